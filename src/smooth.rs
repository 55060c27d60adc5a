use crate::grid::Grid3;

use ndarray::{Array3, Axis, Zip};

/// Separable Gaussian blur over all three axes.
#[derive(Clone, Copy, Debug)]
pub struct GaussianSmoother {
    sigma: f32,
}

impl GaussianSmoother {
    pub fn new(sigma: f32) -> Self {
        Self { sigma }
    }

    pub fn sigma(&self) -> f32 {
        self.sigma
    }

    /// Normalised 1-D kernel of radius `ceil(3 * sigma)`.
    pub fn kernel(&self) -> Vec<f32> {
        let radius = (3.0 * self.sigma).ceil() as usize;
        let two_sigma_sq = 2.0 * self.sigma * self.sigma;
        let mut kernel: Vec<f32> = (0..=2 * radius)
            .map(|i| {
                let x = i as f32 - radius as f32;
                (-x * x / two_sigma_sq).exp()
            })
            .collect();
        let sum: f32 = kernel.iter().sum();
        kernel.iter_mut().for_each(|k| *k /= sum);
        kernel
    }

    /// Consumes `grid`; a non-positive sigma returns it unchanged.
    pub fn apply(&self, grid: Grid3) -> Grid3 {
        if self.sigma <= 0.0 || grid.is_empty() {
            return grid;
        }
        let kernel = self.kernel();
        log::debug!("Gaussian smoothing, sigma {} ({} taps)", self.sigma, kernel.len());
        grid.map_data(|mut data| {
            for axis in 0..3 {
                convolve_axis(&mut data, Axis(axis), &kernel);
            }
            data
        })
    }
}

/// Convolve every lane along `axis`. Taps falling outside the grid are
/// dropped and the remaining weights renormalised.
fn convolve_axis(data: &mut Array3<f32>, axis: Axis, kernel: &[f32]) {
    let half = kernel.len() / 2;
    Zip::from(data.lanes_mut(axis)).par_for_each(|mut lane| {
        let source = lane.to_vec();
        let n = source.len();
        for (i, out) in lane.iter_mut().enumerate() {
            let mut sum = 0.0_f32;
            let mut weight = 0.0_f32;
            for (k, &kval) in kernel.iter().enumerate() {
                let j = i as isize + k as isize - half as isize;
                if j >= 0 && (j as usize) < n {
                    sum += source[j as usize] * kval;
                    weight += kval;
                }
            }
            *out = sum / weight;
        }
    });
}
