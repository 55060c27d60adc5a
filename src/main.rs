use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use dicom_surface::{Pipeline, PipelineConfig, Result};

#[derive(Parser, Debug)]
#[command(name = "dicom-surface")]
#[command(about = "Preview images and surface meshes from DICOM series")]
struct Args {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write the middle slice as an 8-bit image
    Preview {
        /// DICOM directory, file, or raster image
        input: PathBuf,

        /// Output image; format follows the extension
        #[arg(default_value = "preview.png")]
        output: PathBuf,
    },
    /// Extract the surface of a threshold band as binary STL
    Mesh {
        input: PathBuf,

        #[arg(default_value = "mesh.stl")]
        output: PathBuf,

        /// Lowest intensity inside the band
        #[arg(long, allow_negative_numbers = true)]
        lower: f32,

        /// Highest intensity inside the band
        #[arg(long, allow_negative_numbers = true)]
        upper: f32,

        /// Iso level on the binarized mask; midway between the mask labels by default
        #[arg(long)]
        iso: Option<f32>,
    },
    /// Write every axial slice clipped to a threshold band
    Slices {
        input: PathBuf,

        #[arg(default_value = "segmented")]
        output_dir: PathBuf,

        #[arg(long, allow_negative_numbers = true)]
        lower: f32,

        #[arg(long, allow_negative_numbers = true)]
        upper: f32,
    },
}

fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    let pipeline = Pipeline::new(config);

    match args.command {
        Commands::Preview { input, output } => {
            let path = pipeline.make_preview(&input, &output)?;
            log::info!("Preview written to {}", path.display());
        }
        Commands::Mesh {
            input,
            output,
            lower,
            upper,
            iso,
        } => {
            let iso = iso.unwrap_or_else(|| pipeline.config().mesh.default_iso_level());
            let artifact = pipeline.make_mesh(&input, lower, upper, iso, &output)?;
            log::info!(
                "Mesh written to {} ({} vertices, {} faces)",
                artifact.path.display(),
                artifact.vertex_count,
                artifact.face_count
            );
        }
        Commands::Slices {
            input,
            output_dir,
            lower,
            upper,
        } => {
            let paths = pipeline.make_segmented_slices(&input, lower, upper, &output_dir)?;
            log::info!("{} slices written to {}", paths.len(), output_dir.display());
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
