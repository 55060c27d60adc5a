use dicom::core::{DataElement, PrimitiveValue, VR};
use dicom::object::{FileMetaTableBuilder, InMemDicomObject};
use dicom_dictionary_std::{tags, uids};
use std::path::{Path, PathBuf};

pub const ROWS: usize = 10;
pub const COLUMNS: usize = 10;
pub const DEPTH: usize = 8;
pub const PIXEL_SPACING: f32 = 0.5;
pub const SLICE_SPACING: f32 = 2.0;
pub const INSIDE: u16 = 1000;

/// Voxels of the bright block: z in 2..6, y and x in 3..7.
pub fn in_block(z: usize, y: usize, x: usize) -> bool {
    (2..6).contains(&z) && (3..7).contains(&y) && (3..7).contains(&x)
}

fn strs(values: &[String]) -> PrimitiveValue {
    PrimitiveValue::Strs(values.iter().cloned().collect())
}

/// Write one 16-bit MONOCHROME2 CT slice.
pub fn write_slice(
    path: &Path,
    instance: usize,
    z_position: f32,
    rows: usize,
    columns: usize,
    pixel: impl Fn(usize, usize) -> u16,
) {
    let pixels = (0..rows)
        .flat_map(|y| (0..columns).map(move |x| (y, x)))
        .map(|(y, x)| pixel(y, x))
        .collect();
    write_object(path, instance, z_position, rows, columns, 1, None, pixels);
}

/// Write one multi-frame file; frame `f` is the slice at
/// `f * spacing_between_slices` above the first.
pub fn write_multiframe(
    path: &Path,
    frames: usize,
    rows: usize,
    columns: usize,
    spacing_between_slices: f32,
    pixel: impl Fn(usize, usize, usize) -> u16,
) {
    let mut pixels = Vec::with_capacity(frames * rows * columns);
    for f in 0..frames {
        for y in 0..rows {
            for x in 0..columns {
                pixels.push(pixel(f, y, x));
            }
        }
    }
    write_object(path, 1, 0.0, rows, columns, frames, Some(spacing_between_slices), pixels);
}

/// Write a slice whose pixel data holds only half of the declared samples.
pub fn write_truncated_slice(path: &Path, instance: usize, z_position: f32) {
    let pixels = vec![INSIDE; ROWS * COLUMNS / 2];
    write_object(path, instance, z_position, ROWS, COLUMNS, 1, None, pixels);
}

#[allow(clippy::too_many_arguments)]
fn write_object(
    path: &Path,
    instance: usize,
    z_position: f32,
    rows: usize,
    columns: usize,
    frames: usize,
    spacing_between_slices: Option<f32>,
    pixels: Vec<u16>,
) {
    let sop_instance_uid = format!("1.2.826.0.1.3680043.2.1125.{instance}.{frames}");

    let mut object = InMemDicomObject::from_element_iter([
        DataElement::new(tags::SOP_CLASS_UID, VR::UI, PrimitiveValue::from(uids::CT_IMAGE_STORAGE)),
        DataElement::new(tags::SOP_INSTANCE_UID, VR::UI, PrimitiveValue::from(sop_instance_uid.as_str())),
        DataElement::new(tags::MODALITY, VR::CS, PrimitiveValue::from("CT")),
        DataElement::new(tags::INSTANCE_NUMBER, VR::IS, PrimitiveValue::from(instance.to_string())),
        DataElement::new(
            tags::IMAGE_POSITION_PATIENT,
            VR::DS,
            strs(&["0".to_string(), "0".to_string(), z_position.to_string()]),
        ),
        DataElement::new(
            tags::PIXEL_SPACING,
            VR::DS,
            strs(&[PIXEL_SPACING.to_string(), PIXEL_SPACING.to_string()]),
        ),
        DataElement::new(tags::SAMPLES_PER_PIXEL, VR::US, PrimitiveValue::from(1_u16)),
        DataElement::new(tags::PHOTOMETRIC_INTERPRETATION, VR::CS, PrimitiveValue::from("MONOCHROME2")),
        DataElement::new(tags::ROWS, VR::US, PrimitiveValue::from(rows as u16)),
        DataElement::new(tags::COLUMNS, VR::US, PrimitiveValue::from(columns as u16)),
        DataElement::new(tags::BITS_ALLOCATED, VR::US, PrimitiveValue::from(16_u16)),
        DataElement::new(tags::BITS_STORED, VR::US, PrimitiveValue::from(16_u16)),
        DataElement::new(tags::HIGH_BIT, VR::US, PrimitiveValue::from(15_u16)),
        DataElement::new(tags::PIXEL_REPRESENTATION, VR::US, PrimitiveValue::from(0_u16)),
        DataElement::new(tags::PIXEL_DATA, VR::OW, PrimitiveValue::U16(pixels.into())),
    ]);
    if frames > 1 {
        object.put(DataElement::new(
            tags::NUMBER_OF_FRAMES,
            VR::IS,
            PrimitiveValue::from(frames.to_string()),
        ));
    }
    if let Some(spacing) = spacing_between_slices {
        object.put(DataElement::new(
            tags::SPACING_BETWEEN_SLICES,
            VR::DS,
            PrimitiveValue::from(spacing.to_string()),
        ));
    }

    object
        .with_meta(
            FileMetaTableBuilder::new()
                .transfer_syntax(uids::EXPLICIT_VR_LITTLE_ENDIAN)
                .media_storage_sop_class_uid(uids::CT_IMAGE_STORAGE)
                .media_storage_sop_instance_uid(sop_instance_uid.as_str()),
        )
        .unwrap()
        .write_to_file(path)
        .unwrap();
}

/// A series holding one bright block on a dark background. File names run
/// opposite to slice position so only the position tag gives the order.
pub fn write_block_series(dir: &Path) -> PathBuf {
    for z in 0..DEPTH {
        let name = format!("IM{:02}.dcm", DEPTH - z);
        write_slice(&dir.join(name), z + 1, z as f32 * SLICE_SPACING, ROWS, COLUMNS, |y, x| {
            if in_block(z, y, x) { INSIDE } else { 0 }
        });
    }
    dir.to_path_buf()
}
