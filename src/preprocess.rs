use anyhow::{Result, bail};
use image::DynamicImage;
use image::GenericImageView;
use std::fs;
use std::path::Path;

trait BufReadSeek: std::io::BufRead + std::io::Seek {}
impl<T: std::io::BufRead + std::io::Seek> BufReadSeek for T {}

/// Crop `padding` pixels off every edge, then undo any EXIF orientation, so
/// that bordered or rotated re-takes of the same frame hash identically.
pub fn prepare(img: DynamicImage, orientation: u8, padding: u32) -> Result<DynamicImage> {
    let cropped = crop_border(&img, padding)?;
    Ok(apply_orientation(cropped, orientation))
}

/// Remove a uniform `padding`-pixel border. A padding that leaves no pixels
/// is a caller error, not something to silently clamp.
pub fn crop_border(img: &DynamicImage, padding: u32) -> Result<DynamicImage> {
    let (width, height) = img.dimensions();
    if 2 * padding as u64 >= width as u64 || 2 * padding as u64 >= height as u64 {
        bail!(
            "padding {} leaves an empty crop region in a {}x{} image",
            padding, width, height
        );
    }
    if padding == 0 {
        return Ok(img.clone());
    }
    Ok(img.crop_imm(padding, padding, width - 2 * padding, height - 2 * padding))
}

/// Map an EXIF orientation value (1-8) onto the transform that renders the
/// image upright. Out-of-range values are treated as 1 (no transform).
pub fn apply_orientation(img: DynamicImage, orientation: u8) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate90().flipv(),
        8 => img.rotate270(),
        _ => img,
    }
}

pub fn read_exif_data(path: &Path, preloaded_bytes: Option<&[u8]>) -> Option<exif::Exif> {
    let mut reader: Box<dyn BufReadSeek> = match preloaded_bytes {
        Some(bytes) => Box::new(std::io::Cursor::new(bytes)),
        None => {
            let file = fs::File::open(path).ok()?;
            Box::new(std::io::BufReader::new(file))
        }
    };

    exif::Reader::new().read_from_container(&mut reader).ok()
}

/// EXIF orientation (1-8); 1 when the tag is missing or unreadable.
pub fn get_orientation(path: &Path, preloaded_bytes: Option<&[u8]>) -> u8 {
    if let Some(exif_data) = read_exif_data(path, preloaded_bytes)
        && let Some(field) = exif_data.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        && let Some(v @ 1..=8) = field.value.get_uint(0)
    {
        return v as u8;
    }
    1
}
