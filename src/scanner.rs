use anyhow::{Context, Result, anyhow, bail};
use crossbeam_channel::Sender;
use image::GenericImageView;
use jpeg_decoder::Decoder as Tier2Decoder;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use walkdir::WalkDir;
use zune_jpeg::JpegDecoder as ZuneDecoder;

use crate::phash::{DctHasher, HashCode};
use crate::preprocess;

/// One input image with its hash. Created when the path is first
/// processed; the hash is computed exactly once and never changes.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    pub path: PathBuf,
    pub resolution: (u32, u32),
    pub hash: HashCode,
}

/// What to do with a file that cannot be decoded or cropped. One policy
/// per run, applied uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodePolicy {
    Abort,
    Skip,
}

/// Run-level settings, resolved once at startup and passed down explicitly.
#[derive(Clone)]
pub struct ScanConfig {
    pub padding: u32,
    pub hash_size: u32,
    pub threshold: u32,
    pub on_decode_error: DecodePolicy,
    pub matched_only: bool,
}

/// Resolve the duplicate threshold once: an absolute distance wins,
/// otherwise the percentage of the maximum distance (hash_size^2).
pub fn resolve_threshold(absolute: Option<u32>, percent: f64, hash_size: u32) -> u32 {
    match absolute {
        Some(t) => t,
        None => {
            let max_distance = (hash_size * hash_size) as f64;
            (percent / 100.0 * max_distance).round() as u32
        }
    }
}

pub fn is_image_ext(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"))
        .unwrap_or(false)
}

/// List the .jpg files directly inside `dir`, in directory order. The
/// listing order is kept as-is because it decides which image of a
/// near-duplicate set becomes the group representative.
pub fn collect_images(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!("input path is not a directory: {}", dir.display());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).max_depth(1).into_iter().filter_map(|e| e.ok()) {
        if entry.file_type().is_file() && is_image_ext(entry.path()) {
            files.push(entry.path().to_path_buf());
        }
    }

    if files.is_empty() {
        bail!("no .jpg images found in {}", dir.display());
    }
    Ok(files)
}

/// Hash every input in parallel. Hashing has no cross-image dependency, so
/// this is safe; the collected output keeps the input order, which the
/// clustering pass depends on. Progress pairs (done, total) go out over
/// the optional channel.
pub fn hash_images(
    paths: &[PathBuf],
    config: &ScanConfig,
    progress_tx: Option<Sender<(usize, usize)>>,
) -> Result<Vec<ImageRecord>> {
    let total = paths.len();
    let processed = AtomicUsize::new(0);
    let hash_size = config.hash_size;

    let results: Vec<Option<ImageRecord>> = paths
        .par_iter()
        .map_init(
            || DctHasher::new(hash_size),
            |hasher, path| {
                let record = load_and_hash(path, config, hasher);

                if let Some(tx) = &progress_tx {
                    let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
                    if done.is_multiple_of(10) || done == total {
                        let _ = tx.send((done, total));
                    }
                }

                match record {
                    Ok(rec) => Ok(Some(rec)),
                    Err(e) => match config.on_decode_error {
                        DecodePolicy::Abort => Err(e),
                        DecodePolicy::Skip => {
                            eprintln!("[WARN] Skipping {}: {:#}", path.display(), e);
                            Ok(None)
                        }
                    },
                }
            },
        )
        .collect::<Result<_>>()?;

    Ok(results.into_iter().flatten().collect())
}

fn load_and_hash(path: &Path, config: &ScanConfig, hasher: &DctHasher) -> Result<ImageRecord> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let img = load_image(path, &bytes)
        .ok_or_else(|| anyhow!("failed to decode {}", path.display()))?;
    let resolution = img.dimensions();

    let orientation = preprocess::get_orientation(path, Some(&bytes));
    let prepared = preprocess::prepare(img, orientation, config.padding)
        .with_context(|| format!("preprocessing {}", path.display()))?;

    Ok(ImageRecord {
        path: path.to_path_buf(),
        resolution,
        hash: hasher.hash_image(&prepared),
    })
}

/// Tiered JPEG loader: zune-jpeg first, jpeg-decoder as fallback, then the
/// image crate for anything the fast decoders reject.
fn load_image(path: &Path, bytes: &[u8]) -> Option<image::DynamicImage> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    if matches!(ext.as_str(), "jpg" | "jpeg") {
        // TIER 1: Zune-JPEG
        let mut zune = ZuneDecoder::new(bytes);
        if let Ok(pixels) = zune.decode()
            && let Some(info) = zune.info()
        {
            if let Some(img) = buffer_from_raw(info.width as u32, info.height as u32, pixels) {
                return Some(img);
            }
        }

        // TIER 2: jpeg-decoder
        let mut decoder = Tier2Decoder::new(std::io::Cursor::new(bytes));
        if let Ok(pixels) = decoder.decode()
            && let Some(info) = decoder.info()
        {
            if let Some(img) = buffer_from_raw(info.width as u32, info.height as u32, pixels) {
                return Some(img);
            }
        }
    }

    // Handles progressive oddities and corrupted headers
    image::load_from_memory(bytes).ok()
}

/// Wrap a raw decoded buffer, working out the channel count from its size.
fn buffer_from_raw(w: u32, h: u32, pixels: Vec<u8>) -> Option<image::DynamicImage> {
    let len = pixels.len();
    if len == (w * h) as usize {
        // Grayscale
        image::ImageBuffer::<image::Luma<u8>, _>::from_raw(w, h, pixels)
            .map(image::DynamicImage::ImageLuma8)
    } else if len == (w * h * 3) as usize {
        // RGB
        image::ImageBuffer::<image::Rgb<u8>, _>::from_raw(w, h, pixels)
            .map(image::DynamicImage::ImageRgb8)
    } else if len == (w * h * 4) as usize {
        // RGBA (or CMYK widened by the decoder)
        image::ImageBuffer::<image::Rgba<u8>, _>::from_raw(w, h, pixels)
            .map(image::DynamicImage::ImageRgba8)
    } else {
        None
    }
}
