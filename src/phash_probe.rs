use std::path::Path;
use std::{env, process};

use crate::phash::{DctHasher, HashCode};
use crate::preprocess::{get_orientation, prepare};

mod phash;
mod preprocess;

const PROBE_HASH_SIZE: u32 = 16;

// Prints the orientation-normalized perceptual hash of one or two images;
// with two, also their Hamming distance. Handy for picking a threshold.
fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args.len() > 3 {
        eprintln!("Usage: {} <image_file> [image_file]", args[0]);
        process::exit(1);
    }

    let hasher = DctHasher::new(PROBE_HASH_SIZE);
    let mut codes: Vec<HashCode> = Vec::new();

    for file_path in &args[1..] {
        let path = Path::new(file_path);

        // image::open detects format automatically from file extension/magic bytes
        let img = match image::open(path) {
            Ok(i) => i,
            Err(e) => {
                eprintln!("Error opening file '{}': {}", file_path, e);
                process::exit(1);
            }
        };

        let orientation = get_orientation(path, None);
        let prepared = match prepare(img, orientation, 0) {
            Ok(i) => i,
            Err(e) => {
                eprintln!("Error preparing '{}': {}", file_path, e);
                process::exit(1);
            }
        };

        let code = hasher.hash_image(&prepared);
        let bytes: Vec<u8> = code.bits.iter().flat_map(|w| w.to_be_bytes()).collect();
        println!("{}  {} (orientation {})", hex::encode(bytes), file_path, orientation);
        codes.push(code);
    }

    if let [a, b] = codes.as_slice() {
        println!(
            "Hamming distance: {} of {} bits",
            a.hamming_distance(b),
            a.bit_len()
        );
    }
}
