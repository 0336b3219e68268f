use anyhow::Result;
use clap::Parser;
use crossbeam_channel::unbounded;
use std::path::PathBuf;
use std::thread;

use crate::scanner::{DecodePolicy, ScanConfig};

mod cluster;
mod materialize;
mod phash;
mod preprocess;
mod scanner;

// --- CLI Definition ---

#[derive(Parser, Debug)]
#[command(author, version, about = "Sorts a photo folder into unique images and near-duplicate groups.", long_about = None)]
struct Cli {
    /// Folder containing the .jpg images to sort
    #[arg(long, value_name = "DIR")]
    input_folder: PathBuf,

    /// Destination folder for the unique/ and duplicates/ trees
    #[arg(long, value_name = "DIR", default_value = "processed_images")]
    dest: PathBuf,

    /// Duplicate threshold as a percentage of the maximum hash distance
    #[arg(long, default_value_t = 5.0)]
    threshold_percent: f64,

    /// Absolute Hamming distance threshold; overrides --threshold-percent
    #[arg(long)]
    threshold: Option<u32>,

    /// Pixels cropped from every edge before hashing
    #[arg(long, default_value_t = 0)]
    padding: u32,

    /// Hash size N; hash codes carry N*N bits
    #[arg(long, default_value_t = 16)]
    hash_size: u32,

    /// Skip images that fail to decode instead of aborting the run
    #[arg(long)]
    skip_unreadable: bool,

    /// Only create duplicates/<name>/ folders for representatives that
    /// matched at least one other image
    #[arg(long)]
    matched_only: bool,
}

impl Cli {
    fn validate(&self) -> Result<(), String> {
        if !(2..=64).contains(&self.hash_size) {
            return Err(format!("Hash size must be 2-64. Got {}.", self.hash_size));
        }

        let max_distance = self.hash_size * self.hash_size;
        if let Some(t) = self.threshold
            && t > max_distance
        {
            return Err(format!(
                "Threshold must be 0-{} for hash size {}. Got {}.",
                max_distance, self.hash_size, t
            ));
        }

        if !(0.0..=100.0).contains(&self.threshold_percent) {
            return Err(format!("Threshold percent must be 0-100. Got {}.", self.threshold_percent));
        }

        Ok(())
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    let config = ScanConfig {
        padding: args.padding,
        hash_size: args.hash_size,
        threshold: scanner::resolve_threshold(args.threshold, args.threshold_percent, args.hash_size),
        on_decode_error: if args.skip_unreadable { DecodePolicy::Skip } else { DecodePolicy::Abort },
        matched_only: args.matched_only,
    };

    let files = scanner::collect_images(&args.input_folder)?;
    println!(
        "Found {} .jpg images in {} (threshold {} of {} bits).\n",
        files.len(),
        args.input_folder.display(),
        config.threshold,
        config.hash_size * config.hash_size
    );

    // Hash in parallel; the clustering pass below stays strictly
    // sequential because each decision depends on the representatives
    // established by all earlier images.
    let (tx, rx) = unbounded();
    let printer = thread::spawn(move || {
        for (done, total) in rx {
            println!("Hashed {}/{} images", done, total);
        }
    });
    let records = scanner::hash_images(&files, &config, Some(tx));
    let _ = printer.join();
    let records = records?;

    let skipped = files.len() - records.len();
    if skipped > 0 {
        println!("Skipped {} unreadable images.", skipped);
    }

    println!("\nComparing images...\n");
    let clusters = cluster::cluster(records, config.threshold);

    println!("\nSaving files...");
    let summary = materialize::materialize(&clusters, &args.dest, config.matched_only)?;

    println!(
        "\nDone. {} unique images, {} duplicates in {} groups under {}.",
        summary.unique_count,
        summary.duplicate_count,
        summary.group_count,
        args.dest.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_cli() -> Cli {
        Cli {
            input_folder: PathBuf::from("photos"),
            dest: PathBuf::from("processed_images"),
            threshold_percent: 5.0,
            threshold: None,
            padding: 0,
            hash_size: 16,
            skip_unreadable: false,
            matched_only: false,
        }
    }

    #[test]
    fn default_settings_validate() {
        assert!(base_cli().validate().is_ok());
    }

    #[test]
    fn out_of_range_settings_are_rejected() {
        let mut cli = base_cli();
        cli.hash_size = 1;
        assert!(cli.validate().is_err());

        let mut cli = base_cli();
        cli.threshold = Some(300); // > 16^2
        assert!(cli.validate().is_err());

        let mut cli = base_cli();
        cli.threshold_percent = 101.0;
        assert!(cli.validate().is_err());
    }
}
