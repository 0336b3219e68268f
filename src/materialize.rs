use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::cluster::Cluster;

pub struct MaterializeSummary {
    pub unique_count: usize,
    pub duplicate_count: usize,
    pub group_count: usize,
}

/// Lay the clustering result out on disk:
///
///   <dest>/unique/<filename>            every representative
///   <dest>/duplicates/<stem>/<filename> representative + its duplicates
///
/// Representatives get a duplicates/<stem>/ folder even with zero matches
/// unless `matched_only` is set. Copies are plain byte copies of the
/// sources, never re-encoded. Directory creation is idempotent; a failed
/// copy surfaces immediately and leaves earlier copies in place.
pub fn materialize(clusters: &[Cluster], dest: &Path, matched_only: bool) -> Result<MaterializeSummary> {
    let unique_dir = dest.join("unique");
    let duplicates_dir = dest.join("duplicates");
    fs::create_dir_all(&unique_dir)
        .with_context(|| format!("creating {}", unique_dir.display()))?;
    fs::create_dir_all(&duplicates_dir)
        .with_context(|| format!("creating {}", duplicates_dir.display()))?;

    for c in clusters {
        copy_into(&c.representative.path, &unique_dir)?;
    }

    let mut group_count = 0;
    let mut duplicate_count = 0;
    for c in clusters {
        if matched_only && c.duplicates.is_empty() {
            continue;
        }

        let stem = c
            .representative
            .path
            .file_stem()
            .with_context(|| format!("no file stem in {}", c.representative.path.display()))?;
        let group_dir = duplicates_dir.join(stem);
        fs::create_dir_all(&group_dir)
            .with_context(|| format!("creating {}", group_dir.display()))?;

        copy_into(&c.representative.path, &group_dir)?;
        for dup in &c.duplicates {
            copy_into(&dup.path, &group_dir)?;
            duplicate_count += 1;
        }
        group_count += 1;
    }

    Ok(MaterializeSummary { unique_count: clusters.len(), duplicate_count, group_count })
}

fn copy_into(src: &Path, dir: &Path) -> Result<()> {
    let name = src
        .file_name()
        .with_context(|| format!("source path has no file name: {}", src.display()))?;
    let target = dir.join(name);
    fs::copy(src, &target)
        .with_context(|| format!("copying {} to {}", src.display(), target.display()))?;
    println!("Copied: {} -> {}", name.to_string_lossy(), dir.display());
    Ok(())
}
