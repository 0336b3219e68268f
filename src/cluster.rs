use crate::scanner::ImageRecord;

/// A representative plus the images matched to it, in match order. The
/// representative is always the first image of the set seen in input
/// order that matched no earlier representative.
#[derive(Debug)]
pub struct Cluster {
    pub representative: ImageRecord,
    pub duplicates: Vec<ImageRecord>,
}

fn basename(record: &ImageRecord) -> String {
    record.path.file_name().unwrap_or_default().to_string_lossy().into_owned()
}

/// Greedy single-pass grouping. Each record is compared against the
/// representatives discovered so far, in discovery order; the FIRST one
/// within `threshold` (strict less-than) claims it. No match makes the
/// record a new representative, eligible to claim later images.
///
/// Order sensitivity is intended: which image of a near-duplicate set
/// anchors the group depends on the input order, and the first-match rule
/// means a closer representative later in the scan never steals a match.
/// Every input ends up in exactly one cluster, as representative or as
/// duplicate.
pub fn cluster(records: Vec<ImageRecord>, threshold: u32) -> Vec<Cluster> {
    let mut clusters: Vec<Cluster> = Vec::new();

    for record in records {
        let (w, h) = record.resolution;
        println!("Processing: {} ({}x{})", basename(&record), w, h);

        let matched = clusters
            .iter()
            .position(|c| record.hash.hamming_distance(&c.representative.hash) < threshold);

        match matched {
            Some(idx) => {
                println!("Detected duplicate of: {}", basename(&clusters[idx].representative));
                clusters[idx].duplicates.push(record);
            }
            None => {
                println!("Unique image.");
                clusters.push(Cluster { representative: record, duplicates: Vec::new() });
            }
        }
    }

    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phash::HashCode;
    use rand::prelude::*;
    use std::collections::HashSet;
    use std::path::PathBuf;

    // 8x8 codes fit one word, which keeps the fixtures readable.
    fn rec(name: &str, word: u64) -> ImageRecord {
        ImageRecord {
            path: PathBuf::from(name),
            resolution: (100, 100),
            hash: HashCode { size: 8, bits: vec![word] },
        }
    }

    fn names(records: &[ImageRecord]) -> Vec<&str> {
        records.iter().map(|r| r.path.to_str().unwrap()).collect()
    }

    #[test]
    fn empty_input_yields_no_clusters() {
        assert!(cluster(Vec::new(), 10).is_empty());
    }

    #[test]
    fn identical_hashes_group_together() {
        let clusters = cluster(vec![rec("a.jpg", 42), rec("b.jpg", 42)], 1);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].representative.path.to_str(), Some("a.jpg"));
        assert_eq!(names(&clusters[0].duplicates), ["b.jpg"]);
    }

    #[test]
    fn distance_at_threshold_is_not_a_duplicate() {
        // 0b111 is exactly 3 bits away from 0
        let at = cluster(vec![rec("a.jpg", 0), rec("b.jpg", 0b111)], 3);
        assert_eq!(at.len(), 2, "strict less-than: distance == threshold stays unique");

        let below = cluster(vec![rec("a.jpg", 0), rec("b.jpg", 0b111)], 4);
        assert_eq!(below.len(), 1);
        assert_eq!(names(&below[0].duplicates), ["b.jpg"]);
    }

    #[test]
    fn first_match_wins_over_closer_later_representative() {
        // x is distance 2 from r1 but only 1 from r2; scan order still
        // hands it to r1.
        let clusters = cluster(
            vec![rec("r1.jpg", 0b000), rec("r2.jpg", 0b111), rec("x.jpg", 0b110)],
            3,
        );
        assert_eq!(clusters.len(), 2);
        assert_eq!(names(&clusters[0].duplicates), ["x.jpg"]);
        assert!(clusters[1].duplicates.is_empty());
    }

    #[test]
    fn representative_choice_depends_on_input_order() {
        // d(a,b) = 2, d(b,c) = 2, d(a,c) = 4, threshold 3: whichever of
        // the chain's endpoints comes first anchors b's group.
        let forward = cluster(
            vec![rec("a.jpg", 0b0000), rec("b.jpg", 0b0011), rec("c.jpg", 0b1111)],
            3,
        );
        assert_eq!(names(&forward[0].duplicates), ["b.jpg"]);
        assert_eq!(forward[1].representative.path.to_str(), Some("c.jpg"));

        let reverse = cluster(
            vec![rec("c.jpg", 0b1111), rec("b.jpg", 0b0011), rec("a.jpg", 0b0000)],
            3,
        );
        assert_eq!(reverse[0].representative.path.to_str(), Some("c.jpg"));
        assert_eq!(names(&reverse[0].duplicates), ["b.jpg"]);
        assert_eq!(reverse[1].representative.path.to_str(), Some("a.jpg"));
    }

    #[test]
    fn zero_threshold_keeps_everything_unique() {
        let clusters = cluster(vec![rec("a.jpg", 7), rec("b.jpg", 7), rec("c.jpg", 7)], 0);
        assert_eq!(clusters.len(), 3);
        assert!(clusters.iter().all(|c| c.duplicates.is_empty()));
    }

    #[test]
    fn threshold_above_max_distance_collapses_to_one_group() {
        let mut rng = rand::rng();
        let records: Vec<ImageRecord> =
            (0..50).map(|i| rec(&format!("img_{i}.jpg"), rng.random())).collect();

        let clusters = cluster(records, 65);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].duplicates.len(), 49);
    }

    #[test]
    fn every_image_lands_in_exactly_one_group() {
        let mut rng = rand::rng();
        let records: Vec<ImageRecord> =
            (0..500).map(|i| rec(&format!("img_{i}.jpg"), rng.random())).collect();

        let clusters = cluster(records, 10);

        let mut seen = HashSet::new();
        let mut total = 0usize;
        for c in &clusters {
            assert!(seen.insert(c.representative.path.clone()), "representative repeated");
            total += 1;
            for d in &c.duplicates {
                assert!(seen.insert(d.path.clone()), "duplicate appears twice");
                total += 1;
            }
        }
        assert_eq!(total, 500);
    }
}
