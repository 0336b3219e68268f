use image::DynamicImage;
use rustdct::{DctPlanner, TransformType2And3};
use std::sync::Arc;

//     This program is free software: you can redistribute it and/or modify it under the terms of the
//     GNU General Public License as published by the Free Software Foundation, either version 3 of
//     the License, or (at your option) any later version.
//     This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
//     without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See
//     the GNU General Public License for more details.
//     You should have received a copy of the GNU General Public License along with this program.
//     If not, see <https://www.gnu.org/licenses/>.

/// The DCT runs on a grid this many times larger than the hash grid, and
/// only the top-left low frequencies survive. Standard pHash is hash size 8
/// over a 32x32 DCT; the same 4x ratio is kept for every hash size.
const RESIZE_FACTOR: usize = 4;

/// A perceptual hash of `size * size` bits, packed into u64 words.
/// Codes are only comparable when they were produced with the same size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashCode {
    pub size: u32,
    pub bits: Vec<u64>,
}

impl HashCode {
    pub fn bit_len(&self) -> u32 {
        self.size * self.size
    }

    /// Number of differing bits. Panics on mismatched hash sizes; the
    /// distance between codes of different sizes is meaningless.
    pub fn hamming_distance(&self, other: &Self) -> u32 {
        assert_eq!(
            self.size, other.size,
            "hash codes of different sizes are not comparable"
        );
        self.bits
            .iter()
            .zip(&other.bits)
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }
}

pub struct DctHasher {
    hash_size: usize,
    dct_size: usize,
    row_dct: Arc<dyn TransformType2And3<f32>>,
    col_dct: Arc<dyn TransformType2And3<f32>>,
    scratch_len: usize,
}

impl DctHasher {
    /// Initialize the DCT planner for a given hash size. One hasher serves
    /// a whole run, so every image in the run gets the same-length code.
    pub fn new(hash_size: u32) -> Self {
        let hash_size = hash_size as usize;
        let dct_size = hash_size * RESIZE_FACTOR;

        let mut planner = DctPlanner::new();
        let row_dct = planner.plan_dct2(dct_size);
        let col_dct = planner.plan_dct2(dct_size);

        // Calculate required scratch space once
        let scratch_len = std::cmp::max(row_dct.get_scratch_len(), col_dct.get_scratch_len());
        let scratch_len = std::cmp::max(scratch_len, dct_size);

        Self { hash_size, dct_size, row_dct, col_dct, scratch_len }
    }

    /// Calculates the perceptual hash of an image.
    pub fn hash_image(&self, img: &DynamicImage) -> HashCode {
        // 1. Resize to the DCT grid with a Triangle (bilinear) filter and
        //    convert to grayscale.
        let gray_img = img
            .resize_exact(
                self.dct_size as u32,
                self.dct_size as u32,
                image::imageops::FilterType::Triangle,
            )
            .to_luma8();

        // 2. Convert to f32 vector for DCT
        let mut pixels: Vec<f32> = gray_img.as_raw().iter().map(|&b| b as f32).collect();

        // 3. Perform 2D DCT (Separable: Rows then Cols)
        self.perform_dct_2d(&mut pixels);

        // 4. Crop to the top-left hash_size x hash_size low frequencies
        let low_freqs = self.crop_low_frequencies(&pixels);

        // 5. Median of the low frequencies, excluding the DC coefficient
        //    (0,0): it only encodes flat luminance and would skew the
        //    comparison point.
        let mut sorted = low_freqs[1..].to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let median = sorted[sorted.len() / 2];

        // 6. Generate hash bits
        let nbits = self.hash_size * self.hash_size;
        let mut bits = vec![0u64; nbits.div_ceil(64)];
        for (i, &val) in low_freqs.iter().enumerate() {
            if val > median {
                bits[i / 64] |= 1 << (i % 64);
            }
        }

        HashCode { size: self.hash_size as u32, bits }
    }

    /// Helper: In-place 2D DCT on a dct_size x dct_size buffer
    fn perform_dct_2d(&self, buffer: &mut Vec<f32>) {
        let mut scratch = vec![0.0f32; self.scratch_len];

        // Rows
        for row in buffer.chunks_mut(self.dct_size) {
            self.row_dct.process_dct2_with_scratch(row, &mut scratch);
        }

        // Transpose
        let mut transposed = vec![0.0f32; self.dct_size * self.dct_size];
        transpose::transpose(buffer, &mut transposed, self.dct_size, self.dct_size);
        *buffer = transposed;

        // Cols (which are now rows)
        for row in buffer.chunks_mut(self.dct_size) {
            self.col_dct.process_dct2_with_scratch(row, &mut scratch);
        }

        // Transpose back
        let mut final_buf = vec![0.0f32; self.dct_size * self.dct_size];
        transpose::transpose(buffer, &mut final_buf, self.dct_size, self.dct_size);
        *buffer = final_buf;
    }

    /// Helper: Extract the hash_size x hash_size crop from the DCT buffer
    fn crop_low_frequencies(&self, full_dct: &[f32]) -> Vec<f32> {
        let mut crop = Vec::with_capacity(self.hash_size * self.hash_size);
        for y in 0..self.hash_size {
            let start = y * self.dct_size;
            crop.extend_from_slice(&full_dct[start..start + self.hash_size]);
        }
        crop
    }
}
