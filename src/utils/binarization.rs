use crate::models::BitMatrix;
use image::GrayImage;
use rayon::prelude::*;

/// Which side of the local threshold becomes foreground (255)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// Pixels at or below the threshold (dark ink) become 255
    InkForeground,
    /// Pixels above the threshold (paper) become 255
    PaperForeground,
}

/// Convert grayscale pixels to binary using Otsu's thresholding method
/// Returns a BitMatrix where true = ink (darker class), false = paper
pub fn otsu_binarize(gray: &[u8], width: usize, height: usize) -> BitMatrix {
    let threshold = otsu_threshold(gray);
    BitMatrix::from_fn(width, height, |x, y| gray[y * width + x] < threshold)
}

/// Calculate Otsu's optimal threshold.
///
/// Pixels `< threshold` form the dark class. A single-valued input has no
/// separable classes and yields 128, so uniform black reads as ink and
/// uniform white as paper.
pub fn otsu_threshold(gray: &[u8]) -> u8 {
    let mut histogram = [0u64; 256];
    for &pixel in gray {
        histogram[pixel as usize] += 1;
    }

    let total = gray.len() as u64;
    let total_sum: u64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &c)| i as u64 * c)
        .sum();

    let mut max_variance = 0.0f64;
    let mut optimal_threshold = 128u8;
    let mut dark_pixels = 0u64;
    let mut dark_sum = 0u64;

    // threshold t splits [0, t) from [t, 255]
    for t in 1..=255usize {
        dark_pixels += histogram[t - 1];
        dark_sum += (t as u64 - 1) * histogram[t - 1];
        let light_pixels = total - dark_pixels;
        if dark_pixels == 0 || light_pixels == 0 {
            continue;
        }

        let dark_mean = dark_sum as f64 / dark_pixels as f64;
        let light_mean = (total_sum - dark_sum) as f64 / light_pixels as f64;
        let w_dark = dark_pixels as f64 / total as f64;
        let w_light = light_pixels as f64 / total as f64;
        let variance = w_dark * w_light * (dark_mean - light_mean).powi(2);

        if variance > max_variance {
            max_variance = variance;
            optimal_threshold = t as u8;
        }
    }

    optimal_threshold
}

/// Summed-area table with one row/column of zero padding
struct IntegralImage {
    stride: usize,
    sums: Vec<u64>,
}

impl IntegralImage {
    fn new(gray: &GrayImage) -> Self {
        let (w, h) = (gray.width() as usize, gray.height() as usize);
        let stride = w + 1;
        let mut sums = vec![0u64; stride * (h + 1)];
        let raw = gray.as_raw();
        for y in 0..h {
            let mut row_sum = 0u64;
            for x in 0..w {
                row_sum += raw[y * w + x] as u64;
                sums[(y + 1) * stride + x + 1] = sums[y * stride + x + 1] + row_sum;
            }
        }
        Self { stride, sums }
    }

    /// Sum over the inclusive-exclusive box [x0, x1) x [y0, y1)
    fn box_sum(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> u64 {
        let s = self.stride;
        self.sums[y1 * s + x1] + self.sums[y0 * s + x0]
            - self.sums[y0 * s + x1]
            - self.sums[y1 * s + x0]
    }
}

/// Local-mean adaptive threshold.
///
/// Each pixel is compared against the mean of the `block_size` x `block_size`
/// window around it (clipped at the borders) minus `offset`. With
/// [`Polarity::InkForeground`] a pixel becomes 255 when `value <= mean - offset`.
pub fn adaptive_threshold(
    gray: &GrayImage,
    block_size: u32,
    offset: i32,
    polarity: Polarity,
) -> GrayImage {
    let (w, h) = (gray.width() as usize, gray.height() as usize);
    if w == 0 || h == 0 {
        return GrayImage::new(gray.width(), gray.height());
    }
    let integral = IntegralImage::new(gray);
    let radius = (block_size.max(3) / 2) as usize;
    let raw = gray.as_raw();
    let mut out = vec![0u8; w * h];

    out.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
        let y0 = y.saturating_sub(radius);
        let y1 = (y + radius + 1).min(h);
        for (x, dst) in row.iter_mut().enumerate() {
            let x0 = x.saturating_sub(radius);
            let x1 = (x + radius + 1).min(w);
            let count = ((x1 - x0) * (y1 - y0)) as f64;
            let mean = integral.box_sum(x0, y0, x1, y1) as f64 / count;
            let is_ink = (raw[y * w + x] as f64) <= mean - offset as f64;
            let foreground = match polarity {
                Polarity::InkForeground => is_ink,
                Polarity::PaperForeground => !is_ink,
            };
            *dst = if foreground { 255 } else { 0 };
        }
    });

    GrayImage::from_raw(gray.width(), gray.height(), out)
        .unwrap_or_else(|| GrayImage::new(gray.width(), gray.height()))
}

/// Bitwise inverse of an 8-bit image
pub fn invert(gray: &GrayImage) -> GrayImage {
    let mut out = gray.clone();
    for p in out.pixels_mut() {
        p[0] = 255 - p[0];
    }
    out
}
