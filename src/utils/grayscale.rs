/// Convert RGB images to grayscale
/// Y = 0.299*R + 0.587*G + 0.114*B
/// Uses fast integer arithmetic: Y = (76*R + 150*G + 29*B) >> 8
use image::{GrayImage, RgbImage};
use rayon::prelude::*;

/// Coefficients for grayscale conversion: Y = (76*R + 150*G + 29*B) >> 8
const COEF_R: u32 = 76;
const COEF_G: u32 = 150;
const COEF_B: u32 = 29;

#[inline]
fn luminance(r: u8, g: u8, b: u8) -> u8 {
    let lum = (COEF_R * r as u32 + COEF_G * g as u32 + COEF_B * b as u32) >> 8;
    lum.min(255) as u8
}

/// Convert raw RGB bytes (3 bytes per pixel) to grayscale
pub fn rgb_to_grayscale(rgb: &[u8], width: usize, height: usize) -> Vec<u8> {
    let pixel_count = width * height;
    let mut gray = vec![0u8; pixel_count];

    // Process rows in parallel
    gray.par_chunks_mut(width.max(1))
        .enumerate()
        .for_each(|(y, row)| {
            let row_start = y * width * 3;
            for (x, out) in row.iter_mut().enumerate() {
                let idx = row_start + x * 3;
                *out = luminance(rgb[idx], rgb[idx + 1], rgb[idx + 2]);
            }
        });

    gray
}

/// Convert an RGB image to a grayscale image
pub fn to_gray_image(img: &RgbImage) -> GrayImage {
    let (width, height) = img.dimensions();
    let gray = rgb_to_grayscale(img.as_raw(), width as usize, height as usize);
    GrayImage::from_raw(width, height, gray).unwrap_or_else(|| GrayImage::new(width, height))
}

/// Expand a grayscale image back to RGB (for overlays)
pub fn gray_to_rgb(gray: &GrayImage) -> RgbImage {
    RgbImage::from_fn(gray.width(), gray.height(), |x, y| {
        let v = gray.get_pixel(x, y)[0];
        image::Rgb([v, v, v])
    })
}
