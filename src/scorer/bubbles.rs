use crate::models::BitMatrix;
use crate::utils::binarization::otsu_binarize;
use image::GrayImage;
use std::f64::consts::PI;

/// Margin added around the circle when cutting out the neighbourhood
const ROI_MARGIN: i32 = 2;

/// Fraction of a circle's ideal area classified as ink.
///
/// The neighbourhood is binarized with its own Otsu threshold. Centres
/// outside the image score 0.0; neighbourhoods crossing the border are
/// clipped. The result is clamped to `[0, 1]`.
pub fn fill_ratio(gray: &GrayImage, cx: i32, cy: i32, r: i32) -> f32 {
    let (w, h) = (gray.width() as i32, gray.height() as i32);
    if r <= 0 || cx < 0 || cy < 0 || cx >= w || cy >= h {
        return 0.0;
    }

    let pad = r.saturating_add(ROI_MARGIN);
    let (x0, y0) = (cx.saturating_sub(pad).max(0), cy.saturating_sub(pad).max(0));
    let (x1, y1) = (
        cx.saturating_add(pad).saturating_add(1).min(w),
        cy.saturating_add(pad).saturating_add(1).min(h),
    );
    let (rw, rh) = ((x1 - x0) as usize, (y1 - y0) as usize);

    let mut roi = Vec::with_capacity(rw * rh);
    for y in y0..y1 {
        for x in x0..x1 {
            roi.push(gray.get_pixel(x as u32, y as u32)[0]);
        }
    }

    let mut ink = otsu_binarize(&roi, rw, rh);
    ink.and_assign(&circle_mask(rw, rh, cx - x0, cy - y0, r));

    let ideal = PI * f64::from(r).powi(2);
    (ink.count_ones() as f64 / ideal).min(1.0) as f32
}

/// Disk of radius `r` centred at `(cx, cy)`
fn circle_mask(width: usize, height: usize, cx: i32, cy: i32, r: i32) -> BitMatrix {
    let r2 = i64::from(r).pow(2);
    BitMatrix::from_fn(width, height, |x, y| {
        let (dx, dy) = (x as i64 - i64::from(cx), y as i64 - i64::from(cy));
        dx * dx + dy * dy <= r2
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_circle_mut};

    #[test]
    fn test_black_and_white() {
        let black = GrayImage::from_pixel(40, 40, Luma([0]));
        let white = GrayImage::from_pixel(40, 40, Luma([255]));
        assert!(fill_ratio(&black, 20, 20, 8) > 0.95);
        assert_eq!(fill_ratio(&white, 20, 20, 8), 0.0);
    }

    #[test]
    fn test_filled_versus_outline() {
        let mut img = GrayImage::from_pixel(80, 40, Luma([245]));
        draw_filled_circle_mut(&mut img, (20, 20), 9, Luma([20]));
        draw_hollow_circle_mut(&mut img, (60, 20), 9, Luma([60]));
        assert!(fill_ratio(&img, 20, 20, 9) > 0.9);
        assert!(fill_ratio(&img, 60, 20, 9) < 0.33);
    }

    #[test]
    fn test_out_of_frame_is_zero() {
        let img = GrayImage::from_pixel(30, 20, Luma([0]));
        assert_eq!(fill_ratio(&img, 30, 10, 5), 0.0);
        assert_eq!(fill_ratio(&img, 10, 20, 5), 0.0);
        assert_eq!(fill_ratio(&img, -1, 10, 5), 0.0);
        assert!(fill_ratio(&img, 29, 10, 5) > 0.0);
    }

    #[test]
    fn test_huge_radius_stays_bounded() {
        let img = GrayImage::from_pixel(40, 40, Luma([0]));
        for r in [50_000, 1 << 20, i32::MAX] {
            let ratio = fill_ratio(&img, 20, 20, r);
            assert!((0.0..=1.0).contains(&ratio), "r={r}: {ratio}");
        }
        assert!(fill_ratio(&img, 20, 20, 50_000) < 1e-3);
    }

    #[test]
    fn test_monotonic_in_coverage() {
        let mut img = GrayImage::from_pixel(40, 40, Luma([250]));
        let mut last = fill_ratio(&img, 20, 20, 10);
        for rows in [4u32, 8, 12, 16, 20] {
            for y in 10..10 + rows {
                for x in 10..31 {
                    img.put_pixel(x, y, Luma([10]));
                }
            }
            let now = fill_ratio(&img, 20, 20, 10);
            assert!(now >= last, "{rows}: {now} < {last}");
            last = now;
        }
        assert!(last > 0.95);
    }
}
