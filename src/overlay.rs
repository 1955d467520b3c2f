//! Debug renderings of the marker search and the bubble scoring.

use crate::detector::MarkerDetection;
use crate::models::{PageLayout, Rect};
use crate::scorer::MarkScorer;
use crate::utils::geometry::pt_to_px;
use crate::utils::grayscale::{gray_to_rgb, to_gray_image};
use image::{Rgb, RgbImage, imageops};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_circle_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect as DrawRect;

const BLUE: Rgb<u8> = Rgb([40, 90, 255]);
const YELLOW: Rgb<u8> = Rgb([250, 200, 0]);
const GREEN: Rgb<u8> = Rgb([0, 200, 60]);
const RED: Rgb<u8> = Rgb([230, 30, 30]);

fn outline(img: &mut RgbImage, rect: &Rect, color: Rgb<u8>) {
    if rect.w <= 0 || rect.h <= 0 {
        return;
    }
    let r = DrawRect::at(rect.x, rect.y).of_size(rect.w as u32, rect.h as u32);
    draw_hollow_rect_mut(img, r, color);
}

/// Photo annotated with the identifier box, every candidate and the chosen
/// anchors, next to the threshold mask the contours were traced on.
///
/// Detected anchors are green, placeholder corners red.
pub fn marker_overlay(photo: &RgbImage, detection: &MarkerDetection, identifier: Option<&Rect>) -> RgbImage {
    let mut annotated = photo.clone();
    if let Some(rect) = identifier {
        outline(&mut annotated, rect, BLUE);
    }
    for cand in &detection.candidates {
        outline(&mut annotated, &cand.bbox, YELLOW);
    }
    let dot = (photo.width().min(photo.height()) / 100).max(3) as i32;
    for (p, &found) in detection.anchors.points.iter().zip(&detection.anchors.detected) {
        let center = (p.x.round() as i32, p.y.round() as i32);
        draw_filled_circle_mut(&mut annotated, center, dot, if found { GREEN } else { RED });
    }

    let mask = gray_to_rgb(&detection.mask);
    let (w, h) = annotated.dimensions();
    let mut canvas = RgbImage::new(w + mask.width(), h.max(mask.height()));
    imageops::replace(&mut canvas, &annotated, 0, 0);
    imageops::replace(&mut canvas, &mask, i64::from(w), 0);
    canvas
}

/// Canonical page with every layout bubble outlined: green when its fill
/// ratio clears the threshold, red otherwise.
pub fn bubble_overlay(canonical: &RgbImage, layout: &PageLayout, scorer: &MarkScorer, px_per_pt: f32) -> RgbImage {
    let gray = to_gray_image(canonical);
    let mut out = canonical.clone();
    let mut mark = |x: f32, y: f32, r: f32| {
        let ratio = scorer.score(&gray, x, y, r);
        let color = if scorer.is_filled(ratio) { GREEN } else { RED };
        let center = (pt_to_px(x, px_per_pt), pt_to_px(y, px_per_pt));
        let radius = pt_to_px(r, px_per_pt).max(1);
        draw_hollow_circle_mut(&mut out, center, radius, color);
        draw_hollow_circle_mut(&mut out, center, radius + 1, color);
    };

    for question in &layout.questions {
        for option in &question.options {
            mark(option.x, option.y, option.r);
        }
    }
    if let Some(ext_id) = &layout.ext_id {
        for bubble in ext_id.cells.iter().flat_map(|c| &c.bubbles) {
            mark(bubble.x, bubble.y, bubble.r);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::MarkerDetector;
    use crate::models::{OptionSpec, QuestionSpec};
    use image::GrayImage;

    #[test]
    fn test_marker_overlay_is_side_by_side() {
        let photo = RgbImage::from_pixel(120, 90, Rgb([240, 240, 240]));
        let gray = to_gray_image(&photo);
        let detection = MarkerDetector::default().detect(&gray, None, 0);
        let overlay = marker_overlay(&photo, &detection, Some(&Rect::new(70, 5, 30, 30)));
        assert_eq!(overlay.dimensions(), (240, 90));
        assert_eq!(*overlay.get_pixel(70, 5), BLUE);
        // placeholder corner dot at the top-left
        assert_eq!(*overlay.get_pixel(0, 0), RED);
        let m = detection.mask.get_pixel(60, 45)[0];
        assert_eq!(overlay.get_pixel(180, 45).0, [m, m, m]);
        assert_eq!(overlay.get_pixel(60, 45).0, [240, 240, 240]);
    }

    #[test]
    fn test_bubble_overlay_colors() {
        let mut page = GrayImage::from_pixel(100, 60, image::Luma([245]));
        imageproc::drawing::draw_filled_circle_mut(&mut page, (20, 20), 8, image::Luma([10]));
        let canonical = gray_to_rgb(&page);
        let layout = PageLayout {
            questions: vec![QuestionSpec {
                question_id: 1,
                options: vec![
                    OptionSpec { label: "A".into(), x: 10.0, y: 10.0, r: 4.0 },
                    OptionSpec { label: "B".into(), x: 30.0, y: 10.0, r: 4.0 },
                ],
            }],
            ..Default::default()
        };
        let scorer = MarkScorer::new(2.0, 0.33);
        let out = bubble_overlay(&canonical, &layout, &scorer, 2.0);
        assert_eq!(*out.get_pixel(28, 20), GREEN);
        assert_eq!(*out.get_pixel(68, 20), RED);
    }
}
