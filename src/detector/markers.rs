use super::contour::ContourDetector;
use crate::config::MarkerParams;
use crate::models::{AnchorId, AnchorSet, Point, Rect};
use crate::utils::binarization::{Polarity, adaptive_threshold};
use crate::utils::geometry::{mask_rect, order_quad_indices};
use image::GrayImage;
use image::imageops;
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology;
use serde::Serialize;
use tracing::{debug, warn};

/// A square blob considered for one of the corners
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerCandidate {
    /// Quadrant the blob was found in
    pub zone: AnchorId,
    /// Moment centroid in image pixels
    pub centroid: Point,
    /// Enclosed area in pixels
    pub area: f64,
    /// Bounding box in image pixels
    pub bbox: Rect,
    /// Distance from the zone's image corner
    pub distance: f32,
}

/// Marker search result
#[derive(Debug, Clone)]
pub struct MarkerDetection {
    /// Chosen anchors, TL/TR/BR/BL
    pub anchors: AnchorSet,
    /// Binary mask the contours were traced on (ink = 255)
    pub mask: GrayImage,
    /// Every blob that passed the shape filters
    pub candidates: Vec<MarkerCandidate>,
}

/// Corner registration marker detector
#[derive(Debug, Clone, Default)]
pub struct MarkerDetector {
    params: MarkerParams,
}

impl MarkerDetector {
    /// Detector with the given parameters
    pub fn new(params: MarkerParams) -> Self {
        Self { params }
    }

    /// Smoothed, locally thresholded and morphologically cleaned ink mask
    pub fn ink_mask(&self, gray: &GrayImage) -> GrayImage {
        let p = &self.params;
        let blurred = if p.blur_sigma > 0.0 {
            gaussian_blur_f32(gray, p.blur_sigma)
        } else {
            gray.clone()
        };
        let binary = adaptive_threshold(&blurred, p.block_size, p.offset, Polarity::InkForeground);
        let closed = morphology::close(&binary, Norm::LInf, p.close_radius);
        morphology::open(&closed, Norm::LInf, p.open_radius)
    }

    /// Find the four corner markers.
    ///
    /// `exclude` (grown by `pad`) is blanked out of the mask first. Never
    /// fails: a quadrant without a usable blob contributes its image corner.
    pub fn detect(&self, gray: &GrayImage, exclude: Option<&Rect>, pad: i32) -> MarkerDetection {
        let (w, h) = gray.dimensions();
        let mut mask = self.ink_mask(gray);
        if let Some(rect) = exclude {
            mask_rect(&mut mask, rect, pad);
        }

        let max_area = self.params.max_area_fraction * w as f64 * h as f64;
        let contours = ContourDetector::new(&self.params);
        let mut candidates = Vec::new();
        let mut chosen = [Point::default(); 4];
        let mut detected = [false; 4];

        for (i, zone) in zones(w, h).into_iter().enumerate() {
            let ideal = zone.ideal;
            let mut best: Option<MarkerCandidate> = None;

            if zone.w > 0 && zone.h > 0 {
                let view = imageops::crop_imm(&mask, zone.x, zone.y, zone.w, zone.h).to_image();
                for square in contours.detect(&view, max_area) {
                    let centroid = square.centroid.translate(zone.x as f32, zone.y as f32);
                    let cand = MarkerCandidate {
                        zone: zone.id,
                        centroid,
                        area: square.area,
                        bbox: Rect::new(
                            square.bbox.x + zone.x as i32,
                            square.bbox.y + zone.y as i32,
                            square.bbox.w,
                            square.bbox.h,
                        ),
                        distance: centroid.distance(&ideal),
                    };
                    if best.as_ref().is_none_or(|b| cand.distance < b.distance) {
                        best = Some(cand.clone());
                    }
                    candidates.push(cand);
                }
            }

            match best {
                Some(b) => {
                    debug!(zone = ?zone.id, x = b.centroid.x, y = b.centroid.y, area = b.area, "marker selected");
                    chosen[i] = b.centroid;
                    detected[i] = true;
                }
                None => {
                    debug!(zone = ?zone.id, "no marker candidate, using image corner");
                    chosen[i] = ideal;
                }
            }
        }

        let order = order_quad_indices(&chosen);
        let anchors = AnchorSet::new(order.map(|i| chosen[i]), order.map(|i| detected[i]));
        if anchors.is_degraded() {
            warn!(
                detected = anchors.detected_count(),
                "corner markers missing, alignment will be approximate"
            );
        }

        MarkerDetection {
            anchors,
            mask,
            candidates,
        }
    }
}

struct Zone {
    id: AnchorId,
    x: u32,
    y: u32,
    w: u32,
    h: u32,
    ideal: Point,
}

/// Image quadrants split at the midpoint, in TL/TR/BR/BL order
fn zones(w: u32, h: u32) -> [Zone; 4] {
    let (mx, my) = (w / 2, h / 2);
    let (fw, fh) = (w as f32, h as f32);
    [
        Zone { id: AnchorId::TL, x: 0, y: 0, w: mx, h: my, ideal: Point::new(0.0, 0.0) },
        Zone { id: AnchorId::TR, x: mx, y: 0, w: w - mx, h: my, ideal: Point::new(fw, 0.0) },
        Zone { id: AnchorId::BR, x: mx, y: my, w: w - mx, h: h - my, ideal: Point::new(fw, fh) },
        Zone { id: AnchorId::BL, x: 0, y: my, w: mx, h: h - my, ideal: Point::new(0.0, fh) },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect as DrawRect;

    fn page(w: u32, h: u32) -> GrayImage {
        GrayImage::from_pixel(w, h, Luma([245]))
    }

    fn square(img: &mut GrayImage, x: i32, y: i32, side: u32) {
        draw_filled_rect_mut(img, DrawRect::at(x, y).of_size(side, side), Luma([10]));
    }

    #[test]
    fn test_four_markers() {
        let mut img = page(600, 800);
        square(&mut img, 30, 40, 20);
        square(&mut img, 550, 35, 20);
        square(&mut img, 545, 740, 20);
        square(&mut img, 25, 745, 20);
        let det = MarkerDetector::default().detect(&img, None, 0);
        assert!(!det.anchors.is_degraded());
        let expect = [(39.5, 49.5), (559.5, 44.5), (554.5, 749.5), (34.5, 754.5)];
        for (p, e) in det.anchors.points.iter().zip(expect) {
            assert!((p.x - e.0).abs() < 1.0 && (p.y - e.1).abs() < 1.0, "{p:?} vs {e:?}");
        }
    }

    #[test]
    fn test_nearest_not_largest() {
        let mut img = page(600, 800);
        // per quadrant: small marker close to the corner, bigger square further in
        let (near, far) = ((20, 564), (150, 410));
        let (near_y, far_y) = ((20, 764), (160, 600));
        square(&mut img, near.0, near_y.0, 16);
        square(&mut img, far.0, far_y.0, 40);
        square(&mut img, near.1, near_y.0, 16);
        square(&mut img, far.1, far_y.0, 40);
        square(&mut img, near.1, near_y.1, 16);
        square(&mut img, far.1, far_y.1, 40);
        square(&mut img, near.0, near_y.1, 16);
        square(&mut img, far.0, far_y.1, 40);

        let det = MarkerDetector::default().detect(&img, None, 0);
        assert!(!det.anchors.is_degraded());
        let expect = [(27.5, 27.5), (571.5, 27.5), (571.5, 771.5), (27.5, 771.5)];
        for (id, e) in AnchorId::ORDER.into_iter().zip(expect) {
            let p = det.anchors.get(id);
            assert!((p.x - e.0).abs() < 1.0 && (p.y - e.1).abs() < 1.0, "{id:?}: {p:?} vs {e:?}");
            assert_eq!(det.candidates.iter().filter(|c| c.zone == id).count(), 2, "{id:?}");
        }
    }

    #[test]
    fn test_blank_page_degrades_to_corners() {
        let img = page(300, 400);
        let det = MarkerDetector::default().detect(&img, None, 0);
        assert_eq!(det.anchors.detected_count(), 0);
        assert_eq!(
            det.anchors.points,
            [
                Point::new(0.0, 0.0),
                Point::new(300.0, 0.0),
                Point::new(300.0, 400.0),
                Point::new(0.0, 400.0),
            ]
        );
    }

    #[test]
    fn test_excluded_region_is_ignored() {
        let mut img = page(600, 800);
        square(&mut img, 540, 30, 30);
        let exclude = Rect::new(540, 30, 30, 30);
        let det = MarkerDetector::default().detect(&img, Some(&exclude), 10);
        assert!(!det.anchors.detected[AnchorId::TR.index()]);
        assert!(det.candidates.is_empty());

        let det = MarkerDetector::default().detect(&img, None, 0);
        assert!(det.anchors.detected[AnchorId::TR.index()]);
    }
}
