use crate::config::MarkerParams;
use crate::models::{Point, Rect};
use crate::utils::geometry::{
    approx_closed_polygon, closed_arc_length, polygon_centroid, polygon_signed_area,
};
use image::GrayImage;
use imageproc::contours::{BorderType, find_contours};

/// Outer contour that passed the square-shape filters
#[derive(Debug, Clone, PartialEq)]
pub struct SquareContour {
    /// Moment centroid, in the coordinates of the searched mask
    pub centroid: Point,
    /// Enclosed area in pixels
    pub area: f64,
    /// Bounding box of the traced border
    pub bbox: Rect,
    /// The four approximated vertices
    pub vertices: Vec<Point>,
}

/// Square-blob filter over a binary mask
pub struct ContourDetector<'a> {
    params: &'a MarkerParams,
}

impl<'a> ContourDetector<'a> {
    /// Detector using the given filter thresholds
    pub fn new(params: &'a MarkerParams) -> Self {
        Self { params }
    }

    /// Find square-like external blobs in a binary mask (foreground != 0).
    ///
    /// Contours are dropped when their area is below `min_area` or above
    /// `max_area`, when the approximated polygon does not have exactly four
    /// vertices, or when the bounding box is not roughly square.
    pub fn detect(&self, mask: &GrayImage, max_area: f64) -> Vec<SquareContour> {
        if mask.width() == 0 || mask.height() == 0 {
            return Vec::new();
        }
        let mut squares = Vec::new();

        for contour in find_contours::<i32>(mask) {
            if contour.parent.is_some() || !matches!(contour.border_type, BorderType::Outer) {
                continue;
            }
            if contour.points.len() < 4 {
                continue;
            }
            let outline: Vec<Point> = contour
                .points
                .iter()
                .map(|p| Point::new(p.x as f32, p.y as f32))
                .collect();

            let area = polygon_signed_area(&outline).abs();
            if area < self.params.min_area || area > max_area {
                continue;
            }

            let epsilon = self.params.approx_epsilon * closed_arc_length(&outline);
            let vertices = approx_closed_polygon(&outline, epsilon);
            if vertices.len() != 4 {
                continue;
            }

            let Some(bbox) = border_bbox(&contour.points) else {
                continue;
            };
            let aspect = bbox.w as f32 / bbox.h as f32;
            if !(self.params.aspect_min..=self.params.aspect_max).contains(&aspect) {
                continue;
            }

            let Some(centroid) = polygon_centroid(&outline) else {
                continue;
            };
            squares.push(SquareContour {
                centroid,
                area,
                bbox,
                vertices,
            });
        }

        squares
    }
}

/// Pixel bounding box of a traced border, both ends inclusive
fn border_bbox(points: &[imageproc::point::Point<i32>]) -> Option<Rect> {
    let first = points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in &points[1..] {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    Some(Rect::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1))
}
