use super::Point;
use serde::Serialize;

/// Axis-aligned integer rectangle in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rect {
    /// Left edge
    pub x: i32,
    /// Top edge
    pub y: i32,
    /// Width in pixels
    pub w: i32,
    /// Height in pixels
    pub h: i32,
}

impl Rect {
    /// Create a new rectangle
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Smallest rectangle covering every point: floor of the minimum, ceil of the extent
    pub fn bounding(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self {
            x: min_x.floor() as i32,
            y: min_y.floor() as i32,
            w: (max_x - min_x).ceil() as i32,
            h: (max_y - min_y).ceil() as i32,
        })
    }

    /// Grow by `pad` on every side and clip to `[0, width) x [0, height)`.
    ///
    /// Returns `(x0, y0, x1, y1)` with exclusive upper bounds, or `None`
    /// when nothing of the padded rectangle lies inside the image.
    pub fn padded_span(
        &self,
        pad: i32,
        width: u32,
        height: u32,
    ) -> Option<(u32, u32, u32, u32)> {
        let x0 = (self.x - pad).max(0);
        let y0 = (self.y - pad).max(0);
        let x1 = (self.x + self.w + pad).min(width as i32);
        let y1 = (self.y + self.h + pad).min(height as i32);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
    }
}
