//! Perspective alignment onto the canonical page raster.

use crate::config::{Calibration, ScanConfig};
use crate::error::{Result, ScanError};
use crate::models::{AnchorSet, PageLayout, Point};
use crate::utils::geometry::PerspectiveTransform;
use image::RgbImage;
use rayon::prelude::*;
use tracing::debug;

/// Slack for samples that land on the last row or column up to rounding
const EDGE_EPS: f64 = 1e-6;

/// Rectified page and the geometry that produced it
#[derive(Debug, Clone)]
pub struct Alignment {
    /// Canonical image, `page size * px_per_pt`
    pub image: RgbImage,
    /// Forward transform, photo pixels to canonical pixels
    pub transform: PerspectiveTransform,
    /// Canonical positions the anchors were mapped to, TL/TR/BR/BL
    pub targets: [Point; 4],
    /// Anchors used as the source quad
    pub anchors: AnchorSet,
}

/// Maps a photographed page onto its canonical raster
#[derive(Debug, Clone, Copy)]
pub struct Aligner {
    px_per_pt: f32,
    calibration: Calibration,
}

impl Aligner {
    /// Aligner with an explicit scale and calibration offset
    pub fn new(px_per_pt: f32, calibration: Calibration) -> Self {
        Self {
            px_per_pt,
            calibration,
        }
    }

    /// Aligner configured from a scanner profile
    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new(config.px_per_pt, config.calibration)
    }

    /// Canonical pixel positions the TL/TR/BR/BL anchors map to.
    ///
    /// Anchor centres are scaled to pixels and shifted by the calibration
    /// offset. A layout without all four anchors maps onto the raster corners.
    pub fn targets(&self, layout: &PageLayout) -> [Point; 4] {
        match layout.corner_anchors() {
            Some(anchors) => anchors.map(|a| {
                a.center()
                    .scale(self.px_per_pt)
                    .translate(self.calibration.dx, self.calibration.dy)
            }),
            None => {
                let (w, h) = layout.canonical_size(self.px_per_pt);
                let (r, b) = ((w - 1) as f32, (h - 1) as f32);
                debug!("layout lacks corner anchors, targeting raster corners");
                [
                    Point::new(0.0, 0.0),
                    Point::new(r, 0.0),
                    Point::new(r, b),
                    Point::new(0.0, b),
                ]
            }
        }
    }

    /// Rectify `image` so the detected anchors land on their targets
    pub fn align(&self, image: &RgbImage, layout: &PageLayout, anchors: &AnchorSet) -> Result<Alignment> {
        let targets = self.targets(layout);
        let (out_w, out_h) = layout.canonical_size(self.px_per_pt);

        let transform = PerspectiveTransform::from_points(&anchors.points, &targets).ok_or_else(|| {
            ScanError::Alignment {
                message: format!("anchors {:?} cannot be mapped to {:?}", anchors.points, targets),
            }
        })?;
        let inverse = transform.inverse().ok_or_else(|| ScanError::Alignment {
            message: "forward transform is singular".to_string(),
        })?;

        debug!(out_w, out_h, degraded = anchors.is_degraded(), "warping to canonical page");
        let image = warp_perspective(image, &inverse, out_w, out_h);

        Ok(Alignment {
            image,
            transform,
            targets,
            anchors: *anchors,
        })
    }
}

/// Resample `src` into an `out_w` x `out_h` raster.
///
/// `inverse` maps output pixels back into `src`; samples are bilinear and
/// anything landing outside `src` is black.
pub fn warp_perspective(
    src: &RgbImage,
    inverse: &PerspectiveTransform,
    out_w: u32,
    out_h: u32,
) -> RgbImage {
    let (sw, sh) = (src.width() as usize, src.height() as usize);
    let row_len = out_w as usize * 3;
    let mut out = vec![0u8; row_len * out_h as usize];
    if sw == 0 || sh == 0 || row_len == 0 {
        return RgbImage::from_raw(out_w, out_h, out).unwrap_or_else(|| RgbImage::new(out_w, out_h));
    }
    let raw = src.as_raw();
    let (max_x, max_y) = ((sw - 1) as f64, (sh - 1) as f64);

    out.par_chunks_mut(row_len).enumerate().for_each(|(y, row)| {
        for (x, px) in row.chunks_exact_mut(3).enumerate() {
            let Some((sx, sy)) = inverse.apply(x as f64, y as f64) else {
                continue;
            };
            if !(-EDGE_EPS..=max_x + EDGE_EPS).contains(&sx)
                || !(-EDGE_EPS..=max_y + EDGE_EPS).contains(&sy)
            {
                continue;
            }
            let (sx, sy) = (sx.clamp(0.0, max_x), sy.clamp(0.0, max_y));
            let (x0, y0) = (sx.floor() as usize, sy.floor() as usize);
            let (x1, y1) = ((x0 + 1).min(sw - 1), (y0 + 1).min(sh - 1));
            let (fx, fy) = (sx - x0 as f64, sy - y0 as f64);
            for c in 0..3 {
                let at = |xx: usize, yy: usize| raw[(yy * sw + xx) * 3 + c] as f64;
                let top = at(x0, y0) * (1.0 - fx) + at(x1, y0) * fx;
                let bottom = at(x0, y1) * (1.0 - fx) + at(x1, y1) * fx;
                px[c] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
            }
        }
    });

    RgbImage::from_raw(out_w, out_h, out).unwrap_or_else(|| RgbImage::new(out_w, out_h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnchorSpec, PageSize};
    use image::Rgb;

    fn layout_with_anchors(ids: &[&str]) -> PageLayout {
        let spots = [("TL", 20.0, 20.0), ("TR", 160.0, 20.0), ("BR", 160.0, 260.0), ("BL", 20.0, 260.0)];
        PageLayout {
            page: PageSize { w: 200.0, h: 300.0 },
            anchors: spots
                .iter()
                .filter(|(id, _, _)| ids.contains(id))
                .map(|&(id, x, y)| AnchorSpec {
                    id: id.to_string(),
                    x,
                    y,
                    size: 10.0,
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_targets_scale_and_calibrate() {
        let layout = layout_with_anchors(&["TL", "TR", "BR", "BL"]);
        let aligner = Aligner::new(2.0, Calibration { dx: -3.0, dy: 1.0 });
        let t = aligner.targets(&layout);
        assert_eq!(t[0], Point::new(47.0, 51.0));
        assert_eq!(t[2], Point::new(327.0, 531.0));
    }

    #[test]
    fn test_missing_anchor_targets_corners() {
        let layout = layout_with_anchors(&["TL", "TR", "BL"]);
        let aligner = Aligner::new(2.0, Calibration { dx: -18.0, dy: -18.0 });
        assert_eq!(
            aligner.targets(&layout),
            [
                Point::new(0.0, 0.0),
                Point::new(399.0, 0.0),
                Point::new(399.0, 599.0),
                Point::new(0.0, 599.0),
            ]
        );
    }

    #[test]
    fn test_transform_maps_anchors_onto_targets() {
        let layout = layout_with_anchors(&["TL", "TR", "BR", "BL"]);
        let aligner = Aligner::new(1.5, Calibration::default());
        let anchors = AnchorSet::new(
            [
                Point::new(31.2, 40.7),
                Point::new(250.9, 28.4),
                Point::new(262.3, 410.0),
                Point::new(22.8, 398.6),
            ],
            [true; 4],
        );
        let photo = RgbImage::from_pixel(300, 450, Rgb([200, 200, 200]));
        let aligned = aligner.align(&photo, &layout, &anchors).unwrap();
        assert_eq!(aligned.image.dimensions(), (300, 450));
        for (a, t) in anchors.points.iter().zip(aligned.targets.iter()) {
            let mapped = aligned.transform.transform(a).unwrap();
            assert!(mapped.distance(t) < 1e-2, "{mapped:?} vs {t:?}");
        }
    }

    #[test]
    fn test_identity_warp_and_black_outside() {
        let mut src = RgbImage::new(10, 8);
        for (x, y, p) in src.enumerate_pixels_mut() {
            *p = Rgb([(x * 20) as u8, (y * 30) as u8, 7]);
        }
        let quad = [
            Point::new(0.0, 0.0),
            Point::new(9.0, 0.0),
            Point::new(9.0, 7.0),
            Point::new(0.0, 7.0),
        ];
        let identity = PerspectiveTransform::from_points(&quad, &quad).unwrap();
        let out = warp_perspective(&src, &identity, 12, 8);
        assert_eq!(out.get_pixel(3, 4), src.get_pixel(3, 4));
        assert_eq!(out.get_pixel(9, 7), src.get_pixel(9, 7));
        assert_eq!(out.get_pixel(11, 2), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_collapsed_anchors_are_an_error() {
        let layout = layout_with_anchors(&["TL", "TR", "BR", "BL"]);
        let anchors = AnchorSet::new([Point::new(5.0, 5.0); 4], [false; 4]);
        let photo = RgbImage::new(20, 20);
        let err = Aligner::new(1.0, Calibration::default())
            .align(&photo, &layout, &anchors)
            .unwrap_err();
        assert!(matches!(err, ScanError::Alignment { .. }));
    }
}
