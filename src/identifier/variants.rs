//! Lazy sequence of image variants searched for the identifier symbol.
//!
//! Cheap variants come first: the untouched image, then the region the
//! symbol is printed in, then upscaled copies for small prints, then
//! smoothed and binarized copies for noisy or low-contrast photos.

use crate::config::IdentifierParams;
use crate::models::Rect;
use crate::utils::binarization::{Polarity, adaptive_threshold, invert};
use image::GrayImage;
use image::imageops::{self, FilterType};
use imageproc::filter::gaussian_blur_f32;
use serde::Serialize;
use std::fmt;

/// How a variant was derived from the source image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VariantKind {
    /// The grayscale source
    Original,
    /// Identifier region of the source
    Crop,
    /// Whole source upscaled by the factor
    Upscaled(u32),
    /// Identifier region of the upscaled source
    UpscaledCrop(u32),
    /// Gaussian-smoothed source
    Blurred,
    /// Local-mean binarization of the source
    Thresholded,
    /// Bitwise inverse of the binarization
    Inverted,
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariantKind::Original => write!(f, "original"),
            VariantKind::Crop => write!(f, "crop"),
            VariantKind::Upscaled(s) => write!(f, "upscaled_{s}x"),
            VariantKind::UpscaledCrop(s) => write!(f, "upscaled_{s}x_crop"),
            VariantKind::Blurred => write!(f, "blurred"),
            VariantKind::Thresholded => write!(f, "thresholded"),
            VariantKind::Inverted => write!(f, "inverted"),
        }
    }
}

/// Scale and offset relating variant pixels to source pixels.
///
/// `source = variant / scale + offset`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariantMapping {
    /// Variant pixels per source pixel
    pub scale: f32,
    /// Source position of the variant origin
    pub offset: (f32, f32),
}

impl VariantMapping {
    /// Mapping of a variant that shares the source geometry
    pub const IDENTITY: Self = Self {
        scale: 1.0,
        offset: (0.0, 0.0),
    };

    /// Map a variant-space rectangle into source pixels
    pub fn to_original(&self, rect: &Rect) -> Rect {
        Rect::new(
            (rect.x as f32 / self.scale + self.offset.0).round() as i32,
            (rect.y as f32 / self.scale + self.offset.1).round() as i32,
            (rect.w as f32 / self.scale).round() as i32,
            (rect.h as f32 / self.scale).round() as i32,
        )
    }

    /// Map a source rectangle into variant space
    pub fn to_variant(&self, rect: &Rect) -> Rect {
        Rect::new(
            ((rect.x as f32 - self.offset.0) * self.scale).round() as i32,
            ((rect.y as f32 - self.offset.1) * self.scale).round() as i32,
            (rect.w as f32 * self.scale).round() as i32,
            (rect.h as f32 * self.scale).round() as i32,
        )
    }
}

/// One candidate image for the decoders
pub struct Variant {
    /// Derivation
    pub kind: VariantKind,
    /// Pixels handed to the decoders
    pub image: GrayImage,
    /// Relation to the source image
    pub mapping: VariantMapping,
}

/// Iterator producing variants on demand, in search order
pub struct Variants<'a> {
    source: &'a GrayImage,
    params: &'a IdentifierParams,
    plan: Vec<VariantKind>,
    next: usize,
    upscaled: Option<(u32, GrayImage)>,
    thresholded: Option<GrayImage>,
}

impl<'a> Variants<'a> {
    /// Plan the variant sequence for `source`
    pub fn new(source: &'a GrayImage, params: &'a IdentifierParams) -> Self {
        let mut plan = vec![VariantKind::Original, VariantKind::Crop];
        for &s in &params.upscales {
            plan.push(VariantKind::Upscaled(s));
            plan.push(VariantKind::UpscaledCrop(s));
        }
        plan.extend([
            VariantKind::Blurred,
            VariantKind::Thresholded,
            VariantKind::Inverted,
        ]);
        Self {
            source,
            params,
            plan,
            next: 0,
            upscaled: None,
            thresholded: None,
        }
    }

    /// Kinds in the order they will be produced
    pub fn plan(&self) -> &[VariantKind] {
        &self.plan
    }

    fn build(&mut self, kind: VariantKind) -> Option<Variant> {
        let src = self.source;
        match kind {
            VariantKind::Original => Some(Variant {
                kind,
                image: src.clone(),
                mapping: VariantMapping::IDENTITY,
            }),
            VariantKind::Crop => {
                let (x, y, w, h) = crop_span(src.width(), src.height(), &self.params.crop)?;
                Some(Variant {
                    kind,
                    image: imageops::crop_imm(src, x, y, w, h).to_image(),
                    mapping: VariantMapping {
                        scale: 1.0,
                        offset: (x as f32, y as f32),
                    },
                })
            }
            VariantKind::Upscaled(s) => {
                let image = self.upscaled(s)?.clone();
                Some(Variant {
                    kind,
                    image,
                    mapping: VariantMapping {
                        scale: s as f32,
                        offset: (0.0, 0.0),
                    },
                })
            }
            VariantKind::UpscaledCrop(s) => {
                let crop = self.params.crop;
                let up = self.upscaled(s)?;
                let (x, y, w, h) = crop_span(up.width(), up.height(), &crop)?;
                Some(Variant {
                    kind,
                    image: imageops::crop_imm(up, x, y, w, h).to_image(),
                    mapping: VariantMapping {
                        scale: s as f32,
                        offset: (x as f32 / s as f32, y as f32 / s as f32),
                    },
                })
            }
            VariantKind::Blurred => {
                if self.params.blur_sigma <= 0.0 {
                    return None;
                }
                Some(Variant {
                    kind,
                    image: gaussian_blur_f32(src, self.params.blur_sigma),
                    mapping: VariantMapping::IDENTITY,
                })
            }
            VariantKind::Thresholded => Some(Variant {
                kind,
                image: self.thresholded().clone(),
                mapping: VariantMapping::IDENTITY,
            }),
            VariantKind::Inverted => Some(Variant {
                kind,
                image: invert(self.thresholded()),
                mapping: VariantMapping::IDENTITY,
            }),
        }
    }

    fn upscaled(&mut self, scale: u32) -> Option<&GrayImage> {
        let cached = matches!(&self.upscaled, Some((s, _)) if *s == scale);
        if !cached {
            let (w, h) = (self.source.width(), self.source.height());
            let resized = imageops::resize(
                self.source,
                w.checked_mul(scale)?,
                h.checked_mul(scale)?,
                FilterType::CatmullRom,
            );
            self.upscaled = Some((scale, resized));
        }
        self.upscaled.as_ref().map(|(_, img)| img)
    }

    fn thresholded(&mut self) -> &GrayImage {
        let (source, params) = (self.source, self.params);
        self.thresholded.get_or_insert_with(|| {
            adaptive_threshold(
                source,
                params.block_size,
                params.offset,
                Polarity::PaperForeground,
            )
        })
    }
}

impl Iterator for Variants<'_> {
    type Item = Variant;

    fn next(&mut self) -> Option<Variant> {
        while self.next < self.plan.len() {
            let kind = self.plan[self.next];
            self.next += 1;
            if let Some(variant) = self.build(kind) {
                return Some(variant);
            }
        }
        None
    }
}

/// Pixel span `(x, y, w, h)` of a fractional region, `None` when empty
fn crop_span(width: u32, height: u32, frac: &[f32; 4]) -> Option<(u32, u32, u32, u32)> {
    let at = |f: f32, len: u32| ((f.clamp(0.0, 1.0) * len as f32).round() as u32).min(len);
    let (x0, y0) = (at(frac[0], width), at(frac[1], height));
    let (x1, y1) = (at(frac[2], width), at(frac[3], height));
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some((x0, y0, x1 - x0, y1 - y0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_order() {
        let gray = GrayImage::new(40, 30);
        let params = IdentifierParams::default();
        let variants = Variants::new(&gray, &params);
        assert_eq!(
            variants.plan(),
            &[
                VariantKind::Original,
                VariantKind::Crop,
                VariantKind::Upscaled(2),
                VariantKind::UpscaledCrop(2),
                VariantKind::Upscaled(3),
                VariantKind::UpscaledCrop(3),
                VariantKind::Blurred,
                VariantKind::Thresholded,
                VariantKind::Inverted,
            ]
        );
        let produced: Vec<_> = variants.map(|v| (v.kind, v.image.dimensions())).collect();
        assert_eq!(produced.len(), 9);
        assert_eq!(produced[1].1, (16, 12));
        assert_eq!(produced[4].1, (120, 90));
        assert_eq!(produced[5].1, (48, 36));
    }

    #[test]
    fn test_mapping_round_trip() {
        let gray = GrayImage::new(333, 517);
        let params = IdentifierParams::default();
        let rects = [
            Rect::new(0, 0, 10, 10),
            Rect::new(211, 17, 93, 91),
            Rect::new(250, 100, 57, 61),
        ];
        for variant in Variants::new(&gray, &params) {
            for rect in &rects {
                let there = variant.mapping.to_variant(rect);
                let back = variant.mapping.to_original(&there);
                assert!((back.x - rect.x).abs() <= 1, "{} {rect:?} {back:?}", variant.kind);
                assert!((back.y - rect.y).abs() <= 1);
                assert!((back.w - rect.w).abs() <= 1);
                assert!((back.h - rect.h).abs() <= 1);
            }
        }
    }

    #[test]
    fn test_upscaled_crop_maps_into_source_crop() {
        let gray = GrayImage::new(100, 100);
        let params = IdentifierParams::default();
        let variant = Variants::new(&gray, &params)
            .find(|v| v.kind == VariantKind::UpscaledCrop(2))
            .unwrap();
        let origin = variant.mapping.to_original(&Rect::new(0, 0, 20, 20));
        assert_eq!(origin, Rect::new(60, 0, 10, 10));
    }

    #[test]
    fn test_empty_crop_is_skipped() {
        let gray = GrayImage::new(10, 10);
        let params = IdentifierParams {
            crop: [0.5, 0.5, 0.5, 0.9],
            upscales: vec![],
            ..Default::default()
        };
        let kinds: Vec<_> = Variants::new(&gray, &params).map(|v| v.kind).collect();
        assert!(!kinds.contains(&VariantKind::Crop));
        assert_eq!(kinds.len(), 4);
    }
}
