//! Symbol decoders tried on every variant.

use crate::models::Point;
use crate::utils::binarization::otsu_threshold;
use image::GrayImage;

/// Payload recovered from a variant
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSymbol {
    /// Trimmed, non-empty payload text
    pub payload: String,
    /// Symbol corners in variant pixels, when the decoder reports them
    pub corners: Option<[Point; 4]>,
}

/// A strategy for reading an identifier symbol out of a grayscale image
pub trait SymbolDecoder: Send + Sync {
    /// Short name reported with a successful locate
    fn name(&self) -> &'static str;

    /// Decode the first readable symbol, if any
    fn decode(&self, image: &GrayImage) -> Option<DecodedSymbol>;
}

/// Grid detector over the grayscale pixels; reports corner geometry
#[derive(Debug, Default, Clone, Copy)]
pub struct GridDecoder;

impl SymbolDecoder for GridDecoder {
    fn name(&self) -> &'static str {
        "grid"
    }

    fn decode(&self, image: &GrayImage) -> Option<DecodedSymbol> {
        let (w, h) = (image.width() as usize, image.height() as usize);
        if w == 0 || h == 0 {
            return None;
        }
        let raw = image.as_raw();
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(w, h, |x, y| raw[y * w + x]);
        prepared.detect_grids().into_iter().find_map(|grid| {
            let (_, content) = grid.decode().ok()?;
            let payload = non_empty(&content)?;
            let corners = grid
                .bounds
                .map(|p| Point::new(p.x as f32, p.y as f32));
            Some(DecodedSymbol {
                payload,
                corners: Some(corners),
            })
        })
    }
}

/// Global-threshold bitmap decoder with an added quiet zone.
///
/// Recovers symbols printed too close to other ink, but only the payload.
#[derive(Debug, Clone, Copy)]
pub struct BitmapDecoder {
    /// Blank margin added on every side, in pixels
    pub quiet_zone: usize,
}

impl Default for BitmapDecoder {
    fn default() -> Self {
        Self { quiet_zone: 16 }
    }
}

impl SymbolDecoder for BitmapDecoder {
    fn name(&self) -> &'static str {
        "bitmap"
    }

    fn decode(&self, image: &GrayImage) -> Option<DecodedSymbol> {
        let (w, h) = (image.width() as usize, image.height() as usize);
        if w == 0 || h == 0 {
            return None;
        }
        let raw = image.as_raw();
        let threshold = otsu_threshold(raw);
        let q = self.quiet_zone;
        let mut prepared = rqrr::PreparedImage::prepare_from_bitmap(w + 2 * q, h + 2 * q, |x, y| {
            if x < q || y < q || x >= w + q || y >= h + q {
                return false;
            }
            raw[(y - q) * w + (x - q)] < threshold
        });
        prepared.detect_grids().into_iter().find_map(|grid| {
            let (_, content) = grid.decode().ok()?;
            Some(DecodedSymbol {
                payload: non_empty(&content)?,
                corners: None,
            })
        })
    }
}

fn non_empty(content: &str) -> Option<String> {
    let trimmed = content.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Decoders in the order they are tried on each variant
pub fn default_decoders() -> Vec<Box<dyn SymbolDecoder>> {
    vec![Box::new(GridDecoder), Box::new(BitmapDecoder::default())]
}
