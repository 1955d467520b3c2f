//! Identifier symbol search.
//!
//! The locator walks the [`Variants`] sequence and hands each variant to
//! every [`SymbolDecoder`] in turn, stopping at the first payload. A
//! rectangle found in variant space is mapped back into source pixels so
//! the marker detector can mask the symbol out.

pub mod decoders;
pub mod payload;
pub mod variants;

pub use decoders::{BitmapDecoder, DecodedSymbol, GridDecoder, SymbolDecoder, default_decoders};
pub use payload::SheetPayload;
pub use variants::{Variant, VariantKind, VariantMapping, Variants};

use crate::config::IdentifierParams;
use crate::error::{Result, ScanError};
use crate::models::Rect;
use image::GrayImage;
use serde::Serialize;
use tracing::{debug, trace};

/// A decoded identifier and where it was found
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocatedIdentifier {
    /// Raw decoded text
    pub payload: String,
    /// Bounding rectangle in source pixels, when the decoder reported corners
    pub rect: Option<Rect>,
    /// Variant the symbol was read from
    pub variant: VariantKind,
    /// Decoder that succeeded
    pub decoder: &'static str,
}

impl LocatedIdentifier {
    /// Validate the payload grammar
    pub fn parse(&self) -> Result<SheetPayload> {
        self.payload.parse()
    }
}

/// Multi-variant identifier search
pub struct IdentifierLocator {
    params: IdentifierParams,
    decoders: Vec<Box<dyn SymbolDecoder>>,
}

impl IdentifierLocator {
    /// Locator with the default decoder chain
    pub fn new(params: IdentifierParams) -> Self {
        Self::with_decoders(params, default_decoders())
    }

    /// Locator with a custom decoder chain, tried in order on each variant
    pub fn with_decoders(params: IdentifierParams, decoders: Vec<Box<dyn SymbolDecoder>>) -> Self {
        Self { params, decoders }
    }

    /// Search `gray` for an identifier symbol
    pub fn locate(&self, gray: &GrayImage) -> Result<LocatedIdentifier> {
        for variant in Variants::new(gray, &self.params) {
            trace!(
                variant = %variant.kind,
                width = variant.image.width(),
                height = variant.image.height(),
                "trying identifier variant"
            );
            for decoder in &self.decoders {
                let Some(symbol) = decoder.decode(&variant.image) else {
                    continue;
                };
                let rect = symbol
                    .corners
                    .and_then(|c| Rect::bounding(&c))
                    .map(|r| variant.mapping.to_original(&r));
                debug!(
                    variant = %variant.kind,
                    decoder = decoder.name(),
                    ?rect,
                    "identifier decoded"
                );
                return Ok(LocatedIdentifier {
                    payload: symbol.payload,
                    rect,
                    variant: variant.kind,
                    decoder: decoder.name(),
                });
            }
        }
        debug!("identifier not found in any variant");
        Err(ScanError::NotFound)
    }
}

impl Default for IdentifierLocator {
    fn default() -> Self {
        Self::new(IdentifierParams::default())
    }
}
