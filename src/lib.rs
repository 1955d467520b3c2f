//! sheet_scan - answer-sheet scanning core
//!
//! Reads a photographed or scanned answer sheet:
//! - finds and decodes the sheet's identifier symbol
//! - locates the four printed corner markers
//! - rectifies the photo onto the canonical page raster
//! - scores answer bubbles and the bubbled student identifier
//!
//! ```no_run
//! use sheet_scan::{Scanner, ScanConfig, tools::{FsLayoutProvider, load_rgb}};
//!
//! let photo = load_rgb("sheet.jpg")?;
//! let layouts = FsLayoutProvider::new("layouts");
//! let reading = Scanner::new(ScanConfig::default()).scan(&photo, &layouts)?;
//! println!("{:?}", reading.to_record(None));
//! # Ok::<(), sheet_scan::ScanError>(())
//! ```

#![warn(missing_docs)]
#![allow(clippy::missing_docs_in_private_items)]

/// Perspective alignment onto the canonical page
pub mod align;
/// Scanner configuration and environment overrides
pub mod config;
/// Corner marker detection (thresholding, contours, quadrant search)
pub mod detector;
/// Error type shared by every stage
pub mod error;
/// Identifier symbol search and payload grammar
pub mod identifier;
/// Core data structures (layout, anchors, points, result record)
pub mod models;
/// Debug overlays for markers and bubbles
pub mod overlay;
/// End-to-end scan and collaborator traits
pub mod pipeline;
/// Bubble fill measurement, answers and identifier cells
pub mod scorer;
/// Filesystem collaborators and image loading
pub mod tools;
/// Utility functions (grayscale, binarization, geometry)
pub mod utils;

pub use align::{Aligner, Alignment};
pub use config::{Calibration, IdentifierParams, MarkerParams, ScanConfig};
pub use detector::{MarkerCandidate, MarkerDetection, MarkerDetector};
pub use error::{Result, ScanError};
pub use identifier::{IdentifierLocator, LocatedIdentifier, SheetPayload};
pub use models::{AnchorId, AnchorSet, PageLayout, Point, Rect, ResultRecord};
pub use pipeline::{CropStore, LayoutProvider, PageReading, ResultSink, Scanner, SheetReading};
pub use scorer::{MarkScorer, fill_ratio};

use image::RgbImage;
use utils::grayscale::to_gray_image;

/// Scan a sheet with the default configuration
pub fn scan(image: &RgbImage, layouts: &dyn LayoutProvider) -> Result<SheetReading> {
    Scanner::default().scan(image, layouts)
}

/// Find and decode the identifier symbol in an RGB image
pub fn locate_identifier(image: &RgbImage) -> Result<LocatedIdentifier> {
    IdentifierLocator::default().locate(&to_gray_image(image))
}

/// Detect the four corner markers, masking `exclude` with the default padding
pub fn detect_markers(image: &RgbImage, exclude: Option<&Rect>) -> AnchorSet {
    let config = ScanConfig::default();
    MarkerDetector::new(config.markers)
        .detect(&to_gray_image(image), exclude, config.identifier_pad)
        .anchors
}
