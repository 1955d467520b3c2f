//! Error types for the scanning pipeline.

use thiserror::Error;

/// Errors that abort a scan.
///
/// Marker fallback and out-of-frame bubbles are not errors: the former is
/// reported through [`crate::AnchorSet::is_degraded`], the latter scores 0.0.
#[derive(Debug, Error)]
pub enum ScanError {
    /// No image variant yielded a decodable identifier.
    #[error("identifier not found in any image variant")]
    NotFound,

    /// An identifier was decoded but does not follow `SG|q=..|s=..|v=..`.
    #[error("invalid identifier payload: {payload:?}")]
    InvalidPayload {
        /// The decoded text
        payload: String,
    },

    /// The anchors and targets do not define an invertible transform.
    #[error("degenerate alignment: {message}")]
    Alignment {
        /// What went wrong
        message: String,
    },

    /// The page layout could not be parsed.
    #[error("invalid layout: {message}")]
    Layout {
        /// What went wrong
        message: String,
    },

    /// A configuration file or override could not be applied.
    #[error("invalid configuration: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// The layout provider failed to produce a layout.
    #[error("layout provider failed: {0}")]
    Provider(String),

    /// The result sink or crop store rejected the output.
    #[error("result sink failed: {0}")]
    Sink(String),

    /// Filesystem failure in one of the bundled collaborators.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding failure.
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ScanError>;
