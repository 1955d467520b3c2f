//! Corner marker detection
//!
//! - Ink mask: blur, local-mean threshold, closing then opening
//! - Square-blob filtering of external contours per quadrant
//! - Nearest-to-corner selection and TL/TR/BR/BL ordering

/// Square-like contour filtering
pub mod contour;
/// Per-quadrant marker search
pub mod markers;

pub use markers::{MarkerCandidate, MarkerDetection, MarkerDetector};
