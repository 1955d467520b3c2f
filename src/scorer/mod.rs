//! Bubble scoring on the canonical image.
//!
//! Layout geometry is in points; [`MarkScorer`] converts it to canonical
//! pixels, measures each bubble with [`fill_ratio`] and applies the shared
//! fill threshold to both answer rows and identifier cells.

pub mod answers;
pub mod bubbles;
pub mod ext_id;

pub use answers::{AnswerReadings, QuestionReading};
pub use bubbles::fill_ratio;
pub use ext_id::ExtIdReading;

use crate::config::ScanConfig;
use crate::utils::geometry::pt_to_px;
use image::GrayImage;

/// Round to 4 decimal digits for reporting
pub(crate) fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

/// Scores layout bubbles against a canonical grayscale page
#[derive(Debug, Clone, Copy)]
pub struct MarkScorer {
    px_per_pt: f32,
    threshold: f32,
}

impl MarkScorer {
    /// Scorer with an explicit scale and fill threshold
    pub fn new(px_per_pt: f32, threshold: f32) -> Self {
        Self {
            px_per_pt,
            threshold,
        }
    }

    /// Scorer configured from a scanner profile
    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new(config.px_per_pt, config.fill_threshold)
    }

    /// Fill threshold in use
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Fill ratio of a bubble given in layout points
    pub fn score(&self, gray: &GrayImage, x: f32, y: f32, r: f32) -> f32 {
        fill_ratio(
            gray,
            pt_to_px(x, self.px_per_pt),
            pt_to_px(y, self.px_per_pt),
            pt_to_px(r, self.px_per_pt),
        )
    }

    /// Whether a ratio counts as a mark
    pub fn is_filled(&self, ratio: f32) -> bool {
        ratio >= self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round4() {
        assert_eq!(round4(0.123456), 0.1235);
        assert_eq!(round4(1.0), 1.0);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let scorer = MarkScorer::new(2.5, 0.33);
        assert!(scorer.is_filled(0.33));
        assert!(!scorer.is_filled(0.3299));
    }
}
