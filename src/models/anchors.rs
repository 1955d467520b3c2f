use super::Point;
use serde::{Deserialize, Serialize};

/// Page corner a registration marker belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnchorId {
    /// Top-left
    TL,
    /// Top-right
    TR,
    /// Bottom-right
    BR,
    /// Bottom-left
    BL,
}

impl AnchorId {
    /// Canonical order used everywhere a quad is passed around
    pub const ORDER: [AnchorId; 4] = [AnchorId::TL, AnchorId::TR, AnchorId::BR, AnchorId::BL];

    /// Position of this corner in [`AnchorId::ORDER`]
    pub fn index(self) -> usize {
        match self {
            AnchorId::TL => 0,
            AnchorId::TR => 1,
            AnchorId::BR => 2,
            AnchorId::BL => 3,
        }
    }
}

/// Four marker centroids in original-image pixels, ordered TL/TR/BR/BL.
///
/// A corner whose marker was not found holds the image corner instead and
/// has its `detected` flag cleared.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnchorSet {
    /// Marker centroids (or placeholder corners)
    pub points: [Point; 4],
    /// Whether each point comes from an actual marker
    pub detected: [bool; 4],
}

impl AnchorSet {
    /// Build an anchor set from ordered points and detection flags
    pub fn new(points: [Point; 4], detected: [bool; 4]) -> Self {
        Self { points, detected }
    }

    /// Point for a given corner
    pub fn get(&self, id: AnchorId) -> Point {
        self.points[id.index()]
    }

    /// Number of corners backed by a detected marker
    pub fn detected_count(&self) -> usize {
        self.detected.iter().filter(|&&d| d).count()
    }

    /// True when at least one corner fell back to its placeholder
    pub fn is_degraded(&self) -> bool {
        self.detected_count() < 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degraded_flag() {
        let pts = [Point::default(); 4];
        assert!(!AnchorSet::new(pts, [true; 4]).is_degraded());
        let partial = AnchorSet::new(pts, [true, false, true, true]);
        assert!(partial.is_degraded());
        assert_eq!(partial.detected_count(), 3);
    }

    #[test]
    fn test_anchor_index_matches_order() {
        for (i, id) in AnchorId::ORDER.iter().enumerate() {
            assert_eq!(id.index(), i);
        }
    }
}
