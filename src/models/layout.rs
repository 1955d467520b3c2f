//! Page layout as produced by the sheet generator.
//!
//! All coordinates are in typographic points; the scanner converts them to
//! canonical pixels with `px_per_pt`.

use super::{AnchorId, Point};
use crate::error::{Result, ScanError};
use serde::{Deserialize, Serialize};

const DEFAULT_PAGE_W: f32 = 595.28;
const DEFAULT_PAGE_H: f32 = 841.89;

/// Physical page size in points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    /// Page width
    #[serde(default = "default_page_w")]
    pub w: f32,
    /// Page height
    #[serde(default = "default_page_h")]
    pub h: f32,
}

fn default_page_w() -> f32 {
    DEFAULT_PAGE_W
}

fn default_page_h() -> f32 {
    DEFAULT_PAGE_H
}

impl Default for PageSize {
    fn default() -> Self {
        Self {
            w: DEFAULT_PAGE_W,
            h: DEFAULT_PAGE_H,
        }
    }
}

/// Printed corner square; `x`/`y` is its top-left corner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorSpec {
    /// One of `TL`, `TR`, `BR`, `BL`
    pub id: String,
    /// Left edge
    pub x: f32,
    /// Top edge
    pub y: f32,
    /// Side length
    pub size: f32,
}

impl AnchorSpec {
    /// Parsed corner id, `None` for unknown ids
    pub fn anchor_id(&self) -> Option<AnchorId> {
        match self.id.as_str() {
            "TL" => Some(AnchorId::TL),
            "TR" => Some(AnchorId::TR),
            "BR" => Some(AnchorId::BR),
            "BL" => Some(AnchorId::BL),
            _ => None,
        }
    }

    /// Centre of the square in points
    pub fn center(&self) -> Point {
        Point::new(self.x + self.size / 2.0, self.y + self.size / 2.0)
    }
}

/// One answer bubble of a question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionSpec {
    /// Option label reported back ("A", "B", ...)
    pub label: String,
    /// Centre x
    pub x: f32,
    /// Centre y
    pub y: f32,
    /// Radius
    pub r: f32,
}

/// A multiple-choice question row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSpec {
    /// Question key used in the result maps
    #[serde(rename = "questionPk", alias = "questionId")]
    pub question_id: i64,
    /// Candidate bubbles in print order
    #[serde(default)]
    pub options: Vec<OptionSpec>,
}

/// Candidate bubble of an identifier cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BubbleSpec {
    /// Symbol this bubble stands for
    #[serde(rename = "sym", alias = "symbol", default)]
    pub symbol: Option<String>,
    /// Centre x
    pub x: f32,
    /// Centre y
    pub y: f32,
    /// Radius
    pub r: f32,
}

/// One position of the bubbled identifier, holding at most one symbol
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExtIdCell {
    /// One bubble per admissible symbol
    #[serde(default)]
    pub bubbles: Vec<BubbleSpec>,
}

/// Bubbled student identifier region
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExtIdSpec {
    /// Cells in reading order
    #[serde(default)]
    pub cells: Vec<ExtIdCell>,
}

/// Rectangle in points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NameBox {
    /// Left edge
    pub x: f32,
    /// Top edge
    pub y: f32,
    /// Width
    pub w: f32,
    /// Height
    pub h: f32,
}

/// Handwritten-name area
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NameSpec {
    /// Box to crop out of the canonical image
    #[serde(rename = "box", default)]
    pub bbox: Option<NameBox>,
}

/// Canonical page description
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageLayout {
    /// Quiz this layout belongs to
    #[serde(default)]
    pub quiz_id: Option<String>,
    /// Layout version
    #[serde(default)]
    pub version: Option<u32>,
    /// Physical page size
    #[serde(default)]
    pub page: PageSize,
    /// Corner registration squares
    #[serde(default)]
    pub anchors: Vec<AnchorSpec>,
    /// Answer rows
    #[serde(default)]
    pub questions: Vec<QuestionSpec>,
    /// Bubbled identifier region
    #[serde(default)]
    pub ext_id: Option<ExtIdSpec>,
    /// Name crop region
    #[serde(default)]
    pub name: Option<NameSpec>,
}

impl PageLayout {
    /// Parse a layout document
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str::<Self>(json)
            .map_err(|e| ScanError::Layout {
                message: e.to_string(),
            })?
            .checked()
    }

    /// Parse a provider response, unwrapping a string-encoded `layoutJson` field
    pub fn from_response(value: serde_json::Value) -> Result<Self> {
        if let Some(inner) = value.get("layoutJson") {
            return match inner {
                serde_json::Value::String(s) => Self::from_json_str(s),
                serde_json::Value::Object(_) => Self::from_value(inner.clone()),
                other => Err(ScanError::Layout {
                    message: format!("layoutJson must be a string or object, got {other}"),
                }),
            };
        }
        Self::from_value(value)
    }

    fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value::<Self>(value)
            .map_err(|e| ScanError::Layout {
                message: e.to_string(),
            })?
            .checked()
    }

    /// Reject layouts naming the same corner twice
    fn checked(self) -> Result<Self> {
        let mut seen = [false; 4];
        for id in self.anchors.iter().filter_map(AnchorSpec::anchor_id) {
            if std::mem::replace(&mut seen[id.index()], true) {
                return Err(ScanError::Layout {
                    message: format!("duplicate anchor {id:?}"),
                });
            }
        }
        Ok(self)
    }

    /// Canonical raster size for a given scale
    pub fn canonical_size(&self, px_per_pt: f32) -> (u32, u32) {
        let w = (self.page.w * px_per_pt).round().max(1.0) as u32;
        let h = (self.page.h * px_per_pt).round().max(1.0) as u32;
        (w, h)
    }

    /// Anchor descriptor for a corner
    pub fn anchor(&self, id: AnchorId) -> Option<&AnchorSpec> {
        self.anchors.iter().find(|a| a.anchor_id() == Some(id))
    }

    /// All four anchors in TL/TR/BR/BL order, or `None` if any is missing
    pub fn corner_anchors(&self) -> Option<[&AnchorSpec; 4]> {
        Some([
            self.anchor(AnchorId::TL)?,
            self.anchor(AnchorId::TR)?,
            self.anchor(AnchorId::BR)?,
            self.anchor(AnchorId::BL)?,
        ])
    }
}
