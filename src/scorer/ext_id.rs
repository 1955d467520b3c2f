use super::{MarkScorer, round4};
use crate::models::ExtIdSpec;
use image::GrayImage;
use tracing::debug;

/// Bubbled identifier as read from the page
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtIdReading {
    /// Concatenated symbols, `None` when no cell was marked
    pub value: Option<String>,
    /// Rounded mean fill ratio of the accepted cells
    pub confidence: Option<f64>,
    /// Accepted symbol and ratio per cell, in layout order
    pub cells: Vec<Option<(String, f32)>>,
}

impl MarkScorer {
    /// Read the bubbled identifier.
    ///
    /// Each cell contributes its strongest bubble when that ratio is positive
    /// and clears the fill threshold; other cells contribute nothing. Bubbles
    /// without a symbol are not candidates.
    pub fn read_ext_id(&self, gray: &GrayImage, spec: &ExtIdSpec) -> ExtIdReading {
        let mut cells = Vec::with_capacity(spec.cells.len());
        for cell in &spec.cells {
            let mut best: Option<(&str, f32)> = None;
            for bubble in &cell.bubbles {
                let Some(symbol) = bubble.symbol.as_deref() else {
                    continue;
                };
                let ratio = self.score(gray, bubble.x, bubble.y, bubble.r);
                if best.is_none_or(|(_, b)| ratio > b) {
                    best = Some((symbol, ratio));
                }
            }
            cells.push(
                best.filter(|&(_, r)| r > 0.0 && self.is_filled(r))
                    .map(|(s, r)| (s.to_string(), r)),
            );
        }

        let accepted: Vec<&(String, f32)> = cells.iter().flatten().collect();
        let joined: String = accepted.iter().map(|(s, _)| s.as_str()).collect();
        let joined = joined.trim();
        let value = (!joined.is_empty()).then(|| joined.to_string());
        let confidence = (!accepted.is_empty()).then(|| {
            let sum: f64 = accepted.iter().map(|(_, r)| *r as f64).sum();
            round4(sum / accepted.len() as f64)
        });
        debug!(?value, ?confidence, cells = cells.len(), "identifier bubbles read");

        ExtIdReading {
            value,
            confidence,
            cells,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BubbleSpec, ExtIdCell};
    use image::Luma;
    use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_circle_mut};

    /// Four digit cells in columns, ten rows each, 10 pt apart
    fn digits_spec() -> ExtIdSpec {
        ExtIdSpec {
            cells: (0..4)
                .map(|c| ExtIdCell {
                    bubbles: (0..10)
                        .map(|d| BubbleSpec {
                            symbol: Some(d.to_string()),
                            x: 10.0 + 10.0 * c as f32,
                            y: 10.0 + 10.0 * d as f32,
                            r: 4.0,
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    fn sheet(spec: &ExtIdSpec, marks: &[(usize, usize)]) -> GrayImage {
        // px_per_pt = 2
        let mut img = GrayImage::from_pixel(120, 240, Luma([245]));
        for cell in &spec.cells {
            for b in &cell.bubbles {
                draw_hollow_circle_mut(&mut img, ((b.x * 2.0) as i32, (b.y * 2.0) as i32), 8, Luma([120]));
            }
        }
        for &(c, d) in marks {
            let b = &spec.cells[c].bubbles[d];
            draw_filled_circle_mut(&mut img, ((b.x * 2.0) as i32, (b.y * 2.0) as i32), 8, Luma([10]));
        }
        img
    }

    #[test]
    fn test_reads_marked_digits() {
        let spec = digits_spec();
        let img = sheet(&spec, &[(0, 0), (1, 4), (2, 2), (3, 9)]);
        let reading = MarkScorer::new(2.0, 0.33).read_ext_id(&img, &spec);
        assert_eq!(reading.value.as_deref(), Some("0429"));
        assert!(reading.confidence.unwrap() > 0.9);
    }

    #[test]
    fn test_unmarked_cell_contributes_nothing() {
        let spec = digits_spec();
        let img = sheet(&spec, &[(0, 7), (2, 1)]);
        let reading = MarkScorer::new(2.0, 0.33).read_ext_id(&img, &spec);
        assert_eq!(reading.value.as_deref(), Some("71"));
        assert!(reading.cells[1].is_none());
        assert!(reading.cells[3].is_none());
    }

    #[test]
    fn test_blank_grid_is_none() {
        let spec = digits_spec();
        let img = sheet(&spec, &[]);
        let reading = MarkScorer::new(2.0, 0.33).read_ext_id(&img, &spec);
        assert_eq!(reading.value, None);
        assert_eq!(reading.confidence, None);
    }
}
