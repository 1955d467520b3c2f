//! Synthetic answer-sheet photos rendered analytically from a known layout.
//!
//! Every photo pixel is mapped back onto the page (in points) through a
//! fixed projective transform, then shaded from the page contents.

#![allow(dead_code)]

use image::{Rgb, RgbImage};
use serde_json::json;
use sheet_scan::Point;
use sheet_scan::utils::geometry::PerspectiveTransform;

pub const PAGE_W: f32 = 595.28;
pub const PAGE_H: f32 = 841.89;
pub const MARK: f32 = 14.0;
pub const MARGIN: f32 = 22.0;
pub const QR_BOX: (f32, f32, f32) = (395.0, 60.0, 100.0);
pub const PHOTO_W: u32 = 880;
pub const PHOTO_H: u32 = 1230;
pub const BUBBLE_R: f32 = 7.0;
pub const LABELS: [&str; 4] = ["A", "B", "C", "D"];
pub const QUESTION_IDS: [i64; 3] = [101, 102, 103];
pub const EXT_ID_CELLS: usize = 4;

const BACKGROUND: u8 = 235;
const PAPER: u8 = 250;
const INK: u8 = 20;

/// What is printed and marked on a synthetic sheet
pub struct SyntheticSheet {
    pub payload: String,
    /// Marked labels per question id
    pub marked: Vec<(i64, Vec<&'static str>)>,
    /// One digit per identifier cell, `None` for an unmarked cell
    pub ext_id: Vec<Option<u8>>,
    /// Which of TL/TR/BR/BL markers are printed
    pub markers: [bool; 4],
}

impl Default for SyntheticSheet {
    fn default() -> Self {
        Self {
            payload: "SG|q=abc123|s=42|v=3".to_string(),
            marked: vec![(101, vec!["B"]), (102, vec!["A", "D"])],
            ext_id: vec![Some(3), Some(0), Some(7), Some(5)],
            markers: [true; 4],
        }
    }
}

/// Top-left corners of the TL/TR/BR/BL marker squares, in points
pub fn marker_origins() -> [(f32, f32); 4] {
    let (r, b) = (PAGE_W - MARGIN - MARK, PAGE_H - MARGIN - MARK);
    [(MARGIN, MARGIN), (r, MARGIN), (r, b), (MARGIN, b)]
}

pub fn option_center(question: usize, option: usize) -> (f32, f32) {
    (100.0 + 30.0 * option as f32, 300.0 + 40.0 * question as f32)
}

pub fn ext_id_center(cell: usize, digit: usize) -> (f32, f32) {
    (100.0 + 25.0 * cell as f32, 480.0 + 22.0 * digit as f32)
}

/// Layout document matching the rendered sheets
pub fn layout_json() -> serde_json::Value {
    let ids = ["TL", "TR", "BR", "BL"];
    let anchors: Vec<_> = marker_origins()
        .iter()
        .zip(ids)
        .map(|(&(x, y), id)| json!({"id": id, "x": x, "y": y, "size": MARK}))
        .collect();
    let questions: Vec<_> = QUESTION_IDS
        .iter()
        .enumerate()
        .map(|(q, id)| {
            let options: Vec<_> = LABELS
                .iter()
                .enumerate()
                .map(|(o, label)| {
                    let (x, y) = option_center(q, o);
                    json!({"label": label, "x": x, "y": y, "r": BUBBLE_R})
                })
                .collect();
            json!({"qIndex": q, "questionPk": id, "options": options})
        })
        .collect();
    let cells: Vec<_> = (0..EXT_ID_CELLS)
        .map(|c| {
            let bubbles: Vec<_> = (0..10)
                .map(|d| {
                    let (x, y) = ext_id_center(c, d);
                    json!({"sym": d.to_string(), "x": x, "y": y, "r": BUBBLE_R})
                })
                .collect();
            json!({"pos": c, "bubbles": bubbles})
        })
        .collect();

    json!({
        "quizId": "abc123",
        "version": 3,
        "page": {"w": PAGE_W, "h": PAGE_H, "unit": "pt"},
        "anchors": anchors,
        "qr": {"x": QR_BOX.0, "y": QR_BOX.1, "size": QR_BOX.2},
        "questions": questions,
        "extId": {"mode": "DIGITS_ONLY", "cells": cells},
        "name": {"box": {"x": 300, "y": 480, "w": 200, "h": 60}}
    })
}

/// Page corners in points mapped to slightly rotated, skewed photo corners
pub fn page_to_photo() -> PerspectiveTransform {
    let page = [
        Point::new(0.0, 0.0),
        Point::new(PAGE_W, 0.0),
        Point::new(PAGE_W, PAGE_H),
        Point::new(0.0, PAGE_H),
    ];
    let photo = [
        Point::new(50.0, 40.0),
        Point::new(853.1, 68.0),
        Point::new(808.0, 1198.0),
        Point::new(10.3, 1175.9),
    ];
    PerspectiveTransform::from_points(&page, &photo).expect("page transform")
}

/// Photo-pixel centres of the printed markers
pub fn photo_marker_centers() -> [Point; 4] {
    let forward = page_to_photo();
    marker_origins().map(|(x, y)| {
        forward
            .transform(&Point::new(x + MARK / 2.0, y + MARK / 2.0))
            .expect("marker centre")
    })
}

struct Symbol {
    modules: usize,
    dark: Vec<bool>,
}

impl Symbol {
    fn new(text: &str) -> Self {
        let code = qrcode::QrCode::new(text.as_bytes()).expect("encodable payload");
        let dark = code
            .to_colors()
            .into_iter()
            .map(|c| c == qrcode::Color::Dark)
            .collect();
        Self {
            modules: code.width(),
            dark,
        }
    }

    /// Shade at page position `(u, v)` inside the symbol box, with a
    /// four-module quiet zone inside the box
    fn shade(&self, u: f32, v: f32) -> u8 {
        let units = (self.modules + 8) as f32;
        let unit = QR_BOX.2 / units;
        let mx = ((u - QR_BOX.0) / unit).floor() as i64 - 4;
        let my = ((v - QR_BOX.1) / unit).floor() as i64 - 4;
        let n = self.modules as i64;
        if mx < 0 || my < 0 || mx >= n || my >= n {
            return PAPER;
        }
        if self.dark[(my * n + mx) as usize] { INK } else { PAPER }
    }
}

fn in_box(u: f32, v: f32, x: f32, y: f32, w: f32, h: f32) -> bool {
    u >= x && u < x + w && v >= y && v < y + h
}

/// Render the photo of a sheet
pub fn render_photo(sheet: &SyntheticSheet) -> RgbImage {
    let symbol = Symbol::new(&sheet.payload);
    let inverse = page_to_photo().inverse().expect("invertible");

    let mut disks: Vec<(f32, f32)> = Vec::new();
    for (id, labels) in &sheet.marked {
        let q = QUESTION_IDS.iter().position(|x| x == id).expect("known question");
        for label in labels {
            let o = LABELS.iter().position(|l| l == label).expect("known label");
            disks.push(option_center(q, o));
        }
    }
    for (c, digit) in sheet.ext_id.iter().enumerate() {
        if let Some(d) = digit {
            disks.push(ext_id_center(c, *d as usize));
        }
    }
    let markers: Vec<(f32, f32)> = marker_origins()
        .iter()
        .zip(sheet.markers)
        .filter_map(|(&o, printed)| printed.then_some(o))
        .collect();

    RgbImage::from_fn(PHOTO_W, PHOTO_H, |x, y| {
        let Some((u, v)) = inverse.apply(x as f64, y as f64) else {
            return Rgb([BACKGROUND; 3]);
        };
        let (u, v) = (u as f32, v as f32);
        let shade = if !in_box(u, v, 0.0, 0.0, PAGE_W, PAGE_H) {
            BACKGROUND
        } else if markers.iter().any(|&(mx, my)| in_box(u, v, mx, my, MARK, MARK)) {
            INK
        } else if in_box(u, v, QR_BOX.0, QR_BOX.1, QR_BOX.2, QR_BOX.2) {
            symbol.shade(u, v)
        } else if disks
            .iter()
            .any(|&(cx, cy)| (u - cx).powi(2) + (v - cy).powi(2) <= BUBBLE_R * BUBBLE_R)
        {
            INK + 10
        } else {
            PAPER
        };
        Rgb([shade; 3])
    })
}
