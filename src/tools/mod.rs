//! Filesystem-backed collaborators and image loading for the command-line tool.

use crate::error::{Result, ScanError};
use crate::identifier::SheetPayload;
use crate::models::ResultRecord;
use crate::pipeline::{CropStore, LayoutProvider, ResultSink};
use image::{GenericImageView, RgbImage};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

fn max_dim_from_env() -> Option<u32> {
    match env::var("SHEET_MAX_DIM") {
        Ok(value) => match value.trim().parse::<u32>() {
            Ok(0) => None,
            Ok(v) => Some(v),
            Err(_) => None,
        },
        Err(_) => None,
    }
}

/// Load an image as RGB, downscaled to fit `SHEET_MAX_DIM` when that is set
pub fn load_rgb<P: AsRef<Path>>(path: P) -> Result<RgbImage> {
    let img = image::open(path)?;
    let rgb = match max_dim_from_env() {
        Some(max_dim) if img.dimensions().0.max(img.dimensions().1) > max_dim => img
            .resize(max_dim, max_dim, image::imageops::FilterType::Triangle)
            .to_rgb8(),
        _ => img.to_rgb8(),
    };
    Ok(rgb)
}

/// Layouts stored as `<root>/<quizId>/v<version>.json`, falling back to
/// `<root>/<quizId>.json`
pub struct FsLayoutProvider {
    root: PathBuf,
}

impl FsLayoutProvider {
    /// Provider reading from `root`
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    fn candidates(&self, quiz_id: &str, version: u32) -> [PathBuf; 2] {
        [
            self.root.join(quiz_id).join(format!("v{version}.json")),
            self.root.join(format!("{quiz_id}.json")),
        ]
    }
}

impl LayoutProvider for FsLayoutProvider {
    fn fetch_layout(&self, quiz_id: &str, version: u32) -> Result<serde_json::Value> {
        if quiz_id.contains(['/', '\\']) || quiz_id.starts_with('.') {
            return Err(ScanError::Provider(format!("refusing quiz id {quiz_id:?}")));
        }
        for path in self.candidates(quiz_id, version) {
            if !path.is_file() {
                continue;
            }
            debug!(path = %path.display(), "loading layout");
            let content = fs::read_to_string(&path)?;
            return serde_json::from_str(&content).map_err(|e| ScanError::Layout {
                message: format!("{}: {e}", path.display()),
            });
        }
        Err(ScanError::Provider(format!(
            "no layout for quiz {quiz_id} version {version} under {}",
            self.root.display()
        )))
    }
}

/// Result records written as `<root>/<sheetId>.json`
pub struct FsResultSink {
    root: PathBuf,
}

impl FsResultSink {
    /// Sink writing into `root`, created on first use
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }
}

impl ResultSink for FsResultSink {
    fn submit(&self, sheet: &SheetPayload, record: &ResultRecord) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        let path = self.root.join(format!("{}.json", sheet.sheet_id));
        let json = serde_json::to_string_pretty(record).map_err(|e| ScanError::Sink(e.to_string()))?;
        fs::write(&path, json)?;
        debug!(path = %path.display(), "result written");
        Ok(())
    }
}

/// Name crops written as `<root>/<quizId>/<sheetId>/name.png`
pub struct FsCropStore {
    root: PathBuf,
}

impl FsCropStore {
    /// Store writing under `root`
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }
}

impl CropStore for FsCropStore {
    fn store_name_crop(&self, sheet: &SheetPayload, crop: &RgbImage) -> Result<String> {
        if sheet.quiz_id.contains(['/', '\\']) || sheet.quiz_id.starts_with('.') {
            return Err(ScanError::Sink(format!("refusing quiz id {:?}", sheet.quiz_id)));
        }
        let dir = self
            .root
            .join(&sheet.quiz_id)
            .join(sheet.sheet_id.to_string());
        fs::create_dir_all(&dir)?;
        let path = dir.join("name.png");
        crop.save(&path)?;
        Ok(path.display().to_string())
    }
}
