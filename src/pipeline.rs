//! End-to-end sheet scan.
//!
//! photo -> identifier -> layout -> corner markers -> canonical page ->
//! answers, bubbled identifier and name crop. Each [`Scanner::scan`] call
//! owns its buffers; a `Scanner` can be shared across threads.

use crate::align::{Aligner, Alignment};
use crate::config::ScanConfig;
use crate::detector::{MarkerDetection, MarkerDetector};
use crate::error::{Result, ScanError};
use crate::identifier::{IdentifierLocator, LocatedIdentifier, SheetPayload};
use crate::models::{AnchorSet, PageLayout, Rect, ResultRecord};
use crate::scorer::{AnswerReadings, ExtIdReading, MarkScorer};
use crate::utils::geometry::pt_to_px;
use crate::utils::grayscale::to_gray_image;
use image::{GrayImage, RgbImage, imageops};
use tracing::{debug, info, warn};

/// Source of page layouts, keyed by quiz and layout version
pub trait LayoutProvider: Send + Sync {
    /// Raw layout document; may wrap the layout in a string `layoutJson` field
    fn fetch_layout(&self, quiz_id: &str, version: u32) -> Result<serde_json::Value>;
}

/// Destination of finished result records
pub trait ResultSink: Send + Sync {
    /// Store the record for one sheet
    fn submit(&self, sheet: &SheetPayload, record: &ResultRecord) -> Result<()>;
}

/// Storage for the handwritten-name crop
pub trait CropStore: Send + Sync {
    /// Persist the crop and return where it was stored
    fn store_name_crop(&self, sheet: &SheetPayload, crop: &RgbImage) -> Result<String>;
}

/// Everything read from the canonical page
#[derive(Debug, Clone)]
pub struct PageReading {
    /// Anchors the alignment was computed from
    pub anchors: AnchorSet,
    /// Canonical image and transform
    pub alignment: Alignment,
    /// Multiple-choice rows
    pub answers: AnswerReadings,
    /// Bubbled student identifier
    pub ext_id: ExtIdReading,
    /// Name area of the canonical image
    pub name_crop: Option<RgbImage>,
}

/// Result of a successful scan
#[derive(Debug, Clone)]
pub struct SheetReading {
    /// Where and how the identifier was found
    pub identifier: LocatedIdentifier,
    /// Parsed identifier
    pub sheet: SheetPayload,
    /// Layout the page was read against
    pub layout: PageLayout,
    /// Page contents
    pub page: PageReading,
}

impl SheetReading {
    /// True when at least one corner marker fell back to its image corner
    pub fn is_degraded(&self) -> bool {
        self.page.anchors.is_degraded()
    }

    /// Persist the name crop, if there is one.
    ///
    /// A failing store is logged and yields `None`; the scan result stands.
    pub fn store_name_crop(&self, store: &dyn CropStore) -> Option<String> {
        let crop = self.page.name_crop.as_ref()?;
        match store.store_name_crop(&self.sheet, crop) {
            Ok(path) => Some(path),
            Err(err) => {
                warn!(sheet_id = self.sheet.sheet_id, error = %err, "name crop not stored");
                None
            }
        }
    }

    /// Result record for the sink
    pub fn to_record(&self, name_crop_path: Option<String>) -> ResultRecord {
        ResultRecord {
            ext_id: self.page.ext_id.value.clone(),
            ext_id_confidence: self.page.ext_id.confidence,
            answers: self.page.answers.answers.clone(),
            answers_confidence: self.page.answers.confidence.clone(),
            student_pk: None,
            name_crop_path,
        }
    }
}

/// Answer-sheet scanner
pub struct Scanner {
    config: ScanConfig,
    locator: IdentifierLocator,
    markers: MarkerDetector,
    aligner: Aligner,
    scorer: MarkScorer,
}

impl Scanner {
    /// Scanner with the default decoder chain
    pub fn new(config: ScanConfig) -> Self {
        Self {
            locator: IdentifierLocator::new(config.identifier.clone()),
            markers: MarkerDetector::new(config.markers.clone()),
            aligner: Aligner::from_config(&config),
            scorer: MarkScorer::from_config(&config),
            config,
        }
    }

    /// Replace the identifier locator
    pub fn with_locator(mut self, locator: IdentifierLocator) -> Self {
        self.locator = locator;
        self
    }

    /// Active configuration
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Bubble scorer in use
    pub fn scorer(&self) -> &MarkScorer {
        &self.scorer
    }

    /// Find and decode the identifier symbol
    pub fn locate(&self, gray: &GrayImage) -> Result<LocatedIdentifier> {
        self.locator.locate(gray)
    }

    /// Corner markers with `exclude` masked out using the configured padding
    pub fn detect_markers(&self, gray: &GrayImage, exclude: Option<&Rect>) -> MarkerDetection {
        self.markers.detect(gray, exclude, self.config.identifier_pad)
    }

    /// Read a photographed page against a known layout
    pub fn read_page(&self, image: &RgbImage, layout: &PageLayout, exclude: Option<&Rect>) -> Result<PageReading> {
        let gray = to_gray_image(image);
        self.read_page_gray(image, &gray, layout, exclude)
    }

    fn read_page_gray(
        &self,
        image: &RgbImage,
        gray: &GrayImage,
        layout: &PageLayout,
        exclude: Option<&Rect>,
    ) -> Result<PageReading> {
        let anchors = self.detect_markers(gray, exclude).anchors;

        let alignment = self.aligner.align(image, layout, &anchors)?;
        let canonical = to_gray_image(&alignment.image);

        let answers = self.scorer.read_answers(&canonical, &layout.questions);
        let ext_id = layout
            .ext_id
            .as_ref()
            .map(|spec| self.scorer.read_ext_id(&canonical, spec))
            .unwrap_or_default();
        let name_crop = name_crop(&alignment.image, layout, self.config.px_per_pt);
        debug!(
            questions = answers.answers.len(),
            ext_id = ?ext_id.value,
            name_crop = name_crop.is_some(),
            "page read"
        );

        Ok(PageReading {
            anchors,
            alignment,
            answers,
            ext_id,
            name_crop,
        })
    }

    /// Full scan: identify the sheet, fetch its layout and read the page
    pub fn scan(&self, image: &RgbImage, layouts: &dyn LayoutProvider) -> Result<SheetReading> {
        let gray = to_gray_image(image);
        let identifier = self.locator.locate(&gray)?;
        let sheet = identifier.parse()?;
        info!(
            quiz_id = %sheet.quiz_id,
            sheet_id = sheet.sheet_id,
            version = sheet.version,
            variant = %identifier.variant,
            "sheet identified"
        );

        let raw = layouts.fetch_layout(&sheet.quiz_id, sheet.version)?;
        let layout = PageLayout::from_response(raw)?;
        let page = self.read_page_gray(image, &gray, &layout, identifier.rect.as_ref())?;

        Ok(SheetReading {
            identifier,
            sheet,
            layout,
            page,
        })
    }

    /// Scan, store the name crop if a store is given, and submit the record
    pub fn scan_and_submit(
        &self,
        image: &RgbImage,
        layouts: &dyn LayoutProvider,
        sink: &dyn ResultSink,
        crops: Option<&dyn CropStore>,
    ) -> Result<(SheetReading, ResultRecord)> {
        let reading = self.scan(image, layouts)?;
        let crop_path = crops.and_then(|store| reading.store_name_crop(store));
        let record = reading.to_record(crop_path);
        sink.submit(&reading.sheet, &record)?;
        info!(sheet_id = reading.sheet.sheet_id, "result submitted");
        Ok((reading, record))
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new(ScanConfig::default())
    }
}

/// Crop of the layout's name box from the canonical image, clipped to it
pub fn name_crop(canonical: &RgbImage, layout: &PageLayout, px_per_pt: f32) -> Option<RgbImage> {
    let bbox = layout.name.as_ref()?.bbox?;
    let rect = Rect::new(
        pt_to_px(bbox.x, px_per_pt),
        pt_to_px(bbox.y, px_per_pt),
        pt_to_px(bbox.w, px_per_pt),
        pt_to_px(bbox.h, px_per_pt),
    );
    if rect.w <= 0 || rect.h <= 0 {
        return None;
    }
    let (x0, y0, x1, y1) = rect.padded_span(0, canonical.width(), canonical.height())?;
    Some(imageops::crop_imm(canonical, x0, y0, x1 - x0, y1 - y0).to_image())
}

/// Layout provider backed by a fixed document, for single-layout runs
pub struct StaticLayout(pub serde_json::Value);

impl LayoutProvider for StaticLayout {
    fn fetch_layout(&self, _quiz_id: &str, _version: u32) -> Result<serde_json::Value> {
        if self.0.is_null() {
            return Err(ScanError::Provider("no layout configured".to_string()));
        }
        Ok(self.0.clone())
    }
}
