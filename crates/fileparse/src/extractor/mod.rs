//! Content extractors.
//!
//! An extractor turns the bytes of one uploaded file into a [`ParsedContent`]
//! payload, reporting progress as it goes. The [`ExtractorRegistry`] picks
//! the extractor from the file's extension.

pub mod document;
pub mod tabular;
pub mod unsupported;

use std::path::Path;

use crate::error::ExtractError;
use crate::jobs::ParsedContent;

pub use document::PdfExtractor;
pub use tabular::{CsvExtractor, SpreadsheetExtractor};
pub use unsupported::UnsupportedExtractor;

/// Progress value reported once extraction has started.
pub const START_PROGRESS: u8 = 5;

/// Highest value an extractor reports; the rest is reserved for the final write.
pub const EXTRACT_PROGRESS_CAP: u8 = 95;

/// Rows per progress tick when no batch size is configured.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TabularFormat {
    Csv,
    Spreadsheet,
}

/// Extractor variant selected for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Tabular(TabularFormat),
    Document,
    Unsupported,
}

impl ContentKind {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "csv" => ContentKind::Tabular(TabularFormat::Csv),
            "xls" | "xlsx" | "xlsm" | "ods" => ContentKind::Tabular(TabularFormat::Spreadsheet),
            "pdf" => ContentKind::Document,
            _ => ContentKind::Unsupported,
        }
    }

    /// Classifies by the extension of the original filename.
    pub fn from_filename(filename: &str) -> Self {
        Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(ContentKind::Unsupported)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Tabular(TabularFormat::Csv) => "csv",
            ContentKind::Tabular(TabularFormat::Spreadsheet) => "spreadsheet",
            ContentKind::Document => "pdf",
            ContentKind::Unsupported => "unsupported",
        }
    }
}

/// Receives progress from a running extractor.
pub trait ProgressReporter: Send + Sync {
    /// Reports overall completion in percent. Implementations clamp.
    fn report(&self, percent: u8);

    /// Called between batches and pages. An error stops the extraction.
    fn checkpoint(&self) -> Result<(), ExtractError> {
        Ok(())
    }
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _percent: u8) {}
}

/// Maps `done / total` into the `[START_PROGRESS, EXTRACT_PROGRESS_CAP]` band.
pub fn scaled(done: u64, total: u64) -> u8 {
    if total == 0 {
        return EXTRACT_PROGRESS_CAP;
    }
    let span = u64::from(EXTRACT_PROGRESS_CAP - START_PROGRESS);
    let value = u64::from(START_PROGRESS) + span * done.min(total) / total;
    value.min(u64::from(EXTRACT_PROGRESS_CAP)) as u8
}

pub trait Extractor: Send + Sync {
    fn extract(
        &self,
        path: &Path,
        progress: &dyn ProgressReporter,
    ) -> Result<ParsedContent, ExtractError>;

    fn supports(&self, kind: ContentKind) -> bool;
}

pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn Extractor>>,
    fallback: UnsupportedExtractor,
}

impl ExtractorRegistry {
    /// Registry with every built-in extractor.
    pub fn new(batch_size: usize) -> Self {
        Self::with_extractors(vec![
            Box::new(CsvExtractor::new(batch_size)),
            Box::new(SpreadsheetExtractor::new(batch_size)),
            Box::new(PdfExtractor::new()),
        ])
    }

    /// Registry with caller-chosen extractors. Kinds nobody supports fall
    /// through to [`UnsupportedExtractor`].
    pub fn with_extractors(extractors: Vec<Box<dyn Extractor>>) -> Self {
        Self {
            extractors,
            fallback: UnsupportedExtractor,
        }
    }

    pub fn select(&self, kind: ContentKind) -> &dyn Extractor {
        self.extractors
            .iter()
            .find(|e| e.supports(kind))
            .map(|e| e.as_ref())
            .unwrap_or(&self.fallback)
    }

    /// Extracts `path`, choosing the extractor from `filename`'s extension.
    pub fn extract(
        &self,
        filename: &str,
        path: &Path,
        progress: &dyn ProgressReporter,
    ) -> Result<ParsedContent, ExtractError> {
        let kind = ContentKind::from_filename(filename);
        let _span =
            tracing::info_span!("extractor", kind = kind.as_str(), file = filename).entered();
        self.select(kind).extract(path, progress)
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}
