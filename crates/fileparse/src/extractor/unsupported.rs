use std::path::Path;

use crate::error::ExtractError;
use crate::extractor::{ContentKind, Extractor, ProgressReporter};
use crate::jobs::ParsedContent;

/// Progress reported for files no extractor understands.
const UNSUPPORTED_PROGRESS: u8 = 50;

/// Accepts any file and records that its type is not supported.
///
/// The bytes are never read, so this never fails.
#[derive(Default)]
pub struct UnsupportedExtractor;

impl Extractor for UnsupportedExtractor {
    fn extract(
        &self,
        path: &Path,
        progress: &dyn ProgressReporter,
    ) -> Result<ParsedContent, ExtractError> {
        log::debug!("No extractor for {}, marking unsupported", path.display());
        progress.report(UNSUPPORTED_PROGRESS);
        Ok(ParsedContent::unsupported())
    }

    fn supports(&self, kind: ContentKind) -> bool {
        kind == ContentKind::Unsupported
    }
}
