use std::path::Path;

use crate::error::ExtractError;
use crate::extractor::{scaled, ContentKind, Extractor, ProgressReporter};
use crate::jobs::ParsedContent;

/// Extracts the text of every page of a PDF, in page order.
#[derive(Default)]
pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for PdfExtractor {
    fn extract(
        &self,
        path: &Path,
        progress: &dyn ProgressReporter,
    ) -> Result<ParsedContent, ExtractError> {
        let _span = tracing::info_span!("extractor.pdf").entered();
        progress.checkpoint()?;

        let pdf_bytes = std::fs::read(path).map_err(|e| ExtractError::io(path, e))?;
        let doc = lopdf::Document::load_mem(&pdf_bytes)
            .map_err(|e| ExtractError::malformed(format!("failed to load PDF: {}", e)))?;

        let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
        let total = page_numbers.len() as u64;
        let mut pages = Vec::with_capacity(page_numbers.len());

        for (i, page_num) in page_numbers.into_iter().enumerate() {
            progress.checkpoint()?;
            let text = match doc.extract_text(&[page_num]) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(
                        "Could not extract text from page {} of {}: {}",
                        page_num,
                        path.display(),
                        e
                    );
                    String::new()
                }
            };
            pages.push(text);
            progress.report(scaled(i as u64 + 1, total));
        }

        if pages.is_empty() {
            progress.report(scaled(0, 0));
        }

        Ok(ParsedContent::Pages { pages })
    }

    fn supports(&self, kind: ContentKind) -> bool {
        matches!(kind, ContentKind::Document)
    }
}

/// Builds a small PDF with one text line per page.
#[cfg(test)]
pub(crate) fn sample_pdf(page_texts: &[&str]) -> Vec<u8> {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in page_texts {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode page content"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("serialize sample pdf");
    bytes
}
