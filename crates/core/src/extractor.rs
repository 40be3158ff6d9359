use crate::error::ExtractionError;
use crate::models::{Document, PageText, RawFile};

/// Converts raw PDF bytes into per-page text. Implementations must not
/// require the bytes to live on disk.
pub trait PdfExtractor {
    fn extract_pages(&self, bytes: &[u8], source_id: &str)
        -> Result<Vec<PageText>, ExtractionError>;
}

#[derive(Default)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(
        &self,
        bytes: &[u8],
        source_id: &str,
    ) -> Result<Vec<PageText>, ExtractionError> {
        let document = lopdf::Document::load_mem(bytes).map_err(|error| {
            ExtractionError::PdfParse {
                source_id: source_id.to_string(),
                details: error.to_string(),
            }
        })?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| ExtractionError::PdfParse {
                    source_id: source_id.to_string(),
                    details: error.to_string(),
                })?;

            if !text.trim().is_empty() {
                pages.push(PageText {
                    number: page_no,
                    text,
                });
            }
        }

        if pages.is_empty() {
            return Err(ExtractionError::EmptyDocument {
                source_id: source_id.to_string(),
            });
        }

        Ok(pages)
    }
}

/// Strips control characters and collapses runs of whitespace to single
/// spaces. Idempotent: `clean_text(clean_text(s)) == clean_text(s)`.
pub fn clean_text(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extract and normalize one uploaded file into a [`Document`].
pub fn extract_document(
    extractor: &dyn PdfExtractor,
    file: &RawFile,
) -> Result<Document, ExtractionError> {
    let pages = extractor.extract_pages(&file.bytes, &file.name)?;
    let joined = pages
        .iter()
        .map(|page| page.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    Ok(Document {
        source_id: file.name.clone(),
        text: clean_text(&joined),
        pages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_collapses_whitespace() {
        let input = "A  \t  lot\nof   spacing";
        assert_eq!(clean_text(input), "A lot of spacing");
    }

    #[test]
    fn clean_text_strips_control_characters() {
        let input = "alarm\u{7} bell\u{0} text";
        assert_eq!(clean_text(input), "alarm bell text");
    }

    #[test]
    fn clean_text_is_idempotent() {
        let inputs = [
            "Patient has stage 2 hypertension.\n\nFollow-up in 3 months.",
            "  leading and trailing  ",
            "",
            "already clean",
        ];
        for input in inputs {
            let once = clean_text(input);
            assert_eq!(clean_text(&once), once);
        }
    }

    #[test]
    fn corrupt_bytes_fail_with_source_identifier() {
        let extractor = LopdfExtractor;
        let error = extractor
            .extract_pages(b"not a pdf at all", "report.pdf")
            .expect_err("garbage bytes must not parse");
        assert_eq!(error.source_id(), "report.pdf");
    }
}
