//! Plain-text extraction from stored PDFs (lopdf).

use anyhow::Result;
use std::path::Path;

/// Extract the text of every page, in page order.
pub fn extract_pdf_text(pdf_path: &Path) -> Result<String> {
    use lopdf::Document as PdfDoc;

    let pdf = PdfDoc::load(pdf_path)?;
    let pages: Vec<u32> = pdf.get_pages().keys().copied().collect();
    if pages.is_empty() {
        return Ok(String::new());
    }
    Ok(pdf.extract_text(&pages)?)
}
