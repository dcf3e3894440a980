// PDF text extraction
// One Document per page that carries any text


use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::{RagError, Result};

/// Text of a single PDF page, attributed to its source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub text: String,
    pub source: PathBuf,
    /// 1-based page number within the source
    pub page: u32,
}

impl Document {
    #[inline]
    pub fn new(text: impl Into<String>, source: impl Into<PathBuf>, page: u32) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
            page,
        }
    }
}

/// Load a PDF from disk and extract its text page by page
#[inline]
pub fn load_pdf(path: &Path) -> Result<Vec<Document>> {
    debug!("Reading PDF from {}", path.display());

    let bytes = fs::read(path).map_err(|e| RagError::Pdf {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    load_pdf_bytes(&bytes, path)
}

/// Extract page text from an in-memory PDF. `source` is only used for
/// attribution and error messages.
#[inline]
pub fn load_pdf_bytes(bytes: &[u8], source: &Path) -> Result<Vec<Document>> {
    let pdf = lopdf::Document::load_mem(bytes).map_err(|e| RagError::Pdf {
        path: source.to_path_buf(),
        reason: e.to_string(),
    })?;

    if pdf.is_encrypted() {
        return Err(RagError::Pdf {
            path: source.to_path_buf(),
            reason: "document is encrypted".to_string(),
        });
    }

    let pages = pdf.get_pages();
    let mut documents = Vec::with_capacity(pages.len());

    for &page in pages.keys() {
        let text = match pdf.extract_text(&[page]) {
            Ok(text) => normalize_page_text(&text),
            Err(e) => {
                warn!(
                    "Skipping page {} of {}: {}",
                    page,
                    source.display(),
                    e
                );
                continue;
            }
        };

        if text.trim().is_empty() {
            debug!("Page {} of {} has no text", page, source.display());
            continue;
        }

        documents.push(Document::new(text, source, page));
    }

    if documents.is_empty() {
        return Err(RagError::EmptyDocument(source.display().to_string()));
    }

    info!(
        "Extracted text from {} of {} pages in {}",
        documents.len(),
        pages.len(),
        source.display()
    );

    Ok(documents)
}

fn normalize_page_text(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n").trim_end().to_string()
}
