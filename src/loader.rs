//! Turns input files into provenance-tagged plain text.

use std::path::{Path, PathBuf};

use pdf_oxide::PdfDocument;
use rayon::prelude::*;
use serde::Serialize;

use crate::{
    error::{Error, Result},
    text_util::char_count,
    walker::InputFile,
};

/// Supported file extensions, matched case-insensitively.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "pdf"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Plain text, decoded as UTF-8.
    Text,
    Pdf,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "txt" => Some(Self::Text),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }
}

/// Extract the plain text of a single file.
pub fn extract(path: &Path) -> Result<String> {
    match DocumentKind::from_path(path) {
        Some(DocumentKind::Text) => extract_text(path),
        Some(DocumentKind::Pdf) => extract_pdf(path),
        None => Err(Error::Unsupported {
            path: path.to_path_buf(),
        }),
    }
}

fn extract_text(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    String::from_utf8(bytes).map_err(|source| Error::Utf8 {
        path: path.to_path_buf(),
        source,
    })
}

/// Text of every page, in page order. Pages whose text cannot be extracted
/// contribute nothing.
fn extract_pdf(path: &Path) -> Result<String> {
    let pdf_error = |message: String| Error::Pdf {
        path: path.to_path_buf(),
        message,
    };

    let mut doc = PdfDocument::open(path)
        .map_err(|e| pdf_error(format!("failed to open: {e}")))?;
    let page_count = doc
        .page_count()
        .map_err(|e| pdf_error(format!("failed to read page count: {e}")))?;
    if page_count == 0 {
        return Err(pdf_error("document has no pages".to_string()));
    }

    let mut pages = Vec::new();
    for page_idx in 0..page_count {
        match doc.extract_text(page_idx) {
            Ok(text) => pages.push(text),
            Err(e) => {
                tracing::debug!(
                    path = %path.display(),
                    page = page_idx + 1,
                    error = %e,
                    "skipping page without extractable text"
                );
            }
        }
    }

    Ok(pages.join("\n"))
}

/// Wrap extracted text in start/end markers naming its source file.
pub fn provenance_block(name: &str, text: &str) -> String {
    format!(
        "--- START OF FILE: {name} ---\n{text}\n--- END OF FILE: {name} ---\n\n"
    )
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadedDocument {
    pub name: String,
    pub path: PathBuf,
    pub text: String,
}

/// A file that contributed no text, and why.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub name: String,
    pub path: PathBuf,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub documents: Vec<LoadedDocument>,
    pub diagnostics: Vec<Diagnostic>,
}

impl LoadReport {
    /// Provenance blocks of all loaded documents, joined by newlines.
    pub fn combined(&self) -> String {
        self.documents
            .iter()
            .map(|doc| provenance_block(&doc.name, &doc.text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn files_processed(&self) -> usize {
        self.documents.len() + self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Extract every input in parallel. Output order follows input order;
/// failures become diagnostics instead of aborting the batch.
pub fn load_documents(inputs: &[InputFile]) -> LoadReport {
    let outcomes: Vec<_> = inputs
        .par_iter()
        .map(|input| (input, extract(&input.path)))
        .collect();

    let mut report = LoadReport::default();
    for (input, outcome) in outcomes {
        match outcome {
            Ok(text) if text.trim().is_empty() => {
                tracing::warn!(file = %input.name, "no text extracted");
                report.diagnostics.push(Diagnostic {
                    name: input.name.clone(),
                    path: input.path.clone(),
                    message: "no text could be extracted".to_string(),
                });
            }
            Ok(text) => {
                tracing::debug!(
                    file = %input.name,
                    chars = char_count(&text),
                    "extracted document"
                );
                report.documents.push(LoadedDocument {
                    name: input.name.clone(),
                    path: input.path.clone(),
                    text,
                });
            }
            Err(e) => {
                tracing::warn!(file = %input.name, "{e}");
                report.diagnostics.push(Diagnostic {
                    name: input.name.clone(),
                    path: input.path.clone(),
                    message: e.to_string(),
                });
            }
        }
    }

    report
}
