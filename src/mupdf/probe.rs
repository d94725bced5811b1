//! Upload probe
//!
//! Opens an uploaded file with MuPDF to make sure it is a readable PDF,
//! reports whether it is encrypted and checks a password against it.

use mupdf::Document;
use serde::Serialize;

use crate::document::{DocumentError, DocumentResult};

const PDF_MIME: &str = "application/pdf";

/// How far into the file the `%PDF` header may appear
const HEADER_SEARCH_LIMIT: usize = 1024;

/// What MuPDF reports about an uploaded file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    /// The file needs a password to be read
    pub encrypted: bool,
    /// A supplied password unlocked the file
    pub authenticated: bool,
    /// Page count, known once the document is readable
    pub page_count: Option<usize>,
}

impl ProbeReport {
    /// The document can be read with what the caller supplied
    pub fn is_readable(&self) -> bool {
        !self.encrypted || self.authenticated
    }
}

/// Check for the `%PDF` header near the start of the file
pub fn looks_like_pdf(data: &[u8]) -> bool {
    let head = &data[..data.len().min(HEADER_SEARCH_LIMIT)];
    head.windows(4).any(|w| w == b"%PDF")
}

/// Probe an uploaded file.
///
/// `password` is only tried when the document needs one; a wrong password
/// is reported through [`ProbeReport::authenticated`], not as an error.
pub fn probe_pdf(data: &[u8], password: Option<&str>) -> DocumentResult<ProbeReport> {
    let mut doc = Document::from_bytes(data, PDF_MIME)
        .map_err(|e| DocumentError::ParseError(e.to_string()))?;
    let encrypted = doc.needs_password()?;

    let authenticated = match (encrypted, password) {
        (true, Some(password)) => doc.authenticate(password)?,
        _ => false,
    };

    let page_count = if !encrypted || authenticated {
        Some(doc.page_count()?.max(0) as usize)
    } else {
        None
    };

    tracing::debug!(encrypted, authenticated, ?page_count, "Probed upload");

    Ok(ProbeReport {
        encrypted,
        authenticated,
        page_count,
    })
}
