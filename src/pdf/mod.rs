//! PDF layout extraction and page mutation on top of lopdf
//!
//! This module owns everything that reads or writes PDF structure:
//!
//! - [`open_document`] / [`load_document`]: open and, when needed, decrypt a PDF
//! - [`extract_structured_text`]: Block → Line → Span layout of one page
//! - [`page`]: content stream and resource plumbing used by the patch engine
//! - [`save_document`]: persist a (possibly modified) document
//!
//! # Example
//!
//! ```rust,ignore
//! use redate_server::pdf::{extract_structured_text, open_document};
//!
//! let doc = open_document(Path::new("form.pdf"), None)?;
//! let layout = extract_structured_text(&doc, 0)?;
//! for span in layout.spans() {
//!     println!("{} @ {:?}", span.text, span.bbox);
//! }
//! ```

mod cmap;
mod content;
mod fonts;
mod layout;
mod objects;
pub mod page;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use lopdf::Document;

use crate::document::{DocumentError, DocumentResult};

pub use cmap::ToUnicodeMap;
pub use content::{interpret_page, PaintLog, PaintedGlyph, WHITE};
pub use fonts::{encode_win_ansi_lossy, win_ansi_char, win_ansi_code, FontInfo, StandardFont};
pub use layout::{document_text, extract_page_text, extract_structured_text};
pub use page::PageGeometry;

/// Open a PDF from disk, decrypting it with `password` when it is encrypted
pub fn open_document(path: &Path, password: Option<&str>) -> DocumentResult<Document> {
    let bytes = std::fs::read(path).map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound => DocumentError::NotFound(path.display().to_string()),
        _ => DocumentError::IoError(err),
    })?;
    load_document(&bytes, password)
}

/// Parse a PDF from memory, decrypting it with `password` when it is encrypted.
///
/// An encrypted document whose user password is empty opens without a
/// password. The returned document carries no `/Encrypt` entry, so saving it
/// writes plain objects.
pub fn load_document(bytes: &[u8], password: Option<&str>) -> DocumentResult<Document> {
    let password_error = || match password {
        Some(_) => DocumentError::InvalidPassword,
        None => DocumentError::PasswordRequired,
    };

    let mut doc = Document::load_mem(bytes).map_err(|err| match err {
        lopdf::Error::Decryption(_) => password_error(),
        other => DocumentError::ParseError(other.to_string()),
    })?;

    if doc.is_encrypted() {
        doc.decrypt(password.unwrap_or_default()).map_err(|err| {
            tracing::debug!(error = %err, "Decryption failed");
            password_error()
        })?;
        doc.trailer.remove(b"Encrypt");
    }

    if doc.get_pages().is_empty() {
        return Err(DocumentError::ParseError("document has no pages".into()));
    }
    Ok(doc)
}

/// Write the document to `path`, replacing any existing file
pub fn save_document(doc: &mut Document, path: &Path) -> DocumentResult<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    doc.save_to(&mut writer)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_pdf_bytes, write_sample_pdf, SampleText};

    #[test]
    fn test_open_and_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_sample_pdf(
            dir.path(),
            "in.pdf",
            &[SampleText::new("Born 2007", 100.0, 600.0)],
        );

        let mut doc = open_document(&input, None).unwrap();
        let output = dir.path().join("out.pdf");
        save_document(&mut doc, &output).unwrap();

        let reopened = open_document(&output, None).unwrap();
        assert_eq!(document_text(&reopened).unwrap(), "Born 2007");
    }

    #[test]
    fn test_missing_file() {
        let result = open_document(Path::new("/nonexistent/redate/input.pdf"), None);
        assert!(matches!(result, Err(DocumentError::NotFound(_))));
    }

    #[test]
    fn test_garbage_is_parse_error() {
        let result = load_document(b"definitely not a pdf", None);
        assert!(matches!(result, Err(DocumentError::ParseError(_))));
    }

    #[test]
    fn test_password_ignored_for_plain_document() {
        let bytes = sample_pdf_bytes(&[SampleText::new("2007", 72.0, 700.0)]);
        let doc = load_document(&bytes, Some("secret")).unwrap();
        assert_eq!(document_text(&doc).unwrap(), "2007");
    }
}
