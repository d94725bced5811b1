//! Document error types
//!
//! Errors raised while opening, reading, patching or saving a PDF.

use thiserror::Error;

/// Unified document error type
#[derive(Debug, Error)]
pub enum DocumentError {
    /// Document not found
    #[error("Document not found: {0}")]
    NotFound(String),

    /// Page index outside the document
    #[error("Page not found: index {0}")]
    PageNotFound(usize),

    /// Failed to parse document or one of its content streams
    #[error("Parse error: {0}")]
    ParseError(String),

    /// The document is encrypted and no password was supplied
    #[error("Document is encrypted and requires a password")]
    PasswordRequired,

    /// The supplied password did not unlock the document
    #[error("Invalid password")]
    InvalidPassword,

    /// Invalid content (broken page tree, unencodable operands)
    #[error("Invalid content: {0}")]
    InvalidContent(String),

    /// MuPDF context error
    #[error("MuPDF context error: {0}")]
    ContextError(String),

    /// IO error (std::io::Error)
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Font could not be registered or used
    #[error("Font error: {0}")]
    FontError(String),
}

/// Result type alias for document operations
pub type Result<T> = std::result::Result<T, DocumentError>;

/// Alias for Result (used across the patching code)
pub type DocumentResult<T> = Result<T>;

impl From<mupdf::Error> for DocumentError {
    fn from(err: mupdf::Error) -> Self {
        DocumentError::ContextError(err.to_string())
    }
}

impl From<lopdf::Error> for DocumentError {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(io) => DocumentError::IoError(io),
            other => DocumentError::ParseError(other.to_string()),
        }
    }
}

impl DocumentError {
    /// Whether the error is caused by the input document itself rather than the host
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            DocumentError::ParseError(_)
                | DocumentError::InvalidContent(_)
                | DocumentError::PasswordRequired
                | DocumentError::InvalidPassword
                | DocumentError::PageNotFound(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lopdf_io_error_maps_to_io() {
        let err: DocumentError =
            lopdf::Error::IO(std::io::Error::new(std::io::ErrorKind::NotFound, "gone")).into();
        assert!(matches!(err, DocumentError::IoError(_)));
        assert!(!err.is_input_error());
    }

    #[test]
    fn test_password_errors_are_input_errors() {
        assert!(DocumentError::PasswordRequired.is_input_error());
        assert!(DocumentError::InvalidPassword.is_input_error());
        assert!(DocumentError::ParseError("bad xref".into()).is_input_error());
    }
}
