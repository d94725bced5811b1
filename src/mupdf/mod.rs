//! Low-level MuPDF wrapper
//!
//! MuPDF is used only at the upload boundary: it validates the file, tells
//! whether it is encrypted and authenticates a password. Layout extraction
//! and patching live in [`crate::pdf`].
//!
//! # Thread Safety
//!
//! MuPDF's `fz_context` is **NOT thread-safe**. Every probe opens a fresh
//! document and drops it before returning, and callers run probes on
//! `tokio::task::spawn_blocking`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use redate_server::mupdf::probe_pdf;
//!
//! let report = probe_pdf(&bytes, Some("secret"))?;
//! if report.encrypted && !report.authenticated {
//!     // ask for a password
//! }
//! ```

mod probe;

pub use probe::{looks_like_pdf, probe_pdf, ProbeReport};
