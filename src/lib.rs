//! Redate Server Library
//!
//! Rewrites date tokens inside uploaded PDFs in place, keeping the look of
//! the original text. The HTTP binary is in main.rs.
//!
//! # Modules
//!
//! - `document`: layout types and the document error type
//! - `pdf`: layout extraction and page mutation on top of lopdf
//! - `patch`: span locator, font policy, patch engine and orchestrator
//! - `age`: birth-year heuristic
//! - `mupdf`: upload probing via MuPDF
//! - `session`, `routes`, `state`, `config`, `error`: the HTTP service

pub mod age;
pub mod config;
pub mod document;
pub mod error;
pub mod mupdf;
pub mod patch;
pub mod pdf;
pub mod routes;
pub mod session;
pub mod state;

#[cfg(test)]
mod testing;

pub use patch::{apply_replacements, ReplacementMap, ReplacementReport};
