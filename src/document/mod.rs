//! Document model
//!
//! Format-level types shared by the layout extractor, the patch engine and
//! the HTTP layer.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              StructuredText (page)           │
//! └──────────────────────────────────────────────┘
//!                       │
//!                       ▼
//!               TextBlock → TextLine → TextSpan
//!                                        │
//!                                        ▼
//!                          text, bbox, font, size, colour
//! ```

mod error;
mod types;

pub use error::{DocumentError, DocumentResult, Result};
pub use types::{pack_rgb, unpack_rgb, Rect, StructuredText, TextBlock, TextLine, TextSpan};
