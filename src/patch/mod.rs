//! Date-token patching
//!
//! ```text
//! ReplacementMap ──► orchestrator ──► per page, per key:
//!                                       extract layout (pdf::layout)
//!                                       locate spans   (locator)
//!                                       cover + redraw (engine, font)
//!                                     ──► save ──► ReplacementReport
//! ```

mod engine;
mod font;
mod locator;
mod orchestrator;
mod report;

pub use engine::{PatchEngine, BASELINE_RATIO};
pub use font::{
    select_font, FontChoice, FontResolver, FontResource, BUILTIN_FONT_NAME, CUSTOM_FONT_NAME,
    DEFAULT_FONT_PATHS,
};
pub use locator::{count_occurrences, find_matches, SpanMatch};
pub use orchestrator::{apply_replacements, replace_in_document, RunPhase};
pub use report::{ReplacementDetail, ReplacementMap, ReplacementReport};
