//! Replacement orchestrator
//!
//! Walks pages × replacement keys, re-extracting the page layout before each
//! key so that patches made for an earlier key are visible to later scans.
//! The document is always saved, even when nothing matched.

use std::fmt;
use std::path::Path;

use lopdf::Document;

use super::engine::PatchEngine;
use super::font::FontResolver;
use super::locator::find_matches;
use super::report::{ReplacementMap, ReplacementReport};
use crate::document::DocumentResult;
use crate::pdf::page::page_ids;
use crate::pdf::{extract_page_text, open_document, save_document, PageGeometry};

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Init,
    PerPage { page: usize },
    PerToken { page: usize, key: usize },
    PerBlock { page: usize, key: usize, block: usize },
    PerLine { page: usize, key: usize, block: usize, line: usize },
    PerSpan { page: usize, key: usize, block: usize, line: usize },
    Saving,
    Done,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::Init => write!(f, "init"),
            RunPhase::PerPage { page } => write!(f, "page {}", page),
            RunPhase::PerToken { page, key } => write!(f, "page {} key {}", page, key),
            RunPhase::PerBlock { page, key, block } => {
                write!(f, "page {} key {} block {}", page, key, block)
            }
            RunPhase::PerLine {
                page,
                key,
                block,
                line,
            } => write!(f, "page {} key {} block {} line {}", page, key, block, line),
            RunPhase::PerSpan {
                page,
                key,
                block,
                line,
            } => write!(f, "page {} key {} block {} line {} span", page, key, block, line),
            RunPhase::Saving => write!(f, "saving"),
            RunPhase::Done => write!(f, "done"),
        }
    }
}

/// Tracks the current phase and logs each transition
#[derive(Debug)]
struct PhaseTracker {
    phase: RunPhase,
}

impl PhaseTracker {
    fn new() -> Self {
        tracing::debug!(phase = %RunPhase::Init, "Replacement run started");
        Self {
            phase: RunPhase::Init,
        }
    }

    fn enter(&mut self, next: RunPhase) {
        if self.phase != next {
            tracing::debug!(from = %self.phase, to = %next, "Run phase");
            self.phase = next;
        }
    }
}

/// Apply `replacements` and write the result to `output_path`.
///
/// With `handle` set the supplied document is patched and `input_path` is
/// ignored; the caller keeps ownership. Otherwise `input_path` is opened
/// (unencrypted or empty user password only) and dropped at the end.
pub fn apply_replacements(
    input_path: &Path,
    output_path: &Path,
    replacements: &ReplacementMap,
    handle: Option<&mut Document>,
    fonts: &FontResolver,
) -> DocumentResult<ReplacementReport> {
    match handle {
        Some(doc) => replace_in_document(doc, output_path, replacements, fonts),
        None => {
            let mut doc = open_document(input_path, None)?;
            replace_in_document(&mut doc, output_path, replacements, fonts)
        }
    }
}

/// Apply `replacements` to an open document and save it to `output_path`
pub fn replace_in_document(
    doc: &mut Document,
    output_path: &Path,
    replacements: &ReplacementMap,
    fonts: &FontResolver,
) -> DocumentResult<ReplacementReport> {
    let mut tracker = PhaseTracker::new();
    let mut report = ReplacementReport::for_map(replacements);

    let font = if replacements.is_empty() {
        None
    } else {
        fonts.resolve()
    };
    let mut engine = PatchEngine::new(font.as_ref());

    for (page, page_id) in page_ids(doc).into_iter().enumerate() {
        tracker.enter(RunPhase::PerPage { page });
        let geometry = PageGeometry::from_page(doc, page_id);
        let mut page_total = 0u64;

        for (key, (old, new)) in replacements.iter().enumerate() {
            tracker.enter(RunPhase::PerToken { page, key });

            // Fresh snapshot per key; all matches of this snapshot are
            // patched before the next extraction.
            let layout = extract_page_text(doc, page_id, page)?;
            let mut key_total = 0u64;
            for found in find_matches(&layout, old) {
                tracker.enter(RunPhase::PerBlock {
                    page,
                    key,
                    block: found.block,
                });
                tracker.enter(RunPhase::PerLine {
                    page,
                    key,
                    block: found.block,
                    line: found.line,
                });
                tracker.enter(RunPhase::PerSpan {
                    page,
                    key,
                    block: found.block,
                    line: found.line,
                });
                key_total +=
                    engine.patch_span(doc, page_id, &geometry, found.span, old, new)? as u64;
            }

            report.record(old, key_total);
            page_total += key_total;
        }

        if page_total > 0 {
            tracing::debug!(page, replacements = page_total, "Page patched");
        }
    }

    tracker.enter(RunPhase::Saving);
    save_document(doc, output_path)?;
    tracker.enter(RunPhase::Done);

    tracing::info!(
        output = %output_path.display(),
        total = report.total_replacements,
        "Replacement run finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentError;
    use crate::pdf::document_text;
    use crate::testing::{
        sample_document, sample_document_with_font, sample_ttf, write_sample_pdf, SampleText,
    };
    use lopdf::{dictionary, Object};

    fn no_fonts() -> FontResolver {
        FontResolver::new(Vec::new())
    }

    /// "அ 2007" drawn through a Differences entry for the Tamil letter
    fn tamil_document() -> Document {
        sample_document_with_font(
            &[SampleText::new("\u{1} 2007", 72.0, 700.0)],
            dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => "Times-Roman",
                "Encoding" => dictionary! {
                    "Type" => "Encoding",
                    "BaseEncoding" => "WinAnsiEncoding",
                    "Differences" => Object::Array(vec![1.into(), "uni0B85".into()]),
                },
            },
        )
    }

    fn map(pairs: &[(&str, &str)]) -> ReplacementMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_single_replacement() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_sample_pdf(
            dir.path(),
            "in.pdf",
            &[SampleText::new("Born 2007", 100.0, 600.0)],
        );
        let output = dir.path().join("out.pdf");

        let report = apply_replacements(
            &input,
            &output,
            &map(&[("2007", "2003")]),
            None,
            &no_fonts(),
        )
        .unwrap();

        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            serde_json::json!({
                "total_replacements": 1,
                "replacement_details": {
                    "2007": {"new_value": "2003", "count": 1, "found": true}
                }
            })
        );
        let patched = open_document(&output, None).unwrap();
        assert_eq!(document_text(&patched).unwrap(), "Born 2003");
    }

    #[test]
    fn test_empty_map_still_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_sample_pdf(dir.path(), "in.pdf", &[SampleText::new("2007", 72.0, 700.0)]);
        let output = dir.path().join("out.pdf");

        let report =
            apply_replacements(&input, &output, &ReplacementMap::new(), None, &no_fonts()).unwrap();

        assert_eq!(report.total_replacements, 0);
        assert!(report.replacement_details.is_empty());
        assert!(output.exists());
        let copy = open_document(&output, None).unwrap();
        assert_eq!(document_text(&copy).unwrap(), "2007");
    }

    #[test]
    fn test_no_occurrence() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_sample_pdf(dir.path(), "in.pdf", &[SampleText::new("Born 2008", 72.0, 700.0)]);
        let output = dir.path().join("out.pdf");

        let report = apply_replacements(
            &input,
            &output,
            &map(&[("2007", "2003"), ("1999", "2003")]),
            None,
            &no_fonts(),
        )
        .unwrap();

        assert_eq!(report.total_replacements, 0);
        assert!(report.replacement_details.values().all(|d| !d.found && d.count == 0));
        let copy = open_document(&output, None).unwrap();
        assert_eq!(document_text(&copy).unwrap(), "Born 2008");
    }

    #[test]
    fn test_substring_semantics() {
        let mut doc = sample_document(&[SampleText::new("12007x", 72.0, 700.0)]);
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.pdf");

        let report = replace_in_document(
            &mut doc,
            &output,
            &map(&[("2007", "2003")]),
            &no_fonts(),
        )
        .unwrap();

        assert_eq!(report.replacement_details["2007"].count, 1);
        assert_eq!(document_text(&doc).unwrap(), "12003x");
    }

    #[test]
    fn test_counts_across_pages_and_keys() {
        let mut doc = crate::testing::sample_document_pages(&[
            vec![
                SampleText::new("Born 2007", 72.0, 700.0),
                SampleText::new("Issued 2008", 72.0, 400.0),
            ],
            vec![SampleText::new("2007 / 2007", 72.0, 700.0)],
        ]);
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.pdf");

        let report = replace_in_document(
            &mut doc,
            &output,
            &map(&[("2007", "2003"), ("2008", "2003")]),
            &no_fonts(),
        )
        .unwrap();

        let details = &report.replacement_details;
        assert_eq!(details["2007"].count, 3);
        assert_eq!(details["2008"].count, 1);
        let sum: u64 = details.values().map(|d| d.count).sum();
        assert_eq!(report.total_replacements, sum);
        assert!(details.values().all(|d| d.found == (d.count > 0)));
    }

    #[test]
    fn test_later_key_sees_earlier_patch() {
        let mut doc = sample_document(&[SampleText::new("Born 2007", 72.0, 700.0)]);
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.pdf");

        let report = replace_in_document(
            &mut doc,
            &output,
            &map(&[("2007", "2005"), ("2005", "2003")]),
            &no_fonts(),
        )
        .unwrap();

        assert_eq!(report.replacement_details["2005"].count, 1);
        assert_eq!(document_text(&doc).unwrap(), "Born 2003");
    }

    #[test]
    fn test_second_run_finds_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_sample_pdf(dir.path(), "in.pdf", &[SampleText::new("Born 2007", 72.0, 700.0)]);
        let first = dir.path().join("first.pdf");
        let second = dir.path().join("second.pdf");
        let replacements = map(&[("2007", "2003")]);

        apply_replacements(&input, &first, &replacements, None, &no_fonts()).unwrap();
        let report = apply_replacements(&first, &second, &replacements, None, &no_fonts()).unwrap();

        assert_eq!(report.total_replacements, 0);
        assert!(!report.replacement_details["2007"].found);
    }

    #[test]
    fn test_supplied_handle_ignores_input_path() {
        let mut doc = sample_document(&[SampleText::new("Born 2007", 72.0, 700.0)]);
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.pdf");

        let report = apply_replacements(
            Path::new("/nonexistent/input.pdf"),
            &output,
            &map(&[("2007", "2003")]),
            Some(&mut doc),
            &no_fonts(),
        )
        .unwrap();

        assert_eq!(report.total_replacements, 1);
        assert_eq!(document_text(&doc).unwrap(), "Born 2003");
    }

    #[test]
    fn test_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.pdf");
        let result = apply_replacements(
            Path::new("/nonexistent/input.pdf"),
            &output,
            &map(&[("2007", "2003")]),
            None,
            &no_fonts(),
        );
        assert!(matches!(result, Err(DocumentError::NotFound(_))));
        assert!(!output.exists());
    }

    #[test]
    fn test_non_latin_span_with_host_font() {
        let dir = tempfile::tempdir().unwrap();
        let font_path = dir.path().join("tamil.ttf");
        std::fs::write(&font_path, sample_ttf("\u{0B85} 0123456789")).unwrap();
        let fonts = FontResolver::new(vec![font_path]);

        let mut doc = tamil_document();
        assert_eq!(document_text(&doc).unwrap(), "\u{0B85} 2007");
        let output = dir.path().join("out.pdf");

        let report =
            replace_in_document(&mut doc, &output, &map(&[("2007", "2003")]), &fonts).unwrap();

        assert_eq!(report.total_replacements, 1);
        let patched = open_document(&output, None).unwrap();
        assert_eq!(document_text(&patched).unwrap(), "\u{0B85} 2003");
    }

    #[test]
    fn test_non_latin_span_without_host_font() {
        let mut doc = tamil_document();
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.pdf");

        let report =
            replace_in_document(&mut doc, &output, &map(&[("2007", "2003")]), &no_fonts())
                .unwrap();

        assert_eq!(report.replacement_details["2007"].count, 1);
        let patched = open_document(&output, None).unwrap();
        let text = document_text(&patched).unwrap();
        assert!(text.contains("2003"));
        assert!(!text.contains("2007"));
    }
}
