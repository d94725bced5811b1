//! Structured text layout
//!
//! Groups visible glyphs into spans, spans into lines and lines into blocks.

use lopdf::{Document, ObjectId};

use super::content::{interpret_page, PaintedGlyph};
use super::page::{page_ids, PageGeometry};
use crate::document::{
    DocumentError, DocumentResult, StructuredText, TextBlock, TextLine, TextSpan,
};

/// Gap (in em) above which a space is inserted between glyphs of one span
const SPACE_GAP_EM: f32 = 0.15;
/// Gap (in em) above which a new span starts
const SPAN_BREAK_EM: f32 = 3.0;
/// Overlap (in em) tolerated before a glyph counts as jumping backwards
const BACKWARD_TOLERANCE_EM: f32 = 0.25;
/// Baseline drift (in em) tolerated within a span
const BASELINE_TOLERANCE_EM: f32 = 0.1;
/// Block continuation distance, in line heights
const BLOCK_GAP_LINES: f32 = 2.0;

/// Layout of the page at `page_index`
pub fn extract_structured_text(
    doc: &Document,
    page_index: usize,
) -> DocumentResult<StructuredText> {
    let page_id = page_ids(doc)
        .get(page_index)
        .copied()
        .ok_or(DocumentError::PageNotFound(page_index))?;
    extract_page_text(doc, page_id, page_index)
}

/// Layout of a page given its object id
pub fn extract_page_text(
    doc: &Document,
    page_id: ObjectId,
    page_index: usize,
) -> DocumentResult<StructuredText> {
    let geometry = PageGeometry::from_page(doc, page_id);
    let glyphs = interpret_page(doc, page_id, &geometry)?.visible_glyphs();

    let mut layout = StructuredText::empty(page_index, geometry.width(), geometry.height());
    layout.blocks = group_blocks(group_lines(group_spans(glyphs)));
    Ok(layout)
}

/// Plain text of every page, pages separated by a blank line
pub fn document_text(doc: &Document) -> DocumentResult<String> {
    let mut pages = Vec::new();
    for (index, page_id) in page_ids(doc).into_iter().enumerate() {
        pages.push(extract_page_text(doc, page_id, index)?.text());
    }
    Ok(pages.join("\n\n"))
}

fn group_spans(glyphs: Vec<PaintedGlyph>) -> Vec<TextSpan> {
    let mut spans: Vec<TextSpan> = Vec::new();

    for glyph in glyphs.into_iter().filter(|g| !g.text.is_empty()) {
        if let Some(span) = spans.last_mut() {
            if let Some(needs_space) = continues_span(span, &glyph) {
                if needs_space {
                    span.text.push(' ');
                }
                span.text.push_str(&glyph.text);
                span.bbox = span.bbox.union(&glyph.bbox);
                continue;
            }
        }
        spans.push(TextSpan {
            text: glyph.text,
            bbox: glyph.bbox,
            font: glyph.font,
            size: glyph.size,
            color: glyph.color,
            origin: glyph.origin,
        });
    }

    // A span made only of spaces carries nothing a reader or a scan can use
    spans.retain(|span| !span.text.trim().is_empty());
    spans
}

/// `Some(needs_space)` when the glyph extends the span
fn continues_span(span: &TextSpan, glyph: &PaintedGlyph) -> Option<bool> {
    let em = span.size.max(f32::EPSILON);
    if glyph.font != span.font
        || (glyph.size - span.size).abs() > 0.01 * em
        || glyph.color != span.color
        || (glyph.origin.1 - span.origin.1).abs() > BASELINE_TOLERANCE_EM * em
    {
        return None;
    }
    let gap = glyph.bbox.x - span.bbox.right();
    if gap < -BACKWARD_TOLERANCE_EM * em || gap > SPAN_BREAK_EM * em {
        return None;
    }
    Some(gap > SPACE_GAP_EM * em && !span.text.ends_with(' ') && !glyph.is_space)
}

fn group_lines(spans: Vec<TextSpan>) -> Vec<TextLine> {
    let mut lines: Vec<TextLine> = Vec::new();

    for span in spans {
        let baseline = span.origin.1;
        if let Some(line) = lines.last_mut() {
            let em = line
                .spans
                .iter()
                .map(|s| s.size)
                .fold(span.size, f32::max);
            let same_baseline = (line.baseline - baseline).abs() <= 0.3 * em;
            let moves_right = span.bbox.x >= line.bbox.right() - em;
            if same_baseline && moves_right {
                line.bbox = line.bbox.union(&span.bbox);
                line.spans.push(span);
                continue;
            }
        }
        lines.push(TextLine {
            bbox: span.bbox,
            baseline,
            spans: vec![span],
        });
    }
    lines
}

fn group_blocks(lines: Vec<TextLine>) -> Vec<TextBlock> {
    let mut blocks: Vec<TextBlock> = Vec::new();

    for line in lines {
        if let Some(block) = blocks.last_mut() {
            if let Some(prev) = block.lines.last() {
                let height = prev.bbox.height.max(line.bbox.height);
                if (line.baseline - prev.baseline).abs() <= BLOCK_GAP_LINES * height {
                    block.bbox = block.bbox.union(&line.bbox);
                    block.lines.push(line);
                    continue;
                }
            }
        }
        blocks.push(TextBlock {
            bbox: line.bbox,
            lines: vec![line],
        });
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_document, sample_document_pages, SampleText};

    #[test]
    fn test_single_span() {
        let doc = sample_document(&[SampleText::new("Born 2007", 100.0, 600.0)]);
        let layout = extract_structured_text(&doc, 0).unwrap();

        assert_eq!(layout.width, 595.0);
        assert_eq!(layout.height, 842.0);
        let spans: Vec<_> = layout.spans().collect();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "Born 2007");
        assert_eq!(spans[0].font, "Times-Roman");
        assert!((spans[0].size - 10.0).abs() < 1e-4);
        assert_eq!(spans[0].color, 0);
        assert!((spans[0].bbox.x - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_lines_and_blocks() {
        let doc = sample_document(&[
            SampleText::new("Name: Jane", 72.0, 700.0),
            SampleText::new("Born 2007", 72.0, 688.0),
            SampleText::new("Issued 2021", 72.0, 400.0),
        ]);
        let layout = extract_structured_text(&doc, 0).unwrap();

        assert_eq!(layout.blocks.len(), 2);
        assert_eq!(layout.blocks[0].lines.len(), 2);
        assert_eq!(layout.text(), "Name: Jane\nBorn 2007\n\nIssued 2021");
    }

    #[test]
    fn test_colour_change_splits_spans_on_one_line() {
        let doc = sample_document(&[
            SampleText::new("Born", 72.0, 700.0),
            SampleText::new("2007", 97.0, 700.0).with_color([1.0, 0.0, 0.0]),
        ]);
        let layout = extract_structured_text(&doc, 0).unwrap();

        assert_eq!(layout.blocks.len(), 1);
        let line = &layout.blocks[0].lines[0];
        assert_eq!(line.spans.len(), 2);
        assert_eq!(line.spans[1].color, 0xFF0000);
        assert_eq!(line.text(), "Born 2007");
    }

    #[test]
    fn test_size_change_splits_spans() {
        let doc = sample_document(&[
            SampleText::new("DOB", 72.0, 700.0).with_size(14.0),
            SampleText::new("2007", 110.0, 700.0),
        ]);
        let layout = extract_structured_text(&doc, 0).unwrap();
        let spans: Vec<_> = layout.spans().collect();

        assert_eq!(spans.len(), 2);
        assert!((spans[0].size - 14.0).abs() < 1e-3);
        assert!((spans[1].size - 10.0).abs() < 1e-3);
        assert_eq!(layout.text(), "DOB 2007");
    }

    #[test]
    fn test_wide_gap_inserts_space_within_span() {
        // Two Td-placed words in the same font, 0.8 em apart
        let doc = sample_document(&[
            SampleText::new("Born", 72.0, 700.0),
            SampleText::new("2007", 100.0, 700.0),
        ]);
        let layout = extract_structured_text(&doc, 0).unwrap();
        let spans: Vec<_> = layout.spans().collect();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "Born 2007");
    }

    #[test]
    fn test_missing_page() {
        let doc = sample_document(&[]);
        assert!(matches!(
            extract_structured_text(&doc, 3),
            Err(DocumentError::PageNotFound(3))
        ));
        assert!(extract_structured_text(&doc, 0).unwrap().is_empty());
    }

    #[test]
    fn test_document_text_spans_pages() {
        let doc = sample_document_pages(&[
            vec![SampleText::new("2008", 72.0, 700.0)],
            vec![SampleText::new("2002", 72.0, 700.0)],
        ]);
        assert_eq!(document_text(&doc).unwrap(), "2008\n\n2002");
    }
}
