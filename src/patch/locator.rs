//! Span locator
//!
//! Plain substring search over a page layout. There is no tokenisation:
//! `2007` matches inside `12007` as well as inside `Born 2007`.

use crate::document::{StructuredText, TextSpan};

/// A span that contains the target at least once
#[derive(Debug, Clone, Copy)]
pub struct SpanMatch<'a> {
    pub block: usize,
    pub line: usize,
    pub span: &'a TextSpan,
    /// Non-overlapping occurrences inside the span text
    pub count: usize,
}

/// Non-overlapping occurrences of `needle` in `haystack`; an empty needle matches nothing
pub fn count_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    haystack.matches(needle).count()
}

/// Spans of `layout` containing `needle`, in block → line → span order
pub fn find_matches<'a>(
    layout: &'a StructuredText,
    needle: &'a str,
) -> impl Iterator<Item = SpanMatch<'a>> + 'a {
    layout
        .blocks
        .iter()
        .enumerate()
        .flat_map(|(b, block)| {
            block
                .lines
                .iter()
                .enumerate()
                .map(move |(l, line)| (b, l, line))
        })
        .flat_map(move |(block, line, text_line)| {
            text_line.spans.iter().filter_map(move |span| {
                let count = count_occurrences(&span.text, needle);
                (count > 0).then_some(SpanMatch {
                    block,
                    line,
                    span,
                    count,
                })
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Rect, TextBlock, TextLine};

    fn span(text: &str) -> TextSpan {
        TextSpan {
            text: text.to_string(),
            bbox: Rect::new(0.0, 0.0, 10.0, 10.0),
            font: "Times-Roman".to_string(),
            size: 10.0,
            color: 0,
            origin: (0.0, 8.0),
        }
    }

    fn layout(lines: Vec<Vec<&str>>) -> StructuredText {
        let mut layout = StructuredText::empty(0, 595.0, 842.0);
        layout.blocks.push(TextBlock {
            bbox: Rect::default(),
            lines: lines
                .into_iter()
                .map(|spans| TextLine {
                    bbox: Rect::default(),
                    baseline: 0.0,
                    spans: spans.into_iter().map(span).collect(),
                })
                .collect(),
        });
        layout
    }

    #[test]
    fn test_count_occurrences() {
        assert_eq!(count_occurrences("2007-2007", "2007"), 2);
        assert_eq!(count_occurrences("12007x", "2007"), 1);
        assert_eq!(count_occurrences("aaaa", "aa"), 2);
        assert_eq!(count_occurrences("2008", "2007"), 0);
        assert_eq!(count_occurrences("2008", ""), 0);
    }

    #[test]
    fn test_find_matches_in_order() {
        let layout = layout(vec![
            vec!["Name", "Born 2007"],
            vec!["Issued 2021"],
            vec!["2007/2007"],
        ]);
        let matches: Vec<_> = find_matches(&layout, "2007").collect();

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].line, 0);
        assert_eq!(matches[0].span.text, "Born 2007");
        assert_eq!(matches[0].count, 1);
        assert_eq!(matches[1].line, 2);
        assert_eq!(matches[1].count, 2);
    }

    #[test]
    fn test_empty_needle_matches_nothing() {
        let layout = layout(vec![vec!["Born 2007"]]);
        assert_eq!(find_matches(&layout, "").count(), 0);
    }
}
