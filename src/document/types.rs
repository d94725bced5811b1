//! Core document types
//!
//! Laid-out text of a PDF page as a Block → Line → Span tree, in
//! top-left-origin page space (y grows downward).

use serde::{Deserialize, Serialize};

/// Structured text from a document page
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredText {
    /// Page index (zero based)
    pub page_index: usize,
    /// Page width
    pub width: f32,
    /// Page height
    pub height: f32,
    /// Text blocks
    pub blocks: Vec<TextBlock>,
}

impl StructuredText {
    /// Empty layout for a page without text
    pub fn empty(page_index: usize, width: f32, height: f32) -> Self {
        Self {
            page_index,
            width,
            height,
            blocks: Vec::new(),
        }
    }

    /// All spans in reading order (block, line, span)
    pub fn spans(&self) -> impl Iterator<Item = &TextSpan> + '_ {
        self.blocks
            .iter()
            .flat_map(|block| block.lines.iter())
            .flat_map(|line| line.spans.iter())
    }

    /// Plain text: lines separated by newlines, blocks by a blank line
    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .map(TextBlock::text)
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Text block (paragraph, heading, etc.)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextBlock {
    /// Bounding box
    pub bbox: Rect,
    /// Text lines within block
    pub lines: Vec<TextLine>,
}

impl TextBlock {
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(TextLine::text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Text line
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextLine {
    /// Bounding box
    pub bbox: Rect,
    /// Baseline (top-left space)
    pub baseline: f32,
    /// Spans on this line, left to right in paint order
    pub spans: Vec<TextSpan>,
}

impl TextLine {
    /// Line text, with a single space between spans separated by a visible gap
    pub fn text(&self) -> String {
        let mut out = String::new();
        let mut previous: Option<&TextSpan> = None;
        for span in &self.spans {
            if let Some(prev) = previous {
                let gap = span.bbox.x - prev.bbox.right();
                if gap > prev.size * 0.15 && !prev.text.ends_with(' ') && !span.text.starts_with(' ')
                {
                    out.push(' ');
                }
            }
            out.push_str(&span.text);
            previous = Some(span);
        }
        out
    }
}

/// Run of glyphs sharing font, size, colour and baseline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSpan {
    /// Literal text
    pub text: String,
    /// Bounding box
    pub bbox: Rect,
    /// Font name (BaseFont, subset prefix kept)
    pub font: String,
    /// Font size in points
    pub size: f32,
    /// Packed 24-bit RGB colour
    pub color: u32,
    /// Baseline origin of the first glyph
    pub origin: (f32, f32),
}

impl TextSpan {
    /// Colour as normalised RGB components
    pub fn rgb(&self) -> [f32; 3] {
        unpack_rgb(self.color)
    }
}

/// Rectangle (bounding box)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn from_ltrb(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            x: left,
            y: top,
            width: right - left,
            height: bottom - top,
        }
    }

    /// Smallest rectangle holding every point
    pub fn from_points(points: &[(f32, f32)]) -> Self {
        let mut left = f32::INFINITY;
        let mut top = f32::INFINITY;
        let mut right = f32::NEG_INFINITY;
        let mut bottom = f32::NEG_INFINITY;
        for &(x, y) in points {
            left = left.min(x);
            top = top.min(y);
            right = right.max(x);
            bottom = bottom.max(y);
        }
        if points.is_empty() {
            return Self::default();
        }
        Self::from_ltrb(left, top, right, bottom)
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.right() && y >= self.y && y <= self.bottom()
    }

    /// Whether `other` lies inside this rectangle, allowing `tolerance` on every edge
    pub fn contains_rect(&self, other: &Rect, tolerance: f32) -> bool {
        other.x >= self.x - tolerance
            && other.y >= self.y - tolerance
            && other.right() <= self.right() + tolerance
            && other.bottom() <= self.bottom() + tolerance
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect::from_ltrb(
            self.x.min(other.x),
            self.y.min(other.y),
            self.right().max(other.right()),
            self.bottom().max(other.bottom()),
        )
    }
}

/// Pack normalised RGB components into a 24-bit integer
pub fn pack_rgb(rgb: [f32; 3]) -> u32 {
    let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u32;
    (channel(rgb[0]) << 16) | (channel(rgb[1]) << 8) | channel(rgb[2])
}

/// Split a packed 24-bit colour into normalised RGB components
pub fn unpack_rgb(color: u32) -> [f32; 3] {
    [
        ((color >> 16) & 0xFF) as f32 / 255.0,
        ((color >> 8) & 0xFF) as f32 / 255.0,
        (color & 0xFF) as f32 / 255.0,
    ]
}
