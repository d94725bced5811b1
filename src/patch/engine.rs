//! Visual patch engine
//!
//! Covers a matched span with an opaque white rectangle and draws the
//! replacement text over it in the span's size and colour.

use std::collections::HashSet;

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, StringFormat};

use super::font::{
    builtin_font, embed_type0, select_font, EmbeddedFont, FontChoice, FontResource,
    BUILTIN_FONT_NAME, CUSTOM_FONT_NAME,
};
use super::locator::count_occurrences;
use crate::document::{DocumentError, DocumentResult, TextSpan};
use crate::pdf::page::{add_font_resource, append_content, wrap_content};
use crate::pdf::{encode_win_ansi_lossy, win_ansi_code, PageGeometry};

/// Baseline offset from the top of the span box, as a fraction of its height
pub const BASELINE_RATIO: f32 = 0.69;

/// Patches spans of one document. Fonts are registered at most once per engine.
pub struct PatchEngine<'f> {
    font: Option<&'f FontResource>,
    embedded: Option<EmbeddedFont>,
    embed_error: Option<String>,
    builtin: Option<ObjectId>,
    wrapped: HashSet<ObjectId>,
}

impl<'f> PatchEngine<'f> {
    pub fn new(font: Option<&'f FontResource>) -> Self {
        Self {
            font,
            embedded: None,
            embed_error: None,
            builtin: None,
            wrapped: HashSet::new(),
        }
    }

    /// Replace every occurrence of `old` in `span` with `new`.
    ///
    /// Returns the number of occurrences patched; a span without `old` is
    /// left alone.
    pub fn patch_span(
        &mut self,
        doc: &mut Document,
        page_id: ObjectId,
        geometry: &PageGeometry,
        span: &TextSpan,
        old: &str,
        new: &str,
    ) -> DocumentResult<usize> {
        let count = count_occurrences(&span.text, old);
        if count == 0 {
            return Ok(0);
        }

        if self.wrapped.insert(page_id) {
            wrap_content(doc, page_id)?;
        }

        let text = span.text.replace(old, new);
        let (font_name, encoded) = self.text_font(doc, page_id, &text)?;

        let bbox = span.bbox;
        let (x, bottom) = geometry.to_pdf(bbox.x, bbox.bottom());
        let (_, baseline) = geometry.to_pdf(bbox.x, bbox.y + BASELINE_RATIO * bbox.height);
        let [r, g, b] = span.rgb();

        let operations = vec![
            // cover
            Operation::new("q", vec![]),
            Operation::new("rg", vec![Object::Real(1.0), Object::Real(1.0), Object::Real(1.0)]),
            Operation::new(
                "re",
                vec![
                    Object::Real(x),
                    Object::Real(bottom),
                    Object::Real(bbox.width),
                    Object::Real(bbox.height),
                ],
            ),
            Operation::new("f", vec![]),
            Operation::new("Q", vec![]),
            // replacement text
            Operation::new("q", vec![]),
            Operation::new("BT", vec![]),
            Operation::new("rg", vec![Object::Real(r), Object::Real(g), Object::Real(b)]),
            Operation::new(
                "Tf",
                vec![Object::Name(font_name.into_bytes()), Object::Real(span.size)],
            ),
            Operation::new(
                "Tm",
                vec![
                    Object::Integer(1),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(1),
                    Object::Real(x),
                    Object::Real(baseline),
                ],
            ),
            Operation::new(
                "Tj",
                vec![Object::String(encoded, StringFormat::Hexadecimal)],
            ),
            Operation::new("ET", vec![]),
            Operation::new("Q", vec![]),
        ];
        let data = Content { operations }.encode()?;
        append_content(doc, page_id, data)?;

        tracing::trace!(
            page = ?page_id,
            from = %span.text,
            to = %text,
            x,
            baseline,
            size = span.size,
            "Patched span"
        );
        Ok(count)
    }

    /// Resource name and encoded bytes for `text`, preferring the host font
    fn text_font(
        &mut self,
        doc: &mut Document,
        page_id: ObjectId,
        text: &str,
    ) -> DocumentResult<(String, Vec<u8>)> {
        if let FontChoice::Embedded(resource) = select_font(self.font) {
            match self.embedded_text(doc, page_id, resource, text) {
                Ok(found) => return Ok(found),
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        font = %resource.path.display(),
                        "Falling back to built-in serif font"
                    );
                }
            }
        }
        self.builtin_text(doc, page_id, text)
    }

    fn embedded_text(
        &mut self,
        doc: &mut Document,
        page_id: ObjectId,
        resource: &FontResource,
        text: &str,
    ) -> DocumentResult<(String, Vec<u8>)> {
        if self.embedded.is_none() {
            if let Some(err) = &self.embed_error {
                return Err(DocumentError::FontError(err.clone()));
            }
            match embed_type0(doc, resource) {
                Ok(font) => self.embedded = Some(font),
                Err(err) => {
                    self.embed_error = Some(err.to_string());
                    return Err(err);
                }
            }
        }
        let font = self
            .embedded
            .as_ref()
            .ok_or_else(|| DocumentError::FontError("font not registered".into()))?;

        let encoded = font.encode(text).ok_or_else(|| {
            DocumentError::FontError(format!("{} has no glyphs for {:?}", font.base_font, text))
        })?;
        let name = add_font_resource(doc, page_id, CUSTOM_FONT_NAME, font.id)?;
        Ok((name, encoded))
    }

    /// Built-in font text. Characters outside WinAnsi are drawn as `?`.
    fn builtin_text(
        &mut self,
        doc: &mut Document,
        page_id: ObjectId,
        text: &str,
    ) -> DocumentResult<(String, Vec<u8>)> {
        if text.chars().any(|ch| win_ansi_code(ch).is_none()) {
            tracing::warn!(
                text = %text,
                "Replacement has characters outside WinAnsi, substituting '?'"
            );
        }
        let encoded = encode_win_ansi_lossy(text);

        let font_id = *self.builtin.get_or_insert_with(|| builtin_font(doc));
        let name = add_font_resource(doc, page_id, BUILTIN_FONT_NAME, font_id)?;
        Ok((name, encoded))
    }
}
