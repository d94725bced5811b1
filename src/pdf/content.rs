//! Content stream interpretation
//!
//! Walks a page's operators and records every painted glyph, with its box in
//! top-left page space, and every rectangle filled with opaque white. Later
//! white fills hide the glyphs they cover, which is how patched spans drop
//! out of subsequent scans.

use std::collections::HashMap;
use std::rc::Rc;

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};

use super::fonts::FontInfo;
use super::objects::{
    dict_get, dict_name, get_number, name_to_string, number_array, resolve, resolve_dict,
    stream_content,
};
use super::page::{page_content, page_resources, PageGeometry};
use crate::document::{pack_rgb, DocumentError, DocumentResult, Rect};

/// Affine matrix `[a b c d e f]`
pub type Matrix = [f32; 6];

pub const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// Packed colour of an occluding fill
pub const WHITE: u32 = 0xFF_FF_FF;

/// Slack allowed when deciding whether a fill covers a glyph box
pub const OCCLUSION_TOLERANCE: f32 = 0.05;

/// Nested Form XObjects deeper than this are skipped
const MAX_FORM_DEPTH: usize = 8;

/// `a × b`: apply `a`, then `b`
pub fn multiply(a: &Matrix, b: &Matrix) -> Matrix {
    [
        a[0] * b[0] + a[1] * b[2],
        a[0] * b[1] + a[1] * b[3],
        a[2] * b[0] + a[3] * b[2],
        a[2] * b[1] + a[3] * b[3],
        a[4] * b[0] + a[5] * b[2] + b[4],
        a[4] * b[1] + a[5] * b[3] + b[5],
    ]
}

pub fn transform(m: &Matrix, x: f32, y: f32) -> (f32, f32) {
    (x * m[0] + y * m[2] + m[4], x * m[1] + y * m[3] + m[5])
}

fn translation(tx: f32, ty: f32) -> Matrix {
    [1.0, 0.0, 0.0, 1.0, tx, ty]
}

/// A glyph as painted on the page
#[derive(Debug, Clone)]
pub struct PaintedGlyph {
    pub text: String,
    pub bbox: Rect,
    /// Origin in top-left page space
    pub origin: (f32, f32),
    pub font: String,
    pub size: f32,
    pub color: u32,
    pub is_space: bool,
    sequence: usize,
}

/// An opaque white rectangle fill
#[derive(Debug, Clone, Copy)]
pub struct Occluder {
    pub rect: Rect,
    sequence: usize,
}

/// Everything painted on a page, in paint order
#[derive(Debug, Default)]
pub struct PaintLog {
    pub glyphs: Vec<PaintedGlyph>,
    pub occluders: Vec<Occluder>,
}

impl PaintLog {
    /// Glyphs not covered by a white fill painted after them
    pub fn visible_glyphs(self) -> Vec<PaintedGlyph> {
        let occluders = self.occluders;
        self.glyphs
            .into_iter()
            .filter(|glyph| {
                !occluders.iter().any(|o| {
                    o.sequence > glyph.sequence
                        && o.rect.contains_rect(&glyph.bbox, OCCLUSION_TOLERANCE)
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
struct TextState {
    font: Option<Rc<FontInfo>>,
    size: f32,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scale: f32,
    leading: f32,
    rise: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font: None,
            size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    fill: u32,
    fill_components: usize,
    text: TextState,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: IDENTITY,
            fill: 0,
            fill_components: 1,
            text: TextState::default(),
        }
    }
}

/// Rectangles of the current path, in top-left page space
#[derive(Debug, Default)]
struct PathState {
    rects: Vec<Rect>,
    complex: bool,
}

impl PathState {
    fn clear(&mut self) {
        self.rects.clear();
        self.complex = false;
    }
}

/// Interpret the content of one page
pub fn interpret_page(
    doc: &Document,
    page_id: ObjectId,
    geometry: &PageGeometry,
) -> DocumentResult<PaintLog> {
    let content = page_content(doc, page_id)?;
    let resources = page_resources(doc, page_id);
    let mut interpreter = Interpreter {
        doc,
        geometry: *geometry,
        log: PaintLog::default(),
        sequence: 0,
        fonts: HashMap::new(),
        fallback: None,
    };
    interpreter.run(&content, resources, GraphicsState::default(), 0)?;
    Ok(interpreter.log)
}

struct Interpreter<'a> {
    doc: &'a Document,
    geometry: PageGeometry,
    log: PaintLog,
    sequence: usize,
    fonts: HashMap<ObjectId, Rc<FontInfo>>,
    fallback: Option<Rc<FontInfo>>,
}

impl<'a> Interpreter<'a> {
    fn run(
        &mut self,
        data: &[u8],
        resources: Option<&'a Dictionary>,
        initial: GraphicsState,
        depth: usize,
    ) -> DocumentResult<()> {
        if data.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(());
        }
        let content = Content::decode(data)
            .map_err(|e| DocumentError::ParseError(format!("content stream: {}", e)))?;

        let mut state = initial;
        let mut stack: Vec<GraphicsState> = Vec::new();
        let mut text_matrix = IDENTITY;
        let mut line_matrix = IDENTITY;
        let mut path = PathState::default();

        for op in &content.operations {
            let operands = &op.operands;
            let number = |i: usize| operands.get(i).and_then(get_number);

            match op.operator.as_str() {
                "q" => stack.push(state.clone()),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        state = saved;
                    }
                }
                "cm" => {
                    if let Some(m) = matrix_operand(operands) {
                        state.ctm = multiply(&m, &state.ctm);
                    }
                }

                // Text objects and positioning
                "BT" => {
                    text_matrix = IDENTITY;
                    line_matrix = IDENTITY;
                }
                "ET" => {}
                "Tf" => {
                    if let (Some(Object::Name(name)), Some(size)) = (operands.first(), number(1)) {
                        state.text.font = Some(self.load_font(resources, name));
                        state.text.size = size;
                    }
                }
                "Tc" => state.text.char_spacing = number(0).unwrap_or(0.0),
                "Tw" => state.text.word_spacing = number(0).unwrap_or(0.0),
                "Tz" => state.text.horizontal_scale = number(0).unwrap_or(100.0) / 100.0,
                "TL" => state.text.leading = number(0).unwrap_or(0.0),
                "Ts" => state.text.rise = number(0).unwrap_or(0.0),
                "Td" | "TD" => {
                    if let (Some(tx), Some(ty)) = (number(0), number(1)) {
                        if op.operator == "TD" {
                            state.text.leading = -ty;
                        }
                        line_matrix = multiply(&translation(tx, ty), &line_matrix);
                        text_matrix = line_matrix;
                    }
                }
                "Tm" => {
                    if let Some(m) = matrix_operand(operands) {
                        text_matrix = m;
                        line_matrix = m;
                    }
                }
                "T*" => {
                    line_matrix = multiply(&translation(0.0, -state.text.leading), &line_matrix);
                    text_matrix = line_matrix;
                }

                // Text showing
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        self.show(&state, &mut text_matrix, bytes);
                    }
                }
                "'" | "\"" => {
                    let text_index = if op.operator == "\"" {
                        state.text.word_spacing = number(0).unwrap_or(state.text.word_spacing);
                        state.text.char_spacing = number(1).unwrap_or(state.text.char_spacing);
                        2
                    } else {
                        0
                    };
                    line_matrix = multiply(&translation(0.0, -state.text.leading), &line_matrix);
                    text_matrix = line_matrix;
                    if let Some(Object::String(bytes, _)) = operands.get(text_index) {
                        self.show(&state, &mut text_matrix, bytes);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = operands.first() {
                        for item in items {
                            match item {
                                Object::String(bytes, _) => {
                                    self.show(&state, &mut text_matrix, bytes)
                                }
                                other => {
                                    if let Some(adjust) = get_number(other) {
                                        let tx = -adjust / 1000.0
                                            * state.text.size
                                            * state.text.horizontal_scale;
                                        text_matrix = multiply(&translation(tx, 0.0), &text_matrix);
                                    }
                                }
                            }
                        }
                    }
                }

                // Fill colour
                "g" => {
                    if let Some(gray) = number(0) {
                        state.fill = pack_rgb([gray, gray, gray]);
                        state.fill_components = 1;
                    }
                }
                "rg" => {
                    if let (Some(r), Some(g), Some(b)) = (number(0), number(1), number(2)) {
                        state.fill = pack_rgb([r, g, b]);
                        state.fill_components = 3;
                    }
                }
                "k" => {
                    if let (Some(c), Some(m), Some(y), Some(k)) =
                        (number(0), number(1), number(2), number(3))
                    {
                        state.fill = cmyk_to_packed(c, m, y, k);
                        state.fill_components = 4;
                    }
                }
                "cs" => {
                    let space = match operands.first() {
                        Some(Object::Name(name)) => name_to_string(name),
                        _ => String::new(),
                    };
                    state.fill_components = match space.as_str() {
                        "DeviceGray" | "CalGray" | "G" => 1,
                        "DeviceCMYK" | "CMYK" => 4,
                        "Pattern" => 0,
                        _ => 3,
                    };
                    state.fill = 0;
                }
                "sc" | "scn" => {
                    let values: Vec<f32> = operands.iter().filter_map(get_number).collect();
                    match (state.fill_components, values.as_slice()) {
                        (1, [gray, ..]) => state.fill = pack_rgb([*gray, *gray, *gray]),
                        (3, [r, g, b, ..]) => state.fill = pack_rgb([*r, *g, *b]),
                        (4, [c, m, y, k, ..]) => state.fill = cmyk_to_packed(*c, *m, *y, *k),
                        _ => {}
                    }
                }

                // Paths
                "re" => {
                    if let (Some(x), Some(y), Some(w), Some(h)) =
                        (number(0), number(1), number(2), number(3))
                    {
                        match self.device_rect(&state.ctm, x, y, w, h) {
                            Some(rect) => path.rects.push(rect),
                            None => path.complex = true,
                        }
                    }
                }
                "m" | "l" | "c" | "v" | "y" => path.complex = true,
                "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" => {
                    if state.fill == WHITE && !path.complex {
                        for rect in path.rects.drain(..) {
                            self.sequence += 1;
                            self.log.occluders.push(Occluder {
                                rect,
                                sequence: self.sequence,
                            });
                        }
                    }
                    path.clear();
                }
                "n" | "S" | "s" => path.clear(),

                "Do" => {
                    if let Some(Object::Name(name)) = operands.first() {
                        self.paint_xobject(resources, name, &state, depth);
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Record the glyphs of one shown string and advance the text matrix
    fn show(&mut self, state: &GraphicsState, text_matrix: &mut Matrix, bytes: &[u8]) {
        let font = match &state.text.font {
            Some(font) => font.clone(),
            None => self.fallback_font(),
        };
        let ts = &state.text;
        let size_matrix = [ts.size * ts.horizontal_scale, 0.0, 0.0, ts.size, 0.0, ts.rise];

        for glyph in font.decode(bytes) {
            let trm = multiply(&multiply(&size_matrix, text_matrix), &state.ctm);
            let corners: Vec<(f32, f32)> = [
                (0.0, font.descent),
                (glyph.width, font.descent),
                (0.0, font.ascent),
                (glyph.width, font.ascent),
            ]
            .iter()
            .map(|&(x, y)| {
                let (px, py) = transform(&trm, x, y);
                self.geometry.to_top_left(px, py)
            })
            .collect();
            let (ox, oy) = transform(&trm, 0.0, 0.0);

            self.sequence += 1;
            self.log.glyphs.push(PaintedGlyph {
                is_space: glyph.text.chars().all(char::is_whitespace),
                text: glyph.text,
                bbox: Rect::from_points(&corners),
                origin: self.geometry.to_top_left(ox, oy),
                font: font.base_font.clone(),
                size: (trm[2] * trm[2] + trm[3] * trm[3]).sqrt(),
                color: state.fill,
                sequence: self.sequence,
            });

            let word_spacing = if glyph.is_word_space {
                ts.word_spacing
            } else {
                0.0
            };
            let advance =
                (glyph.width * ts.size + ts.char_spacing + word_spacing) * ts.horizontal_scale;
            *text_matrix = multiply(&translation(advance, 0.0), text_matrix);
        }
    }

    /// Axis-aligned rectangle in top-left page space, or `None` when the CTM rotates or skews it
    fn device_rect(&self, ctm: &Matrix, x: f32, y: f32, w: f32, h: f32) -> Option<Rect> {
        let axis_aligned = (ctm[1].abs() < 1e-6 && ctm[2].abs() < 1e-6)
            || (ctm[0].abs() < 1e-6 && ctm[3].abs() < 1e-6);
        if !axis_aligned {
            return None;
        }
        let corners: Vec<(f32, f32)> = [(x, y), (x + w, y + h)]
            .iter()
            .map(|&(px, py)| {
                let (dx, dy) = transform(ctm, px, py);
                self.geometry.to_top_left(dx, dy)
            })
            .collect();
        Some(Rect::from_points(&corners))
    }

    fn load_font(&mut self, resources: Option<&'a Dictionary>, name: &[u8]) -> Rc<FontInfo> {
        let doc = self.doc;
        let entry = resources
            .and_then(|res| dict_get(doc, res, b"Font"))
            .and_then(|fonts| match fonts {
                Object::Dictionary(dict) => dict.get(name).ok(),
                _ => None,
            });

        match entry {
            Some(Object::Reference(id)) => {
                if let Some(font) = self.fonts.get(id) {
                    return font.clone();
                }
                let font = match resolve_dict(doc, &Object::Reference(*id)) {
                    Some(dict) => Rc::new(FontInfo::from_dict(doc, dict)),
                    None => self.fallback_font(),
                };
                self.fonts.insert(*id, font.clone());
                font
            }
            Some(Object::Dictionary(dict)) => Rc::new(FontInfo::from_dict(doc, dict)),
            _ => {
                tracing::debug!(font = %name_to_string(name), "Font resource not found, using fallback metrics");
                self.fallback_font()
            }
        }
    }

    fn fallback_font(&mut self) -> Rc<FontInfo> {
        self.fallback
            .get_or_insert_with(|| Rc::new(FontInfo::fallback()))
            .clone()
    }

    /// Interpret a Form XObject in place; image XObjects paint no text
    fn paint_xobject(
        &mut self,
        resources: Option<&'a Dictionary>,
        name: &[u8],
        state: &GraphicsState,
        depth: usize,
    ) {
        if depth >= MAX_FORM_DEPTH {
            tracing::debug!(depth, "Form XObject nesting too deep, skipping");
            return;
        }
        let doc = self.doc;
        let stream = match resources
            .and_then(|res| dict_get(doc, res, b"XObject"))
            .and_then(|xobjects| match xobjects {
                Object::Dictionary(dict) => dict.get(name).ok(),
                _ => None,
            })
            .and_then(|obj| resolve(doc, obj))
        {
            Some(Object::Stream(stream)) => stream,
            _ => return,
        };
        if dict_name(doc, &stream.dict, b"Subtype").as_deref() != Some("Form") {
            return;
        }

        let matrix = stream
            .dict
            .get(b"Matrix")
            .ok()
            .map(|obj| number_array(doc, obj))
            .and_then(|m| matrix_from_slice(&m))
            .unwrap_or(IDENTITY);
        let form_resources = stream
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|obj| resolve_dict(doc, obj))
            .or(resources);

        let mut form_state = state.clone();
        form_state.ctm = multiply(&matrix, &state.ctm);

        if let Err(err) = self.run(&stream_content(stream), form_resources, form_state, depth + 1) {
            tracing::warn!(xobject = %name_to_string(name), error = %err, "Skipping unreadable Form XObject");
        }
    }
}

fn matrix_operand(operands: &[Object]) -> Option<Matrix> {
    let values: Vec<f32> = operands.iter().filter_map(get_number).collect();
    matrix_from_slice(&values)
}

fn matrix_from_slice(values: &[f32]) -> Option<Matrix> {
    match values {
        [a, b, c, d, e, f] => Some([*a, *b, *c, *d, *e, *f]),
        _ => None,
    }
}

fn cmyk_to_packed(c: f32, m: f32, y: f32, k: f32) -> u32 {
    pack_rgb([
        (1.0 - c) * (1.0 - k),
        (1.0 - m) * (1.0 - k),
        (1.0 - y) * (1.0 - k),
    ])
}
