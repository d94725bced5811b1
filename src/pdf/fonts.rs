//! Font metrics and code → text decoding
//!
//! Enough of the PDF font model to place glyphs and recover their text:
//! simple fonts (single-byte codes) and Type0 composite fonts (two-byte codes),
//! with widths from the font dictionary or, for the standard 14 fonts, from
//! built-in tables.

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object};

use super::cmap::ToUnicodeMap;
use super::objects::{
    dict_get, dict_name, dict_number, get_number, number_array, resolve, resolve_dict,
    stream_content,
};

/// Ascent used when neither the descriptor nor a standard font supplies one
const DEFAULT_ASCENT: f32 = 0.8;
/// Descent used when neither the descriptor nor a standard font supplies one
const DEFAULT_DESCENT: f32 = -0.2;

/// WinAnsiEncoding 0x80..=0x9F
const WIN_ANSI_HIGH: [Option<char>; 32] = [
    Some('€'), None, Some('‚'), Some('ƒ'), Some('„'), Some('…'), Some('†'), Some('‡'),
    Some('ˆ'), Some('‰'), Some('Š'), Some('‹'), Some('Œ'), None, Some('Ž'), None,
    None, Some('‘'), Some('’'), Some('“'), Some('”'), Some('•'), Some('–'), Some('—'),
    Some('˜'), Some('™'), Some('š'), Some('›'), Some('œ'), None, Some('ž'), Some('Ÿ'),
];

/// MacRomanEncoding 0x80..=0xFF
const MAC_ROMAN_HIGH: &str = "ÄÅÇÉÑÖÜáàâäãåçéèêëíìîïñóòôöõúùûü†°¢£§•¶ß®©™´¨≠ÆØ∞±≤≥¥µ∂∑∏π∫ªºΩæø\
¿¡¬√ƒ≈∆«»…\u{00A0}ÀÃÕŒœ–—“”‘’÷◊ÿŸ⁄€‹›ﬁﬂ‡·‚„‰ÂÊÁËÈÍÎÏÌÓÔ\u{F8FF}ÒÚÛÙıˆ˜¯˘˙˚¸˝˛ˇ";

/// Times-Roman advance widths for codes 32..=126
const TIMES_WIDTHS: &[u16] = &[
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278, // 32-47
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444, // 48-63
    921, 722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722, // 64-79
    556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, 333, 278, 333, 469, 500, // 80-95
    333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500, // 96-111
    500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541, // 112-126
];

/// Helvetica advance widths for codes 32..=126
const HELVETICA_WIDTHS: &[u16] = &[
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // 32-47
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 48-63
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // 64-79
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 80-95
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // 96-111
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 112-126
];

/// Glyph names outside the single-letter and `uniXXXX` forms
const GLYPH_NAMES: &[(&str, char)] = &[
    ("space", ' '), ("exclam", '!'), ("quotedbl", '"'), ("numbersign", '#'),
    ("dollar", '$'), ("percent", '%'), ("ampersand", '&'), ("quotesingle", '\''),
    ("parenleft", '('), ("parenright", ')'), ("asterisk", '*'), ("plus", '+'),
    ("comma", ','), ("hyphen", '-'), ("minus", '−'), ("period", '.'), ("slash", '/'),
    ("zero", '0'), ("one", '1'), ("two", '2'), ("three", '3'), ("four", '4'),
    ("five", '5'), ("six", '6'), ("seven", '7'), ("eight", '8'), ("nine", '9'),
    ("colon", ':'), ("semicolon", ';'), ("less", '<'), ("equal", '='), ("greater", '>'),
    ("question", '?'), ("at", '@'), ("bracketleft", '['), ("backslash", '\\'),
    ("bracketright", ']'), ("asciicircum", '^'), ("underscore", '_'), ("grave", '`'),
    ("braceleft", '{'), ("bar", '|'), ("braceright", '}'), ("asciitilde", '~'),
    ("quoteleft", '‘'), ("quoteright", '’'), ("quotedblleft", '“'), ("quotedblright", '”'),
    ("quotesinglbase", '‚'), ("quotedblbase", '„'), ("endash", '–'), ("emdash", '—'),
    ("bullet", '•'), ("ellipsis", '…'), ("dagger", '†'), ("daggerdbl", '‡'),
    ("degree", '°'), ("copyright", '©'), ("registered", '®'), ("trademark", '™'),
    ("section", '§'), ("paragraph", '¶'), ("periodcentered", '·'), ("nbspace", '\u{00A0}'),
    ("nonbreakingspace", '\u{00A0}'), ("Euro", '€'), ("sterling", '£'), ("yen", '¥'),
    ("cent", '¢'), ("currency", '¤'), ("germandbls", 'ß'), ("AE", 'Æ'), ("ae", 'æ'),
    ("OE", 'Œ'), ("oe", 'œ'), ("Oslash", 'Ø'), ("oslash", 'ø'), ("dotlessi", 'ı'),
    ("Aacute", 'Á'), ("Agrave", 'À'), ("Acircumflex", 'Â'), ("Adieresis", 'Ä'),
    ("Atilde", 'Ã'), ("Aring", 'Å'), ("Ccedilla", 'Ç'), ("Eacute", 'É'), ("Egrave", 'È'),
    ("Ecircumflex", 'Ê'), ("Edieresis", 'Ë'), ("Iacute", 'Í'), ("Igrave", 'Ì'),
    ("Icircumflex", 'Î'), ("Idieresis", 'Ï'), ("Ntilde", 'Ñ'), ("Oacute", 'Ó'),
    ("Ograve", 'Ò'), ("Ocircumflex", 'Ô'), ("Odieresis", 'Ö'), ("Otilde", 'Õ'),
    ("Uacute", 'Ú'), ("Ugrave", 'Ù'), ("Ucircumflex", 'Û'), ("Udieresis", 'Ü'),
    ("Yacute", 'Ý'), ("aacute", 'á'), ("agrave", 'à'), ("acircumflex", 'â'),
    ("adieresis", 'ä'), ("atilde", 'ã'), ("aring", 'å'), ("ccedilla", 'ç'),
    ("eacute", 'é'), ("egrave", 'è'), ("ecircumflex", 'ê'), ("edieresis", 'ë'),
    ("iacute", 'í'), ("igrave", 'ì'), ("icircumflex", 'î'), ("idieresis", 'ï'),
    ("ntilde", 'ñ'), ("oacute", 'ó'), ("ograve", 'ò'), ("ocircumflex", 'ô'),
    ("odieresis", 'ö'), ("otilde", 'õ'), ("uacute", 'ú'), ("ugrave", 'ù'),
    ("ucircumflex", 'û'), ("udieresis", 'ü'), ("yacute", 'ý'), ("ydieresis", 'ÿ'),
];

/// Standard 14 families with built-in metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardFont {
    Times,
    Helvetica,
    Courier,
}

impl StandardFont {
    /// Recognise a standard family from a BaseFont name (subset prefix allowed)
    pub fn from_base_font(name: &str) -> Option<Self> {
        let name = strip_subset_prefix(name).to_ascii_lowercase();
        if name.contains("times") {
            Some(Self::Times)
        } else if name.contains("helvetica") || name.contains("arial") {
            Some(Self::Helvetica)
        } else if name.contains("courier") {
            Some(Self::Courier)
        } else {
            None
        }
    }

    /// Advance width in 1/1000 em
    pub fn width(&self, code: u32) -> f32 {
        let table = match self {
            Self::Times => TIMES_WIDTHS,
            Self::Helvetica => HELVETICA_WIDTHS,
            Self::Courier => return 600.0,
        };
        code.checked_sub(32)
            .and_then(|i| table.get(i as usize))
            .map(|&w| w as f32)
            .unwrap_or(match self {
                Self::Times => 500.0,
                _ => 556.0,
            })
    }

    /// (ascent, descent) in em
    pub fn vertical_metrics(&self) -> (f32, f32) {
        match self {
            Self::Times => (0.683, -0.217),
            Self::Helvetica => (0.718, -0.207),
            Self::Courier => (0.629, -0.157),
        }
    }
}

/// One decoded character code
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedGlyph {
    pub code: u32,
    pub text: String,
    /// Advance in text space units per unit of font size
    pub width: f32,
    /// Single-byte code 32, which receives word spacing
    pub is_word_space: bool,
}

#[derive(Debug, Clone)]
enum FontKind {
    Simple {
        first_char: u32,
        widths: Vec<f32>,
        encoding: Vec<Option<String>>,
    },
    Composite {
        widths: HashMap<u32, f32>,
        default_width: f32,
        code_bytes: usize,
    },
}

/// Metrics and decoding tables of one font resource
#[derive(Debug, Clone)]
pub struct FontInfo {
    pub base_font: String,
    kind: FontKind,
    standard: Option<StandardFont>,
    to_unicode: Option<ToUnicodeMap>,
    missing_width: f32,
    /// Glyph space → text space scale (0.001 except for Type3)
    width_scale: f32,
    /// Ascent in em
    pub ascent: f32,
    /// Descent in em (negative)
    pub descent: f32,
}

impl FontInfo {
    /// Font used when a `Tf` names a resource that cannot be found
    pub fn fallback() -> Self {
        let standard = StandardFont::Helvetica;
        let (ascent, descent) = standard.vertical_metrics();
        Self {
            base_font: "Helvetica".to_string(),
            kind: FontKind::Simple {
                first_char: 0,
                widths: Vec::new(),
                encoding: base_encoding(Some("WinAnsiEncoding")),
            },
            standard: Some(standard),
            to_unicode: None,
            missing_width: 0.0,
            width_scale: 0.001,
            ascent,
            descent,
        }
    }

    pub fn from_dict(doc: &Document, dict: &Dictionary) -> Self {
        let subtype = dict_name(doc, dict, b"Subtype").unwrap_or_default();
        let base_font = dict_name(doc, dict, b"BaseFont").unwrap_or_else(|| subtype.clone());
        let standard = StandardFont::from_base_font(&base_font);

        let to_unicode = match dict_get(doc, dict, b"ToUnicode") {
            Some(Object::Stream(stream)) => Some(ToUnicodeMap::parse(&stream_content(stream))),
            _ => None,
        };

        let (kind, descriptor) = if subtype == "Type0" {
            let descendant = dict_get(doc, dict, b"DescendantFonts")
                .and_then(|obj| match obj {
                    Object::Array(items) => items.first(),
                    _ => None,
                })
                .and_then(|first| resolve_dict(doc, first));
            let code_bytes = to_unicode
                .as_ref()
                .and_then(ToUnicodeMap::code_bytes)
                .filter(|n| (1..=2).contains(n))
                .unwrap_or(2);
            let (widths, default_width) = match descendant {
                Some(cid) => (
                    cid_widths(doc, cid),
                    dict_number(doc, cid, b"DW").unwrap_or(1000.0),
                ),
                None => (HashMap::new(), 1000.0),
            };
            let descriptor = descendant.and_then(|cid| font_descriptor(doc, cid));
            (
                FontKind::Composite {
                    widths,
                    default_width,
                    code_bytes,
                },
                descriptor,
            )
        } else {
            let first_char = dict_number(doc, dict, b"FirstChar").unwrap_or(0.0).max(0.0) as u32;
            let widths = dict
                .get(b"Widths")
                .map(|obj| number_array(doc, obj))
                .unwrap_or_default();
            let default_base = if subtype == "Type1" && standard.is_some() {
                "StandardEncoding"
            } else {
                "WinAnsiEncoding"
            };
            let encoding = simple_encoding(doc, dict, default_base);
            (
                FontKind::Simple {
                    first_char,
                    widths,
                    encoding,
                },
                font_descriptor(doc, dict),
            )
        };

        let width_scale = if subtype == "Type3" {
            dict.get(b"FontMatrix")
                .ok()
                .map(|obj| number_array(doc, obj))
                .and_then(|m| m.first().copied())
                .filter(|a| a.abs() > f32::EPSILON)
                .map(|a| a.abs())
                .unwrap_or(0.001)
        } else {
            0.001
        };

        let standard_metrics = standard.map(|s| s.vertical_metrics());
        let descriptor_number =
            |key: &[u8]| descriptor.and_then(|d| dict_number(doc, d, key));
        let ascent = descriptor_number(b"Ascent")
            .filter(|a| *a > 0.0)
            .map(|a| a / 1000.0)
            .or(standard_metrics.map(|m| m.0))
            .unwrap_or(DEFAULT_ASCENT);
        let descent = descriptor_number(b"Descent")
            .filter(|d| *d < 0.0)
            .map(|d| d / 1000.0)
            .or(standard_metrics.map(|m| m.1))
            .unwrap_or(DEFAULT_DESCENT);
        let missing_width = descriptor_number(b"MissingWidth").unwrap_or(0.0);

        Self {
            base_font,
            kind,
            standard,
            to_unicode,
            missing_width,
            width_scale,
            ascent,
            descent,
        }
    }

    /// Split a shown string into glyphs
    pub fn decode(&self, bytes: &[u8]) -> Vec<DecodedGlyph> {
        match &self.kind {
            FontKind::Simple { .. } => bytes
                .iter()
                .map(|&b| {
                    let code = b as u32;
                    DecodedGlyph {
                        code,
                        text: self.text_for(code),
                        width: self.width_for(code),
                        is_word_space: b == b' ',
                    }
                })
                .collect(),
            FontKind::Composite { code_bytes, .. } => bytes
                .chunks(*code_bytes)
                .map(|chunk| {
                    let code = chunk.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32);
                    DecodedGlyph {
                        code,
                        text: self.text_for(code),
                        width: self.width_for(code),
                        is_word_space: false,
                    }
                })
                .collect(),
        }
    }

    fn text_for(&self, code: u32) -> String {
        if let Some(text) = self.to_unicode.as_ref().and_then(|map| map.get(code)) {
            return text.to_string();
        }
        match &self.kind {
            FontKind::Simple { encoding, .. } => encoding
                .get(code as usize)
                .cloned()
                .flatten()
                .unwrap_or_else(|| char::from(code as u8).to_string()),
            FontKind::Composite { .. } => char::from_u32(code)
                .filter(|c| !c.is_control())
                .unwrap_or(char::REPLACEMENT_CHARACTER)
                .to_string(),
        }
    }

    fn width_for(&self, code: u32) -> f32 {
        let glyph_units = match &self.kind {
            FontKind::Simple {
                first_char, widths, ..
            } => code
                .checked_sub(*first_char)
                .and_then(|i| widths.get(i as usize).copied())
                .or_else(|| self.standard.map(|s| s.width(code)))
                .unwrap_or(self.missing_width),
            FontKind::Composite {
                widths,
                default_width,
                ..
            } => widths.get(&code).copied().unwrap_or(*default_width),
        };
        glyph_units * self.width_scale
    }
}

fn font_descriptor<'a>(doc: &'a Document, dict: &'a Dictionary) -> Option<&'a Dictionary> {
    resolve_dict(doc, dict.get(b"FontDescriptor").ok()?)
}

/// Parse a CIDFont `/W` array
fn cid_widths(doc: &Document, cid_font: &Dictionary) -> HashMap<u32, f32> {
    let mut widths = HashMap::new();
    let items = match dict_get(doc, cid_font, b"W") {
        Some(Object::Array(items)) => items,
        _ => return widths,
    };

    let mut i = 0;
    while i < items.len() {
        let first = match resolve(doc, &items[i]).and_then(get_number) {
            Some(n) => n as u32,
            None => break,
        };
        match items.get(i + 1).and_then(|obj| resolve(doc, obj)) {
            Some(Object::Array(run)) => {
                for (offset, w) in run.iter().enumerate() {
                    if let Some(w) = resolve(doc, w).and_then(get_number) {
                        widths.insert(first.saturating_add(offset as u32), w);
                    }
                }
                i += 2;
            }
            Some(last) => {
                let last = get_number(last).map(|n| n as u32).unwrap_or(first);
                let w = items
                    .get(i + 2)
                    .and_then(|obj| resolve(doc, obj))
                    .and_then(get_number)
                    .unwrap_or(1000.0);
                for code in first..=last.min(first.saturating_add(0xFFFF)) {
                    widths.insert(code, w);
                }
                i += 3;
            }
            None => break,
        }
    }
    widths
}

/// Code → text table for a simple font
fn simple_encoding(doc: &Document, dict: &Dictionary, default_base: &str) -> Vec<Option<String>> {
    match dict_get(doc, dict, b"Encoding") {
        Some(Object::Name(name)) => base_encoding(Some(String::from_utf8_lossy(name).as_ref())),
        Some(Object::Dictionary(enc)) => {
            let base = dict_name(doc, enc, b"BaseEncoding");
            let mut table = base_encoding(Some(base.as_deref().unwrap_or(default_base)));
            if let Some(Object::Array(diffs)) = dict_get(doc, enc, b"Differences") {
                let mut code = 0usize;
                for item in diffs {
                    match resolve(doc, item) {
                        Some(Object::Integer(n)) => code = (*n).max(0) as usize,
                        Some(Object::Name(name)) => {
                            if let Some(slot) = table.get_mut(code) {
                                *slot = glyph_name_to_text(&String::from_utf8_lossy(name));
                            }
                            code += 1;
                        }
                        _ => {}
                    }
                }
            }
            table
        }
        _ => base_encoding(Some(default_base)),
    }
}

/// Code → text table for a named base encoding
fn base_encoding(name: Option<&str>) -> Vec<Option<String>> {
    (0u32..256)
        .map(|code| {
            let ch = match name {
                Some("MacRomanEncoding") if code >= 0x80 => {
                    MAC_ROMAN_HIGH.chars().nth((code - 0x80) as usize)
                }
                Some("StandardEncoding") if code == 0x27 => Some('’'),
                Some("StandardEncoding") if code == 0x60 => Some('‘'),
                _ => win_ansi_char(code as u8),
            };
            ch.map(String::from)
        })
        .collect()
}

/// Text for a glyph name (`A`, `two`, `uni0032`, `u1F600`, `eacute.sc`)
pub fn glyph_name_to_text(name: &str) -> Option<String> {
    let base = name.split('.').next().unwrap_or(name);
    if base.len() == 1 && base.is_ascii() {
        return Some(base.to_string());
    }
    if let Some((_, ch)) = GLYPH_NAMES.iter().find(|(n, _)| *n == base) {
        return Some(ch.to_string());
    }
    if let Some(hex) = base.strip_prefix("uni") {
        if hex.len() >= 4 && hex.len() % 4 == 0 && is_hex(hex) {
            let units: Option<Vec<u16>> = (0..hex.len())
                .step_by(4)
                .map(|i| u16::from_str_radix(&hex[i..i + 4], 16).ok())
                .collect();
            return units.map(|u| String::from_utf16_lossy(&u));
        }
    }
    if let Some(hex) = base.strip_prefix('u') {
        if (4..=6).contains(&hex.len()) && is_hex(hex) {
            return u32::from_str_radix(hex, 16)
                .ok()
                .and_then(char::from_u32)
                .map(String::from);
        }
    }
    None
}

fn is_hex(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// WinAnsiEncoding code → character
pub fn win_ansi_char(code: u8) -> Option<char> {
    match code {
        0x20..=0x7E | 0xA0..=0xFF => Some(code as char),
        0x80..=0x9F => WIN_ANSI_HIGH[(code - 0x80) as usize],
        _ => None,
    }
}

/// Character → WinAnsiEncoding code
pub fn win_ansi_code(ch: char) -> Option<u8> {
    match ch as u32 {
        c @ (0x20..=0x7E | 0xA0..=0xFF) => Some(c as u8),
        _ => WIN_ANSI_HIGH
            .iter()
            .position(|slot| *slot == Some(ch))
            .map(|i| 0x80 + i as u8),
    }
}

/// Encode text as WinAnsi, substituting `?` for characters outside the encoding
pub fn encode_win_ansi_lossy(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| win_ansi_code(ch).unwrap_or(b'?'))
        .collect()
}

/// `ABCDEF+Times-Roman` → `Times-Roman`
pub fn strip_subset_prefix(name: &str) -> &str {
    match name.split_once('+') {
        Some((prefix, rest))
            if prefix.len() == 6 && prefix.chars().all(|c| c.is_ascii_uppercase()) =>
        {
            rest
        }
        _ => name,
    }
}
