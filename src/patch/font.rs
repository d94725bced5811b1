//! Font resolution and registration for replacement text

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use crate::document::{DocumentError, DocumentResult};

/// Resource name of the registered host font
pub const CUSTOM_FONT_NAME: &str = "CustomFont";
/// Resource name of the built-in serif font
pub const BUILTIN_FONT_NAME: &str = "TimesRoman";

const BUILTIN_BASE_FONT: &str = "Times-Roman";
/// Most entries in one `beginbfchar` block
const TO_UNICODE_CHUNK: usize = 100;

/// Preferred font files, first match wins
pub const DEFAULT_FONT_PATHS: &[&str] = &[
    "/usr/share/fonts/noto/NotoSerifTamil-Regular.ttf",
    "/usr/share/fonts/truetype/noto/NotoSerifTamil-Regular.ttf",
    "/usr/share/fonts/google-noto/NotoSerifTamil-Regular.ttf",
    "/usr/share/fonts/TTF/NotoSerifTamil-Regular.ttf",
    "/usr/share/fonts/TTF/times.ttf",
    "/usr/share/fonts/liberation/LiberationSerif-Regular.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSerif-Regular.ttf",
];

/// A font file read from the host
#[derive(Debug, Clone)]
pub struct FontResource {
    pub path: PathBuf,
    pub data: Arc<[u8]>,
}

/// Ordered list of candidate font files
#[derive(Debug, Clone)]
pub struct FontResolver {
    candidates: Vec<PathBuf>,
}

impl Default for FontResolver {
    fn default() -> Self {
        Self::new(DEFAULT_FONT_PATHS.iter().map(PathBuf::from))
    }
}

impl FontResolver {
    pub fn new(candidates: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            candidates: candidates.into_iter().map(|p| expand_home(&p)).collect(),
        }
    }

    /// Parse a colon-separated path list (the `FONT_PATHS` format)
    pub fn from_path_list(list: &str) -> Self {
        Self::new(
            list.split(':')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
        )
    }

    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// First candidate that exists and can be read.
    ///
    /// `None` means the built-in serif font will be used.
    pub fn resolve(&self) -> Option<FontResource> {
        for path in &self.candidates {
            match std::fs::read(path) {
                Ok(data) => {
                    tracing::debug!(path = %path.display(), bytes = data.len(), "Resolved font");
                    return Some(FontResource {
                        path: path.clone(),
                        data: data.into(),
                    });
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    tracing::debug!(path = %path.display(), error = %err, "Font not readable");
                }
            }
        }
        tracing::warn!(
            candidates = self.candidates.len(),
            "No font file found, using built-in {}",
            BUILTIN_BASE_FONT
        );
        None
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}

/// Which font replacement text is drawn with
#[derive(Debug, Clone, Copy)]
pub enum FontChoice<'a> {
    Embedded(&'a FontResource),
    Builtin,
}

pub fn select_font(resource: Option<&FontResource>) -> FontChoice<'_> {
    match resource {
        Some(resource) => FontChoice::Embedded(resource),
        None => FontChoice::Builtin,
    }
}

/// A host font registered in the document as a Type0 font with two-byte
/// glyph id codes (`Identity-H`)
#[derive(Debug, Clone)]
pub struct EmbeddedFont {
    pub id: ObjectId,
    pub base_font: String,
    glyphs: BTreeMap<char, u16>,
}

impl EmbeddedFont {
    /// Big-endian glyph ids for `text`, or `None` when a character has no glyph
    pub fn encode(&self, text: &str) -> Option<Vec<u8>> {
        let mut bytes = Vec::with_capacity(text.len() * 2);
        for ch in text.chars() {
            let gid = self.glyphs.get(&ch)?;
            bytes.extend_from_slice(&gid.to_be_bytes());
        }
        Some(bytes)
    }

    pub fn covers(&self, ch: char) -> bool {
        self.glyphs.contains_key(&ch)
    }
}

/// Embed `resource` as `/Type0` over a `/CIDFontType2` descendant with a
/// `/FontFile2` program, glyph widths in `/W` and a `/ToUnicode` map
pub fn embed_type0(doc: &mut Document, resource: &FontResource) -> DocumentResult<EmbeddedFont> {
    let face = ttf_parser::Face::parse(&resource.data, 0).map_err(|err| {
        DocumentError::FontError(format!("{}: {}", resource.path.display(), err))
    })?;
    let glyphs = unicode_glyphs(&face);
    if glyphs.is_empty() {
        return Err(DocumentError::FontError(format!(
            "{}: no Unicode character map",
            resource.path.display()
        )));
    }

    let units_per_em = face.units_per_em().max(1) as f32;
    let scale = |v: f32| (v * 1000.0 / units_per_em).round() as i64;

    let widths: Vec<Object> = (0..face.number_of_glyphs())
        .map(|gid| {
            let advance = face.glyph_hor_advance(ttf_parser::GlyphId(gid));
            Object::Integer(advance.map_or(0, |a| scale(a as f32)))
        })
        .collect();

    let bbox = face.global_bounding_box();
    let base_font = postscript_name(&face).unwrap_or_else(|| CUSTOM_FONT_NAME.to_string());

    let mut file_dict = lopdf::Dictionary::new();
    file_dict.set("Length1", Object::Integer(resource.data.len() as i64));
    let file_id = doc.add_object(Stream::new(file_dict, resource.data.to_vec()));

    let descriptor_id = doc.add_object(dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => Object::Name(base_font.as_bytes().to_vec()),
        "Flags" => 32,
        "FontBBox" => vec![
            Object::Integer(scale(bbox.x_min as f32)),
            Object::Integer(scale(bbox.y_min as f32)),
            Object::Integer(scale(bbox.x_max as f32)),
            Object::Integer(scale(bbox.y_max as f32)),
        ],
        "ItalicAngle" => 0,
        "Ascent" => scale(face.ascender() as f32),
        "Descent" => scale(face.descender() as f32),
        "CapHeight" => scale(face.capital_height().unwrap_or(face.ascender()) as f32),
        "StemV" => 80,
        "FontFile2" => file_id,
    });

    let cid_font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "CIDFontType2",
        "BaseFont" => Object::Name(base_font.as_bytes().to_vec()),
        "CIDSystemInfo" => dictionary! {
            "Registry" => Object::string_literal("Adobe"),
            "Ordering" => Object::string_literal("Identity"),
            "Supplement" => 0,
        },
        "FontDescriptor" => descriptor_id,
        "CIDToGIDMap" => "Identity",
        "W" => vec![Object::Integer(0), Object::Array(widths)],
    });

    let to_unicode_id = doc.add_object(Stream::new(
        lopdf::Dictionary::new(),
        to_unicode_cmap(&glyphs).into_bytes(),
    ));

    let id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => Object::Name(base_font.as_bytes().to_vec()),
        "Encoding" => "Identity-H",
        "DescendantFonts" => vec![Object::Reference(cid_font_id)],
        "ToUnicode" => to_unicode_id,
    });

    tracing::debug!(
        path = %resource.path.display(),
        base_font = %base_font,
        characters = glyphs.len(),
        "Embedded font"
    );

    Ok(EmbeddedFont {
        id,
        base_font,
        glyphs,
    })
}

/// Character → glyph id over every Unicode subtable of the font's `cmap`
fn unicode_glyphs(face: &ttf_parser::Face<'_>) -> BTreeMap<char, u16> {
    let mut glyphs = BTreeMap::new();
    let Some(cmap) = face.tables().cmap.as_ref() else {
        return glyphs;
    };
    for subtable in cmap.subtables.into_iter().filter(|s| s.is_unicode()) {
        subtable.codepoints(|cp| {
            let gid = subtable.glyph_index(cp).map(|g| g.0).filter(|g| *g != 0);
            if let (Some(ch), Some(gid)) = (char::from_u32(cp), gid) {
                glyphs.entry(ch).or_insert(gid);
            }
        });
    }
    glyphs
}

/// `/ToUnicode` program mapping each glyph id back to the first character that uses it
fn to_unicode_cmap(glyphs: &BTreeMap<char, u16>) -> String {
    let mut by_glyph: BTreeMap<u16, char> = BTreeMap::new();
    for (&ch, &gid) in glyphs {
        by_glyph.entry(gid).or_insert(ch);
    }

    let mut out = String::from(
        "/CIDInit /ProcSet findresource begin\n\
         12 dict begin\n\
         begincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n\
         /CMapType 2 def\n\
         1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n",
    );
    let entries: Vec<(u16, char)> = by_glyph.into_iter().collect();
    for chunk in entries.chunks(TO_UNICODE_CHUNK) {
        out.push_str(&format!("{} beginbfchar\n", chunk.len()));
        for (gid, ch) in chunk {
            let mut units = [0u16; 2];
            let hex: String = ch
                .encode_utf16(&mut units)
                .iter()
                .map(|u| format!("{:04X}", u))
                .collect();
            out.push_str(&format!("<{:04X}> <{}>\n", gid, hex));
        }
        out.push_str("endbfchar\n");
    }
    out.push_str("endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n");
    out
}

/// Register the built-in serif font
pub fn builtin_font(doc: &mut Document) -> ObjectId {
    doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => BUILTIN_BASE_FONT,
        "Encoding" => "WinAnsiEncoding",
    })
}

fn postscript_name(face: &ttf_parser::Face<'_>) -> Option<String> {
    face.names()
        .into_iter()
        .filter(|name| name.name_id == ttf_parser::name_id::POST_SCRIPT_NAME)
        .find_map(|name| name.to_string())
        .map(|name| {
            name.chars()
                .filter(|c| c.is_ascii_graphic() && !"()<>[]{}/%#".contains(*c))
                .collect::<String>()
        })
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::ToUnicodeMap;
    use crate::testing::sample_ttf;

    #[test]
    fn test_resolver_skips_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("serif.ttf");
        std::fs::write(&present, b"not really a font").unwrap();

        let resolver = FontResolver::new(vec![dir.path().join("missing.ttf"), present.clone()]);
        let resource = resolver.resolve().unwrap();
        assert_eq!(resource.path, present);
        assert_eq!(&resource.data[..], b"not really a font");
    }

    #[test]
    fn test_resolver_without_candidates() {
        let resolver = FontResolver::from_path_list("/nonexistent/a.ttf: :/nonexistent/b.ttf");
        assert_eq!(resolver.candidates().len(), 2);
        assert!(resolver.resolve().is_none());
    }

    #[test]
    fn test_home_expansion() {
        let resolver = FontResolver::new(vec![PathBuf::from("~/fonts/serif.ttf")]);
        if let Some(home) = std::env::var_os("HOME") {
            assert_eq!(
                resolver.candidates()[0],
                PathBuf::from(home).join("fonts/serif.ttf")
            );
        }
    }

    #[test]
    fn test_default_candidates_start_with_noto() {
        let resolver = FontResolver::default();
        assert!(resolver.candidates()[0].ends_with("NotoSerifTamil-Regular.ttf"));
        assert_eq!(resolver.candidates().len(), DEFAULT_FONT_PATHS.len());
    }

    #[test]
    fn test_select_font() {
        assert!(matches!(select_font(None), FontChoice::Builtin));
        let resource = FontResource {
            path: PathBuf::from("x.ttf"),
            data: Arc::from(&b"x"[..]),
        };
        assert!(matches!(select_font(Some(&resource)), FontChoice::Embedded(_)));
    }

    #[test]
    fn test_invalid_font_file_is_font_error() {
        let mut doc = Document::with_version("1.7");
        let resource = FontResource {
            path: PathBuf::from("broken.ttf"),
            data: Arc::from(&b"garbage"[..]),
        };
        assert!(matches!(
            embed_type0(&mut doc, &resource),
            Err(DocumentError::FontError(_))
        ));
    }

    #[test]
    fn test_embed_type0_font() {
        let mut doc = Document::with_version("1.7");
        let resource = FontResource {
            path: PathBuf::from("sample.ttf"),
            data: Arc::from(sample_ttf("0123456789\u{0B85}")),
        };
        let font = embed_type0(&mut doc, &resource).unwrap();

        // glyph ids follow code point order, starting at 1
        assert_eq!(font.encode("2003"), Some(vec![0, 3, 0, 1, 0, 1, 0, 4]));
        assert_eq!(font.encode("\u{0B85}"), Some(vec![0, 11]));
        assert_eq!(font.encode("Born 2003"), None);
        assert!(font.covers('7'));

        let dict = doc.get_dictionary(font.id).unwrap();
        assert_eq!(dict.get(b"Subtype").unwrap().as_name().unwrap(), b"Type0");
        assert_eq!(dict.get(b"Encoding").unwrap().as_name().unwrap(), b"Identity-H");

        let to_unicode_id = dict.get(b"ToUnicode").unwrap().as_reference().unwrap();
        let stream = doc.get_object(to_unicode_id).unwrap().as_stream().unwrap();
        let map = ToUnicodeMap::parse(&stream.content);
        assert_eq!(map.code_bytes(), Some(2));
        assert_eq!(map.get(3), Some("2"));
        assert_eq!(map.get(11), Some("\u{0B85}"));
    }
}
