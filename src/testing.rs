//! Test fixtures: small generated PDFs and fonts

use std::path::{Path, PathBuf};

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};

/// One line of text placed on the sample page
#[derive(Debug, Clone)]
pub(crate) struct SampleText {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub rgb: Option<[f32; 3]>,
}

impl SampleText {
    /// Black 10pt Times-Roman at PDF user-space `(x, y)`
    pub fn new(text: &str, x: f32, y: f32) -> Self {
        Self {
            text: text.to_string(),
            x,
            y,
            size: 10.0,
            rgb: None,
        }
    }

    pub fn with_size(mut self, size: f32) -> Self {
        self.size = size;
        self
    }

    pub fn with_color(mut self, rgb: [f32; 3]) -> Self {
        self.rgb = Some(rgb);
        self
    }
}

/// Single A4 page, Times-Roman as `/F1`, resources and MediaBox inherited from the page tree
pub(crate) fn sample_document(texts: &[SampleText]) -> Document {
    sample_document_pages(&[texts.to_vec()])
}

/// One page per entry
pub(crate) fn sample_document_pages(pages: &[Vec<SampleText>]) -> Document {
    build_document(
        pages,
        dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Times-Roman",
            "Encoding" => "WinAnsiEncoding",
        },
    )
}

/// Single page whose text is shown with `font` as `/F1`.
///
/// Text is written as raw bytes, so control codes reach the font's
/// encoding untouched.
pub(crate) fn sample_document_with_font(texts: &[SampleText], font: Dictionary) -> Document {
    build_document(&[texts.to_vec()], font)
}

fn build_document(pages: &[Vec<SampleText>], font: Dictionary) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(font);
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for texts in pages {
        let mut operations = Vec::new();
        for text in texts {
            operations.push(Operation::new("BT", vec![]));
            if let Some([r, g, b]) = text.rgb {
                operations.push(Operation::new(
                    "rg",
                    vec![Object::Real(r), Object::Real(g), Object::Real(b)],
                ));
            }
            operations.push(Operation::new(
                "Tf",
                vec!["F1".into(), Object::Real(text.size)],
            ));
            operations.push(Operation::new(
                "Td",
                vec![Object::Real(text.x), Object::Real(text.y)],
            ));
            operations.push(Operation::new(
                "Tj",
                vec![Object::string_literal(text.text.as_str())],
            ));
            operations.push(Operation::new("ET", vec![]));
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode sample content"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(595),
                Object::Integer(842),
            ],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc
}

/// Serialised sample document
pub(crate) fn sample_pdf_bytes(texts: &[SampleText]) -> Vec<u8> {
    let mut doc = sample_document(texts);
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("serialise sample pdf");
    bytes
}

/// Write a sample document to `dir/name`
pub(crate) fn write_sample_pdf(dir: &Path, name: &str, texts: &[SampleText]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, sample_pdf_bytes(texts)).expect("write sample pdf");
    path
}

/// Minimal TrueType font covering `chars`.
///
/// Glyph ids follow code point order starting at 1; every glyph advances
/// 500 units on a 1000 unit em. There are no outlines or name table.
pub(crate) fn sample_ttf(chars: &str) -> Vec<u8> {
    let mut chars: Vec<char> = chars.chars().collect();
    chars.sort_unstable();
    chars.dedup();
    let glyph_count = chars.len() as u16 + 1;

    let mut head = Vec::new();
    put_u32(&mut head, 0x0001_0000); // version
    put_u32(&mut head, 0x0001_0000); // fontRevision
    put_u32(&mut head, 0); // checksumAdjustment
    put_u32(&mut head, 0x5F0F_3CF5); // magic
    put_u16(&mut head, 0); // flags
    put_u16(&mut head, 1000); // unitsPerEm
    head.extend_from_slice(&[0; 16]); // created, modified
    for v in [0i16, -200, 500, 800] {
        put_u16(&mut head, v as u16);
    }
    put_u16(&mut head, 0); // macStyle
    put_u16(&mut head, 8); // lowestRecPPEM
    put_u16(&mut head, 2); // fontDirectionHint
    put_u16(&mut head, 0); // indexToLocFormat
    put_u16(&mut head, 0); // glyphDataFormat

    let mut hhea = Vec::new();
    put_u32(&mut hhea, 0x0001_0000);
    for v in [800i16, -200, 0] {
        put_u16(&mut hhea, v as u16); // ascender, descender, lineGap
    }
    put_u16(&mut hhea, 500); // advanceWidthMax
    for v in [0u16, 0, 500, 1, 0, 0, 0, 0, 0, 0, 0] {
        put_u16(&mut hhea, v); // side bearings, extent, caret, reserved, metricDataFormat
    }
    put_u16(&mut hhea, glyph_count);

    let mut maxp = Vec::new();
    put_u32(&mut maxp, 0x0000_5000);
    put_u16(&mut maxp, glyph_count);

    let mut hmtx = Vec::new();
    for _ in 0..glyph_count {
        put_u16(&mut hmtx, 500);
        put_u16(&mut hmtx, 0);
    }

    // Windows Unicode full repertoire, format 12
    let mut cmap = Vec::new();
    put_u16(&mut cmap, 0);
    put_u16(&mut cmap, 1);
    put_u16(&mut cmap, 3);
    put_u16(&mut cmap, 10);
    put_u32(&mut cmap, 12);
    put_u16(&mut cmap, 12);
    put_u16(&mut cmap, 0);
    put_u32(&mut cmap, 16 + 12 * chars.len() as u32);
    put_u32(&mut cmap, 0);
    put_u32(&mut cmap, chars.len() as u32);
    for (index, ch) in chars.iter().enumerate() {
        put_u32(&mut cmap, *ch as u32);
        put_u32(&mut cmap, *ch as u32);
        put_u32(&mut cmap, index as u32 + 1);
    }

    // Table records must be sorted by tag
    let tables: [(&[u8; 4], Vec<u8>); 5] = [
        (b"cmap", cmap),
        (b"head", head),
        (b"hhea", hhea),
        (b"hmtx", hmtx),
        (b"maxp", maxp),
    ];

    let mut font = Vec::new();
    put_u32(&mut font, 0x0001_0000);
    put_u16(&mut font, tables.len() as u16);
    put_u16(&mut font, 64); // searchRange
    put_u16(&mut font, 2); // entrySelector
    put_u16(&mut font, 16); // rangeShift

    let mut offset = 12 + 16 * tables.len();
    let mut body = Vec::new();
    for (tag, data) in &tables {
        font.extend_from_slice(*tag);
        put_u32(&mut font, 0);
        put_u32(&mut font, offset as u32);
        put_u32(&mut font, data.len() as u32);

        body.extend_from_slice(data);
        while body.len() % 4 != 0 {
            body.push(0);
        }
        offset = 12 + 16 * tables.len() + body.len();
    }
    font.extend_from_slice(&body);
    font
}

fn put_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_be_bytes());
}

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_be_bytes());
}
