//! Page geometry, content streams and resources
//!
//! Read and write access to a single page: the visible box used for the
//! top-left coordinate space, the concatenated content stream, and the
//! font resources the patch engine registers.

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use super::objects::{
    inherited_attribute, kind_name, number_array, resolve, resolve_dict, stream_content,
};
use crate::document::{DocumentError, DocumentResult};

/// Page box and the mapping between PDF user space and top-left page space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub llx: f32,
    pub lly: f32,
    pub urx: f32,
    pub ury: f32,
}

impl Default for PageGeometry {
    /// US Letter
    fn default() -> Self {
        Self {
            llx: 0.0,
            lly: 0.0,
            urx: 612.0,
            ury: 792.0,
        }
    }
}

impl PageGeometry {
    /// Read the (possibly inherited) MediaBox of a page
    pub fn from_page(doc: &Document, page_id: ObjectId) -> Self {
        let values = inherited_attribute(doc, page_id, b"MediaBox")
            .map(|obj| number_array(doc, obj))
            .unwrap_or_default();
        if values.len() != 4 {
            tracing::debug!(?page_id, "No usable MediaBox, assuming Letter");
            return Self::default();
        }
        Self {
            llx: values[0].min(values[2]),
            lly: values[1].min(values[3]),
            urx: values[0].max(values[2]),
            ury: values[1].max(values[3]),
        }
    }

    pub fn width(&self) -> f32 {
        self.urx - self.llx
    }

    pub fn height(&self) -> f32 {
        self.ury - self.lly
    }

    /// PDF user space → top-left page space
    pub fn to_top_left(&self, x: f32, y: f32) -> (f32, f32) {
        (x - self.llx, self.ury - y)
    }

    /// Top-left page space → PDF user space
    pub fn to_pdf(&self, x: f32, y: f32) -> (f32, f32) {
        (x + self.llx, self.ury - y)
    }
}

/// Page object ids in document order
pub fn page_ids(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().into_values().collect()
}

/// Concatenated, decompressed content of a page (empty when the page has no Contents)
pub fn page_content(doc: &Document, page_id: ObjectId) -> DocumentResult<Vec<u8>> {
    let page = doc.get_dictionary(page_id)?;
    let contents = match page.get(b"Contents") {
        Ok(contents) => contents,
        Err(_) => return Ok(Vec::new()),
    };

    let mut data = Vec::new();
    match resolve(doc, contents) {
        Some(Object::Stream(stream)) => data.extend(stream_content(stream)),
        Some(Object::Array(parts)) => {
            for part in parts {
                if let Some(Object::Stream(stream)) = resolve(doc, part) {
                    data.extend(stream_content(stream));
                    data.push(b'\n');
                }
            }
        }
        Some(Object::Null) | None => {}
        Some(other) => {
            return Err(DocumentError::InvalidContent(format!(
                "page {:?} has unsupported Contents entry: {}",
                page_id,
                kind_name(&other)
            )))
        }
    }
    Ok(data)
}

/// Resources dictionary that applies to a page, inherited if needed
pub fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let resources = inherited_attribute(doc, page_id, b"Resources")?;
    resolve_dict(doc, resources)
}

/// Append a content stream to the page, after everything already painted
pub fn append_content(doc: &mut Document, page_id: ObjectId, data: Vec<u8>) -> DocumentResult<()> {
    let stream_id = doc.add_object(Stream::new(Dictionary::new(), data));
    let mut parts = content_parts(doc, page_id)?;
    parts.push(Object::Reference(stream_id));
    set_contents(doc, page_id, parts)
}

/// Wrap the existing page content in `q … Q` so later streams start from the default graphics state
pub fn wrap_content(doc: &mut Document, page_id: ObjectId) -> DocumentResult<()> {
    let mut parts = content_parts(doc, page_id)?;
    if parts.is_empty() {
        return Ok(());
    }
    let open = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let close = doc.add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec()));
    parts.insert(0, Object::Reference(open));
    parts.push(Object::Reference(close));
    set_contents(doc, page_id, parts)
}

/// Existing content streams of a page as a list of references
fn content_parts(doc: &mut Document, page_id: ObjectId) -> DocumentResult<Vec<Object>> {
    let contents = doc.get_dictionary(page_id)?.get(b"Contents").ok().cloned();
    let parts = match contents {
        None | Some(Object::Null) => Vec::new(),
        Some(Object::Reference(id)) => match doc.get_object(id)? {
            Object::Array(items) => items.clone(),
            _ => vec![Object::Reference(id)],
        },
        Some(Object::Array(items)) => items,
        Some(Object::Stream(stream)) => vec![Object::Reference(doc.add_object(stream))],
        Some(other) => {
            return Err(DocumentError::InvalidContent(format!(
                "page {:?} has unsupported Contents entry: {}",
                page_id,
                kind_name(&other)
            )))
        }
    };
    Ok(parts)
}

fn set_contents(doc: &mut Document, page_id: ObjectId, parts: Vec<Object>) -> DocumentResult<()> {
    page_dict_mut(doc, page_id)?.set("Contents", Object::Array(parts));
    Ok(())
}

fn page_dict_mut(doc: &mut Document, page_id: ObjectId) -> DocumentResult<&mut Dictionary> {
    match doc.get_object_mut(page_id)? {
        Object::Dictionary(dict) => Ok(dict),
        _ => Err(DocumentError::InvalidContent(format!(
            "page {:?} is not a dictionary",
            page_id
        ))),
    }
}

/// Where a page's resources dictionary lives
enum ResourcesSlot {
    Inline,
    Indirect(ObjectId),
}

/// Make sure the page carries its own Resources entry and report where it lives
fn resources_slot(doc: &mut Document, page_id: ObjectId) -> DocumentResult<ResourcesSlot> {
    let own = doc.get_dictionary(page_id)?.get(b"Resources").ok().cloned();
    match own {
        Some(Object::Reference(id)) if matches!(doc.get_object(id), Ok(Object::Dictionary(_))) => {
            Ok(ResourcesSlot::Indirect(id))
        }
        Some(Object::Dictionary(_)) => Ok(ResourcesSlot::Inline),
        _ => {
            let inherited = page_resources(doc, page_id)
                .cloned()
                .unwrap_or_else(Dictionary::new);
            page_dict_mut(doc, page_id)?.set("Resources", Object::Dictionary(inherited));
            Ok(ResourcesSlot::Inline)
        }
    }
}

fn resources_mut<'a>(
    doc: &'a mut Document,
    page_id: ObjectId,
    slot: &ResourcesSlot,
) -> DocumentResult<&'a mut Dictionary> {
    let broken = || DocumentError::InvalidContent(format!("page {:?} has broken Resources", page_id));
    match slot {
        ResourcesSlot::Indirect(id) => match doc.get_object_mut(*id)? {
            Object::Dictionary(dict) => Ok(dict),
            _ => Err(broken()),
        },
        ResourcesSlot::Inline => match page_dict_mut(doc, page_id)?.get_mut(b"Resources")? {
            Object::Dictionary(dict) => Ok(dict),
            _ => Err(broken()),
        },
    }
}

/// Register `font_id` in the page's `/Font` resources.
///
/// Returns the resource name actually used: `preferred` when it is free or
/// already bound to `font_id`, otherwise `preferred` with a numeric suffix.
pub fn add_font_resource(
    doc: &mut Document,
    page_id: ObjectId,
    preferred: &str,
    font_id: ObjectId,
) -> DocumentResult<String> {
    let slot = resources_slot(doc, page_id)?;
    let font_entry = resources_mut(doc, page_id, &slot)?.get(b"Font").ok().cloned();

    // Inline /Font dictionaries get copied out, edited and written back;
    // indirect ones are edited in place.
    let indirect_fonts = match &font_entry {
        Some(Object::Reference(id)) if matches!(doc.get_object(*id), Ok(Object::Dictionary(_))) => {
            Some(*id)
        }
        _ => None,
    };
    let mut fonts = match (&font_entry, indirect_fonts) {
        (_, Some(id)) => doc.get_dictionary(id)?.clone(),
        (Some(Object::Dictionary(dict)), None) => dict.clone(),
        _ => Dictionary::new(),
    };

    let name = free_resource_name(&fonts, preferred, font_id);
    fonts.set(name.as_bytes().to_vec(), Object::Reference(font_id));

    match indirect_fonts {
        Some(id) => *doc.get_object_mut(id)? = Object::Dictionary(fonts),
        None => resources_mut(doc, page_id, &slot)?.set("Font", Object::Dictionary(fonts)),
    }
    Ok(name)
}

fn free_resource_name(fonts: &Dictionary, preferred: &str, font_id: ObjectId) -> String {
    let mut candidate = preferred.to_string();
    let mut suffix = 1;
    loop {
        match fonts.get(candidate.as_bytes()) {
            Err(_) => return candidate,
            Ok(Object::Reference(id)) if *id == font_id => return candidate,
            Ok(_) => {
                candidate = format!("{}{}", preferred, suffix);
                suffix += 1;
            }
        }
    }
}
