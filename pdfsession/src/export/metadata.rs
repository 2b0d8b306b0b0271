//! Document information dictionary of output documents.

use lopdf::{Dictionary, Document, Object, StringFormat};

use crate::error::{Result, SessionError};

/// Info entries written to every output document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentInfo {
    /// Document title, taken from the group or document name.
    pub title: String,
    /// Application that assembled the document.
    pub producer: String,
}

impl DocumentInfo {
    /// Info for a document titled `title`, produced by this crate.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            producer: format!("{} {}", crate::NAME, crate::VERSION),
        }
    }
}

/// Write `info` into the document's Info dictionary, creating it if needed.
pub fn set_document_info(doc: &mut Document, info: &DocumentInfo) -> Result<()> {
    let info_id = match doc.trailer.get(b"Info").and_then(Object::as_reference) {
        Ok(id) => id,
        Err(_) => {
            let id = doc.add_object(Dictionary::new());
            doc.trailer.set("Info", Object::Reference(id));
            id
        }
    };

    let Ok(Object::Dictionary(dict)) = doc.get_object_mut(info_id) else {
        return Err(SessionError::assembly("Info entry is not a dictionary"));
    };

    dict.set("Title", text_string(&info.title));
    dict.set("Producer", text_string(&info.producer));
    dict.set("Creator", text_string(crate::NAME));

    Ok(())
}

/// Read the title from a document's Info dictionary.
pub fn document_title(doc: &Document) -> Option<String> {
    let info_id = doc.trailer.get(b"Info").and_then(Object::as_reference).ok()?;
    let dict = doc.get_dictionary(info_id).ok()?;
    match dict.get(b"Title").ok()? {
        Object::String(bytes, _) => decode_text_string(bytes),
        _ => None,
    }
}

/// Encode as a PDF text string: plain bytes for ASCII, UTF-16BE with BOM
/// otherwise.
fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::String(text.as_bytes().to_vec(), StringFormat::Literal);
    }

    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

fn decode_text_string(bytes: &[u8]) -> Option<String> {
    match bytes {
        [0xFE, 0xFF, rest @ ..] => {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16(&units).ok()
        }
        _ => String::from_utf8(bytes.to_vec()).ok(),
    }
}
