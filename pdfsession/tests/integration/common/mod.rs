//! Fixture builders shared by the integration tests.
//!
//! Test documents are synthesized with lopdf. Every page draws a marker
//! string such as `a-2` (label `a`, page index 2) so tests can tell which
//! source page ended up where in an output document.

#![allow(dead_code)]

use std::io::{Cursor, Read};

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use pdfsession::SourceFile;

/// Build a PDF with `pages` pages whose markers are `{label}-{index}`.
pub fn marked_pdf(label: &str, pages: usize) -> Vec<u8> {
    let mut doc = marked_document(label, pages);
    save(&mut doc)
}

/// Build a PDF whose first page links to its last page.
pub fn linked_pdf(label: &str, pages: usize) -> Vec<u8> {
    let mut doc = marked_document(label, pages);
    let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
    let (first, last) = (page_ids[0], page_ids[pages - 1]);

    let link_id = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Link",
        "Rect" => vec![72.into(), 700.into(), 200.into(), 720.into()],
        "Dest" => vec![last.into(), "Fit".into()],
    });
    if let Ok(Object::Dictionary(page)) = doc.get_object_mut(first) {
        page.set("Annots", vec![Object::Reference(link_id)]);
    }

    save(&mut doc)
}

/// A named source file built by [`marked_pdf`].
pub fn source(name: &str, label: &str, pages: usize) -> SourceFile {
    SourceFile::new(name, marked_pdf(label, pages))
}

/// Markers of every page of a PDF, in page order.
pub fn page_markers(bytes: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(bytes).expect("output is not a valid PDF");
    doc.get_pages()
        .into_values()
        .map(|page_id| {
            let content = doc.get_page_content(page_id).unwrap_or_default();
            marker(&content).unwrap_or_else(|| "?".to_string())
        })
        .collect()
}

/// Entries of a ZIP archive as (name, bytes), in archive order.
pub fn zip_entries(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("invalid archive");
    (0..archive.len())
        .map(|index| {
            let mut entry = archive.by_index(index).unwrap();
            let mut content = Vec::new();
            entry.read_to_end(&mut content).unwrap();
            (entry.name().to_string(), content)
        })
        .collect()
}

fn marked_document(label: &str, pages: usize) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for index in 0..pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new(
                    "Tj",
                    vec![Object::string_literal(format!("{label}-{index}"))],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("content encodes"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    doc
}

fn save(doc: &mut Document) -> Vec<u8> {
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("fixture saves");
    bytes
}

fn marker(content: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(content);
    let start = text.find('(')? + 1;
    let end = start + text[start..].find(')')?;
    Some(text[start..end].to_string())
}
