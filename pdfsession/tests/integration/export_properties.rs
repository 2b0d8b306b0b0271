//! Properties of the export engine.

use lopdf::{Document, Object};
use pdfsession::export::{CopyBatch, DocumentAssembler};
use pdfsession::{MissingFilePolicy, PageGroup, Session, SessionConfig, SessionError, SourceFile};

use crate::common::{linked_pdf, page_markers, source};

async fn loaded(files: Vec<SourceFile>) -> Session {
    let mut session = Session::new(SessionConfig::default());
    for result in session.add_files(files).await {
        result.unwrap();
    }
    session
}

#[tokio::test]
async fn test_export_is_deterministic() {
    let mut session = loaded(vec![source("a.pdf", "a", 3), source("b.pdf", "b", 2)]).await;
    session.merge_groups(&[1, 0], "mixed").unwrap();

    let first = session.export().await.unwrap().unwrap();
    let second = session.export().await.unwrap().unwrap();

    assert_eq!(page_markers(&first.bytes), page_markers(&second.bytes));
    assert_eq!(first.bytes, second.bytes);
}

#[tokio::test]
async fn test_archive_export_is_deterministic() {
    let session = loaded(vec![source("a.pdf", "a", 1), source("b.pdf", "b", 1)]).await;

    let first = session.export().await.unwrap().unwrap();
    let second = session.export().await.unwrap().unwrap();

    assert_eq!(first.bytes, second.bytes);
}

#[tokio::test]
async fn test_duplicate_page_fidelity() {
    let mut session = loaded(vec![source("a.pdf", "a", 2)]).await;
    let first = session.groups()[0].pages()[0].id();
    session
        .edit_group(0, |group| {
            let copy = group.duplicate(first).unwrap();
            let position = group.position(copy).unwrap();
            group.move_page(position, group.len());
        })
        .unwrap();

    let artifact = session.export().await.unwrap().unwrap();
    assert_eq!(page_markers(&artifact.bytes), vec!["a-0", "a-1", "a-0"]);

    let doc = Document::load_mem(&artifact.bytes).unwrap();
    let kids: Vec<_> = doc.get_pages().into_values().collect();
    assert_ne!(kids[0], kids[2]);
}

#[tokio::test]
async fn test_shared_page_is_copied_once() {
    let session = loaded(vec![source("a.pdf", "a", 4), source("b.pdf", "b", 1)]).await;
    let a = session.files().iter().next().unwrap().clone();
    let b = session.files().iter().nth(1).unwrap().clone();

    let groups = vec![
        PageGroup::from_refs("one", [a.page(3).unwrap(), b.page(0).unwrap()]),
        PageGroup::from_refs("two", [a.page(3).unwrap(), a.page(1).unwrap()]),
    ];

    let output = DocumentAssembler::new()
        .create_document_from(&groups, session.files(), "both")
        .await
        .unwrap();

    assert_eq!(
        output.statistics.batches,
        vec![
            CopyBatch {
                file_id: a.id(),
                page_indices: vec![1, 3],
            },
            CopyBatch {
                file_id: b.id(),
                page_indices: vec![0],
            },
        ]
    );
    assert_eq!(output.statistics.pages_copied, 3);
    assert_eq!(output.page_count(), 4);
}

#[tokio::test]
async fn test_removed_file_pages_are_omitted() {
    let mut session = loaded(vec![source("a.pdf", "a", 2), source("b.pdf", "b", 2)]).await;
    let b_id = session.files().iter().nth(1).unwrap().id();
    session.merge_groups(&[0, 1], "all").unwrap();

    session.remove_file(b_id).unwrap();

    let artifact = session.export().await.unwrap().unwrap();
    assert_eq!(page_markers(&artifact.bytes), vec!["a-0", "a-1"]);
    assert_eq!(artifact.page_count, 2);
}

#[tokio::test]
async fn test_removed_file_fails_with_strict_policy() {
    let config = SessionConfig {
        missing_file_policy: MissingFilePolicy::Fail,
        ..SessionConfig::default()
    };
    let mut session = Session::new(config);
    for result in session
        .add_files(vec![source("a.pdf", "a", 1), source("b.pdf", "b", 1)])
        .await
    {
        result.unwrap();
    }
    let b_id = session.files().iter().nth(1).unwrap().id();
    session.merge_groups(&[0, 1], "all").unwrap();
    session.remove_file(b_id).unwrap();

    let err = session.export().await.unwrap_err();
    assert!(matches!(err, SessionError::MissingSourceFile { file_id } if file_id == b_id));
}

#[tokio::test]
async fn test_links_between_exported_pages_survive() {
    let session = loaded(vec![SourceFile::new("linked.pdf", linked_pdf("l", 3))]).await;

    let artifact = session.export().await.unwrap().unwrap();
    let doc = Document::load_mem(&artifact.bytes).unwrap();
    let kids: Vec<_> = doc.get_pages().into_values().collect();

    assert_eq!(link_target(&doc, kids[0]), Some(Object::Reference(kids[2])));
}

#[tokio::test]
async fn test_links_to_pages_left_out_are_nulled() {
    let mut session = loaded(vec![SourceFile::new("linked.pdf", linked_pdf("l", 3))]).await;
    session.edit_group(0, |group| group.remove_at(2)).unwrap();

    let artifact = session.export().await.unwrap().unwrap();
    let doc = Document::load_mem(&artifact.bytes).unwrap();
    let first = doc.get_pages()[&1];

    assert_eq!(link_target(&doc, first), Some(Object::Null));
}

/// First element of the `/Dest` of the first annotation on a page.
fn link_target(doc: &Document, page_id: lopdf::ObjectId) -> Option<Object> {
    let page = doc.get_dictionary(page_id).ok()?;
    let annots = page.get(b"Annots").ok()?.as_array().ok()?;
    let annot_id = annots.first()?.as_reference().ok()?;
    let annot = doc.get_dictionary(annot_id).ok()?;
    let dest = annot.get(b"Dest").ok()?.as_array().ok()?;
    dest.first().cloned()
}
