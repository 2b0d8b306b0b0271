//! Saving and restoring session layouts.

use std::collections::HashMap;
use std::sync::Arc;

use pdfsession::render::PdfPageRenderer;
use pdfsession::{FileLoader, MemorySessionStore, Session, SessionConfig, SessionStore, SourceFile};

use crate::common::{marked_pdf, page_markers, zip_entries};

#[tokio::test]
async fn test_snapshot_round_trip_through_store() {
    let uploads: HashMap<&str, Vec<u8>> =
        HashMap::from([("a.pdf", marked_pdf("a", 2)), ("b.pdf", marked_pdf("b", 2))]);

    let mut session = Session::new(SessionConfig::default());
    for name in ["a.pdf", "b.pdf"] {
        session
            .add_files(vec![SourceFile::new(name, uploads[name].clone())])
            .await
            .remove(0)
            .unwrap();
    }
    session.merge_groups(&[1, 0], "reordered").unwrap();
    session.split_group(0, 3, "tail").unwrap();
    let expected = session.export().await.unwrap().unwrap();

    let store = MemorySessionStore::new();
    store.save(session.id(), &session.snapshot()).await.unwrap();
    session.mark_saved();

    let snapshot = store.load(session.id()).await.unwrap().unwrap();
    let mut restored = Session::resume(
        snapshot.session_id,
        SessionConfig::default(),
        Arc::new(PdfPageRenderer),
    );
    let loader = FileLoader::new();
    for file in &snapshot.files {
        let bytes = uploads[file.name.as_str()].clone();
        let loaded = loader
            .load_as(file.id, SourceFile::new(file.name.clone(), bytes))
            .await
            .unwrap();
        restored.insert_file(loaded);
    }
    restored.restore_groups(&snapshot).unwrap();

    assert_eq!(restored.id(), session.id());
    assert_eq!(restored.groups(), session.groups());
    assert!(!restored.has_unsaved_changes());

    let actual = restored.export().await.unwrap().unwrap();
    assert_eq!(actual.file_name, expected.file_name);
    assert_eq!(actual.bytes, expected.bytes);
    assert!(!page_markers(&zip_entries(&actual.bytes)[0].1).is_empty());
}

#[tokio::test]
async fn test_restore_without_files_fails() {
    let mut session = Session::new(SessionConfig::default());
    session
        .add_files(vec![SourceFile::new("a.pdf", marked_pdf("a", 1))])
        .await
        .remove(0)
        .unwrap();
    let snapshot = session.snapshot();

    let mut empty = Session::new(SessionConfig::default());
    assert!(empty.restore_groups(&snapshot).is_err());
    assert!(empty.groups().is_empty());
}
