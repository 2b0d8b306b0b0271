//! End-to-end scenarios: upload, arrange, export.

use pdfsession::{ArtifactKind, Session, SessionConfig};

use crate::common::{page_markers, source, zip_entries};

#[tokio::test]
async fn test_single_file_single_group() {
    let mut session = Session::new(SessionConfig::default());
    let results = session.add_files(vec![source("alpha.pdf", "a", 3)]).await;
    let file_id = results.into_iter().next().unwrap().unwrap();

    assert_eq!(session.groups().len(), 1);
    let group = &session.groups()[0];
    assert_eq!(group.name(), "alpha");
    let indices: Vec<usize> = group.page_refs().map(|r| r.page_index()).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert!(group.page_refs().all(|r| r.file_id() == file_id));

    let artifact = session.export().await.unwrap().unwrap();
    assert_eq!(artifact.kind, ArtifactKind::Pdf);
    assert_eq!(artifact.file_name, "alpha.pdf");
    assert_eq!(page_markers(&artifact.bytes), vec!["a-0", "a-1", "a-2"]);
}

#[tokio::test]
async fn test_two_files_merged_into_one_group() {
    let mut session = Session::new(SessionConfig::default());
    for result in session
        .add_files(vec![source("a.pdf", "a", 2), source("b.pdf", "b", 1)])
        .await
    {
        result.unwrap();
    }

    // [A:0, A:1, B:0] -> [A:1, B:0, A:0]
    let merged = session.merge_groups(&[0, 1], "merged").unwrap();
    session
        .edit_group(merged, |group| {
            group.move_page(0, 2);
        })
        .unwrap();

    assert_eq!(session.groups().len(), 1);
    let artifact = session.export().await.unwrap().unwrap();
    assert_eq!(artifact.kind, ArtifactKind::Pdf);
    assert_eq!(artifact.file_name, "merged.pdf");
    assert_eq!(page_markers(&artifact.bytes), vec!["a-1", "b-0", "a-0"]);
}

#[tokio::test]
async fn test_multiple_groups_export_archive() {
    let mut session = Session::new(SessionConfig::default());
    for result in session
        .add_files(vec![source("first.pdf", "f", 2), source("second.pdf", "s", 3)])
        .await
    {
        result.unwrap();
    }

    let artifact = session.export().await.unwrap().unwrap();
    assert_eq!(artifact.kind, ArtifactKind::Zip);
    assert_eq!(artifact.file_name, "first.zip");
    assert_eq!(artifact.page_count, 5);

    let entries = zip_entries(&artifact.bytes);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].0, "first.pdf");
    assert_eq!(page_markers(&entries[0].1), vec!["f-0", "f-1"]);
    assert_eq!(entries[1].0, "second.pdf");
    assert_eq!(page_markers(&entries[1].1), vec!["s-0", "s-1", "s-2"]);
}

#[tokio::test]
async fn test_no_groups_exports_nothing() {
    let mut session = Session::new(SessionConfig::default());
    session.add_files(vec![source("a.pdf", "a", 1)]).await;
    session.remove_group(0).unwrap();

    assert!(session.export().await.unwrap().is_none());
    assert_eq!(session.document_name(), "Untitled Document");
}
