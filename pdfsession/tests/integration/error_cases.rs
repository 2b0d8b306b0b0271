//! Rejected uploads and invalid requests.

use pdfsession::{Session, SessionConfig, SessionError, SourceFile};

use crate::common::source;

#[tokio::test]
async fn test_corrupt_upload_does_not_affect_others() {
    let mut session = Session::new(SessionConfig::default());

    let results = session
        .add_files(vec![
            source("good.pdf", "g", 2),
            SourceFile::new("broken.pdf", b"%PDF-1.7\nnot really".to_vec()),
            source("also-good.pdf", "o", 1),
        ])
        .await;

    assert!(results[0].is_ok());
    assert!(matches!(
        results[1],
        Err(SessionError::CorruptDocument { ref name, .. }) if name == "broken.pdf"
    ));
    assert!(results[2].is_ok());

    let names: Vec<&str> = session.groups().iter().map(|g| g.name()).collect();
    assert_eq!(names, vec!["good", "also-good"]);
}

#[tokio::test]
async fn test_page_index_out_of_range() {
    let mut session = Session::new(SessionConfig::default());
    let file_id = session
        .add_files(vec![source("a.pdf", "a", 2)])
        .await
        .remove(0)
        .unwrap();

    let err = session.page_ref(file_id, 2).unwrap_err();
    assert!(matches!(
        err,
        SessionError::PageOutOfRange {
            page_index: 2,
            page_count: 2,
            ..
        }
    ));
    assert!(!err.is_recoverable());

    let file = session.files().get(file_id).unwrap();
    assert!(file.page_signed(-1).is_err());
}

#[tokio::test]
async fn test_invalid_group_handles() {
    let mut session = Session::new(SessionConfig::default());
    session.add_files(vec![source("a.pdf", "a", 1)]).await;

    assert!(matches!(
        session.rename_group(3, "x"),
        Err(SessionError::UnknownGroup { index: 3, len: 1 })
    ));
    assert!(session.split_group(1, 0, "x").is_err());
    assert!(session.remove_group(1).is_err());
}
