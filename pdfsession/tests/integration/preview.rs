//! Page previews through the session's render cache.

use std::time::Duration;

use pdfsession::{PageStatus, RenderEvent, Session, SessionConfig};

use crate::common::{page_markers, source};

#[tokio::test]
async fn test_preview_is_a_single_page_pdf() {
    let mut session = Session::new(SessionConfig::default());
    let file_id = session
        .add_files(vec![source("a.pdf", "a", 3)])
        .await
        .remove(0)
        .unwrap();
    let page_ref = session.page_ref(file_id, 1).unwrap();

    let preview = session.render_cache().page(page_ref).await.unwrap();

    assert_eq!((preview.width, preview.height), (612.0, 792.0));
    assert_eq!(page_markers(&preview.pdf), vec!["a-1"]);
    assert_eq!(session.render_cache().rendered_count(file_id), 1);
}

#[tokio::test]
async fn test_request_page_becomes_ready() {
    let mut session = Session::new(SessionConfig::default());
    let file_id = session
        .add_files(vec![source("a.pdf", "a", 1)])
        .await
        .remove(0)
        .unwrap();
    let page_ref = session.page_ref(file_id, 0).unwrap();
    let cache = session.render_cache().clone();
    let mut events = cache.subscribe();

    assert!(matches!(cache.request_page(page_ref).unwrap(), PageStatus::Pending));
    assert!(matches!(cache.request_page(page_ref).unwrap(), PageStatus::Pending | PageStatus::Ready(_)));

    let event = tokio::time::timeout(Duration::from_secs(10), events.recv())
        .await
        .expect("render did not finish")
        .unwrap();
    assert_eq!(event, RenderEvent::Ready { page_ref });

    match cache.request_page(page_ref).unwrap() {
        PageStatus::Ready(page) => assert_eq!(page.page_ref, page_ref),
        other => panic!("expected a cached page, got {other:?}"),
    }
}

#[tokio::test]
async fn test_preview_of_removed_file_is_rejected() {
    let mut session = Session::new(SessionConfig::default());
    let file_id = session
        .add_files(vec![source("a.pdf", "a", 1)])
        .await
        .remove(0)
        .unwrap();
    let page_ref = session.page_ref(file_id, 0).unwrap();
    session.remove_file(file_id).unwrap();

    assert!(session.render_cache().request_page(page_ref).is_err());
}
