//! Lazy, memoized page previews.
//!
//! The cache renders a page the first time it is requested and keeps the
//! result for the lifetime of the file registration. Every (file, page) slot
//! is in one of three states:
//!
//! - `Ready`: the rendered page is cached.
//! - `Pending`: a render is in flight; callers awaiting the page are parked
//!   on it instead of starting a second render.
//! - `Failed`: the last render failed. The failure is reported once and the
//!   slot is cleared, so the next request retries.
//!
//! Renders run on the blocking pool, bounded by a semaphore. Completion is
//! broadcast as a [`RenderEvent`] to every subscriber.

pub mod renderer;

use std::collections::HashMap;
use std::sync::Arc;

use lopdf::Document;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{Semaphore, broadcast, oneshot};
use tokio::task;
use tracing::{debug, warn};

use crate::config::RenderConfig;
use crate::error::{RenderFailure, Result, SessionError};
use crate::store::{FileId, PageRef, PhysicalFile};

pub use renderer::{PageRenderer, PdfPageRenderer, RenderOptions, RenderedPage};

type RenderOutcome = std::result::Result<Arc<RenderedPage>, RenderFailure>;

/// Current state of a page preview, as seen by a non-blocking request.
#[derive(Debug, Clone)]
pub enum PageStatus {
    /// The preview is available.
    Ready(Arc<RenderedPage>),
    /// A render is in flight.
    Pending,
    /// The last render failed; requesting again retries.
    Failed(RenderFailure),
}

impl PageStatus {
    /// Check if the preview is available.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

/// Notification that a render finished.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    /// The page is now cached.
    Ready {
        /// Rendered page.
        page_ref: PageRef,
    },
    /// The render failed.
    Failed {
        /// Page that failed.
        page_ref: PageRef,
        /// Failure description.
        reason: String,
    },
}

enum Slot {
    Ready(Arc<RenderedPage>),
    Pending {
        waiters: Vec<oneshot::Sender<RenderOutcome>>,
    },
    Failed(RenderFailure),
}

struct CacheEntry {
    document: Arc<Document>,
    page_count: usize,
    slots: HashMap<usize, Slot>,
}

struct Shared {
    renderer: Arc<dyn PageRenderer>,
    config: RenderConfig,
    options: RenderOptions,
    entries: Mutex<HashMap<FileId, CacheEntry>>,
    permits: Arc<Semaphore>,
    events: broadcast::Sender<RenderEvent>,
}

/// Per-file cache of rendered pages.
///
/// Cloning is cheap; clones share the same cache.
#[derive(Clone)]
pub struct RenderCache {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for RenderCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderCache")
            .field("files", &self.shared.entries.lock().len())
            .field("config", &self.shared.config)
            .finish()
    }
}

impl RenderCache {
    /// Create an empty cache that renders with `renderer`.
    pub fn new(renderer: Arc<dyn PageRenderer>, config: RenderConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let permits = Arc::new(Semaphore::new(config.max_concurrent_renders.max(1)));
        let options = RenderOptions {
            compress: config.compress_previews,
        };

        Self {
            shared: Arc::new(Shared {
                renderer,
                config,
                options,
                entries: Mutex::new(HashMap::new()),
                permits,
                events,
            }),
        }
    }

    /// Make the pages of `file` renderable. Registering twice is a no-op.
    pub fn register_file(&self, file: &PhysicalFile) {
        self.shared
            .entries
            .lock()
            .entry(file.id())
            .or_insert_with(|| CacheEntry {
                document: Arc::clone(file.document()),
                page_count: file.page_count(),
                slots: HashMap::new(),
            });
    }

    /// Drop every cached page of a file.
    ///
    /// Callers awaiting an in-flight render of this file receive a render
    /// failure. Returns false if the file was not registered.
    pub fn remove_file(&self, file_id: FileId) -> bool {
        self.shared.entries.lock().remove(&file_id).is_some()
    }

    /// Check whether a file is registered.
    pub fn contains_file(&self, file_id: FileId) -> bool {
        self.shared.entries.lock().contains_key(&file_id)
    }

    /// Request a page without waiting.
    ///
    /// Starts a render on the first request. Must be called from within a
    /// tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file is not registered
    /// - The page index is out of range
    /// - No tokio runtime is available to run the render
    pub fn request_page(&self, page_ref: PageRef) -> Result<PageStatus> {
        let mut entries = self.shared.entries.lock();
        let entry = checked_entry(&mut entries, page_ref)?;

        match entry.slots.get(&page_ref.page_index()) {
            Some(Slot::Ready(page)) => return Ok(PageStatus::Ready(Arc::clone(page))),
            Some(Slot::Pending { .. }) => return Ok(PageStatus::Pending),
            Some(Slot::Failed(_)) => {
                if let Some(Slot::Failed(failure)) = entry.slots.remove(&page_ref.page_index()) {
                    return Ok(PageStatus::Failed(failure));
                }
            }
            None => {}
        }

        let handle = current_runtime()?;
        entry.slots.insert(
            page_ref.page_index(),
            Slot::Pending {
                waiters: Vec::new(),
            },
        );
        let document = Arc::clone(&entry.document);
        drop(entries);

        self.spawn_render(&handle, page_ref, document);
        Ok(PageStatus::Pending)
    }

    /// Get a page, rendering it if needed.
    ///
    /// Joins an in-flight render instead of starting another one.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Render`] if the render fails, and the errors
    /// of [`RenderCache::request_page`] for invalid requests.
    pub async fn page(&self, page_ref: PageRef) -> Result<Arc<RenderedPage>> {
        let (sender, receiver) = oneshot::channel();

        {
            let mut entries = self.shared.entries.lock();
            let entry = checked_entry(&mut entries, page_ref)?;

            match entry.slots.get_mut(&page_ref.page_index()) {
                Some(Slot::Ready(page)) => return Ok(Arc::clone(page)),
                Some(Slot::Pending { waiters }) => waiters.push(sender),
                Some(Slot::Failed(_)) => {
                    if let Some(Slot::Failed(failure)) =
                        entry.slots.remove(&page_ref.page_index())
                    {
                        return Err(failure.into());
                    }
                }
                None => {
                    let handle = current_runtime()?;
                    entry.slots.insert(
                        page_ref.page_index(),
                        Slot::Pending {
                            waiters: vec![sender],
                        },
                    );
                    let document = Arc::clone(&entry.document);
                    drop(entries);
                    self.spawn_render(&handle, page_ref, document);
                }
            }
        }

        match receiver.await {
            Ok(outcome) => outcome.map_err(SessionError::from),
            Err(_) => Err(RenderFailure::new(
                page_ref.file_id(),
                page_ref.page_index(),
                "file was removed while rendering",
            )
            .into()),
        }
    }

    /// Check whether a page is cached.
    pub fn is_ready(&self, page_ref: PageRef) -> bool {
        self.shared
            .entries
            .lock()
            .get(&page_ref.file_id())
            .and_then(|entry| entry.slots.get(&page_ref.page_index()))
            .is_some_and(|slot| matches!(slot, Slot::Ready(_)))
    }

    /// Number of cached pages of a file.
    pub fn rendered_count(&self, file_id: FileId) -> usize {
        self.shared
            .entries
            .lock()
            .get(&file_id)
            .map(|entry| {
                entry
                    .slots
                    .values()
                    .filter(|slot| matches!(slot, Slot::Ready(_)))
                    .count()
            })
            .unwrap_or(0)
    }

    /// Subscribe to render completion events.
    pub fn subscribe(&self) -> broadcast::Receiver<RenderEvent> {
        self.shared.events.subscribe()
    }

    fn spawn_render(&self, handle: &Handle, page_ref: PageRef, document: Arc<Document>) {
        let shared = Arc::clone(&self.shared);

        handle.spawn(async move {
            if shared.config.yield_before_render {
                task::yield_now().await;
            }

            let result = match Arc::clone(&shared.permits).acquire_owned().await {
                Ok(permit) => {
                    let renderer = Arc::clone(&shared.renderer);
                    let options = shared.options.clone();
                    let joined = task::spawn_blocking(move || {
                        let _permit = permit;
                        renderer.render(&document, page_ref, &options)
                    })
                    .await;

                    joined.unwrap_or_else(|e| {
                        Err(RenderFailure::new(
                            page_ref.file_id(),
                            page_ref.page_index(),
                            format!("render task failed: {e}"),
                        ))
                    })
                }
                Err(_) => Err(RenderFailure::new(
                    page_ref.file_id(),
                    page_ref.page_index(),
                    "render permits closed",
                )),
            };

            shared.complete(page_ref, result.map(Arc::new));
        });
    }
}

impl Shared {
    fn complete(&self, page_ref: PageRef, outcome: RenderOutcome) {
        let waiters = {
            let mut entries = self.entries.lock();
            let Some(entry) = entries.get_mut(&page_ref.file_id()) else {
                debug!(page = %page_ref, "render finished for a removed file");
                return;
            };

            let slot = match &outcome {
                Ok(page) => Slot::Ready(Arc::clone(page)),
                Err(failure) => Slot::Failed(failure.clone()),
            };
            match entry.slots.insert(page_ref.page_index(), slot) {
                Some(Slot::Pending { waiters }) => waiters,
                _ => Vec::new(),
            }
        };

        let event = match &outcome {
            Ok(_) => {
                debug!(page = %page_ref, "page rendered");
                RenderEvent::Ready { page_ref }
            }
            Err(failure) => {
                warn!(page = %page_ref, reason = %failure.reason, "page render failed");
                RenderEvent::Failed {
                    page_ref,
                    reason: failure.reason.clone(),
                }
            }
        };

        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }
}

fn checked_entry<'a>(
    entries: &'a mut HashMap<FileId, CacheEntry>,
    page_ref: PageRef,
) -> Result<&'a mut CacheEntry> {
    let file_id = page_ref.file_id();
    let entry = entries
        .get_mut(&file_id)
        .ok_or(SessionError::UnknownFile { file_id })?;

    if page_ref.page_index() >= entry.page_count {
        return Err(SessionError::page_out_of_range(
            file_id,
            page_ref.page_index() as i64,
            entry.page_count,
        ));
    }

    Ok(entry)
}

fn current_runtime() -> Result<Handle> {
    Handle::try_current()
        .map_err(|e| SessionError::runtime(format!("Page rendering needs a tokio runtime: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::file::tests::create_physical_file;
    use futures::future::join_all;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts renders and fails the first `failures` attempts.
    #[derive(Default)]
    struct CountingRenderer {
        calls: AtomicUsize,
        failures: usize,
    }

    impl CountingRenderer {
        fn failing(failures: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                failures,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl PageRenderer for CountingRenderer {
        fn render(
            &self,
            document: &Document,
            page_ref: PageRef,
            options: &RenderOptions,
        ) -> std::result::Result<RenderedPage, RenderFailure> {
            let attempt = self.calls.fetch_add(1, Ordering::SeqCst);
            if attempt < self.failures {
                return Err(RenderFailure::new(
                    page_ref.file_id(),
                    page_ref.page_index(),
                    "broken page",
                ));
            }
            PdfPageRenderer.render(document, page_ref, options)
        }
    }

    fn cache_with(renderer: Arc<CountingRenderer>) -> RenderCache {
        RenderCache::new(renderer, RenderConfig::default())
    }

    #[tokio::test]
    async fn test_concurrent_requests_render_once() {
        let renderer = Arc::new(CountingRenderer::default());
        let cache = cache_with(Arc::clone(&renderer));
        let file = create_physical_file("a.pdf", 2);
        cache.register_file(&file);
        let page_ref = file.page(1).unwrap();

        let results = join_all((0..8).map(|_| cache.page(page_ref))).await;

        let first = results[0].as_ref().unwrap();
        for result in &results {
            assert!(Arc::ptr_eq(first, result.as_ref().unwrap()));
        }
        assert_eq!(renderer.calls(), 1);
        assert!(cache.is_ready(page_ref));
        assert_eq!(cache.rendered_count(file.id()), 1);
    }

    #[tokio::test]
    async fn test_request_page_is_memoized() {
        let renderer = Arc::new(CountingRenderer::default());
        let cache = cache_with(Arc::clone(&renderer));
        let file = create_physical_file("a.pdf", 1);
        cache.register_file(&file);
        let page_ref = file.page(0).unwrap();

        assert!(matches!(cache.request_page(page_ref).unwrap(), PageStatus::Pending));
        cache.page(page_ref).await.unwrap();

        assert!(cache.request_page(page_ref).unwrap().is_ready());
        assert!(cache.request_page(page_ref).unwrap().is_ready());
        assert_eq!(renderer.calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_is_reported_then_retried() {
        let renderer = Arc::new(CountingRenderer::failing(1));
        let cache = cache_with(Arc::clone(&renderer));
        let file = create_physical_file("a.pdf", 1);
        cache.register_file(&file);
        let page_ref = file.page(0).unwrap();

        let err = cache.page(page_ref).await.unwrap_err();
        assert!(matches!(err, SessionError::Render(ref f) if f.reason == "broken page"));

        match cache.request_page(page_ref).unwrap() {
            PageStatus::Failed(failure) => assert_eq!(failure.page_index, 0),
            other => panic!("expected failure, got {other:?}"),
        }

        let page = cache.page(page_ref).await.unwrap();
        assert_eq!(page.page_ref, page_ref);
        assert_eq!(renderer.calls(), 2);
    }

    #[tokio::test]
    async fn test_ready_event_is_broadcast() {
        let cache = cache_with(Arc::new(CountingRenderer::default()));
        let file = create_physical_file("a.pdf", 1);
        cache.register_file(&file);
        let page_ref = file.page(0).unwrap();
        let mut events = cache.subscribe();

        cache.page(page_ref).await.unwrap();

        assert_eq!(events.recv().await.unwrap(), RenderEvent::Ready { page_ref });
    }

    #[tokio::test]
    async fn test_unknown_file_and_out_of_range() {
        let cache = cache_with(Arc::new(CountingRenderer::default()));
        let file = create_physical_file("a.pdf", 1);
        let page_ref = file.page(0).unwrap();

        assert!(matches!(
            cache.request_page(page_ref),
            Err(SessionError::UnknownFile { .. })
        ));

        cache.register_file(&file);
        assert!(cache.contains_file(file.id()));
        assert!(cache.remove_file(file.id()));
        assert!(!cache.remove_file(file.id()));
        assert!(matches!(
            cache.page(page_ref).await,
            Err(SessionError::UnknownFile { .. })
        ));
    }

    #[test]
    fn test_request_outside_runtime() {
        let cache = cache_with(Arc::new(CountingRenderer::default()));
        let file = create_physical_file("a.pdf", 1);
        cache.register_file(&file);

        let err = cache.request_page(file.page(0).unwrap()).unwrap_err();
        assert!(matches!(err, SessionError::Runtime { .. }));
    }
}
