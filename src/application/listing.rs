//! Incremental "load more" list over the content store.
//!
//! A [`ListController`] starts from a seed page rendered by the server and
//! grows one page at a time. Fetching is split into [`ListController::trigger`]
//! and [`ListController::resolve`] so an event loop can keep polling input
//! while a page is in flight; [`ListController::load_more`] does both for
//! callers that simply await.

use tracing::debug;

use crate::application::content::{ContentError, ContentQuery};
use crate::domain::{
    pagination::{PageRequest, PageSize},
    posts::PostSummary,
};

/// Whether a page of `returned` items leaves more posts to fetch.
///
/// Counts posts that survived decoding, not raw store records: a page
/// shortened by malformed records is treated as the last one.
pub fn has_more_after(returned: usize, page_size: PageSize) -> bool {
    returned >= page_size.get()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListPhase {
    Idle,
    Loading,
    Exhausted,
}

/// A fetch the controller has agreed to start. Hand it back to `resolve`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingFetch {
    request: PageRequest,
    ticket: u64,
}

impl PendingFetch {
    pub fn request(&self) -> PageRequest {
        self.request
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Fetch(PendingFetch),
    /// A fetch is already in flight; nothing is queued.
    Busy,
    /// The last page was short; no further fetches are permitted.
    Exhausted,
}

#[derive(Debug)]
pub enum Resolution {
    /// A full page arrived.
    Appended { added: usize },
    /// A short page arrived; the list is complete.
    Exhausted { added: usize },
    /// The fetch failed; the list is unchanged and the range can be retried.
    Failed(ContentError),
    /// The result belongs to a fetch that is no longer in flight.
    Stale,
    /// `load_more` was called while busy or exhausted.
    Ignored,
}

#[derive(Debug)]
pub struct ListController {
    items: Vec<PostSummary>,
    page_size: PageSize,
    phase: ListPhase,
    in_flight: Option<u64>,
    next_ticket: u64,
    last_error: Option<String>,
}

impl ListController {
    /// Start from a server-rendered first page.
    pub fn seeded(seed: Vec<PostSummary>, page_size: PageSize) -> Self {
        let phase = if has_more_after(seed.len(), page_size) {
            ListPhase::Idle
        } else {
            ListPhase::Exhausted
        };

        Self {
            items: seed,
            page_size,
            phase,
            in_flight: None,
            next_ticket: 0,
            last_error: None,
        }
    }

    pub fn items(&self) -> &[PostSummary] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn phase(&self) -> ListPhase {
        self.phase
    }

    pub fn has_more(&self) -> bool {
        self.phase != ListPhase::Exhausted
    }

    pub fn is_loading(&self) -> bool {
        self.phase == ListPhase::Loading
    }

    /// Message of the most recent failed fetch, cleared by the next success.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// React to a "load more" action.
    pub fn trigger(&mut self) -> Trigger {
        match self.phase {
            ListPhase::Loading => Trigger::Busy,
            ListPhase::Exhausted => Trigger::Exhausted,
            ListPhase::Idle => match PageRequest::following(self.items.len(), self.page_size) {
                Ok(request) => {
                    let ticket = self.next_ticket;
                    self.next_ticket += 1;
                    self.in_flight = Some(ticket);
                    self.phase = ListPhase::Loading;
                    debug!(
                        target = "travelora::listing",
                        range = %request,
                        "starting page fetch"
                    );
                    Trigger::Fetch(PendingFetch { request, ticket })
                }
                // The index space is used up; nothing more can exist past it.
                Err(_) => {
                    self.phase = ListPhase::Exhausted;
                    Trigger::Exhausted
                }
            },
        }
    }

    /// Apply the outcome of a fetch started by `trigger`.
    pub fn resolve(
        &mut self,
        pending: PendingFetch,
        result: Result<Vec<PostSummary>, ContentError>,
    ) -> Resolution {
        if self.phase != ListPhase::Loading || self.in_flight != Some(pending.ticket) {
            debug!(
                target = "travelora::listing",
                range = %pending.request,
                "discarding result of abandoned fetch"
            );
            return Resolution::Stale;
        }
        self.in_flight = None;

        match result {
            Ok(page) => {
                let added = page.len();
                let full = added >= pending.request.len();
                self.items.extend(page);
                self.last_error = None;
                debug!(
                    target = "travelora::listing",
                    range = %pending.request,
                    added,
                    total = self.items.len(),
                    "page appended"
                );
                if full {
                    self.phase = ListPhase::Idle;
                    Resolution::Appended { added }
                } else {
                    self.phase = ListPhase::Exhausted;
                    Resolution::Exhausted { added }
                }
            }
            Err(err) => {
                self.phase = ListPhase::Idle;
                self.last_error = Some(err.to_string());
                Resolution::Failed(err)
            }
        }
    }

    /// Give up on the fetch in flight. Its result will be reported as stale.
    pub fn abandon(&mut self) {
        if self.phase == ListPhase::Loading {
            self.in_flight = None;
            self.phase = ListPhase::Idle;
        }
    }

    /// Trigger, fetch and resolve in one step.
    pub async fn load_more(&mut self, content: &dyn ContentQuery) -> Resolution {
        match self.trigger() {
            Trigger::Fetch(pending) => {
                let result = content.fetch_page(pending.request()).await;
                self.resolve(pending, result)
            }
            Trigger::Busy | Trigger::Exhausted => Resolution::Ignored,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use time::macros::datetime;
    use tokio::sync::Mutex;

    use super::*;
    use crate::domain::posts::PostDetail;

    fn post(index: usize) -> PostSummary {
        PostSummary {
            id: format!("post-{index}"),
            title: format!("Story {index}"),
            slug: format!("story-{index}"),
            excerpt: String::new(),
            published_at: datetime!(2024-01-01 00:00 UTC),
            main_image: None,
            author: None,
            categories: None,
        }
    }

    fn posts(range: std::ops::Range<usize>) -> Vec<PostSummary> {
        range.map(post).collect()
    }

    fn six() -> PageSize {
        PageSize::new(6).expect("page size")
    }

    #[derive(Default)]
    struct ScriptedContent {
        pages: Mutex<VecDeque<Result<Vec<PostSummary>, ContentError>>>,
        requests: Mutex<Vec<PageRequest>>,
    }

    impl ScriptedContent {
        fn new(pages: Vec<Result<Vec<PostSummary>, ContentError>>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ContentQuery for ScriptedContent {
        async fn fetch_page(&self, range: PageRequest) -> Result<Vec<PostSummary>, ContentError> {
            self.requests.lock().await.push(range);
            self.pages
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }

        async fn fetch_post(&self, _slug: &str) -> Result<Option<PostDetail>, ContentError> {
            Ok(None)
        }
    }

    #[test]
    fn full_seed_starts_idle() {
        let controller = ListController::seeded(posts(0..6), six());
        assert_eq!(controller.phase(), ListPhase::Idle);
        assert!(controller.has_more());
        assert_eq!(controller.len(), 6);
    }

    #[test]
    fn short_seed_starts_exhausted() {
        let mut controller = ListController::seeded(posts(0..4), six());
        assert_eq!(controller.phase(), ListPhase::Exhausted);
        assert!(!controller.has_more());
        assert_eq!(controller.trigger(), Trigger::Exhausted);
    }

    #[test]
    fn empty_seed_starts_exhausted() {
        let controller = ListController::seeded(Vec::new(), six());
        assert_eq!(controller.phase(), ListPhase::Exhausted);
        assert!(controller.is_empty());
    }

    #[test]
    fn trigger_requests_range_after_loaded_items() {
        let mut controller = ListController::seeded(posts(0..6), six());
        let Trigger::Fetch(pending) = controller.trigger() else {
            panic!("expected a fetch");
        };
        assert_eq!(pending.request(), PageRequest::new(6, 12).expect("range"));
        assert!(controller.is_loading());
    }

    #[test]
    fn trigger_while_loading_is_ignored() {
        let mut controller = ListController::seeded(posts(0..6), six());
        assert!(matches!(controller.trigger(), Trigger::Fetch(_)));
        assert_eq!(controller.trigger(), Trigger::Busy);
        assert_eq!(controller.trigger(), Trigger::Busy);
        assert!(controller.is_loading());
    }

    #[test]
    fn full_page_returns_to_idle() {
        let mut controller = ListController::seeded(posts(0..6), six());
        let Trigger::Fetch(pending) = controller.trigger() else {
            panic!("expected a fetch");
        };
        let resolution = controller.resolve(pending, Ok(posts(6..12)));
        assert!(matches!(resolution, Resolution::Appended { added: 6 }));
        assert_eq!(controller.phase(), ListPhase::Idle);
        assert_eq!(controller.len(), 12);
        assert!(controller.has_more());
    }

    #[test]
    fn short_page_exhausts_list() {
        let mut controller = ListController::seeded(posts(0..6), six());
        let Trigger::Fetch(pending) = controller.trigger() else {
            panic!("expected a fetch");
        };
        let resolution = controller.resolve(pending, Ok(posts(6..9)));
        assert!(matches!(resolution, Resolution::Exhausted { added: 3 }));
        assert_eq!(controller.len(), 9);
        assert!(!controller.has_more());
        assert_eq!(controller.trigger(), Trigger::Exhausted);
    }

    #[test]
    fn empty_page_exhausts_list() {
        let mut controller = ListController::seeded(posts(0..6), six());
        let Trigger::Fetch(pending) = controller.trigger() else {
            panic!("expected a fetch");
        };
        let resolution = controller.resolve(pending, Ok(Vec::new()));
        assert!(matches!(resolution, Resolution::Exhausted { added: 0 }));
        assert_eq!(controller.len(), 6);
    }

    #[test]
    fn failed_fetch_keeps_items_and_allows_retry() {
        let mut controller = ListController::seeded(posts(0..6), six());
        let Trigger::Fetch(pending) = controller.trigger() else {
            panic!("expected a fetch");
        };
        let resolution = controller.resolve(pending, Err(ContentError::transport("reset")));
        assert!(matches!(resolution, Resolution::Failed(_)));
        assert_eq!(controller.phase(), ListPhase::Idle);
        assert_eq!(controller.len(), 6);
        assert!(
            controller
                .last_error()
                .is_some_and(|message| message.contains("reset"))
        );

        let Trigger::Fetch(retry) = controller.trigger() else {
            panic!("expected a retry");
        };
        assert_eq!(retry.request(), pending.request());

        controller.resolve(retry, Ok(posts(6..12)));
        assert!(controller.last_error().is_none());
    }

    #[test]
    fn abandoned_fetch_result_is_discarded() {
        let mut controller = ListController::seeded(posts(0..6), six());
        let Trigger::Fetch(pending) = controller.trigger() else {
            panic!("expected a fetch");
        };
        controller.abandon();
        assert_eq!(controller.phase(), ListPhase::Idle);

        let resolution = controller.resolve(pending, Ok(posts(6..12)));
        assert!(matches!(resolution, Resolution::Stale));
        assert_eq!(controller.len(), 6);
    }

    #[test]
    fn result_of_superseded_fetch_is_discarded() {
        let mut controller = ListController::seeded(posts(0..6), six());
        let Trigger::Fetch(first) = controller.trigger() else {
            panic!("expected a fetch");
        };
        controller.abandon();
        let Trigger::Fetch(second) = controller.trigger() else {
            panic!("expected a fetch");
        };

        assert!(matches!(
            controller.resolve(first, Ok(posts(100..106))),
            Resolution::Stale
        ));
        assert!(controller.is_loading());
        assert!(matches!(
            controller.resolve(second, Ok(posts(6..12))),
            Resolution::Appended { added: 6 }
        ));
        assert_eq!(controller.items()[6].id, "post-6");
    }

    #[test]
    fn order_is_concatenation_of_pages() {
        let mut controller = ListController::seeded(posts(0..2), PageSize::new(2).expect("size"));
        for page in [vec![post(9), post(3)], vec![post(3), post(1)]] {
            let Trigger::Fetch(pending) = controller.trigger() else {
                panic!("expected a fetch");
            };
            controller.resolve(pending, Ok(page));
        }
        let ids: Vec<_> = controller.items().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(
            ids,
            ["post-0", "post-1", "post-9", "post-3", "post-3", "post-1"]
        );
    }

    #[tokio::test]
    async fn load_more_grows_by_page_size_until_short_page() {
        let content = ScriptedContent::new(vec![
            Ok(posts(6..12)),
            Ok(posts(12..18)),
            Ok(posts(18..20)),
        ]);
        let mut controller = ListController::seeded(posts(0..6), six());

        for expected in [12, 18] {
            let resolution = controller.load_more(&content).await;
            assert!(matches!(resolution, Resolution::Appended { added: 6 }));
            assert_eq!(controller.len(), expected);
            assert!(controller.has_more());
        }

        assert!(matches!(
            controller.load_more(&content).await,
            Resolution::Exhausted { added: 2 }
        ));
        assert!(matches!(
            controller.load_more(&content).await,
            Resolution::Ignored
        ));

        let requests = content.requests.lock().await.clone();
        let starts: Vec<_> = requests.iter().map(PageRequest::start).collect();
        assert_eq!(starts, [6, 12, 18]);
    }

    #[tokio::test]
    async fn load_more_on_short_seed_issues_no_fetch() {
        let content = ScriptedContent::default();
        let mut controller = ListController::seeded(posts(0..4), six());
        assert!(matches!(
            controller.load_more(&content).await,
            Resolution::Ignored
        ));
        assert!(content.requests.lock().await.is_empty());
    }
}
