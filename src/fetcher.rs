use tracing::{debug, info, warn};

use crate::api::{Api, ApiError};
use crate::filter::FilterState;
use crate::models::{PostPage, PostSummary};
use crate::session::Session;

#[derive(Debug, Clone, PartialEq)]
pub enum ListingView {
    Idle,
    Loading,
    Loaded(PostPage),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct FetchTicket {
    generation: u64,
    filter: FilterState,
    token: Option<String>,
}

impl FetchTicket {
    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Applied,
    Stale,
    Failed,
    // Credential rejected and cleared, fetch again logged out
    Reload,
}

#[derive(Debug)]
pub struct ListingFetcher {
    generation: u64,
    current: Option<FilterState>,
    view: ListingView,
}

impl Default for ListingFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ListingFetcher {
    pub fn new() -> Self {
        Self {
            generation: 0,
            current: None,
            view: ListingView::Idle,
        }
    }

    pub fn view(&self) -> &ListingView {
        &self.view
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.view, ListingView::Loading)
    }

    pub fn posts(&self) -> &[PostSummary] {
        match &self.view {
            ListingView::Loaded(page) => &page.posts,
            _ => &[],
        }
    }

    pub fn posts_mut(&mut self) -> Option<&mut Vec<PostSummary>> {
        match &mut self.view {
            ListingView::Loaded(page) => Some(&mut page.posts),
            _ => None,
        }
    }

    pub fn begin(&mut self, filter: &FilterState, session: &Session<'_>) -> FetchTicket {
        self.generation += 1;
        self.current = Some(filter.clone());
        self.view = ListingView::Loading;
        let token = session.token();
        debug!(
            generation = self.generation,
            authenticated = token.is_some(),
            "listing fetch started"
        );
        FetchTicket {
            generation: self.generation,
            filter: filter.clone(),
            token,
        }
    }

    pub fn complete(
        &mut self,
        ticket: FetchTicket,
        result: Result<PostPage, ApiError>,
        session: &Session<'_>,
    ) -> FetchStatus {
        if ticket.generation != self.generation || self.current.as_ref() != Some(&ticket.filter) {
            debug!(
                generation = ticket.generation,
                latest = self.generation,
                "discarding stale listing response"
            );
            return FetchStatus::Stale;
        }

        match result {
            Ok(page) => {
                info!(
                    posts = page.posts.len(),
                    last_page = page.paginator.last_page,
                    "listing loaded"
                );
                self.view = ListingView::Loaded(page);
                FetchStatus::Applied
            }
            Err(ApiError::Unauthorized) if ticket.token.is_some() => {
                warn!("listing request rejected the session token; reloading logged out");
                session.invalidate();
                self.view = ListingView::Idle;
                FetchStatus::Reload
            }
            Err(e) => {
                warn!(error = %e, "listing request failed");
                self.view = ListingView::Failed(format!("Could not load postings. {}", e.user_message()));
                FetchStatus::Failed
            }
        }
    }

    pub async fn fetch(&mut self, api: &dyn Api, filter: &FilterState, session: &Session<'_>) -> FetchStatus {
        let ticket = self.begin(filter, session);
        let result = api.list_posts(ticket.filter(), ticket.token()).await;
        self.complete(ticket, result, session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::FakeApi;
    use crate::db::Database;
    use crate::models::{Paginator, RoleTag, SortOrder};

    fn page_with(ids: &[&str], last_page: u32) -> PostPage {
        PostPage {
            posts: ids
                .iter()
                .map(|id| PostSummary {
                    id: id.to_string(),
                    company_name: "Company".to_string(),
                    position_title: "Intern".to_string(),
                    location: String::new(),
                    profile_image_key: None,
                    tags: Vec::new(),
                    is_bookmarked: false,
                    employment_end_date: None,
                    domain: None,
                })
                .collect(),
            paginator: Paginator { last_page },
        }
    }

    #[test]
    fn test_late_response_does_not_overwrite_newer() {
        let db = Database::open_in_memory().unwrap();
        let session = Session::new(&db);
        let mut fetcher = ListingFetcher::new();

        let first = FilterState::default();
        let mut second = FilterState::default();
        second.order = SortOrder::Deadline;

        let ticket_a = fetcher.begin(&first, &session);
        let ticket_b = fetcher.begin(&second, &session);

        assert_eq!(
            fetcher.complete(ticket_b, Ok(page_with(&["b"], 2)), &session),
            FetchStatus::Applied
        );
        assert_eq!(
            fetcher.complete(ticket_a, Ok(page_with(&["a"], 9)), &session),
            FetchStatus::Stale
        );

        assert_eq!(fetcher.view(), &ListingView::Loaded(page_with(&["b"], 2)));
    }

    #[test]
    fn test_stale_error_is_ignored() {
        let db = Database::open_in_memory().unwrap();
        let session = Session::new(&db);
        session.store("jwt").unwrap();
        let mut fetcher = ListingFetcher::new();

        let ticket_a = fetcher.begin(&FilterState::default(), &session);
        let mut next = FilterState::default();
        next.roles.insert(RoleTag::Design);
        let _ticket_b = fetcher.begin(&next, &session);

        let status = fetcher.complete(ticket_a, Err(ApiError::Unauthorized), &session);
        assert_eq!(status, FetchStatus::Stale);
        assert!(fetcher.is_loading());
        assert!(session.is_logged_in());
    }

    #[test]
    fn test_failure_is_visible_without_retry() {
        let db = Database::open_in_memory().unwrap();
        let session = Session::new(&db);
        let mut fetcher = ListingFetcher::new();

        let ticket = fetcher.begin(&FilterState::default(), &session);
        let status = fetcher.complete(ticket, Err(ApiError::Transport("reset".to_string())), &session);
        assert_eq!(status, FetchStatus::Failed);
        match fetcher.view() {
            ListingView::Failed(message) => assert!(message.starts_with("Could not load")),
            other => panic!("unexpected view {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unauthorized_clears_token_and_requests_reload() {
        let db = Database::open_in_memory().unwrap();
        let session = Session::new(&db);
        session.store("expired").unwrap();

        let api = FakeApi::new();
        *api.reject_tokens.lock().unwrap() = true;

        let mut fetcher = ListingFetcher::new();
        let status = fetcher.fetch(&api, &FilterState::default(), &session).await;
        assert_eq!(status, FetchStatus::Reload);
        assert!(!session.is_logged_in());

        // Anonymous retry after the reload succeeds
        let status = fetcher.fetch(&api, &FilterState::default(), &session).await;
        assert_eq!(status, FetchStatus::Applied);
        assert_eq!(api.call_count("list_posts"), 2);
    }

    #[tokio::test]
    async fn test_anonymous_unauthorized_fails_without_reload() {
        let db = Database::open_in_memory().unwrap();
        let session = Session::new(&db);
        let api = FakeApi::new();
        *api.page.lock().unwrap() = Some(Err(ApiError::Unauthorized));

        let mut fetcher = ListingFetcher::new();
        for _ in 0..3 {
            let status = fetcher.fetch(&api, &FilterState::default(), &session).await;
            assert_eq!(status, FetchStatus::Failed);
        }
        assert!(matches!(fetcher.view(), ListingView::Failed(_)));
        assert_eq!(api.call_count("list_posts"), 3);
    }

    #[tokio::test]
    async fn test_fetch_applies_page() {
        let db = Database::open_in_memory().unwrap();
        let session = Session::new(&db);
        let api = FakeApi::new();
        *api.page.lock().unwrap() = Some(Ok(page_with(&["x", "y"], 3)));

        let mut fetcher = ListingFetcher::new();
        assert_eq!(
            fetcher.fetch(&api, &FilterState::default(), &session).await,
            FetchStatus::Applied
        );
        assert_eq!(fetcher.posts().len(), 2);
    }
}
