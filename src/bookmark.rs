use std::collections::HashSet;
use tracing::{debug, warn};

use crate::api::{Api, ApiError};
use crate::models::PostSummary;
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookmarkPhase {
    Idle,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookmarkOutcome {
    Updated(bool),
    LoginRequired,
    Suppressed,
    Failed(String),
}

impl BookmarkOutcome {
    pub fn apply_to(&self, post: &mut PostSummary) {
        if let BookmarkOutcome::Updated(flag) = self {
            post.is_bookmarked = *flag;
        }
    }
}

#[derive(Debug, Clone)]
pub struct BookmarkTicket {
    post_id: String,
    target: bool,
    token: String,
}

impl BookmarkTicket {
    pub fn post_id(&self) -> &str {
        &self.post_id
    }

    pub fn target(&self) -> bool {
        self.target
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

#[derive(Debug, Default)]
pub struct BookmarkController {
    pending: HashSet<String>,
}

impl BookmarkController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self, post_id: &str) -> BookmarkPhase {
        if self.pending.contains(post_id) {
            BookmarkPhase::Pending
        } else {
            BookmarkPhase::Idle
        }
    }

    pub fn begin(
        &mut self,
        post_id: &str,
        currently_bookmarked: bool,
        session: &Session<'_>,
    ) -> Result<BookmarkTicket, BookmarkOutcome> {
        let Some(token) = session.token() else {
            return Err(BookmarkOutcome::LoginRequired);
        };
        if !self.pending.insert(post_id.to_string()) {
            debug!(post_id, "bookmark toggle already pending");
            return Err(BookmarkOutcome::Suppressed);
        }
        Ok(BookmarkTicket {
            post_id: post_id.to_string(),
            target: !currently_bookmarked,
            token,
        })
    }

    pub fn finish(
        &mut self,
        ticket: BookmarkTicket,
        result: Result<(), ApiError>,
        session: &Session<'_>,
    ) -> BookmarkOutcome {
        self.pending.remove(&ticket.post_id);
        match result {
            Ok(()) => BookmarkOutcome::Updated(ticket.target),
            Err(ApiError::Unauthorized) => {
                warn!(post_id = %ticket.post_id, "bookmark rejected the session token");
                session.invalidate();
                BookmarkOutcome::LoginRequired
            }
            Err(e) => {
                warn!(post_id = %ticket.post_id, error = %e, "bookmark request failed");
                BookmarkOutcome::Failed(format!("Could not update the bookmark. {}", e.user_message()))
            }
        }
    }

    pub async fn toggle(&mut self, api: &dyn Api, post: &mut PostSummary, session: &Session<'_>) -> BookmarkOutcome {
        let ticket = match self.begin(&post.id, post.is_bookmarked, session) {
            Ok(ticket) => ticket,
            Err(outcome) => return outcome,
        };
        let result = api
            .set_bookmark(ticket.post_id(), ticket.target(), ticket.token())
            .await;
        let outcome = self.finish(ticket, result, session);
        outcome.apply_to(post);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::FakeApi;
    use crate::db::Database;

    fn post(bookmarked: bool) -> PostSummary {
        PostSummary {
            id: "p1".to_string(),
            company_name: "Waffle".to_string(),
            position_title: "Frontend intern".to_string(),
            location: "Seoul".to_string(),
            profile_image_key: None,
            tags: Vec::new(),
            is_bookmarked: bookmarked,
            employment_end_date: None,
            domain: None,
        }
    }

    #[tokio::test]
    async fn test_login_required_without_network() {
        let db = Database::open_in_memory().unwrap();
        let session = Session::new(&db);
        let api = FakeApi::new();
        let mut controller = BookmarkController::new();
        let mut p = post(false);

        let outcome = controller.toggle(&api, &mut p, &session).await;
        assert_eq!(outcome, BookmarkOutcome::LoginRequired);
        assert_eq!(api.call_count("set_bookmark"), 0);
        assert!(!p.is_bookmarked);
    }

    #[tokio::test]
    async fn test_toggle_flips_on_success() {
        let db = Database::open_in_memory().unwrap();
        let session = Session::new(&db);
        session.store("jwt").unwrap();
        let api = FakeApi::new();
        let mut controller = BookmarkController::new();
        let mut p = post(false);

        assert_eq!(controller.toggle(&api, &mut p, &session).await, BookmarkOutcome::Updated(true));
        assert!(p.is_bookmarked);
        assert_eq!(controller.toggle(&api, &mut p, &session).await, BookmarkOutcome::Updated(false));
        assert!(!p.is_bookmarked);
        assert_eq!(controller.phase("p1"), BookmarkPhase::Idle);
    }

    #[test]
    fn test_second_toggle_suppressed_while_pending() {
        let db = Database::open_in_memory().unwrap();
        let session = Session::new(&db);
        session.store("jwt").unwrap();
        let mut controller = BookmarkController::new();

        let ticket = controller.begin("p1", false, &session).unwrap();
        assert_eq!(controller.phase("p1"), BookmarkPhase::Pending);
        assert_eq!(
            controller.begin("p1", false, &session).unwrap_err(),
            BookmarkOutcome::Suppressed
        );
        // Other posts are independent
        assert!(controller.begin("p2", true, &session).is_ok());

        controller.finish(ticket, Ok(()), &session);
        assert!(controller.begin("p1", true, &session).is_ok());
    }

    #[tokio::test]
    async fn test_unauthorized_invalidates_session() {
        let db = Database::open_in_memory().unwrap();
        let session = Session::new(&db);
        session.store("expired").unwrap();
        let api = FakeApi::new();
        *api.reject_tokens.lock().unwrap() = true;
        let mut controller = BookmarkController::new();
        let mut p = post(true);

        let outcome = controller.toggle(&api, &mut p, &session).await;
        assert_eq!(outcome, BookmarkOutcome::LoginRequired);
        assert!(!session.is_logged_in());
        assert!(p.is_bookmarked);
    }

    #[tokio::test]
    async fn test_other_failure_keeps_flag() {
        let db = Database::open_in_memory().unwrap();
        let session = Session::new(&db);
        session.store("jwt").unwrap();
        let api = FakeApi::new();
        *api.bookmark_error.lock().unwrap() = Some(ApiError::Status(500));
        let mut controller = BookmarkController::new();
        let mut p = post(false);

        let outcome = controller.toggle(&api, &mut p, &session).await;
        assert!(matches!(outcome, BookmarkOutcome::Failed(_)));
        assert!(!p.is_bookmarked);
        assert!(session.is_logged_in());
        assert_eq!(api.call_count("set_bookmark"), 1);
    }
}
