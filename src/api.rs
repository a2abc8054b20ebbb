use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;
use crate::filter::FilterState;
use crate::models::{ApplicantProfile, PostDetail, PostPage, PostSummary, User};
use crate::profile::ProfileUpdate;

pub const PROFILE_NOT_FOUND_CODE: &str = "APPLICANT_002";

// --- Errors ---

#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Transport(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("not found")]
    NotFound,

    #[error("request rejected ({status}): {message}")]
    Rejected {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("could not decode response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            ApiError::Rejected { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    pub fn user_message(&self) -> &str {
        match self {
            ApiError::Transport(_) => "Could not reach the server. Check your connection.",
            ApiError::Unauthorized => "Your session has expired. Please log in again.",
            ApiError::NotFound => "The requested item was not found.",
            ApiError::Rejected { message, .. } => message.as_str(),
            ApiError::Status(_) | ApiError::Decode(_) => {
                "Something went wrong on the server. Please try again later."
            }
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Transport(e.to_string())
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<serde_json::Value>,
}

impl ErrorBody {
    fn detail_message(&self) -> Option<String> {
        let details = match &self.details {
            Some(serde_json::Value::Object(map)) => map
                .values()
                .map(|v| match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>(),
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                .collect(),
            Some(serde_json::Value::String(s)) => vec![s.clone()],
            _ => Vec::new(),
        };
        if !details.is_empty() {
            return Some(details.join(" "));
        }
        self.message.clone().filter(|m| !m.trim().is_empty())
    }
}

fn error_from_body(status: StatusCode, body: &str) -> ApiError {
    match status {
        StatusCode::UNAUTHORIZED => return ApiError::Unauthorized,
        StatusCode::NOT_FOUND => return ApiError::NotFound,
        _ => {}
    }
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    match parsed.detail_message() {
        Some(message) => ApiError::Rejected {
            status: status.as_u16(),
            code: parsed.code,
            message,
        },
        None => match parsed.code {
            Some(code) => ApiError::Rejected {
                status: status.as_u16(),
                message: format!("Request failed ({})", code),
                code: Some(code),
            },
            None => ApiError::Status(status.as_u16()),
        },
    }
}

// --- Request/response bodies ---

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupInfo {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub success_code: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub auth_type: String,
    pub info: SignupInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Deserialize)]
struct BookmarksResponse {
    posts: Vec<PostSummary>,
}

// --- Client trait ---

pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send + 'a>>;

pub trait Api: Send + Sync {
    fn list_posts<'a>(&'a self, filter: &'a FilterState, token: Option<&'a str>) -> ApiFuture<'a, PostPage>;

    fn get_post<'a>(&'a self, id: &'a str, token: Option<&'a str>) -> ApiFuture<'a, PostDetail>;

    // `bookmarked = true` creates the bookmark, `false` deletes it.
    fn set_bookmark<'a>(&'a self, id: &'a str, bookmarked: bool, token: &'a str) -> ApiFuture<'a, ()>;

    fn list_bookmarks<'a>(&'a self, token: &'a str) -> ApiFuture<'a, Vec<PostSummary>>;

    fn signup<'a>(&'a self, request: &'a SignupRequest) -> ApiFuture<'a, TokenResponse>;

    fn login<'a>(&'a self, request: &'a LoginRequest) -> ApiFuture<'a, TokenResponse>;

    fn me<'a>(&'a self, token: &'a str) -> ApiFuture<'a, User>;

    // `Ok(None)` when the applicant has not created a profile yet.
    fn get_profile<'a>(&'a self, token: &'a str) -> ApiFuture<'a, Option<ApplicantProfile>>;

    fn put_profile<'a>(&'a self, token: &'a str, update: &'a ProfileUpdate) -> ApiFuture<'a, ()>;
}

// --- HTTP implementation ---

#[derive(Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpApi {
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        debug!(status = status.as_u16(), url = %response.url(), "response received");
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let error = error_from_body(status, &body);
        warn!(status = status.as_u16(), error = %error, "request failed");
        Err(error)
    }

    async fn fetch_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = self.execute(request).await?;
        response.json::<T>().await.map_err(|e| ApiError::Decode(e.to_string()))
    }
}

fn with_token(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

impl Api for HttpApi {
    fn list_posts<'a>(&'a self, filter: &'a FilterState, token: Option<&'a str>) -> ApiFuture<'a, PostPage> {
        Box::pin(async move {
            debug!(query = %filter.to_query(), authenticated = token.is_some(), "listing posts");
            let request = self
                .client
                .get(self.endpoint("/api/post"))
                .query(&filter.query_pairs());
            self.fetch_json(with_token(request, token)).await
        })
    }

    fn get_post<'a>(&'a self, id: &'a str, token: Option<&'a str>) -> ApiFuture<'a, PostDetail> {
        Box::pin(async move {
            let request = self.client.get(self.endpoint(&format!("/api/post/{}", id)));
            self.fetch_json(with_token(request, token)).await
        })
    }

    fn set_bookmark<'a>(&'a self, id: &'a str, bookmarked: bool, token: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let url = self.endpoint(&format!("/api/post/{}/bookmark", id));
            let request = if bookmarked {
                self.client.post(url)
            } else {
                self.client.delete(url)
            };
            self.execute(request.bearer_auth(token)).await?;
            Ok(())
        })
    }

    fn list_bookmarks<'a>(&'a self, token: &'a str) -> ApiFuture<'a, Vec<PostSummary>> {
        Box::pin(async move {
            let request = self
                .client
                .get(self.endpoint("/api/post/bookmarks"))
                .bearer_auth(token);
            let body: BookmarksResponse = self.fetch_json(request).await?;
            Ok(body.posts)
        })
    }

    fn signup<'a>(&'a self, request: &'a SignupRequest) -> ApiFuture<'a, TokenResponse> {
        Box::pin(async move {
            let builder = self.client.post(self.endpoint("/api/auth/user")).json(request);
            self.fetch_json(builder).await
        })
    }

    fn login<'a>(&'a self, request: &'a LoginRequest) -> ApiFuture<'a, TokenResponse> {
        Box::pin(async move {
            let builder = self
                .client
                .post(self.endpoint("/api/auth/user/session"))
                .json(request);
            self.fetch_json(builder).await
        })
    }

    fn me<'a>(&'a self, token: &'a str) -> ApiFuture<'a, User> {
        Box::pin(async move {
            let request = self.client.get(self.endpoint("/api/auth/me")).bearer_auth(token);
            self.fetch_json(request).await
        })
    }

    fn get_profile<'a>(&'a self, token: &'a str) -> ApiFuture<'a, Option<ApplicantProfile>> {
        Box::pin(async move {
            let request = self
                .client
                .get(self.endpoint("/api/applicant/me"))
                .bearer_auth(token);
            match self.fetch_json(request).await {
                Ok(profile) => Ok(Some(profile)),
                Err(e) if is_missing_profile(&e) => Ok(None),
                Err(e) => Err(e),
            }
        })
    }

    fn put_profile<'a>(&'a self, token: &'a str, update: &'a ProfileUpdate) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let request = self
                .client
                .put(self.endpoint("/api/applicant/me"))
                .bearer_auth(token)
                .json(update);
            self.execute(request).await?;
            Ok(())
        })
    }
}

pub fn is_missing_profile(error: &ApiError) -> bool {
    matches!(error, ApiError::NotFound) || error.code() == Some(PROFILE_NOT_FOUND_CODE)
}

// --- In-memory API for tests ---


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_and_not_found_statuses() {
        assert!(error_from_body(StatusCode::UNAUTHORIZED, "").is_unauthorized());
        assert!(matches!(
            error_from_body(StatusCode::NOT_FOUND, "{}"),
            ApiError::NotFound
        ));
    }

    #[test]
    fn test_details_become_message() {
        let body = r#"{"code":"USER_001","message":"Bad request","details":{"email":"Email already in use."}}"#;
        let error = error_from_body(StatusCode::CONFLICT, body);
        assert_eq!(error.user_message(), "Email already in use.");
        assert_eq!(error.code(), Some("USER_001"));
    }

    #[test]
    fn test_message_without_details() {
        let body = r#"{"message":"Password too weak"}"#;
        let error = error_from_body(StatusCode::BAD_REQUEST, body);
        assert_eq!(error.user_message(), "Password too weak");
    }

    #[test]
    fn test_unstructured_body_is_generic() {
        let error = error_from_body(StatusCode::INTERNAL_SERVER_ERROR, "<html>oops</html>");
        assert!(matches!(error, ApiError::Status(500)));
        assert!(error.user_message().contains("try again later"));
    }

    #[test]
    fn test_missing_profile_detection() {
        assert!(is_missing_profile(&ApiError::NotFound));
        let coded = error_from_body(
            StatusCode::BAD_REQUEST,
            r#"{"code":"APPLICANT_002","message":"no profile"}"#,
        );
        assert!(is_missing_profile(&coded));
        assert!(!is_missing_profile(&ApiError::Status(500)));
    }

    #[test]
    fn test_signup_request_shape() {
        let request = SignupRequest {
            auth_type: "APPLICANT".to_string(),
            info: SignupInfo {
                kind: "APPLICANT".to_string(),
                name: "Kim".to_string(),
                email: "kim@snu.ac.kr".to_string(),
                password: "Ab1!aaaa".to_string(),
                success_code: "1234".to_string(),
            },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["authType"], "APPLICANT");
        assert_eq!(value["info"]["type"], "APPLICANT");
        assert_eq!(value["info"]["successCode"], "1234");
    }

    #[test]
    fn test_http_api_trims_base_url() {
        let config = Config {
            api_url: "https://api.example.com/".to_string(),
            timeout_secs: 5,
        };
        let api = HttpApi::new(&config).unwrap();
        assert_eq!(api.endpoint("/api/post"), "https://api.example.com/api/post");
    }
}
