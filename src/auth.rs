use thiserror::Error;
use tracing::info;

use crate::api::{Api, ApiError, LoginRequest, SignupInfo, SignupRequest};
use crate::models::User;
use crate::session::Session;
use crate::validate::{self, ValidationError};

const APPLICANT: &str = "APPLICANT";

pub const DEFAULT_SUCCESS_CODE: &str = "1234";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Invalid(#[from] ValidationError),

    #[error("Email or password is incorrect.")]
    BadCredentials,

    #[error("Please log in first.")]
    LoginRequired,

    #[error("{}", .0.user_message())]
    Api(#[from] ApiError),

    #[error("Could not save the session: {0}")]
    Storage(String),
}

#[derive(Debug, Clone, Default)]
pub struct SignupForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    pub success_code: Option<String>,
}

impl SignupForm {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate::validate_email(&self.email)?;
        validate::confirm_password(&self.password, &self.password_confirm)
    }

    fn to_request(&self) -> SignupRequest {
        let success_code = self
            .success_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_SUCCESS_CODE);
        SignupRequest {
            auth_type: APPLICANT.to_string(),
            info: SignupInfo {
                kind: APPLICANT.to_string(),
                name: self.name.trim().to_string(),
                email: self.email.trim().to_string(),
                password: self.password.clone(),
                success_code: success_code.to_string(),
            },
        }
    }
}

pub async fn signup(api: &dyn Api, session: &Session<'_>, form: &SignupForm) -> Result<(), AuthError> {
    form.validate()?;
    let response = api.signup(&form.to_request()).await?;
    session
        .store(&response.token)
        .map_err(|e| AuthError::Storage(e.to_string()))?;
    info!("signed up");
    Ok(())
}

pub async fn login(api: &dyn Api, session: &Session<'_>, email: &str, password: &str) -> Result<(), AuthError> {
    let request = LoginRequest {
        email: email.trim().to_string(),
        password: password.to_string(),
    };
    let response = match api.login(&request).await {
        Ok(response) => response,
        Err(e @ ApiError::Transport(_)) => return Err(AuthError::Api(e)),
        Err(_) => return Err(AuthError::BadCredentials),
    };
    session
        .store(&response.token)
        .map_err(|e| AuthError::Storage(e.to_string()))?;
    info!("logged in");
    Ok(())
}

pub fn logout(session: &Session<'_>) {
    session.invalidate();
}

pub async fn current_user(api: &dyn Api, session: &Session<'_>) -> Result<User, AuthError> {
    let token = session.token().ok_or(AuthError::LoginRequired)?;
    match api.me(&token).await {
        Ok(user) => Ok(user),
        Err(ApiError::Unauthorized) => {
            session.invalidate();
            Err(AuthError::LoginRequired)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::FakeApi;
    use crate::db::Database;

    fn form(email: &str, password: &str, confirm: &str) -> SignupForm {
        SignupForm {
            name: "Kim Waffle".to_string(),
            email: email.to_string(),
            password: password.to_string(),
            password_confirm: confirm.to_string(),
            success_code: None,
        }
    }

    #[tokio::test]
    async fn test_signup_stores_session() {
        let db = Database::open_in_memory().unwrap();
        let session = Session::new(&db);
        let api = FakeApi::new();

        signup(&api, &session, &form("new@snu.ac.kr", "Ab1!aaaa", "Ab1!aaaa"))
            .await
            .unwrap();
        assert_eq!(session.token().as_deref(), Some("token-for-new@snu.ac.kr"));
    }

    #[tokio::test]
    async fn test_signup_mismatch_never_calls_api() {
        let db = Database::open_in_memory().unwrap();
        let session = Session::new(&db);
        let api = FakeApi::new();

        let result = signup(&api, &session, &form("new@snu.ac.kr", "Ab1!aaaa", "Ab1!aaab")).await;
        assert!(matches!(
            result,
            Err(AuthError::Invalid(ValidationError::PasswordMismatch))
        ));
        assert_eq!(api.call_count("signup"), 0);
        assert!(!session.is_logged_in());
    }

    #[tokio::test]
    async fn test_signup_duplicate_email_shows_server_message() {
        let db = Database::open_in_memory().unwrap();
        let session = Session::new(&db);
        let api = FakeApi::new();
        let f = form("dup@snu.ac.kr", "Ab1!aaaa", "Ab1!aaaa");

        signup(&api, &session, &f).await.unwrap();
        session.invalidate();

        let err = signup(&api, &session, &f).await.unwrap_err();
        assert_eq!(err.to_string(), "This email is already registered.");
        assert!(!session.is_logged_in());
    }

    #[test]
    fn test_default_success_code() {
        let request = form("a@b.co", "x", "x").to_request();
        assert_eq!(request.info.success_code, DEFAULT_SUCCESS_CODE);
        assert_eq!(request.auth_type, "APPLICANT");
    }

    #[tokio::test]
    async fn test_login_and_logout() {
        let db = Database::open_in_memory().unwrap();
        let session = Session::new(&db);
        let api = FakeApi::new();
        api.accounts
            .lock()
            .unwrap()
            .push(("kim@snu.ac.kr".to_string(), "Ab1!aaaa".to_string()));

        let bad = login(&api, &session, "kim@snu.ac.kr", "wrong").await;
        assert!(matches!(bad, Err(AuthError::BadCredentials)));

        login(&api, &session, "kim@snu.ac.kr", "Ab1!aaaa").await.unwrap();
        assert!(session.is_logged_in());

        let user = current_user(&api, &session).await.unwrap();
        assert_eq!(user.email, "kim@snu.ac.kr");

        logout(&session);
        assert!(matches!(
            current_user(&api, &session).await,
            Err(AuthError::LoginRequired)
        ));
    }

    #[tokio::test]
    async fn test_expired_session_is_cleared() {
        let db = Database::open_in_memory().unwrap();
        let session = Session::new(&db);
        session.store("expired").unwrap();
        let api = FakeApi::new();
        *api.reject_tokens.lock().unwrap() = true;

        assert!(matches!(
            current_user(&api, &session).await,
            Err(AuthError::LoginRequired)
        ));
        assert!(!session.is_logged_in());
    }
}
