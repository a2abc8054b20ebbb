use anyhow::{Context, Result};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::info;

use crate::api::{Api, ApiError};
use crate::models::{ApplicantProfile, ProfileLink, RoleTag};
use crate::session::Session;
use crate::validate::{self, CvFile, StackList, ValidationError, PDF_MIME};

const CV_KEY_PREFIX: &str = "static/private/CV_RESUME";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub enroll_year: i32,
    pub department: String,
    pub cv_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub positions: Option<Vec<RoleTag>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stacks: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slogan: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<ProfileLink>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileField {
    EnrollYear,
    Departments,
    Cv,
    Slogan,
    Explanation,
    Links,
}

impl fmt::Display for ProfileField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProfileField::EnrollYear => "enrollment year",
            ProfileField::Departments => "departments",
            ProfileField::Cv => "CV",
            ProfileField::Slogan => "slogan",
            ProfileField::Explanation => "introduction",
            ProfileField::Links => "links",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: ProfileField,
    pub error: ValidationError,
}

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Please log in first.")]
    LoginRequired,

    #[error("{}", describe(.0))]
    Invalid(Vec<FieldError>),

    #[error("{}", .0.user_message())]
    Api(#[from] ApiError),
}

fn describe(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.error))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, Default)]
pub struct ProfileDraft {
    pub enroll_year: String,
    pub departments: Vec<String>,
    pub cv_file: Option<CvFile>,
    pub existing_cv_key: Option<String>,
    pub positions: Vec<RoleTag>,
    pub stacks: StackList,
    pub slogan: String,
    pub explanation: String,
    pub links: Vec<ProfileLink>,
}

impl ProfileDraft {
    pub fn from_profile(profile: &ApplicantProfile) -> Self {
        Self {
            enroll_year: format!("{:02}", profile.enroll_year.rem_euclid(100)),
            departments: profile.departments(),
            cv_file: None,
            existing_cv_key: profile.cv_key.clone().filter(|k| !k.is_empty()),
            positions: profile.positions.clone().unwrap_or_default(),
            stacks: StackList::from_existing(profile.stacks.as_deref().unwrap_or_default()),
            slogan: profile.slogan.clone().unwrap_or_default(),
            explanation: profile.explanation.clone().unwrap_or_default(),
            links: profile.links.clone().unwrap_or_default(),
        }
    }

    pub fn validate(&self) -> Result<ProfileUpdate, Vec<FieldError>> {
        let mut errors = Vec::new();
        let mut fail = |field, error| errors.push(FieldError { field, error });

        let enroll_year = validate::parse_enroll_year(&self.enroll_year)
            .map_err(|e| fail(ProfileField::EnrollYear, e))
            .ok();
        let departments = validate::validate_departments(&self.departments)
            .map_err(|e| fail(ProfileField::Departments, e))
            .ok();
        let cv_ok = validate::validate_cv(self.cv_file.as_ref(), self.existing_cv_key.as_deref())
            .map_err(|e| fail(ProfileField::Cv, e))
            .is_ok();
        let slogan_ok = validate::validate_slogan(&self.slogan)
            .map_err(|e| fail(ProfileField::Slogan, e))
            .is_ok();
        let explanation_ok = validate::validate_explanation(&self.explanation)
            .map_err(|e| fail(ProfileField::Explanation, e))
            .is_ok();
        let links = validate::validate_links(&self.links)
            .map_err(|e| fail(ProfileField::Links, e))
            .ok();

        let (Some(enroll_year), Some(departments), true, true, true, Some(links)) =
            (enroll_year, departments, cv_ok, slogan_ok, explanation_ok, links)
        else {
            return Err(errors);
        };

        let cv_key = match (&self.cv_file, &self.existing_cv_key) {
            (Some(file), _) => new_cv_key(&file.file_name),
            (None, Some(key)) => key.clone(),
            (None, None) => return Err(errors),
        };

        let mut positions: Vec<RoleTag> = Vec::new();
        for role in &self.positions {
            if !positions.contains(role) {
                positions.push(*role);
            }
        }

        Ok(ProfileUpdate {
            enroll_year,
            department: departments.join(","),
            cv_key,
            positions: non_empty(positions),
            stacks: non_empty(self.stacks.items().to_vec()),
            slogan: non_blank(&self.slogan),
            explanation: non_blank(&self.explanation),
            links: non_empty(links),
        })
    }
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    if items.is_empty() { None } else { Some(items) }
}

fn non_blank(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn new_cv_key(file_name: &str) -> String {
    let id: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect();
    format!("{}/{}/{}", CV_KEY_PREFIX, id, file_name)
}

impl CvFile {
    pub fn from_path(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path)
            .with_context(|| format!("Failed to read CV file: {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "cv.pdf".to_string());
        let is_pdf = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);
        Ok(Self {
            file_name,
            mime_type: if is_pdf { PDF_MIME } else { "application/octet-stream" }.to_string(),
            size: metadata.len(),
        })
    }
}

// --- Remote operations ---

pub async fn load_profile(api: &dyn Api, session: &Session<'_>) -> Result<Option<ApplicantProfile>, ProfileError> {
    let token = session.token().ok_or(ProfileError::LoginRequired)?;
    match api.get_profile(&token).await {
        Ok(profile) => Ok(profile),
        Err(ApiError::Unauthorized) => {
            session.invalidate();
            Err(ProfileError::LoginRequired)
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn save_profile(
    api: &dyn Api,
    session: &Session<'_>,
    draft: &ProfileDraft,
) -> Result<ProfileUpdate, ProfileError> {
    let token = session.token().ok_or(ProfileError::LoginRequired)?;
    let update = draft.validate().map_err(ProfileError::Invalid)?;
    match api.put_profile(&token, &update).await {
        Ok(()) => {
            info!("profile saved");
            Ok(update)
        }
        Err(ApiError::Unauthorized) => {
            session.invalidate();
            Err(ProfileError::LoginRequired)
        }
        Err(e) => Err(e.into()),
    }
}
