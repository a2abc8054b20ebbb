use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use thiserror::Error;

use crate::models::ProfileLink;

pub const MAX_DEPARTMENTS: usize = 7;
pub const MAX_CV_BYTES: u64 = 5 * 1024 * 1024;
pub const PDF_MIME: &str = "application/pdf";
pub const MAX_LINK_DESCRIPTION: usize = 100;
pub const MAX_STACKS: usize = 10;
pub const MAX_STACK_LEN: usize = 30;
pub const MAX_SLOGAN: usize = 100;
pub const MAX_EXPLANATION: usize = 5000;
pub const MIN_PASSWORD_LEN: usize = 8;

// Two-digit years up to this value belong to the 2000s.
const CENTURY_CUTOFF: u8 = 25;

const PASSWORD_SYMBOLS: &str = "!@#$%^&*()_+-=[]{}|;:'\",.<>/?`~\\";

const ASCENDING_TRIPLES: [&str; 32] = [
    "abc", "bcd", "cde", "def", "efg", "fgh", "ghi", "hij", "ijk", "jkl", "klm", "lmn", "mno",
    "nop", "opq", "pqr", "qrs", "rst", "stu", "tuv", "uvw", "vwx", "wxy", "xyz", "012", "123",
    "234", "345", "456", "567", "678", "789",
];

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Enter your enrollment year as two digits (e.g. 21).")]
    EnrollYear,
    #[error("The primary department is required.")]
    PrimaryDepartmentMissing,
    #[error("Departments must not repeat.")]
    DuplicateDepartment,
    #[error("You can list at most 7 departments (1 primary + 6 more).")]
    TooManyDepartments,
    #[error("Please attach your CV.")]
    CvRequired,
    #[error("The CV must be a PDF file.")]
    CvNotPdf,
    #[error("The CV must be 5MB or smaller.")]
    CvTooLarge,
    #[error("Passwords do not match.")]
    PasswordMismatch,
    #[error("Enter a valid email address.")]
    InvalidEmail,
    #[error("Links must start with https://")]
    LinkNotHttps,
    #[error("Link descriptions must be 100 characters or fewer.")]
    LinkDescriptionTooLong,
    #[error("The same link is listed more than once.")]
    DuplicateLink,
    #[error("Enter a stack name.")]
    StackBlank,
    #[error("Stack names must be 30 characters or fewer.")]
    StackTooLong,
    #[error("That stack is already added.")]
    DuplicateStack,
    #[error("You can add at most 10 stacks.")]
    TooManyStacks,
    #[error("The slogan must be 100 characters or fewer.")]
    SloganTooLong,
    #[error("The introduction must be 5000 characters or fewer.")]
    ExplanationTooLong,
}

// --- Enrollment year ---

pub fn to_full_year(two_digit: u8) -> i32 {
    if two_digit <= CENTURY_CUTOFF {
        2000 + i32::from(two_digit)
    } else {
        1900 + i32::from(two_digit)
    }
}

pub fn parse_enroll_year(input: &str) -> Result<i32, ValidationError> {
    let input = input.trim();
    if input.len() != 2 || !input.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::EnrollYear);
    }
    let value: u8 = input.parse().map_err(|_| ValidationError::EnrollYear)?;
    Ok(to_full_year(value))
}

// --- Departments ---

pub fn validate_departments(entries: &[String]) -> Result<Vec<String>, ValidationError> {
    match entries.first() {
        Some(primary) if !primary.trim().is_empty() => {}
        _ => return Err(ValidationError::PrimaryDepartmentMissing),
    }

    let departments: Vec<String> = entries
        .iter()
        .map(|d| d.trim())
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .collect();

    let mut seen = HashSet::new();
    if !departments.iter().all(|d| seen.insert(d.as_str())) {
        return Err(ValidationError::DuplicateDepartment);
    }
    if departments.len() > MAX_DEPARTMENTS {
        return Err(ValidationError::TooManyDepartments);
    }
    Ok(departments)
}

// --- CV ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CvFile {
    pub file_name: String,
    pub mime_type: String,
    pub size: u64,
}

pub fn validate_cv(file: Option<&CvFile>, existing_key: Option<&str>) -> Result<(), ValidationError> {
    let Some(file) = file else {
        return match existing_key {
            Some(key) if !key.trim().is_empty() => Ok(()),
            _ => Err(ValidationError::CvRequired),
        };
    };
    if file.mime_type != PDF_MIME {
        return Err(ValidationError::CvNotPdf);
    }
    if file.size > MAX_CV_BYTES {
        return Err(ValidationError::CvTooLarge);
    }
    Ok(())
}

// --- Passwords ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordChecklist {
    pub min_length: bool,
    pub has_digit: bool,
    pub has_mixed_case: bool,
    pub has_symbol: bool,
    pub no_repeat_or_sequence: bool,
}

impl PasswordChecklist {
    pub fn check(password: &str) -> Self {
        Self {
            min_length: password.chars().count() >= MIN_PASSWORD_LEN,
            has_digit: password.chars().any(|c| c.is_ascii_digit()),
            has_mixed_case: password.chars().any(|c| c.is_lowercase())
                && password.chars().any(|c| c.is_uppercase()),
            has_symbol: password.chars().any(|c| PASSWORD_SYMBOLS.contains(c)),
            no_repeat_or_sequence: !has_repeated_run(password) && !has_ascending_run(password),
        }
    }

    pub fn items(&self) -> [(&'static str, bool); 5] {
        [
            ("At least 8 characters", self.min_length),
            ("Contains a number", self.has_digit),
            ("Contains upper and lower case letters", self.has_mixed_case),
            ("Contains a symbol", self.has_symbol),
            ("No 3 repeated or sequential characters", self.no_repeat_or_sequence),
        ]
    }

    pub fn is_strong(&self) -> bool {
        self.items().iter().all(|(_, ok)| *ok)
    }
}

fn has_repeated_run(password: &str) -> bool {
    let chars: Vec<char> = password.chars().collect();
    chars.windows(3).any(|w| w[0] == w[1] && w[1] == w[2])
}

fn has_ascending_run(password: &str) -> bool {
    let lower = password.to_lowercase();
    ASCENDING_TRIPLES.iter().any(|triple| lower.contains(triple))
}

pub fn confirm_password(password: &str, confirmation: &str) -> Result<(), ValidationError> {
    if password == confirmation {
        Ok(())
    } else {
        Err(ValidationError::PasswordMismatch)
    }
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if EMAIL_RE.is_match(email.trim()) {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail)
    }
}

// --- Links ---

pub fn validate_links(links: &[ProfileLink]) -> Result<Vec<ProfileLink>, ValidationError> {
    let mut seen = HashSet::new();
    let mut valid = Vec::new();
    for link in links {
        let url = link.link.trim();
        if url.is_empty() {
            continue;
        }
        if !url.starts_with("https://") || url.len() == "https://".len() {
            return Err(ValidationError::LinkNotHttps);
        }
        if link.description.chars().count() > MAX_LINK_DESCRIPTION {
            return Err(ValidationError::LinkDescriptionTooLong);
        }
        if !seen.insert(url.to_string()) {
            return Err(ValidationError::DuplicateLink);
        }
        valid.push(ProfileLink {
            link: url.to_string(),
            description: link.description.trim().to_string(),
        });
    }
    Ok(valid)
}

// --- Stacks ---

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackList {
    items: Vec<String>,
}

impl StackList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_existing(values: &[String]) -> Self {
        let mut list = Self::new();
        for value in values {
            let _ = list.commit(value);
        }
        list
    }

    pub fn commit(&mut self, input: &str) -> Result<(), ValidationError> {
        let stack = input.trim();
        if stack.is_empty() {
            return Err(ValidationError::StackBlank);
        }
        if stack.chars().count() > MAX_STACK_LEN {
            return Err(ValidationError::StackTooLong);
        }
        if self.items.iter().any(|s| s == stack) {
            return Err(ValidationError::DuplicateStack);
        }
        if self.items.len() >= MAX_STACKS {
            return Err(ValidationError::TooManyStacks);
        }
        self.items.push(stack.to_string());
        Ok(())
    }

    pub fn remove(&mut self, stack: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|s| s != stack.trim());
        self.items.len() != before
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// --- Free text ---

pub fn validate_slogan(slogan: &str) -> Result<(), ValidationError> {
    if slogan.chars().count() > MAX_SLOGAN {
        Err(ValidationError::SloganTooLong)
    } else {
        Ok(())
    }
}

pub fn validate_explanation(explanation: &str) -> Result<(), ValidationError> {
    if explanation.chars().count() > MAX_EXPLANATION {
        Err(ValidationError::ExplanationTooLong)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn link(url: &str, description: &str) -> ProfileLink {
        ProfileLink {
            link: url.to_string(),
            description: description.to_string(),
        }
    }

    #[test]
    fn test_to_full_year_cutoff() {
        for v in 0..=25u8 {
            assert_eq!(to_full_year(v), 2000 + i32::from(v));
        }
        for v in 26..=99u8 {
            assert_eq!(to_full_year(v), 1900 + i32::from(v));
        }
    }

    #[test]
    fn test_parse_enroll_year() {
        assert_eq!(parse_enroll_year("21"), Ok(2021));
        assert_eq!(parse_enroll_year("05"), Ok(2005));
        assert_eq!(parse_enroll_year("99"), Ok(1999));
        assert_eq!(parse_enroll_year("5"), Err(ValidationError::EnrollYear));
        assert_eq!(parse_enroll_year("2021"), Err(ValidationError::EnrollYear));
        assert_eq!(parse_enroll_year("2a"), Err(ValidationError::EnrollYear));
        assert_eq!(parse_enroll_year("+5"), Err(ValidationError::EnrollYear));
    }

    #[test]
    fn test_departments() {
        assert_eq!(
            validate_departments(&strings(&["CS", "", " EE "])),
            Ok(strings(&["CS", "EE"]))
        );
        assert_eq!(
            validate_departments(&strings(&["CS", "CS"])),
            Err(ValidationError::DuplicateDepartment)
        );
        assert_eq!(
            validate_departments(&strings(&["", "EE"])),
            Err(ValidationError::PrimaryDepartmentMissing)
        );
        assert_eq!(validate_departments(&[]), Err(ValidationError::PrimaryDepartmentMissing));

        let eight = strings(&["CS", "EE", "ME", "BIZ", "ECON", "MATH", "STAT", "PHYS"]);
        assert_eq!(validate_departments(&eight), Err(ValidationError::TooManyDepartments));
        assert!(validate_departments(&eight[..7]).is_ok());
    }

    #[test]
    fn test_cv_rules() {
        let pdf = CvFile {
            file_name: "cv.pdf".to_string(),
            mime_type: PDF_MIME.to_string(),
            size: MAX_CV_BYTES,
        };
        assert!(validate_cv(Some(&pdf), None).is_ok());
        assert_eq!(validate_cv(None, None), Err(ValidationError::CvRequired));
        assert!(validate_cv(None, Some("static/private/CV_RESUME/x/cv.pdf")).is_ok());

        let big = CvFile { size: MAX_CV_BYTES + 1, ..pdf.clone() };
        assert_eq!(validate_cv(Some(&big), None), Err(ValidationError::CvTooLarge));

        let doc = CvFile { mime_type: "application/msword".to_string(), ..pdf };
        assert_eq!(validate_cv(Some(&doc), Some("old")), Err(ValidationError::CvNotPdf));
    }

    #[test]
    fn test_password_checklist() {
        let strong = PasswordChecklist::check("Zx9!Qw7#");
        assert!(strong.is_strong());

        let weak = PasswordChecklist::check("abc");
        assert!(!weak.min_length);
        assert!(!weak.has_digit);
        assert!(!weak.has_mixed_case);
        assert!(!weak.has_symbol);
        assert!(!weak.no_repeat_or_sequence);

        assert!(!PasswordChecklist::check("Ab1!aaaa").no_repeat_or_sequence);
        assert!(!PasswordChecklist::check("Pw!x1234").no_repeat_or_sequence);
        assert!(!PasswordChecklist::check("Pw!9XYZq").no_repeat_or_sequence);
        assert!(PasswordChecklist::check("Pw!9XZYq").no_repeat_or_sequence);
    }

    #[test]
    fn test_confirm_password() {
        assert!(confirm_password("Ab1!aaaa", "Ab1!aaaa").is_ok());
        assert_eq!(
            confirm_password("Ab1!aaaa", "Ab1!aaab"),
            Err(ValidationError::PasswordMismatch)
        );
    }

    #[test]
    fn test_email() {
        assert!(validate_email("kim@snu.ac.kr").is_ok());
        assert!(validate_email("kim@snu").is_err());
        assert!(validate_email("kim snu@ac.kr").is_err());
    }

    #[test]
    fn test_links() {
        assert_eq!(
            validate_links(&[link("http://x.com", "site")]),
            Err(ValidationError::LinkNotHttps)
        );
        assert_eq!(
            validate_links(&[link("https://x.com", "a"), link("https://x.com", "b")]),
            Err(ValidationError::DuplicateLink)
        );
        assert_eq!(
            validate_links(&[link("https://x.com", &"d".repeat(101))]),
            Err(ValidationError::LinkDescriptionTooLong)
        );

        let cleaned = validate_links(&[link("", ""), link(" https://github.com/kim ", "GitHub")]).unwrap();
        assert_eq!(cleaned, vec![link("https://github.com/kim", "GitHub")]);
    }

    #[test]
    fn test_stack_commit_rules() {
        let mut stacks = StackList::new();
        assert_eq!(stacks.commit("  "), Err(ValidationError::StackBlank));
        assert_eq!(stacks.commit(&"r".repeat(31)), Err(ValidationError::StackTooLong));

        stacks.commit("Rust").unwrap();
        assert_eq!(stacks.commit("Rust"), Err(ValidationError::DuplicateStack));

        for i in 1..MAX_STACKS {
            stacks.commit(&format!("stack{}", i)).unwrap();
        }
        assert_eq!(stacks.items().len(), MAX_STACKS);
        assert_eq!(stacks.commit("Go"), Err(ValidationError::TooManyStacks));

        assert!(stacks.remove("Rust"));
        assert!(stacks.commit("Go").is_ok());
    }

    #[test]
    fn test_free_text_limits() {
        assert!(validate_slogan(&"s".repeat(100)).is_ok());
        assert_eq!(validate_slogan(&"s".repeat(101)), Err(ValidationError::SloganTooLong));
        assert!(validate_explanation(&"가".repeat(5000)).is_ok());
        assert_eq!(
            validate_explanation(&"e".repeat(5001)),
            Err(ValidationError::ExplanationTooLong)
        );
    }
}
