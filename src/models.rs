use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const CARD_TAG_LIMIT: usize = 3;

// --- Tags ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RoleTag {
    Front,
    App,
    Backend,
    Data,
    Others,
    Planner,
    Design,
    Marketing,
}

impl RoleTag {
    pub const ALL: [RoleTag; 8] = [
        RoleTag::Front,
        RoleTag::App,
        RoleTag::Backend,
        RoleTag::Data,
        RoleTag::Others,
        RoleTag::Planner,
        RoleTag::Design,
        RoleTag::Marketing,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RoleTag::Front => "FRONT",
            RoleTag::App => "APP",
            RoleTag::Backend => "BACKEND",
            RoleTag::Data => "DATA",
            RoleTag::Others => "OTHERS",
            RoleTag::Planner => "PLANNER",
            RoleTag::Design => "DESIGN",
            RoleTag::Marketing => "MARKETING",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RoleTag::Front => "Frontend",
            RoleTag::App => "App",
            RoleTag::Backend => "Backend",
            RoleTag::Data => "Data analysis",
            RoleTag::Others => "Other development",
            RoleTag::Planner => "Planning",
            RoleTag::Design => "Design",
            RoleTag::Marketing => "Marketing",
        }
    }
}

impl fmt::Display for RoleTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_uppercase();
        RoleTag::ALL
            .into_iter()
            .find(|role| role.as_str() == wanted)
            .ok_or_else(|| format!("unknown role '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleCategory {
    Development,
    Planner,
    Design,
    Marketing,
}

impl RoleCategory {
    pub const ALL: [RoleCategory; 4] = [
        RoleCategory::Development,
        RoleCategory::Planner,
        RoleCategory::Design,
        RoleCategory::Marketing,
    ];

    pub fn roles(self) -> &'static [RoleTag] {
        match self {
            RoleCategory::Development => &[
                RoleTag::Front,
                RoleTag::App,
                RoleTag::Backend,
                RoleTag::Data,
                RoleTag::Others,
            ],
            RoleCategory::Planner => &[RoleTag::Planner],
            RoleCategory::Design => &[RoleTag::Design],
            RoleCategory::Marketing => &[RoleTag::Marketing],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RoleCategory::Development => "DEVELOPMENT",
            RoleCategory::Planner => "PLANNER",
            RoleCategory::Design => "DESIGN",
            RoleCategory::Marketing => "MARKETING",
        }
    }
}

impl FromStr for RoleCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_uppercase();
        RoleCategory::ALL
            .into_iter()
            .find(|category| category.as_str() == wanted)
            .ok_or_else(|| format!("unknown role category '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DomainTag {
    Fintech,
    Healthtech,
    Education,
    Ecommerce,
    Foodtech,
    Mobility,
    Contents,
    B2b,
    Others,
}

impl DomainTag {
    pub const ALL: [DomainTag; 9] = [
        DomainTag::Fintech,
        DomainTag::Healthtech,
        DomainTag::Education,
        DomainTag::Ecommerce,
        DomainTag::Foodtech,
        DomainTag::Mobility,
        DomainTag::Contents,
        DomainTag::B2b,
        DomainTag::Others,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DomainTag::Fintech => "FINTECH",
            DomainTag::Healthtech => "HEALTHTECH",
            DomainTag::Education => "EDUCATION",
            DomainTag::Ecommerce => "ECOMMERCE",
            DomainTag::Foodtech => "FOODTECH",
            DomainTag::Mobility => "MOBILITY",
            DomainTag::Contents => "CONTENTS",
            DomainTag::B2b => "B2B",
            DomainTag::Others => "OTHERS",
        }
    }
}

impl fmt::Display for DomainTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DomainTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_uppercase();
        DomainTag::ALL
            .into_iter()
            .find(|domain| domain.as_str() == wanted)
            .ok_or_else(|| format!("unknown domain '{}'", s))
    }
}

// --- Listing options ---

// Sort order of the listing; the API encodes it as 0 (recent) or 1 (deadline).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum SortOrder {
    #[default]
    Recent,
    Deadline,
}

impl SortOrder {
    pub fn code(self) -> u8 {
        match self {
            SortOrder::Recent => 0,
            SortOrder::Deadline => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortOrder::Recent => "recent",
            SortOrder::Deadline => "deadline",
        }
    }
}

impl From<SortOrder> for u8 {
    fn from(order: SortOrder) -> u8 {
        order.code()
    }
}

impl TryFrom<u8> for SortOrder {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(SortOrder::Recent),
            1 => Ok(SortOrder::Deadline),
            other => Err(format!("unknown sort order {}", other)),
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "0" | "recent" => Ok(SortOrder::Recent),
            "1" | "deadline" => Ok(SortOrder::Deadline),
            _ => Err(format!("unknown sort order '{}' (use recent or deadline)", s)),
        }
    }
}

// Recruiting-status filter. `All` is the "unknown" state: the parameter is omitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ActiveFilter {
    #[default]
    All,
    ActiveOnly,
}

impl ActiveFilter {
    pub fn as_option(self) -> Option<bool> {
        match self {
            ActiveFilter::All => None,
            ActiveFilter::ActiveOnly => Some(true),
        }
    }

    pub fn from_option(value: Option<bool>) -> Self {
        match value {
            Some(true) => ActiveFilter::ActiveOnly,
            _ => ActiveFilter::All,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ActiveFilter::All => "all",
            ActiveFilter::ActiveOnly => "recruiting",
        }
    }
}

impl FromStr for ActiveFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(ActiveFilter::All),
            "only" | "active" | "true" => Ok(ActiveFilter::ActiveOnly),
            _ => Err(format!("unknown status filter '{}' (use all or only)", s)),
        }
    }
}

// --- Posts ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostSummary {
    pub id: String,
    pub company_name: String,
    pub position_title: String,
    #[serde(default)]
    pub location: String, // pipe-delimited, first segment is the city/district
    #[serde(default)]
    pub profile_image_key: Option<String>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub is_bookmarked: bool,
    #[serde(default)]
    pub employment_end_date: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
}

impl PostSummary {
    pub fn primary_location(&self) -> &str {
        self.location.split('|').next().unwrap_or("").trim()
    }

    pub fn card_tags(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().take(CARD_TAG_LIMIT).map(|t| t.tag.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginator {
    pub last_page: u32,
}

impl Default for Paginator {
    fn default() -> Self {
        Self { last_page: 1 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostPage {
    pub posts: Vec<PostSummary>,
    #[serde(default)]
    pub paginator: Paginator,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub position_title: String,
    #[serde(default)]
    pub position_type: Option<String>,
    #[serde(default)]
    pub head_count: Option<u32>,
    #[serde(default)]
    pub salary: Option<i64>,
    #[serde(default)]
    pub employment_end_date: Option<String>,
    #[serde(default)]
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub company_name: String,
    #[serde(default)]
    pub slogan: Option<String>,
    #[serde(default)]
    pub company_established_year: Option<i32>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub headcount: Option<u32>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub links: Vec<ProfileLink>,
    #[serde(default)]
    pub landing_page_link: Option<String>,
    #[serde(default, rename = "companyInfoPDFKey")]
    pub company_info_pdf_key: Option<String>,
    #[serde(default)]
    pub profile_image_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDetail {
    pub id: String,
    pub position: Position,
    pub company: Company,
    #[serde(default)]
    pub is_bookmarked: bool,
    #[serde(default)]
    pub coffee_chat_count: u32,
}

// --- Accounts ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileLink {
    pub link: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicantProfile {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub created_at: Option<String>,
    pub enroll_year: i32,
    pub department: String, // comma-joined, primary first
    #[serde(default)]
    pub cv_key: Option<String>,
    #[serde(default)]
    pub positions: Option<Vec<RoleTag>>,
    #[serde(default)]
    pub stacks: Option<Vec<String>>,
    #[serde(default)]
    pub slogan: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub links: Option<Vec<ProfileLink>>,
}

impl ApplicantProfile {
    pub fn departments(&self) -> Vec<String> {
        self.department
            .split(',')
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .collect()
    }
}

// --- Display helpers ---

pub fn image_url(api_url: &str, key: &str) -> String {
    format!("{}/{}", api_url.trim_end_matches('/'), key.trim_start_matches('/'))
}

pub fn format_salary(salary: Option<i64>) -> String {
    match salary {
        None => "Per company policy".to_string(),
        Some(0) => "Unpaid (negotiable)".to_string(),
        Some(amount) => format!("Annual salary: {} KRW", group_thousands(amount)),
    }
}

fn group_thousands(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::new();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if amount < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

pub fn format_date(raw: &str) -> String {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.format("%Y.%m.%d").to_string();
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return dt.format("%Y.%m.%d").to_string();
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.format("%Y.%m.%d").to_string();
    }
    raw.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_tag_parse() {
        assert_eq!("backend".parse::<RoleTag>().unwrap(), RoleTag::Backend);
        assert_eq!("FRONT".parse::<RoleTag>().unwrap(), RoleTag::Front);
        assert!("DEVOPS".parse::<RoleTag>().is_err());
    }

    #[test]
    fn test_domain_tag_serde_names() {
        let json = serde_json::to_string(&DomainTag::B2b).unwrap();
        assert_eq!(json, "\"B2B\"");
        let parsed: DomainTag = serde_json::from_str("\"HEALTHTECH\"").unwrap();
        assert_eq!(parsed, DomainTag::Healthtech);
    }

    #[test]
    fn test_sort_order_codes() {
        assert_eq!(serde_json::to_string(&SortOrder::Deadline).unwrap(), "1");
        let parsed: SortOrder = serde_json::from_str("0").unwrap();
        assert_eq!(parsed, SortOrder::Recent);
        assert!(serde_json::from_str::<SortOrder>("2").is_err());
    }

    #[test]
    fn test_development_category_roles() {
        let roles = RoleCategory::Development.roles();
        assert_eq!(roles.len(), 5);
        assert!(roles.contains(&RoleTag::Others));
        assert_eq!(RoleCategory::Design.roles(), &[RoleTag::Design]);
    }

    #[test]
    fn test_post_summary_from_listing_json() {
        let json = r#"{
            "id": "a5f5ead2",
            "companyName": "Waffle",
            "positionTitle": "Backend intern",
            "location": "Seoul Gwanak-gu|Building 301",
            "profileImageKey": "static/logo.png",
            "tags": [{"tag": "A"}, {"tag": "B"}, {"tag": "C"}, {"tag": "D"}],
            "isBookmarked": true
        }"#;
        let post: PostSummary = serde_json::from_str(json).unwrap();
        assert_eq!(post.primary_location(), "Seoul Gwanak-gu");
        assert_eq!(post.card_tags().collect::<Vec<_>>(), vec!["A", "B", "C"]);
        assert!(post.is_bookmarked);
    }

    #[test]
    fn test_post_summary_defaults_when_anonymous() {
        let json = r#"{"id": "1", "companyName": "C", "positionTitle": "P"}"#;
        let post: PostSummary = serde_json::from_str(json).unwrap();
        assert!(!post.is_bookmarked);
        assert_eq!(post.primary_location(), "");
    }

    #[test]
    fn test_format_salary() {
        assert_eq!(format_salary(None), "Per company policy");
        assert_eq!(format_salary(Some(0)), "Unpaid (negotiable)");
        assert_eq!(format_salary(Some(32_000_000)), "Annual salary: 32,000,000 KRW");
        assert_eq!(format_salary(Some(999)), "Annual salary: 999 KRW");
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date("2025-03-01T09:00:00Z"), "2025.03.01");
        assert_eq!(format_date("2025-03-01T09:00:00.123"), "2025.03.01");
        assert_eq!(format_date("2025-03-01"), "2025.03.01");
        assert_eq!(format_date("soon"), "soon");
    }

    #[test]
    fn test_profile_departments_split() {
        let profile = ApplicantProfile {
            id: None,
            name: "Kim".to_string(),
            email: "kim@snu.ac.kr".to_string(),
            created_at: None,
            enroll_year: 2021,
            department: "CS, EE,".to_string(),
            cv_key: None,
            positions: None,
            stacks: None,
            slogan: None,
            explanation: None,
            links: None,
        };
        assert_eq!(profile.departments(), vec!["CS", "EE"]);
    }

    #[test]
    fn test_image_url() {
        assert_eq!(
            image_url("https://api.example.com/", "/static/a.png"),
            "https://api.example.com/static/a.png"
        );
    }
}
