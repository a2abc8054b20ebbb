use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::db::Database;
use crate::models::{ActiveFilter, DomainTag, RoleCategory, RoleTag, SortOrder};

pub const FILTER_KEY: &str = "postFilter";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    pub roles: BTreeSet<RoleTag>,
    pub domains: BTreeSet<DomainTag>,
    pub active: ActiveFilter,
    pub order: SortOrder,
    pub page: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SecondaryChanges {
    pub status: bool,
    pub domains: bool,
    pub sort: bool,
}

impl SecondaryChanges {
    pub fn any(self) -> bool {
        self.status || self.domains || self.sort
    }
}

impl FilterState {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        for role in &self.roles {
            pairs.push(("roles", role.as_str().to_string()));
        }
        for domain in &self.domains {
            pairs.push(("domains", domain.as_str().to_string()));
        }
        if let Some(active) = self.active.as_option() {
            pairs.push(("isActive", active.to_string()));
        }
        pairs.push(("order", self.order.code().to_string()));
        pairs.push(("page", self.page.to_string()));
        pairs
    }

    pub fn to_query(&self) -> String {
        self.query_pairs()
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join("&")
    }

    pub fn from_query(query: &str) -> Self {
        let fields = QueryFields::parse(query);
        Self {
            roles: fields.roles,
            domains: fields.domains,
            active: fields.active.unwrap_or_default(),
            order: fields.order.unwrap_or_default(),
            page: fields.page.unwrap_or(0),
        }
    }

    pub fn secondary_changes(&self) -> SecondaryChanges {
        SecondaryChanges {
            status: self.active != ActiveFilter::All,
            domains: !self.domains.is_empty(),
            sort: self.order != SortOrder::Recent,
        }
    }

    pub fn category_selected(&self, category: RoleCategory) -> bool {
        category.roles().iter().all(|role| self.roles.contains(role))
    }
}

#[derive(Debug, Default)]
struct QueryFields {
    roles: BTreeSet<RoleTag>,
    domains: BTreeSet<DomainTag>,
    active: Option<ActiveFilter>,
    order: Option<SortOrder>,
    page: Option<u32>,
}

impl QueryFields {
    fn parse(query: &str) -> Self {
        // Accept a full link as well as a bare query string
        let query = match query.split_once('?') {
            Some((_, rest)) => rest,
            None => query,
        };
        let query = query.split('#').next().unwrap_or("");

        let mut fields = QueryFields::default();
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            match key {
                "roles" => match value.parse::<RoleTag>() {
                    Ok(role) => {
                        fields.roles.insert(role);
                    }
                    Err(e) => debug!("ignoring query value: {}", e),
                },
                "domains" => match value.parse::<DomainTag>() {
                    Ok(domain) => {
                        fields.domains.insert(domain);
                    }
                    Err(e) => debug!("ignoring query value: {}", e),
                },
                "isActive" => {
                    fields.active = Some(ActiveFilter::from_option(Some(value == "true")));
                }
                "order" => {
                    fields.order = value
                        .parse::<u8>()
                        .ok()
                        .and_then(|code| SortOrder::try_from(code).ok());
                }
                "page" => fields.page = value.parse::<u32>().ok(),
                _ => {}
            }
        }
        fields
    }

    fn has_filters(&self) -> bool {
        !self.roles.is_empty()
            || !self.domains.is_empty()
            || self.active.is_some()
            || self.order.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedFilter {
    #[serde(default)]
    roles: Vec<RoleTag>,
    #[serde(default)]
    domains: Vec<DomainTag>,
    #[serde(default)]
    is_active: Option<bool>,
    #[serde(default)]
    order: SortOrder,
}

impl From<&FilterState> for PersistedFilter {
    fn from(state: &FilterState) -> Self {
        Self {
            roles: state.roles.iter().copied().collect(),
            domains: state.domains.iter().copied().collect(),
            is_active: state.active.as_option(),
            order: state.order,
        }
    }
}

// URL precedence over the stored blob over defaults. The page only ever comes from the URL.
fn resolve(url: &QueryFields, stored: Option<PersistedFilter>) -> FilterState {
    let page = url.page.unwrap_or(0);
    if url.has_filters() {
        return FilterState {
            roles: url.roles.clone(),
            domains: url.domains.clone(),
            active: url.active.unwrap_or_default(),
            order: url.order.unwrap_or_default(),
            page,
        };
    }
    match stored {
        Some(stored) => FilterState {
            roles: stored.roles.into_iter().collect(),
            domains: stored.domains.into_iter().collect(),
            active: ActiveFilter::from_option(stored.is_active),
            order: stored.order,
            page,
        },
        None => FilterState {
            page,
            ..FilterState::default()
        },
    }
}

// --- Location ---

#[derive(Debug, Clone, Default)]
pub struct Location {
    entries: Vec<String>,
}

impl Location {
    pub fn new(query: impl Into<String>) -> Self {
        let query: String = query.into();
        let query = query.trim_start_matches('?').to_string();
        Self {
            entries: vec![query],
        }
    }

    pub fn query(&self) -> &str {
        self.entries.last().map(String::as_str).unwrap_or("")
    }

    pub fn history_len(&self) -> usize {
        self.entries.len()
    }

    fn push(&mut self, query: String) {
        self.entries.push(query);
    }

    fn replace(&mut self, query: String) {
        match self.entries.last_mut() {
            Some(last) => *last = query,
            None => self.entries.push(query),
        }
    }
}

// --- Store ---

pub struct FilterStore<'a> {
    state: FilterState,
    location: Location,
    db: &'a Database,
}

impl<'a> FilterStore<'a> {
    pub fn mount(location: Location, db: &'a Database) -> Result<Self> {
        let url = QueryFields::parse(location.query());
        let stored = match db.get(FILTER_KEY)? {
            Some(json) => match serde_json::from_str::<PersistedFilter>(&json) {
                Ok(stored) => Some(stored),
                Err(e) => {
                    warn!(error = %e, "discarding unreadable stored filter");
                    None
                }
            },
            None => None,
        };

        let state = resolve(&url, stored);
        let mut store = Self {
            state,
            location,
            db,
        };
        persist(store.db, &store.state)?;
        let query = store.state.to_query();
        store.location.replace(query);
        debug!(query = store.location.query(), "filter store mounted");
        Ok(store)
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn toggle_role(&mut self, role: RoleTag) -> Result<()> {
        let mut next = self.state.clone();
        if !next.roles.remove(&role) {
            next.roles.insert(role);
        }
        self.commit(next)
    }

    pub fn toggle_role_category(&mut self, category: RoleCategory) -> Result<()> {
        let mut next = self.state.clone();
        if self.state.category_selected(category) {
            for role in category.roles() {
                next.roles.remove(role);
            }
        } else {
            next.roles.extend(category.roles().iter().copied());
        }
        self.commit(next)
    }

    pub fn toggle_domain(&mut self, domain: DomainTag) -> Result<()> {
        let mut next = self.state.clone();
        if !next.domains.remove(&domain) {
            next.domains.insert(domain);
        }
        self.commit(next)
    }

    pub fn toggle_all_domains(&mut self) -> Result<()> {
        let mut next = self.state.clone();
        if DomainTag::ALL.iter().all(|d| self.state.domains.contains(d)) {
            next.domains.clear();
        } else {
            next.domains.extend(DomainTag::ALL);
        }
        self.commit(next)
    }

    pub fn set_active_only(&mut self, active: ActiveFilter) -> Result<()> {
        let next = FilterState {
            active,
            ..self.state.clone()
        };
        self.commit(next)
    }

    pub fn set_sort_order(&mut self, order: SortOrder) -> Result<()> {
        let next = FilterState {
            order,
            ..self.state.clone()
        };
        self.commit(next)
    }

    pub fn set_page(&mut self, page: u32) -> Result<()> {
        let next = FilterState {
            page,
            ..self.state.clone()
        };
        self.write_through(next)
    }

    // Clears domains, status and sort. Roles and page stay. Returns false when nothing differed.
    pub fn reset_secondary_filters(&mut self) -> Result<bool> {
        if !self.state.secondary_changes().any() {
            return Ok(false);
        }
        let next = FilterState {
            roles: self.state.roles.clone(),
            page: self.state.page,
            ..FilterState::default()
        };
        self.write_through(next)?;
        Ok(true)
    }

    // Any mutation other than an explicit page change starts over at page 0.
    fn commit(&mut self, mut next: FilterState) -> Result<()> {
        next.page = 0;
        self.write_through(next)
    }

    // Storage first: on a write error neither the state nor the URL moves.
    fn write_through(&mut self, next: FilterState) -> Result<()> {
        persist(self.db, &next)?;
        let query = next.to_query();
        debug!(query = %query, "filter changed");
        self.location.push(query);
        self.state = next;
        Ok(())
    }
}

fn persist(db: &Database, state: &FilterState) -> Result<()> {
    let json = serde_json::to_string(&PersistedFilter::from(state))
        .context("Failed to serialize filter state")?;
    db.set(FILTER_KEY, &json)
}
