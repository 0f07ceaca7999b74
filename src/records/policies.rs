use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::info;

use super::{require_min_chars, ListQuery, Page, Pagination, Record, RecordError, Table};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolicyStatus {
    #[default]
    Draft,
    #[serde(rename = "Under Review")]
    UnderReview,
    Approved,
}

impl fmt::Display for PolicyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyStatus::Draft => write!(f, "Draft"),
            PolicyStatus::UnderReview => write!(f, "Under Review"),
            PolicyStatus::Approved => write!(f, "Approved"),
        }
    }
}

impl FromStr for PolicyStatus {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "draft" => Ok(PolicyStatus::Draft),
            "underreview" => Ok(PolicyStatus::UnderReview),
            "approved" => Ok(PolicyStatus::Approved),
            _ => Err(RecordError::invalid(format!(
                "unknown policy status '{s}', expected Draft, Under Review or Approved"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub id: u64,
    pub title: String,
    pub description: Option<String>,
    pub status: PolicyStatus,
    #[serde(default)]
    pub reviewers: Vec<String>,
    pub file_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Policy {
    const KIND: &'static str = "Policy";

    fn id(&self) -> u64 {
        self.id
    }

    fn search_key(&self) -> &str {
        &self.title
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDraft {
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub status: PolicyStatus,
    #[serde(default)]
    pub reviewers: Vec<String>,
    pub file_url: Option<String>,
}

impl PolicyDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Partial update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<PolicyStatus>,
    pub reviewers: Option<Vec<String>>,
    pub file_url: Option<String>,
}

#[derive(Debug, Default)]
pub struct PolicyStore {
    table: Mutex<Table<Policy>>,
    pagination: Pagination,
}

impl PolicyStore {
    pub fn new(pagination: Pagination) -> Self {
        Self {
            table: Mutex::new(Table::default()),
            pagination,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Table<Policy>> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn list(&self, query: &ListQuery) -> Page<Policy> {
        self.lock().list(query, &self.pagination)
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }

    pub fn create(&self, draft: PolicyDraft) -> Result<Policy, RecordError> {
        let title = require_min_chars("policy title", &draft.title, 3)?;
        let now = Utc::now();

        let mut table = self.lock();
        let policy = Policy {
            id: table.allocate_id(),
            title,
            description: draft.description,
            status: draft.status,
            reviewers: draft.reviewers,
            file_url: draft.file_url,
            created_at: now,
            updated_at: now,
        };
        table.insert(policy.clone());

        info!(
            policy_id = policy.id,
            title = %policy.title,
            status = %policy.status,
            "Policy created"
        );
        Ok(policy)
    }

    pub fn get(&self, id: u64) -> Result<Policy, RecordError> {
        self.lock().get(id).cloned()
    }

    pub fn update(&self, id: u64, update: PolicyUpdate) -> Result<Policy, RecordError> {
        let title = update
            .title
            .as_deref()
            .map(|title| require_min_chars("policy title", title, 3))
            .transpose()?;

        let mut table = self.lock();
        let policy = table.get_mut(id)?;
        if let Some(title) = title {
            policy.title = title;
        }
        if let Some(description) = update.description {
            policy.description = Some(description);
        }
        if let Some(status) = update.status {
            policy.status = status;
        }
        if let Some(reviewers) = update.reviewers {
            policy.reviewers = reviewers;
        }
        if let Some(file_url) = update.file_url {
            policy.file_url = Some(file_url);
        }
        policy.updated_at = Utc::now();

        info!(policy_id = id, status = %policy.status, "Policy updated");
        Ok(policy.clone())
    }

    pub fn delete(&self, id: u64) -> Result<(), RecordError> {
        self.lock().remove(id)?;
        info!(policy_id = id, "Policy deleted");
        Ok(())
    }

    /// Record where the policy document lives. Storing the document itself
    /// is the caller's concern.
    pub fn attach_file(&self, id: u64, file_url: &str) -> Result<Policy, RecordError> {
        let file_url = file_url.trim();
        if file_url.is_empty() {
            return Err(RecordError::invalid("file url must not be empty"));
        }
        self.update(
            id,
            PolicyUpdate {
                file_url: Some(file_url.to_string()),
                ..PolicyUpdate::default()
            },
        )
    }

    pub fn table_snapshot(&self) -> Table<Policy> {
        self.lock().clone()
    }

    /// Replace the table with one loaded from a snapshot, after checking it.
    pub fn restore(&self, table: Table<Policy>) -> Result<(), RecordError> {
        table.validate()?;
        *self.lock() = table;
        Ok(())
    }
}
