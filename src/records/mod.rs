// GRC record stores: policies, risk register, compliance frameworks

pub mod compliance;
pub mod policies;
pub mod risks;

pub use compliance::{ComplianceStore, ControlMappings, Framework, FrameworkDraft, FrameworkUpdate};
pub use policies::{Policy, PolicyDraft, PolicyStatus, PolicyStore, PolicyUpdate};
pub use risks::{Risk, RiskDraft, RiskLevel, RiskStore, RiskUpdate};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: u64 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl RecordError {
    pub fn invalid(message: impl Into<String>) -> Self {
        RecordError::InvalidInput(message.into())
    }
}

/// Page size limits applied to every list call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_limit: 100,
        }
    }
}

impl Pagination {
    fn effective_limit(&self, requested: Option<usize>) -> usize {
        requested
            .filter(|limit| *limit > 0)
            .unwrap_or(self.default_limit)
            .min(self.max_limit)
    }
}

/// Search and paging parameters for list operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListQuery {
    /// Case-insensitive substring match on the record's title or name.
    pub q: Option<String>,
    #[serde(default)]
    pub skip: usize,
    pub limit: Option<usize>,
}

impl ListQuery {
    pub fn search(q: impl Into<String>) -> Self {
        Self {
            q: Some(q.into()),
            ..Self::default()
        }
    }
}

/// One page of results. `total` counts every record in the store, not only
/// the ones matching the filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
}

pub trait Record: Clone {
    const KIND: &'static str;

    fn id(&self) -> u64;

    fn search_key(&self) -> &str;

    /// Field checks for records that did not come through `create`/`update`.
    fn validate(&self) -> Result<(), RecordError> {
        Ok(())
    }
}

/// Id-sequenced record table. Ids start at 1 and are never reused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table<T> {
    next_id: u64,
    items: BTreeMap<u64, T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            next_id: 1,
            items: BTreeMap::new(),
        }
    }
}

impl<T: Record> Table<T> {
    pub(crate) fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub(crate) fn insert(&mut self, item: T) {
        self.items.insert(item.id(), item);
    }

    pub(crate) fn get(&self, id: u64) -> Result<&T, RecordError> {
        self.items
            .get(&id)
            .ok_or(RecordError::NotFound { kind: T::KIND, id })
    }

    pub(crate) fn get_mut(&mut self, id: u64) -> Result<&mut T, RecordError> {
        self.items
            .get_mut(&id)
            .ok_or(RecordError::NotFound { kind: T::KIND, id })
    }

    pub(crate) fn remove(&mut self, id: u64) -> Result<T, RecordError> {
        self.items
            .remove(&id)
            .ok_or(RecordError::NotFound { kind: T::KIND, id })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Check a table loaded from outside the store: keys match record ids,
    /// every id sits below the sequence, and each record passes its own checks.
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.next_id == 0 {
            return Err(RecordError::invalid(format!(
                "{} id sequence must start at 1",
                T::KIND
            )));
        }
        for (key, item) in &self.items {
            if *key != item.id() {
                return Err(RecordError::invalid(format!(
                    "{} stored under id {key} carries id {}",
                    T::KIND,
                    item.id()
                )));
            }
            if *key >= self.next_id {
                return Err(RecordError::invalid(format!(
                    "{} id {key} is not below the next id {}",
                    T::KIND,
                    self.next_id
                )));
            }
            item.validate()?;
        }
        Ok(())
    }

    pub(crate) fn list(&self, query: &ListQuery, pagination: &Pagination) -> Page<T> {
        let needle = query
            .q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase);

        let items = self
            .items
            .values()
            .filter(|item| match &needle {
                Some(needle) => item.search_key().to_lowercase().contains(needle.as_str()),
                None => true,
            })
            .skip(query.skip)
            .take(pagination.effective_limit(query.limit))
            .cloned()
            .collect();

        Page {
            items,
            total: self.items.len(),
        }
    }
}

pub(crate) fn require_min_chars(
    field: &str,
    value: &str,
    min: usize,
) -> Result<String, RecordError> {
    let trimmed = value.trim();
    if trimmed.chars().count() < min {
        return Err(RecordError::invalid(format!(
            "{field} must be at least {min} characters"
        )));
    }
    Ok(trimmed.to_string())
}
