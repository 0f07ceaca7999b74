use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::info;

use super::{require_min_chars, ListQuery, Page, Pagination, Record, RecordError, Table};

/// Framework control id → ids of the policies that satisfy it.
pub type ControlMappings = BTreeMap<String, Vec<u64>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Framework {
    pub id: u64,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub controls: Vec<String>,
    #[serde(default)]
    pub control_mappings: ControlMappings,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Framework {
    /// Controls with no mapped policy.
    pub fn unmapped_controls(&self) -> Vec<&str> {
        self.controls
            .iter()
            .filter(|control| {
                self.control_mappings
                    .get(control.as_str())
                    .map_or(true, Vec::is_empty)
            })
            .map(String::as_str)
            .collect()
    }
}

impl Record for Framework {
    const KIND: &'static str = "Framework";

    fn id(&self) -> u64 {
        self.id
    }

    fn search_key(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameworkDraft {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub controls: Vec<String>,
}

impl FrameworkDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_controls<I, S>(mut self, controls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.controls = controls.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameworkUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub controls: Option<Vec<String>>,
}

#[derive(Debug, Default)]
pub struct ComplianceStore {
    table: Mutex<Table<Framework>>,
    pagination: Pagination,
}

impl ComplianceStore {
    pub fn new(pagination: Pagination) -> Self {
        Self {
            table: Mutex::new(Table::default()),
            pagination,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Table<Framework>> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn list(&self, query: &ListQuery) -> Page<Framework> {
        self.lock().list(query, &self.pagination)
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }

    pub fn create(&self, draft: FrameworkDraft) -> Result<Framework, RecordError> {
        let name = require_min_chars("framework name", &draft.name, 2)?;
        let now = Utc::now();

        let mut table = self.lock();
        let framework = Framework {
            id: table.allocate_id(),
            name,
            description: draft.description,
            controls: draft.controls,
            control_mappings: ControlMappings::new(),
            created_at: now,
            updated_at: now,
        };
        table.insert(framework.clone());

        info!(
            framework_id = framework.id,
            name = %framework.name,
            controls = framework.controls.len(),
            "Compliance framework created"
        );
        Ok(framework)
    }

    pub fn get(&self, id: u64) -> Result<Framework, RecordError> {
        self.lock().get(id).cloned()
    }

    pub fn update(&self, id: u64, update: FrameworkUpdate) -> Result<Framework, RecordError> {
        let name = update
            .name
            .as_deref()
            .map(|name| require_min_chars("framework name", name, 2))
            .transpose()?;

        let mut table = self.lock();
        let framework = table.get_mut(id)?;
        if let Some(name) = name {
            framework.name = name;
        }
        if let Some(description) = update.description {
            framework.description = Some(description);
        }
        if let Some(controls) = update.controls {
            framework.controls = controls;
        }
        framework.updated_at = Utc::now();

        info!(framework_id = id, "Compliance framework updated");
        Ok(framework.clone())
    }

    /// Merge control → policy mappings into the framework. Supplied controls
    /// replace their previous mapping; other controls keep theirs.
    pub fn map_controls(
        &self,
        id: u64,
        mappings: ControlMappings,
    ) -> Result<Framework, RecordError> {
        if let Some(blank) = mappings.keys().find(|control| control.trim().is_empty()) {
            return Err(RecordError::invalid(format!(
                "control id '{blank}' must not be blank"
            )));
        }

        let mut table = self.lock();
        let framework = table.get_mut(id)?;
        let mapped = mappings.len();
        framework.control_mappings.extend(mappings);
        framework.updated_at = Utc::now();

        info!(framework_id = id, mapped, "Framework controls mapped to policies");
        Ok(framework.clone())
    }

    pub fn table_snapshot(&self) -> Table<Framework> {
        self.lock().clone()
    }

    /// Replace the table with one loaded from a snapshot, after checking it.
    pub fn restore(&self, table: Table<Framework>) -> Result<(), RecordError> {
        table.validate()?;
        *self.lock() = table;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ComplianceStore {
        ComplianceStore::new(Pagination::default())
    }

    fn mapping(entries: Vec<(&str, Vec<u64>)>) -> ControlMappings {
        entries
            .into_iter()
            .map(|(control, policies)| (control.to_string(), policies))
            .collect()
    }

    #[test]
    fn test_create_starts_without_mappings() {
        let framework = store()
            .create(FrameworkDraft::new("ISO 27001").with_controls(["A.5.1", "A.8.2"]))
            .unwrap();
        assert!(framework.control_mappings.is_empty());
        assert_eq!(framework.unmapped_controls(), vec!["A.5.1", "A.8.2"]);
    }

    #[test]
    fn test_map_controls_merges() {
        let store = store();
        let framework = store
            .create(FrameworkDraft::new("SOC 2").with_controls(["CC6.1", "CC7.2"]))
            .unwrap();

        store
            .map_controls(framework.id, mapping(vec![("CC6.1", vec![1]), ("CC7.2", vec![2])]))
            .unwrap();
        let updated = store
            .map_controls(framework.id, mapping(vec![("CC6.1", vec![1, 3])]))
            .unwrap();

        assert_eq!(updated.control_mappings["CC6.1"], vec![1, 3]);
        assert_eq!(updated.control_mappings["CC7.2"], vec![2]);
        assert!(updated.unmapped_controls().is_empty());
    }

    #[test]
    fn test_map_controls_unknown_framework() {
        let err = store().map_controls(7, mapping(vec![("A.1", vec![1])])).unwrap_err();
        assert_eq!(err, RecordError::NotFound { kind: "Framework", id: 7 });
    }

    #[test]
    fn test_name_needs_two_characters() {
        assert!(store().create(FrameworkDraft::new("X")).is_err());
        assert!(store().create(FrameworkDraft::new("CIS")).is_ok());
    }
}
