use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::info;

use super::{require_min_chars, ListQuery, Page, Pagination, Record, RecordError, Table};

const SCALE: std::ops::RangeInclusive<u8> = 1..=5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=4 => RiskLevel::Low,
            5..=9 => RiskLevel::Medium,
            10..=16 => RiskLevel::High,
            _ => RiskLevel::Critical,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "Low"),
            RiskLevel::Medium => write!(f, "Medium"),
            RiskLevel::High => write!(f, "High"),
            RiskLevel::Critical => write!(f, "Critical"),
        }
    }
}

/// Risk register entry. `score` is always `impact * likelihood`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Risk {
    pub id: u64,
    pub title: String,
    pub description: Option<String>,
    pub impact: u8,
    pub likelihood: u8,
    pub score: u8,
    pub mitigation: Option<String>,
    pub owner: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Risk {
    pub fn level(&self) -> RiskLevel {
        RiskLevel::from_score(self.score)
    }
}

impl Record for Risk {
    const KIND: &'static str = "Risk";

    fn id(&self) -> u64 {
        self.id
    }

    fn search_key(&self) -> &str {
        &self.title
    }

    fn validate(&self) -> Result<(), RecordError> {
        let impact = check_scale("impact", self.impact)?;
        let likelihood = check_scale("likelihood", self.likelihood)?;
        if self.score != impact * likelihood {
            return Err(RecordError::invalid(format!(
                "risk {} has score {} but impact {impact} x likelihood {likelihood}",
                self.id, self.score
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskDraft {
    pub title: String,
    pub description: Option<String>,
    pub impact: u8,
    pub likelihood: u8,
    pub mitigation: Option<String>,
    pub owner: Option<String>,
}

impl RiskDraft {
    pub fn new(title: impl Into<String>, impact: u8, likelihood: u8) -> Self {
        Self {
            title: title.into(),
            description: None,
            impact,
            likelihood,
            mitigation: None,
            owner: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub impact: Option<u8>,
    pub likelihood: Option<u8>,
    pub mitigation: Option<String>,
    pub owner: Option<String>,
}

fn check_scale(field: &str, value: u8) -> Result<u8, RecordError> {
    if SCALE.contains(&value) {
        Ok(value)
    } else {
        Err(RecordError::invalid(format!(
            "{field} must be between {} and {}, got {value}",
            SCALE.start(),
            SCALE.end()
        )))
    }
}

#[derive(Debug, Default)]
pub struct RiskStore {
    table: Mutex<Table<Risk>>,
    pagination: Pagination,
}

impl RiskStore {
    pub fn new(pagination: Pagination) -> Self {
        Self {
            table: Mutex::new(Table::default()),
            pagination,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Table<Risk>> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn list(&self, query: &ListQuery) -> Page<Risk> {
        self.lock().list(query, &self.pagination)
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }

    pub fn create(&self, draft: RiskDraft) -> Result<Risk, RecordError> {
        let title = require_min_chars("risk title", &draft.title, 3)?;
        let impact = check_scale("impact", draft.impact)?;
        let likelihood = check_scale("likelihood", draft.likelihood)?;
        let now = Utc::now();

        let mut table = self.lock();
        let risk = Risk {
            id: table.allocate_id(),
            title,
            description: draft.description,
            impact,
            likelihood,
            score: impact * likelihood,
            mitigation: draft.mitigation,
            owner: draft.owner,
            created_at: now,
            updated_at: now,
        };
        table.insert(risk.clone());

        info!(risk_id = risk.id, score = risk.score, level = %risk.level(), "Risk registered");
        Ok(risk)
    }

    pub fn get(&self, id: u64) -> Result<Risk, RecordError> {
        self.lock().get(id).cloned()
    }

    /// Partial update; the score is recomputed from the resulting impact and
    /// likelihood.
    pub fn update(&self, id: u64, update: RiskUpdate) -> Result<Risk, RecordError> {
        let title = update
            .title
            .as_deref()
            .map(|title| require_min_chars("risk title", title, 3))
            .transpose()?;
        let impact = update.impact.map(|v| check_scale("impact", v)).transpose()?;
        let likelihood = update
            .likelihood
            .map(|v| check_scale("likelihood", v))
            .transpose()?;

        let mut table = self.lock();
        let risk = table.get_mut(id)?;
        if let Some(title) = title {
            risk.title = title;
        }
        if let Some(description) = update.description {
            risk.description = Some(description);
        }
        if let Some(impact) = impact {
            risk.impact = impact;
        }
        if let Some(likelihood) = likelihood {
            risk.likelihood = likelihood;
        }
        if let Some(mitigation) = update.mitigation {
            risk.mitigation = Some(mitigation);
        }
        if let Some(owner) = update.owner {
            risk.owner = Some(owner);
        }
        risk.score = risk.impact * risk.likelihood;
        risk.updated_at = Utc::now();

        info!(risk_id = id, score = risk.score, "Risk updated");
        Ok(risk.clone())
    }

    pub fn delete(&self, id: u64) -> Result<(), RecordError> {
        self.lock().remove(id)?;
        info!(risk_id = id, "Risk deleted");
        Ok(())
    }

    pub fn table_snapshot(&self) -> Table<Risk> {
        self.lock().clone()
    }

    /// Replace the table with one loaded from a snapshot, after checking it.
    pub fn restore(&self, table: Table<Risk>) -> Result<(), RecordError> {
        table.validate()?;
        *self.lock() = table;
        Ok(())
    }
}
