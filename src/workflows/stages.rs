use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::error::WorkflowError;

/// Ordered list of approval stage labels.
///
/// A configuration is always non-empty and its labels are unique and
/// non-blank, so index lookups against it are unambiguous.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct StageConfiguration {
    stages: Vec<String>,
}

impl StageConfiguration {
    pub fn new<I, S>(labels: I) -> Result<Self, WorkflowError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let stages: Vec<String> = labels
            .into_iter()
            .map(|label| label.into().trim().to_string())
            .collect();

        if stages.is_empty() {
            return Err(WorkflowError::invalid(
                "stage configuration must contain at least one stage",
            ));
        }

        let mut seen = HashSet::with_capacity(stages.len());
        for (index, label) in stages.iter().enumerate() {
            if label.is_empty() {
                return Err(WorkflowError::invalid(format!(
                    "stage label at index {index} is blank"
                )));
            }
            if !seen.insert(label.as_str()) {
                return Err(WorkflowError::invalid(format!(
                    "duplicate stage label '{label}'"
                )));
            }
        }

        Ok(Self { stages })
    }

    pub fn labels(&self) -> &[String] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Always false for a constructed configuration; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.stages.get(index).map(String::as_str)
    }

    pub fn position(&self, label: &str) -> Option<usize> {
        self.stages.iter().position(|stage| stage == label)
    }
}

impl Default for StageConfiguration {
    fn default() -> Self {
        Self {
            stages: vec!["L1".to_string(), "L2".to_string(), "L3".to_string()],
        }
    }
}

impl TryFrom<Vec<String>> for StageConfiguration {
    type Error = WorkflowError;

    fn try_from(labels: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(labels)
    }
}

impl From<StageConfiguration> for Vec<String> {
    fn from(config: StageConfiguration) -> Self {
        config.stages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_three_levels() {
        let config = StageConfiguration::default();
        assert_eq!(config.labels(), &["L1", "L2", "L3"]);
        assert_eq!(config.position("L2"), Some(1));
        assert_eq!(config.get(3), None);
    }

    #[test]
    fn test_rejects_empty_blank_and_duplicate_labels() {
        assert!(matches!(
            StageConfiguration::new(Vec::<String>::new()),
            Err(WorkflowError::InvalidInput(_))
        ));
        assert!(matches!(
            StageConfiguration::new(["Legal", "  "]),
            Err(WorkflowError::InvalidInput(_))
        ));
        assert!(matches!(
            StageConfiguration::new(["Legal", "Finance", "Legal"]),
            Err(WorkflowError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_labels_are_trimmed() {
        let config = StageConfiguration::new([" Legal ", "CISO"]).unwrap();
        assert_eq!(config.labels(), &["Legal", "CISO"]);
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: StageConfiguration = serde_json::from_str(r#"["A","B"]"#).unwrap();
        assert_eq!(ok.len(), 2);

        let err = serde_json::from_str::<StageConfiguration>(r#"["A","A"]"#);
        assert!(err.is_err());
    }
}
