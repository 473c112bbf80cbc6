use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::labels::Labels;

/// A single observation as produced by a scraper. Observations carry no
/// timestamp of their own; the scheduler stamps a whole batch at once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Update {
    pub name: CompactString,
    pub labels: Labels,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<Labels>,
}

impl Update {
    pub fn new(name: impl Into<CompactString>, labels: Labels, value: f64) -> Self {
        Self {
            name: name.into(),
            labels,
            value,
            additional_info: None,
        }
    }

    pub fn with_additional_info(self, additional_info: Labels) -> Self {
        Self {
            additional_info: Some(additional_info),
            ..self
        }
    }
}

/// A batch of observations that all share `timestamp`.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateSet {
    pub timestamp: OffsetDateTime,
    pub updates: Vec<Update>,
}

impl UpdateSet {
    pub fn new(timestamp: OffsetDateTime, updates: Vec<Update>) -> Self {
        Self { timestamp, updates }
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}
