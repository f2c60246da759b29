use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{deserialize_id, deserialize_opt_id};

/// The participant making a claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claimer {
    pub id: String,
    pub name: String,
}

impl Claimer {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// An exclusive reservation ("dibs") of one opponent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRecord {
    #[serde(deserialize_with = "deserialize_id")]
    pub opponent_id: String,
    #[serde(default)]
    pub opponent_name: String,
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub claimer_id: Option<String>,
    #[serde(default)]
    pub claimer_name: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub claimed_at: DateTime<Utc>,
}

impl ClaimRecord {
    /// Who holds the claim, for display
    pub fn claimer_label(&self) -> String {
        match (&self.claimer_name, &self.claimer_id) {
            (Some(name), _) if !name.is_empty() => name.clone(),
            (_, Some(id)) => format!("Player {}", id),
            _ => "someone".to_string(),
        }
    }

    pub fn is_held_by(&self, claimer_id: &str) -> bool {
        self.claimer_id.as_deref() == Some(claimer_id)
    }
}
