use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::deserialize_id;
use super::member::{ApiStatus, LastAction, PresenceState};

/// One entry of the user's watch-list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetEntry {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub level: i64,
    #[serde(default)]
    pub presence_state: PresenceState,
    #[serde(default)]
    pub incapacitation_until: Option<i64>,
    #[serde(default)]
    pub last_action: Option<String>,
    #[serde(default)]
    pub faction_name: Option<String>,
    #[serde(default = "Utc::now", with = "chrono::serde::ts_milliseconds")]
    pub added_at: DateTime<Utc>,
    #[serde(default = "Utc::now", with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl TargetEntry {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: String::new(),
            level: 0,
            presence_state: PresenceState::Unknown,
            incapacitation_until: None,
            last_action: None,
            faction_name: None,
            added_at: now,
            updated_at: now,
        }
    }

    /// Build an entry from a `user` endpoint payload
    pub fn from_user(id: &str, user: &Value) -> Self {
        let mut entry = Self::new(id);
        entry.apply_user(user);
        entry
    }

    /// Copy name, level, status, last action and faction from a `user` payload
    pub fn apply_user(&mut self, user: &Value) {
        if let Some(name) = user.get("name").and_then(Value::as_str) {
            self.name = name.to_string();
        }
        if let Some(level) = user.get("level").and_then(Value::as_i64) {
            self.level = level;
        }
        if let Some(status) = user
            .get("status")
            .and_then(|s| ApiStatus::deserialize(s).ok())
        {
            self.presence_state = status.presence();
            self.incapacitation_until = status.until();
        }
        if let Some(last_action) = user
            .get("last_action")
            .and_then(|a| LastAction::deserialize(a).ok())
        {
            self.last_action = Some(last_action.raw());
        }
        if let Some(faction) = user
            .get("faction")
            .and_then(|f| f.get("faction_name"))
            .and_then(Value::as_str)
        {
            self.faction_name = Some(faction.to_string());
        }
        self.updated_at = Utc::now();
    }

    /// Merge a newer copy of this entry, keeping known values the update lacks.
    pub fn merge(&mut self, update: TargetEntry) {
        if !update.name.is_empty() {
            self.name = update.name;
        }
        if update.level > 0 {
            self.level = update.level;
        }
        if update.presence_state != PresenceState::Unknown {
            self.presence_state = update.presence_state;
            self.incapacitation_until = update.incapacitation_until;
        }
        if update.last_action.is_some() {
            self.last_action = update.last_action;
        }
        if update.faction_name.is_some() {
            self.faction_name = update.faction_name;
        }
        self.updated_at = Utc::now();
    }
}
