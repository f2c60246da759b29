use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::roster::status::{online_status, OnlineStatus};

/// A member's current in-game activity, from `status.state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PresenceState {
    Okay,
    Hospital,
    Jail,
    Traveling,
    Abroad,
    Federal,
    #[default]
    #[serde(other)]
    Unknown,
}

impl PresenceState {
    pub fn from_state(state: &str) -> Self {
        match state {
            "Okay" => PresenceState::Okay,
            "Hospital" => PresenceState::Hospital,
            "Jail" => PresenceState::Jail,
            "Traveling" => PresenceState::Traveling,
            "Abroad" => PresenceState::Abroad,
            "Federal" => PresenceState::Federal,
            _ => PresenceState::Unknown,
        }
    }

    /// Away from Torn City, either flying or landed abroad
    pub fn is_travelling(&self) -> bool {
        matches!(self, PresenceState::Traveling | PresenceState::Abroad)
    }
}

impl std::fmt::Display for PresenceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PresenceState::Okay => "Okay",
            PresenceState::Hospital => "Hospital",
            PresenceState::Jail => "Jail",
            PresenceState::Traveling => "Traveling",
            PresenceState::Abroad => "Abroad",
            PresenceState::Federal => "Federal",
            PresenceState::Unknown => "Unknown",
        };
        f.pad(s)
    }
}

// API Response shapes for the faction endpoint

#[derive(Debug, Clone, Deserialize, Default)]
pub struct FactionPayload {
    #[serde(rename = "ID")]
    pub id: Option<i64>,
    pub name: Option<String>,
    pub tag: Option<String>,
    pub members: Option<Map<String, Value>>,
}

impl FactionPayload {
    /// Parse every member entry, skipping (and logging) malformed ones.
    ///
    /// Numeric ids come first in ascending numeric order ("9" before "10"),
    /// any other keys after them in key order.
    pub fn parsed_members(&self) -> Vec<(String, ApiMember)> {
        let Some(ref members) = self.members else {
            return Vec::new();
        };

        let mut entries: Vec<(&String, &Value)> = members.iter().collect();
        entries.sort_by_key(|(id, _)| match id.parse::<u64>() {
            Ok(n) => (0, n),
            Err(_) => (1, 0),
        });

        entries
            .into_iter()
            .filter_map(|(id, raw)| match ApiMember::deserialize(raw) {
                Ok(member) => Some((id.clone(), member)),
                Err(e) => {
                    warn!(member_id = %id, error = %e, "Skipping malformed member entry");
                    None
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiMember {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub level: i64,
    pub days_in_faction: Option<i64>,
    pub position: Option<String>,
    pub last_action: Option<LastAction>,
    pub status: Option<ApiStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LastAction {
    pub status: Option<String>,
    pub timestamp: Option<i64>,
    pub relative: Option<String>,
}

impl LastAction {
    /// Free-text "last seen" used for online classification
    pub fn raw(&self) -> String {
        self.relative
            .clone()
            .or_else(|| self.status.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiStatus {
    pub description: Option<String>,
    pub details: Option<String>,
    pub state: Option<String>,
    pub color: Option<String>,
    pub until: Option<i64>,
}

impl ApiStatus {
    pub fn presence(&self) -> PresenceState {
        self.state
            .as_deref()
            .map(PresenceState::from_state)
            .unwrap_or_default()
    }

    /// `until` is 0 when the state has no end time
    pub fn until(&self) -> Option<i64> {
        self.until.filter(|&t| t > 0)
    }
}

/// Most recently observed state of one faction member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberSnapshot {
    pub id: String,
    pub name: String,
    pub level: i64,
    pub presence: PresenceState,
    /// End of the current presence state, epoch seconds
    pub presence_until: Option<i64>,
    pub status_description: String,
    pub last_action: String,
    pub group_id: String,
    pub group_name: String,
    pub group_tag: String,
    pub position: Option<String>,
    pub days_in_faction: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

impl MemberSnapshot {
    pub fn from_api(id: &str, member: &ApiMember, group_id: &str, faction: &FactionPayload) -> Self {
        let status = member.status.clone().unwrap_or_default();
        Self {
            id: id.to_string(),
            name: member.name.clone(),
            level: member.level,
            presence: status.presence(),
            presence_until: status.until(),
            status_description: status.description.clone().unwrap_or_default(),
            last_action: member
                .last_action
                .as_ref()
                .map(LastAction::raw)
                .unwrap_or_default(),
            group_id: group_id.to_string(),
            group_name: faction.name.clone().unwrap_or_default(),
            group_tag: faction.tag.clone().unwrap_or_default(),
            position: member.position.clone(),
            days_in_faction: member.days_in_faction,
            updated_at: Utc::now(),
        }
    }

    /// Seconds left in hospital, if hospitalised and the timer has not run out
    pub fn hospital_remaining(&self, now: i64) -> Option<i64> {
        if self.presence != PresenceState::Hospital {
            return None;
        }
        self.presence_until
            .filter(|&until| until > now)
            .map(|until| until - now)
    }

    pub fn is_incapacitated(&self, now: i64) -> bool {
        self.hospital_remaining(now).is_some()
    }

    pub fn online_status(&self) -> OnlineStatus {
        online_status(&self.last_action)
    }

    /// Same observed state, ignoring when it was observed
    pub fn same_state(&self, other: &MemberSnapshot) -> bool {
        let mut other = other.clone();
        other.updated_at = self.updated_at;
        *self == other
    }
}
