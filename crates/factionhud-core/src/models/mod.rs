//! Data models for Torn entities and the HUD's persisted records.
//!
//! - `MemberSnapshot`, `PresenceState`: faction member state from roster polls
//! - `FactionPayload`, `ApiMember`: raw shapes of the faction endpoint
//! - `ClaimRecord`: a dibs claim on an opponent
//! - `TargetEntry`: a watch-list entry
//! - `Note`: a free-text note about a player
//! - `ActiveWar`, `WarScoreState`: ranked war detection and score

pub mod claim;
pub mod member;
pub mod note;
pub mod target;
pub mod war;

pub use claim::{ClaimRecord, Claimer};
pub use member::{ApiMember, ApiStatus, FactionPayload, LastAction, MemberSnapshot, PresenceState};
pub use note::Note;
pub use target::TargetEntry;
pub use war::{detect_active_war, ActiveWar, WarScoreState};

use serde::{Deserialize, Deserializer};

/// Torn ids show up as both numbers and strings; normalise to a string.
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}

pub(crate) fn deserialize_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match Option::<RawId>::deserialize(deserializer)? {
        Some(RawId::Text(s)) => Some(s),
        Some(RawId::Number(n)) => Some(n.to_string()),
        None => None,
    })
}
