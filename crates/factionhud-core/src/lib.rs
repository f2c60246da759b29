//! factionhud-core - shared library for the factionhud war HUD.
//!
//! This crate contains everything that talks to the Torn API or owns
//! coordination state:
//! - `api`: rate-limited, caching `NetworkClient` and third-party stats lookups
//! - `cache`: TTL response cache behind the client
//! - `roster`: polling aggregator for the two factions in a war
//! - `claims`: dibs registry enforcing one claimant per opponent
//! - `targets`, `notes`: user-curated watch-list and per-player notes
//! - `storage`: JSON key-value persistence
//! - `config`, `context`: configuration and the wiring of all of the above

pub mod api;
pub mod cache;
pub mod claims;
pub mod config;
pub mod context;
pub mod models;
pub mod notes;
pub mod roster;
pub mod storage;
pub mod targets;
pub mod utils;

pub use api::{ApiError, FetchOptions, NetworkClient, RateStatus, StatsClient};
pub use claims::{ClaimOutcome, ClaimRegistry};
pub use config::Config;
pub use context::HudContext;
pub use models::{ClaimRecord, Claimer, MemberSnapshot, Note, PresenceState, TargetEntry};
pub use notes::NoteBook;
pub use roster::{online_status, OnlineStatus, RosterAggregator};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use targets::TargetList;
