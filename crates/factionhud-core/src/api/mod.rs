//! Torn API access.
//!
//! `NetworkClient` is the only path to api.torn.com: it owns the response
//! cache, the per-minute call budget and error classification.
//! `StatsClient` wraps the optional third-party battle-stat services.

pub mod client;
pub mod error;
pub mod rate_limit;
pub mod stats;
pub mod transport;

pub use client::{FetchOptions, KeyCheck, NetworkClient};
pub use error::ApiError;
pub use rate_limit::RateStatus;
pub use stats::{BattleStats, CombinedStats, FairFight, StatsClient};
pub use transport::{HttpTransport, Transport};
