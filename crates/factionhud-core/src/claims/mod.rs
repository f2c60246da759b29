//! Dibs registry: at most one claimant per opponent.
//!
//! The table lives in memory and is rewritten to the `dibs` storage key after
//! every mutation. Arbitration happens under one mutex, so two concurrent
//! claims on the same opponent cannot both win.

use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use tracing::{debug, info};

use crate::models::{ClaimRecord, Claimer};
use crate::storage::{load_or_default, save_or_warn, KeyValueStore, DIBS_KEY};
use crate::utils::lock;

/// Result of a claim attempt. Losing the race is not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed(ClaimRecord),
    /// Someone already holds the opponent; carries their record
    AlreadyClaimed(ClaimRecord),
}

impl ClaimOutcome {
    pub fn is_claimed(&self) -> bool {
        matches!(self, ClaimOutcome::Claimed(_))
    }

    pub fn record(&self) -> &ClaimRecord {
        match self {
            ClaimOutcome::Claimed(record) | ClaimOutcome::AlreadyClaimed(record) => record,
        }
    }
}

pub struct ClaimRegistry {
    store: Arc<dyn KeyValueStore>,
    records: Mutex<Vec<ClaimRecord>>,
}

impl ClaimRegistry {
    /// Open the registry, loading any persisted claims
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        let registry = Self {
            store,
            records: Mutex::new(Vec::new()),
        };
        registry.load();
        registry
    }

    /// Re-read the table from storage, replacing the in-memory copy
    pub fn load(&self) -> usize {
        let records: Vec<ClaimRecord> = load_or_default(self.store.as_ref(), DIBS_KEY);
        let count = records.len();
        *lock(&self.records) = records;
        debug!(count, "Loaded claims");
        count
    }

    fn persist(&self, records: &[ClaimRecord]) {
        save_or_warn(self.store.as_ref(), DIBS_KEY, records);
    }

    /// Claim `opponent_id`. An empty name is stored as "Player <id>".
    pub fn claim(&self, opponent_id: &str, opponent_name: &str, claimer: Option<&Claimer>) -> ClaimOutcome {
        let mut records = lock(&self.records);

        if let Some(existing) = records.iter().find(|r| r.opponent_id == opponent_id) {
            debug!(
                opponent = opponent_id,
                holder = %existing.claimer_label(),
                "Opponent already claimed"
            );
            return ClaimOutcome::AlreadyClaimed(existing.clone());
        }

        let opponent_name = if opponent_name.trim().is_empty() {
            format!("Player {}", opponent_id)
        } else {
            opponent_name.to_string()
        };

        let record = ClaimRecord {
            opponent_id: opponent_id.to_string(),
            opponent_name,
            claimer_id: claimer.map(|c| c.id.clone()),
            claimer_name: claimer.map(|c| c.name.clone()),
            claimed_at: Utc::now(),
        };
        records.push(record.clone());
        self.persist(&records);

        info!(opponent = opponent_id, claimer = %record.claimer_label(), "Opponent claimed");
        ClaimOutcome::Claimed(record)
    }

    /// Drop the claim on `opponent_id`. Returns whether one existed.
    pub fn release(&self, opponent_id: &str) -> bool {
        let mut records = lock(&self.records);
        let before = records.len();
        records.retain(|r| r.opponent_id != opponent_id);
        let released = records.len() != before;
        if released {
            self.persist(&records);
            info!(opponent = opponent_id, "Claim released");
        }
        released
    }

    pub fn is_claimed(&self, opponent_id: &str) -> bool {
        lock(&self.records).iter().any(|r| r.opponent_id == opponent_id)
    }

    pub fn get_by_opponent(&self, opponent_id: &str) -> Option<ClaimRecord> {
        lock(&self.records)
            .iter()
            .find(|r| r.opponent_id == opponent_id)
            .cloned()
    }

    pub fn get_by_claimer(&self, claimer_id: &str) -> Vec<ClaimRecord> {
        lock(&self.records)
            .iter()
            .filter(|r| r.is_held_by(claimer_id))
            .cloned()
            .collect()
    }

    /// Every claim, oldest first
    pub fn all(&self) -> Vec<ClaimRecord> {
        lock(&self.records).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear_all(&self) {
        let mut records = lock(&self.records);
        records.clear();
        self.persist(&records);
        info!("All claims cleared");
    }

    /// Remove claims older than `max_age_hours`, returning how many went
    pub fn clear_expired(&self, max_age_hours: i64) -> usize {
        let cutoff = Utc::now() - Duration::hours(max_age_hours);
        let mut records = lock(&self.records);
        let before = records.len();
        records.retain(|r| r.claimed_at >= cutoff);
        let removed = before - records.len();
        if removed > 0 {
            self.persist(&records);
            info!(removed, max_age_hours, "Expired claims cleared");
        }
        removed
    }
}
