//! War roster aggregation.
//!
//! `RosterAggregator` polls the two factions of a war through the shared
//! `NetworkClient` and merges every member it sees into one directory keyed
//! by member id. Each poll overwrites a member's snapshot wholesale; members
//! that leave a faction are not pruned.
//!
//! Polling is completion-relative: the next poll is scheduled only after the
//! previous one has finished, so slow responses never stack up.

pub mod status;

pub use status::{online_status, OnlineStatus};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::{ApiError, NetworkClient};
use crate::models::{FactionPayload, MemberSnapshot, PresenceState, WarScoreState};
use crate::utils::{format_countdown, lock};

/// Members bucketed by presence state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MembersByStatus {
    pub okay: Vec<MemberSnapshot>,
    pub hospital: Vec<MemberSnapshot>,
    pub jail: Vec<MemberSnapshot>,
    /// Traveling or abroad
    pub traveling: Vec<MemberSnapshot>,
    pub federal: Vec<MemberSnapshot>,
    pub all: Vec<MemberSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HospitalTimer {
    pub member: MemberSnapshot,
    pub remaining_seconds: i64,
}

impl HospitalTimer {
    pub fn countdown(&self) -> String {
        format_countdown(self.remaining_seconds)
    }
}

/// Countdown text for a hospitalised member, `None` once the timer has run out.
pub fn hospital_countdown(member: &MemberSnapshot, now: i64) -> Option<String> {
    member.hospital_remaining(now).map(format_countdown)
}

/// Insertion-ordered member table.
#[derive(Debug, Default)]
struct Directory {
    members: HashMap<String, MemberSnapshot>,
    order: Vec<String>,
}

impl Directory {
    fn upsert(&mut self, snapshot: MemberSnapshot) {
        if !self.members.contains_key(&snapshot.id) {
            self.order.push(snapshot.id.clone());
        }
        self.members.insert(snapshot.id.clone(), snapshot);
    }

    fn iter(&self) -> impl Iterator<Item = &MemberSnapshot> {
        self.order.iter().filter_map(|id| self.members.get(id))
    }

    fn clear(&mut self) {
        self.members.clear();
        self.order.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredGroups {
    pub own_id: String,
    pub enemy_id: String,
}

#[derive(Default)]
struct MonitorState {
    active: bool,
    groups: Option<MonitoredGroups>,
    shutdown: Option<watch::Sender<bool>>,
}

struct RosterInner {
    client: NetworkClient,
    poll_interval: Duration,
    monitor: Mutex<MonitorState>,
    directory: Mutex<Directory>,
    scores: Mutex<WarScoreState>,
}

/// Live directory of both factions in a war. Clone is cheap and clones share state.
#[derive(Clone)]
pub struct RosterAggregator {
    inner: Arc<RosterInner>,
}

impl RosterAggregator {
    pub fn new(client: NetworkClient, poll_interval: Duration) -> Self {
        Self {
            inner: Arc::new(RosterInner {
                client,
                poll_interval,
                monitor: Mutex::new(MonitorState::default()),
                directory: Mutex::new(Directory::default()),
                scores: Mutex::new(WarScoreState::default()),
            }),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Poll both factions once, then keep polling every `poll_interval`.
    /// Calling this while already active does nothing.
    pub async fn start(&self, own_id: &str, enemy_id: &str) {
        {
            let mut monitor = lock(&self.inner.monitor);
            if monitor.active {
                info!("War monitor already active");
                return;
            }
            monitor.active = true;
            monitor.groups = Some(MonitoredGroups {
                own_id: own_id.to_string(),
                enemy_id: enemy_id.to_string(),
            });
        }

        self.poll_now().await;

        let (tx, rx) = watch::channel(false);
        {
            let mut monitor = lock(&self.inner.monitor);
            if !monitor.active {
                debug!("War monitor stopped during initial poll");
                return;
            }
            monitor.shutdown = Some(tx);
        }

        let roster = self.clone();
        tokio::spawn(async move {
            roster.poll_loop(rx).await;
        });

        info!(own = own_id, enemy = enemy_id, "War monitor started");
    }

    /// Cancel the next scheduled poll. A poll already in flight still lands.
    pub fn stop(&self) {
        let mut monitor = lock(&self.inner.monitor);
        monitor.active = false;
        if let Some(tx) = monitor.shutdown.take() {
            let _ = tx.send(true);
        }
        info!("War monitor stopped");
    }

    pub fn is_active(&self) -> bool {
        lock(&self.inner.monitor).active
    }

    pub fn monitored_groups(&self) -> Option<MonitoredGroups> {
        lock(&self.inner.monitor).groups.clone()
    }

    async fn poll_loop(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.inner.poll_interval) => {}
                _ = shutdown.changed() => break,
            }
            if *shutdown.borrow() {
                break;
            }
            self.poll_now().await;
        }
        debug!("Poll loop exited");
    }

    // =========================================================================
    // Polling
    // =========================================================================

    /// Poll both monitored factions concurrently. Failures are logged per
    /// faction and never abort the other poll.
    pub async fn poll_now(&self) {
        let Some(groups) = self.monitored_groups() else {
            debug!("No factions monitored, skipping poll");
            return;
        };

        futures::join!(
            self.poll_group_logged(&groups.own_id),
            self.poll_group_logged(&groups.enemy_id)
        );
    }

    async fn poll_group_logged(&self, group_id: &str) {
        match self.poll_group(group_id).await {
            Ok(count) => debug!(faction = group_id, members = count, "Faction polled"),
            Err(e) => warn!(faction = group_id, error = %e, "War monitor fetch error"),
        }
    }

    /// Fetch one faction and overwrite the snapshot of every member it lists.
    /// Returns the number of members merged; a payload without a members
    /// collection merges nothing.
    pub async fn poll_group(&self, group_id: &str) -> Result<usize, ApiError> {
        let payload = self.inner.client.get_faction(group_id).await?;
        let faction = FactionPayload::deserialize(payload.as_ref())
            .map_err(|e| ApiError::InvalidResponse(format!("faction {}: {}", group_id, e)))?;

        if faction.members.is_none() {
            debug!(faction = group_id, "Response has no members, skipping");
            return Ok(0);
        }

        let members = faction.parsed_members();
        let mut directory = lock(&self.inner.directory);
        for (member_id, member) in &members {
            directory.upsert(MemberSnapshot::from_api(member_id, member, group_id, &faction));
        }
        Ok(members.len())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Members of one faction, highest level first (ties keep first-seen order)
    pub fn members_of(&self, group_id: &str) -> Vec<MemberSnapshot> {
        let mut members: Vec<MemberSnapshot> = lock(&self.inner.directory)
            .iter()
            .filter(|m| m.group_id == group_id)
            .cloned()
            .collect();
        members.sort_by(|a, b| b.level.cmp(&a.level));
        members
    }

    pub fn friendly_members(&self) -> Vec<MemberSnapshot> {
        match self.monitored_groups() {
            Some(groups) => self.members_of(&groups.own_id),
            None => Vec::new(),
        }
    }

    pub fn enemy_members(&self) -> Vec<MemberSnapshot> {
        match self.monitored_groups() {
            Some(groups) => self.members_of(&groups.enemy_id),
            None => Vec::new(),
        }
    }

    pub fn member(&self, member_id: &str) -> Option<MemberSnapshot> {
        lock(&self.inner.directory).members.get(member_id).cloned()
    }

    pub fn all_members(&self) -> Vec<MemberSnapshot> {
        lock(&self.inner.directory).iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.inner.directory).members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn members_by_status(&self) -> MembersByStatus {
        let all = self.all_members();
        let bucket = |pred: fn(&PresenceState) -> bool| -> Vec<MemberSnapshot> {
            all.iter().filter(|m| pred(&m.presence)).cloned().collect()
        };

        MembersByStatus {
            okay: bucket(|p| *p == PresenceState::Okay),
            hospital: bucket(|p| *p == PresenceState::Hospital),
            jail: bucket(|p| *p == PresenceState::Jail),
            traveling: bucket(|p| p.is_travelling()),
            federal: bucket(|p| *p == PresenceState::Federal),
            all: all.clone(),
        }
    }

    pub fn hospital_timers(&self) -> Vec<HospitalTimer> {
        self.hospital_timers_at(Utc::now().timestamp())
    }

    /// Hospitalised members whose timer is still running at `now` (epoch
    /// seconds), soonest out first
    pub fn hospital_timers_at(&self, now: i64) -> Vec<HospitalTimer> {
        let mut timers: Vec<HospitalTimer> = lock(&self.inner.directory)
            .iter()
            .filter_map(|m| {
                m.hospital_remaining(now).map(|remaining_seconds| HospitalTimer {
                    member: m.clone(),
                    remaining_seconds,
                })
            })
            .collect();
        timers.sort_by_key(|t| t.remaining_seconds);
        timers
    }

    /// Drop every snapshot and forget the monitored factions
    pub fn clear(&self) {
        lock(&self.inner.directory).clear();
        lock(&self.inner.monitor).groups = None;
    }

    // =========================================================================
    // War score
    // =========================================================================

    pub fn set_scores(&self, own: i64, opponent: i64) {
        *lock(&self.inner.scores) = WarScoreState {
            own_score: own,
            opponent_score: opponent,
        };
    }

    pub fn scores(&self) -> WarScoreState {
        *lock(&self.inner.scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::transport::testing::ScriptedTransport;
    use crate::api::Transport;
    use crate::config::Config;
    use serde_json::{json, Value};

    fn roster_with(transport: &Arc<ScriptedTransport>) -> RosterAggregator {
        let config = Config::default();
        let client = NetworkClient::new(&config, Arc::clone(transport) as Arc<dyn Transport>);
        client.set_api_key(Some("abc123".to_string()));
        RosterAggregator::new(client, config.poll_interval())
    }

    fn member(name: &str, level: i64, state: &str, until: i64) -> Value {
        json!({
            "name": name,
            "level": level,
            "last_action": {"status": "Idle", "relative": "15 minutes ago"},
            "status": {"description": state, "state": state, "until": until}
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_faction_scenario() {
        let now = Utc::now().timestamp();
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(
            "/faction/100?",
            json!({"ID": 100, "name": "Asgard", "tag": "ASG", "members": {"5": member("Thor", 20, "Okay", 0)}}),
        );
        transport.respond(
            "/faction/200?",
            json!({"ID": 200, "name": "Valhalla", "tag": "VAL", "members": {"9": member("Ragnar", 30, "Hospital", now + 60)}}),
        );
        let roster = roster_with(&transport);

        roster.start("100", "200").await;

        let friendly = roster.friendly_members();
        assert_eq!(friendly.len(), 1);
        assert_eq!(friendly[0].id, "5");
        assert_eq!(friendly[0].level, 20);
        assert_eq!(friendly[0].group_tag, "ASG");

        let enemies = roster.enemy_members();
        assert_eq!(enemies.len(), 1);
        assert_eq!(enemies[0].id, "9");
        assert_eq!(enemies[0].level, 30);

        let remaining = enemies[0].hospital_remaining(Utc::now().timestamp()).expect("in hospital");
        assert!((55..=60).contains(&remaining), "remaining {}", remaining);
        roster.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_not_reentrant() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond("/faction/", json!({"members": {}}));
        let roster = roster_with(&transport);

        roster.start("1", "2").await;
        roster.start("3", "4").await;

        assert_eq!(transport.requests().len(), 2);
        let groups = roster.monitored_groups().expect("groups");
        assert_eq!(groups.own_id, "1");
        assert_eq!(groups.enemy_id, "2");
        roster.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_repeat_until_stopped() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond("/faction/", json!({"members": {}}));
        let roster = roster_with(&transport);

        roster.start("1", "2").await;
        assert_eq!(transport.requests().len(), 2);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(transport.requests().len(), 4);

        roster.stop();
        assert!(!roster.is_active());
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(transport.requests().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_stop() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond("/faction/", json!({"members": {}}));
        let roster = roster_with(&transport);

        roster.start("1", "2").await;
        roster.stop();
        roster.start("1", "2").await;
        assert!(roster.is_active());
        roster.stop();
    }

    #[tokio::test]
    async fn test_stop_keeps_directory() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond("/faction/1?", json!({"members": {"5": member("Thor", 20, "Okay", 0)}}));
        transport.respond("/faction/2?", json!({"members": {}}));
        let roster = roster_with(&transport);

        roster.start("1", "2").await;
        roster.stop();
        assert_eq!(roster.len(), 1);

        roster.clear();
        assert!(roster.is_empty());
        assert!(roster.monitored_groups().is_none());
    }

    #[tokio::test]
    async fn test_missing_members_is_skipped() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond("/faction/1?", json!({"ID": 1, "name": "Asgard"}));
        let roster = roster_with(&transport);

        assert_eq!(roster.poll_group("1").await.expect("no error"), 0);
        assert!(roster.is_empty());
    }

    #[tokio::test]
    async fn test_one_faction_failing_does_not_block_other() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond("/faction/1?", json!({"error": {"code": 6, "error": "Incorrect ID"}}));
        transport.respond("/faction/2?", json!({"members": {"9": member("Ragnar", 30, "Okay", 0)}}));
        let roster = roster_with(&transport);

        roster.start("1", "2").await;
        assert!(roster.friendly_members().is_empty());
        assert_eq!(roster.enemy_members().len(), 1);
        roster.stop();
    }

    #[tokio::test]
    async fn test_repeat_poll_is_idempotent() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(
            "/faction/1?",
            json!({"members": {"5": member("Thor", 20, "Okay", 0), "6": member("Sif", 25, "Jail", 0)}}),
        );
        let roster = roster_with(&transport);

        roster.poll_group("1").await.expect("first poll");
        let before = roster.all_members();

        roster.inner.client.clear_cache();
        roster.poll_group("1").await.expect("second poll");
        let after = roster.all_members();

        assert_eq!(transport.count("/faction/1?"), 2);
        assert_eq!(before.len(), after.len());
        for (b, a) in before.iter().zip(after.iter()) {
            assert!(b.same_state(a));
        }
    }

    #[tokio::test]
    async fn test_departed_member_is_kept() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond_sequence(
            "/faction/1?",
            vec![
                json!({"members": {"5": member("Thor", 20, "Okay", 0), "6": member("Sif", 25, "Okay", 0)}}),
                json!({"members": {"5": member("Thor", 21, "Okay", 0)}}),
            ],
            None,
        );
        let roster = roster_with(&transport);

        roster.poll_group("1").await.expect("first poll");
        roster.inner.client.clear_cache();
        roster.poll_group("1").await.expect("second poll");

        assert_eq!(roster.len(), 2);
        assert_eq!(roster.member("5").expect("thor").level, 21);
        assert!(roster.member("6").is_some());
    }

    #[tokio::test]
    async fn test_level_sort_is_stable() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(
            "/faction/1?",
            json!({"members": {
                "1": member("A", 10, "Okay", 0),
                "2": member("B", 50, "Okay", 0),
                "3": member("C", 10, "Okay", 0),
                "4": member("D", 30, "Okay", 0)
            }}),
        );
        let roster = roster_with(&transport);
        roster.poll_group("1").await.expect("poll");

        let ids: Vec<String> = roster.members_of("1").into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["2", "4", "1", "3"]);
    }

    #[tokio::test]
    async fn test_level_ties_follow_numeric_id_order() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(
            "/faction/1?",
            json!({"members": {
                "10": member("Ten", 10, "Okay", 0),
                "9": member("Nine", 10, "Okay", 0),
                "11": member("Eleven", 40, "Okay", 0)
            }}),
        );
        let roster = roster_with(&transport);
        roster.poll_group("1").await.expect("poll");

        let ids: Vec<String> = roster.members_of("1").into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["11", "9", "10"]);
    }

    #[tokio::test]
    async fn test_status_buckets_and_timers() {
        let now = 1_700_000_000;
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(
            "/faction/2?",
            json!({"members": {
                "1": member("A", 10, "Hospital", now + 300),
                "2": member("B", 20, "Hospital", now + 30),
                "3": member("C", 30, "Hospital", now - 5),
                "4": member("D", 40, "Abroad", 0),
                "5": member("E", 50, "Traveling", 0),
                "6": member("F", 60, "Federal", 0),
                "7": member("G", 70, "Okay", 0)
            }}),
        );
        let roster = roster_with(&transport);
        roster.poll_group("2").await.expect("poll");

        let buckets = roster.members_by_status();
        assert_eq!(buckets.hospital.len(), 3);
        assert_eq!(buckets.traveling.len(), 2);
        assert_eq!(buckets.federal.len(), 1);
        assert_eq!(buckets.okay.len(), 1);
        assert_eq!(buckets.all.len(), 7);

        let timers = roster.hospital_timers_at(now);
        let ids: Vec<&str> = timers.iter().map(|t| t.member.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1"]);
        assert_eq!(timers[0].countdown(), "0:30");
        assert_eq!(timers[1].countdown(), "5:00");
    }

    #[test]
    fn test_hospital_countdown() {
        let now = 1_700_000_000;
        let mut snap = MemberSnapshot {
            id: "9".to_string(),
            name: "Ragnar".to_string(),
            level: 30,
            presence: PresenceState::Hospital,
            presence_until: Some(now + 125),
            status_description: String::new(),
            last_action: String::new(),
            group_id: "200".to_string(),
            group_name: String::new(),
            group_tag: String::new(),
            position: None,
            days_in_faction: None,
            updated_at: Utc::now(),
        };
        assert_eq!(hospital_countdown(&snap, now).as_deref(), Some("2:05"));

        snap.presence_until = Some(now - 5);
        assert_eq!(hospital_countdown(&snap, now), None);
        assert!(!snap.is_incapacitated(now));
    }

    #[test]
    fn test_scores() {
        let transport = Arc::new(ScriptedTransport::new());
        let roster = roster_with(&transport);
        assert_eq!(roster.scores(), WarScoreState::default());
        roster.set_scores(1200, 950);
        assert_eq!(roster.scores(), WarScoreState { own_score: 1200, opponent_score: 950 });
    }
}
