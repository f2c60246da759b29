//! Optional third-party battle-stat lookups (TornStats spies, YATA estimates).
//!
//! These services are best-effort enrichment: every failure is logged and
//! turned into `None`. They do not count against the Torn API budget.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::transport::Transport;
use crate::config::Config;
use crate::utils::{read, write};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BattleStats {
    pub strength: f64,
    pub speed: f64,
    pub dexterity: f64,
    pub defense: f64,
    pub total: f64,
    /// When the spy was taken, epoch seconds
    pub timestamp: i64,
    pub source: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FairFight {
    pub estimate: Option<f64>,
    pub fair_fight: Option<f64>,
    pub respect: Option<f64>,
    pub source: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct CombinedStats {
    pub torn_stats: Option<BattleStats>,
    pub fair_fight: Option<FairFight>,
    pub fetched_at: DateTime<Utc>,
}

impl CombinedStats {
    pub fn has_torn_stats(&self) -> bool {
        self.torn_stats.is_some()
    }

    pub fn has_fair_fight(&self) -> bool {
        self.fair_fight.is_some()
    }
}

#[derive(Clone)]
pub struct StatsClient {
    transport: Arc<dyn Transport>,
    tornstats_url: String,
    yata_url: String,
    tornstats_key: Arc<RwLock<Option<String>>>,
}

impl StatsClient {
    pub fn new(config: &Config, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            tornstats_url: config.tornstats_url.trim_end_matches('/').to_string(),
            yata_url: config.yata_url.trim_end_matches('/').to_string(),
            tornstats_key: Arc::new(RwLock::new(None)),
        }
    }

    pub fn set_tornstats_key(&self, key: Option<String>) {
        let key = key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty());
        *write(&self.tornstats_key) = key;
    }

    pub fn is_tornstats_configured(&self) -> bool {
        read(&self.tornstats_key).is_some()
    }

    /// Raw TornStats spy report for a player
    pub async fn get_spy_report(&self, player_id: &str) -> Option<Value> {
        let key = match read(&self.tornstats_key).clone() {
            Some(k) => k,
            None => {
                debug!("TornStats key not configured");
                return None;
            }
        };

        let url = format!("{}/{}/spy/user/{}", self.tornstats_url, key, player_id);
        let data = match self.transport.get_json(&url).await {
            Ok(data) => data,
            Err(e) => {
                warn!(player_id, error = %e, "TornStats request failed");
                return None;
            }
        };

        if data.get("status").and_then(Value::as_bool) == Some(false) {
            debug!(player_id, message = ?data.get("message"), "TornStats returned no spy");
            return None;
        }

        data.get("spy").filter(|spy| !spy.is_null()).cloned()
    }

    pub async fn get_battle_stats(&self, player_id: &str) -> Option<BattleStats> {
        let spy = self.get_spy_report(player_id).await?;
        let number = |field: &str| spy.get(field).and_then(Value::as_f64).unwrap_or(0.0);

        Some(BattleStats {
            strength: number("strength"),
            speed: number("speed"),
            dexterity: number("dexterity"),
            defense: number("defense"),
            total: number("total"),
            timestamp: spy.get("timestamp").and_then(Value::as_i64).unwrap_or(0),
            source: "TornStats",
        })
    }

    /// YATA battle-score estimate for a player
    pub async fn get_fair_fight(&self, player_id: &str) -> Option<FairFight> {
        let url = format!("{}/bs/?id={}", self.yata_url, player_id);
        let data = match self.transport.get_json(&url).await {
            Ok(data) => data,
            Err(e) => {
                warn!(player_id, error = %e, "YATA request failed");
                return None;
            }
        };

        if let Some(error) = data.get("error") {
            debug!(player_id, error = %error, "YATA returned an error");
            return None;
        }

        let number = |field: &str| data.get(field).and_then(Value::as_f64);
        Some(FairFight {
            estimate: number("battleScore").or_else(|| number("bs")),
            fair_fight: number("ff"),
            respect: number("respect"),
            source: "YATA",
        })
    }

    /// Query both services concurrently
    pub async fn get_combined_stats(&self, player_id: &str) -> CombinedStats {
        let (torn_stats, fair_fight) = futures::join!(
            self.get_battle_stats(player_id),
            self.get_fair_fight(player_id)
        );

        CombinedStats {
            torn_stats,
            fair_fight,
            fetched_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::transport::testing::ScriptedTransport;
    use serde_json::json;

    fn stats_client(transport: &Arc<ScriptedTransport>) -> StatsClient {
        StatsClient::new(&Config::default(), Arc::clone(transport) as Arc<dyn Transport>)
    }

    #[tokio::test]
    async fn test_spy_requires_key() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = stats_client(&transport);

        assert!(client.get_battle_stats("7").await.is_none());
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_battle_stats_from_spy() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(
            "/spy/user/7",
            json!({"status": true, "spy": {"strength": 10.0, "speed": 20.0, "dexterity": 30.0, "defense": 40.0, "total": 100.0, "timestamp": 1_700_000_000}}),
        );
        let client = stats_client(&transport);
        client.set_tornstats_key(Some("TS_KEY".to_string()));

        let stats = client.get_battle_stats("7").await.expect("spy present");
        assert_eq!(stats.total, 100.0);
        assert_eq!(stats.defense, 40.0);
        assert_eq!(stats.timestamp, 1_700_000_000);
        assert_eq!(stats.source, "TornStats");
        assert_eq!(
            transport.requests()[0],
            "https://www.tornstats.com/api/v2/TS_KEY/spy/user/7"
        );
    }

    #[tokio::test]
    async fn test_spy_status_false_is_none() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond("/spy/user/7", json!({"status": false, "message": "User not found"}));
        let client = stats_client(&transport);
        client.set_tornstats_key(Some("TS_KEY".to_string()));

        assert!(client.get_spy_report("7").await.is_none());
    }

    #[tokio::test]
    async fn test_fair_fight_prefers_battle_score() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond("/bs/?id=7", json!({"battleScore": 1500.0, "bs": 10.0, "ff": 2.5}));
        let client = stats_client(&transport);

        let ff = client.get_fair_fight("7").await.expect("estimate");
        assert_eq!(ff.estimate, Some(1500.0));
        assert_eq!(ff.fair_fight, Some(2.5));
        assert_eq!(ff.respect, None);
    }

    #[tokio::test]
    async fn test_combined_stats_tolerates_failures() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond("/bs/?id=7", json!({"error": "unknown player"}));
        let client = stats_client(&transport);

        let combined = client.get_combined_stats("7").await;
        assert!(!combined.has_torn_stats());
        assert!(!combined.has_fair_fight());
    }
}
