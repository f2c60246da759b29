//! Application context.
//!
//! Owns one instance of every service and wires them together: a single
//! `NetworkClient` (and so a single cache and rate budget) is shared by the
//! roster poller and the target list.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::json;
use tracing::{debug, info};

use crate::api::{ApiError, HttpTransport, NetworkClient, StatsClient, Transport};
use crate::claims::ClaimRegistry;
use crate::config::{Config, API_KEY_ENV, TORNSTATS_KEY_ENV};
use crate::models::{detect_active_war, ActiveWar};
use crate::notes::NoteBook;
use crate::roster::RosterAggregator;
use crate::storage::{load_secret, FileStore, KeyValueStore, API_KEY_KEY, TORNSTATS_KEY_KEY};
use crate::targets::TargetList;

pub struct HudContext {
    pub config: Config,
    pub store: Arc<dyn KeyValueStore>,
    pub client: NetworkClient,
    pub stats: StatsClient,
    pub roster: RosterAggregator,
    pub claims: ClaimRegistry,
    pub targets: TargetList,
    pub notes: NoteBook,
}

impl HudContext {
    /// Open the file store in the configured data directory and talk HTTP
    pub fn open(config: Config) -> Result<Self> {
        let data_dir = config.data_dir()?;
        let store = FileStore::new(data_dir).context("Failed to open data store")?;
        let transport = HttpTransport::new(config.request_timeout())
            .context("Failed to build HTTP client")?;
        Ok(Self::with_parts(config, Arc::new(store), Arc::new(transport)))
    }

    pub fn with_parts(config: Config, store: Arc<dyn KeyValueStore>, transport: Arc<dyn Transport>) -> Self {
        let client = NetworkClient::new(&config, Arc::clone(&transport));
        let stats = StatsClient::new(&config, transport);
        let roster = RosterAggregator::new(client.clone(), config.poll_interval());
        let claims = ClaimRegistry::new(Arc::clone(&store));
        let targets = TargetList::new(client.clone(), Arc::clone(&store));
        let notes = NoteBook::new(Arc::clone(&store));

        let context = Self {
            config,
            store,
            client,
            stats,
            roster,
            claims,
            targets,
            notes,
        };
        context.load_credentials();
        context
    }

    fn load_credentials(&self) {
        let api_key = resolve_credential(
            std::env::var(API_KEY_ENV).ok(),
            load_secret(self.store.as_ref(), API_KEY_KEY),
        );
        let tornstats_key = resolve_credential(
            std::env::var(TORNSTATS_KEY_ENV).ok(),
            load_secret(self.store.as_ref(), TORNSTATS_KEY_KEY),
        );
        debug!(
            api_key = api_key.is_some(),
            tornstats_key = tornstats_key.is_some(),
            "Credentials loaded"
        );
        self.client.set_api_key(api_key);
        self.stats.set_tornstats_key(tornstats_key);
    }

    /// Store the Torn API key and start using it
    pub fn set_api_key(&self, key: &str) -> Result<()> {
        let key = key.trim();
        if key.is_empty() {
            anyhow::bail!("API key is empty");
        }
        self.store.set(API_KEY_KEY, &json!(key))?;
        self.client.set_api_key(Some(key.to_string()));
        info!("API key saved");
        Ok(())
    }

    pub fn clear_api_key(&self) -> Result<()> {
        self.store.remove(API_KEY_KEY)?;
        self.client.set_api_key(None);
        Ok(())
    }

    pub fn set_tornstats_key(&self, key: &str) -> Result<()> {
        let key = key.trim();
        if key.is_empty() {
            anyhow::bail!("TornStats key is empty");
        }
        self.store.set(TORNSTATS_KEY_KEY, &json!(key))?;
        self.stats.set_tornstats_key(Some(key.to_string()));
        Ok(())
    }

    /// Look up the key owner's faction for an ongoing war and seed the
    /// roster's score with it
    pub async fn detect_war(&self) -> Result<Option<ActiveWar>, ApiError> {
        let payload = self.client.get_faction_war("").await?;
        let war = detect_active_war(&payload);
        match &war {
            Some(war) => {
                info!(own = %war.own_id, enemy = %war.enemy_id, war_id = %war.war_id, "Active war found");
                self.roster.set_scores(war.own_score, war.enemy_score);
            }
            None => debug!("No active war"),
        }
        Ok(war)
    }
}

/// Environment wins over the stored value; blank values count as missing
fn resolve_credential(env_value: Option<String>, stored: Option<String>) -> Option<String> {
    env_value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or(stored)
}
