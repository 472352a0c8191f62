//! Admin Config Store (C5)
//!
//! Publishes [`AdminConfig`] via `ArcSwap` for wait-free reads from every
//! in-flight Strategy Engine call, persists it to a JSON file on disk, and
//! mirrors writes to a distributed KV store when one is configured so other
//! orchestrator instances observe changes without a restart (§4.5).

use arc_swap::ArcSwap;
use mixcraft_common::models::AdminConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

const DISTRIBUTED_KEY: &str = "mixcraft:admin_config";

/// Wait-free-read, rarely-written holder for the durable admin config.
pub struct AdminConfigStore {
    current: ArcSwap<AdminConfig>,
    config_path: PathBuf,
    distributed: Option<redis::aio::ConnectionManager>,
}

impl AdminConfigStore {
    /// Load the config, distributed store first, local file second, embedded
    /// defaults last (§4.5).
    pub async fn load(config_path: PathBuf, distributed: Option<redis::aio::ConnectionManager>) -> mixcraft_common::Result<Self> {
        let config = match &distributed {
            Some(conn) => match read_distributed(&mut conn.clone()).await {
                Some(config) => config,
                None => read_local_file_or_default(&config_path).await?,
            },
            None => read_local_file_or_default(&config_path).await?,
        };

        let store = Self {
            current: ArcSwap::from_pointee(config.clamped()),
            config_path,
            distributed,
        };
        store.persist_to_disk().await?;
        Ok(store)
    }

    /// Read the current config, distributed store first so other instances'
    /// writes take effect on the next request without a restart (§4.5),
    /// falling back to the locally-cached value (seeded from the local file
    /// or defaults) when no distributed store is configured or it's
    /// unreachable.
    pub async fn get(&self) -> Arc<AdminConfig> {
        if let Some(conn) = &self.distributed {
            if let Some(config) = read_distributed(&mut conn.clone()).await {
                let config = Arc::new(config.clamped());
                self.current.store(config.clone());
                return config;
            }
        }
        self.current.load_full()
    }

    /// Replace the whole config, after clamping, persisting to disk and
    /// (best-effort) mirroring to the distributed store.
    pub async fn replace(&self, config: AdminConfig) -> mixcraft_common::Result<Arc<AdminConfig>> {
        let clamped = Arc::new(config.clamped());
        self.current.store(clamped.clone());
        self.persist_to_disk().await?;
        self.mirror_to_distributed(&clamped).await;
        Ok(clamped)
    }

    /// Apply a partial JSON patch (§4.5 "partial update").
    pub async fn patch(&self, patch: &serde_json::Value) -> mixcraft_common::Result<Arc<AdminConfig>> {
        let merged = self.get().await.merge_patch(patch);
        self.replace(merged).await
    }

    /// Apply one of the config's own saved presets by id.
    pub async fn apply_preset(&self, preset_id: &str) -> mixcraft_common::Result<Arc<AdminConfig>> {
        let current = self.get().await;
        let preset = current
            .presets
            .iter()
            .find(|p| p.id == preset_id)
            .ok_or_else(|| mixcraft_common::Error::NotFound(format!("preset {preset_id}")))?
            .params
            .clone();
        drop(current);
        self.patch(&preset).await
    }

    async fn persist_to_disk(&self) -> mixcraft_common::Result<()> {
        if let Some(parent) = self.config_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let text = serde_json::to_string_pretty(&*self.current.load())
            .map_err(|e| mixcraft_common::Error::Internal(e.to_string()))?;
        tokio::fs::write(&self.config_path, text).await?;
        Ok(())
    }

    async fn mirror_to_distributed(&self, config: &AdminConfig) {
        let Some(conn) = &self.distributed else {
            return;
        };
        let mut conn = conn.clone();
        let text = match serde_json::to_string(config) {
            Ok(t) => t,
            Err(e) => {
                warn!(error = %e, "Failed to serialize admin config for distributed mirror");
                return;
            }
        };
        use redis::AsyncCommands;
        if let Err(e) = conn.set::<_, _, ()>(DISTRIBUTED_KEY, text).await {
            warn!(error = %e, "Failed to mirror admin config to distributed store");
        } else {
            info!("Mirrored admin config update to distributed store");
        }
    }
}

/// Read and parse the mirrored config from the distributed store, if one is
/// configured and reachable and the key is present. Any failure (connection,
/// missing key, bad JSON) is treated as "fall through to the next source" —
/// this path is a convenience, not a source of truth.
async fn read_distributed(conn: &mut redis::aio::ConnectionManager) -> Option<AdminConfig> {
    use redis::AsyncCommands;
    let text: Option<String> = conn.get(DISTRIBUTED_KEY).await.ok().flatten();
    let text = text?;
    match serde_json::from_str(&text) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!(error = %e, "Distributed admin config entry failed to parse, ignoring");
            None
        }
    }
}

async fn read_local_file_or_default(config_path: &std::path::Path) -> mixcraft_common::Result<AdminConfig> {
    match tokio::fs::read_to_string(config_path).await {
        Ok(text) => serde_json::from_str(&text)
            .map_err(|e| mixcraft_common::Error::Config(format!("bad admin config: {e}"))),
        Err(_) => Ok(AdminConfig::default()),
    }
}
