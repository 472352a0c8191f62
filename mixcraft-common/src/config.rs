//! Environment-variable configuration resolution
//!
//! Follows the same CLI-arg > env-var > config-file > compiled-default
//! priority order used across the WKMP-style services this is descended
//! from, collapsed here to env-var > compiled-default since the
//! orchestrator has no CLI surface of its own.

use std::path::PathBuf;

/// Process-wide bootstrap configuration, read once at startup.
///
/// This is distinct from [`crate::models::AdminConfig`], which is durable,
/// hot-reloadable application data rather than process bootstrap config.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory the service is allowed to write under
    pub base_dir: PathBuf,
    /// Directory under which per-session directories are created
    pub session_root: PathBuf,
    /// Directory scanned for local overlay samples
    pub samples_dir: PathBuf,
    /// Optional URL of a distributed KV store backing the Job State Store
    pub distributed_store_url: Option<String>,
    /// Optional LLM endpoint for the Strategy Engine's LLM path
    pub llm_endpoint: Option<String>,
    /// Optional LLM API key
    pub llm_api_key: Option<String>,
    /// Default sample rate used by the Audio Analyzer
    pub default_sample_rate: u32,
    /// Maximum accepted upload size, in megabytes
    pub max_upload_mb: u64,
    /// Optional path to a cloud sample index JSON file (§4.4 cloud catalog)
    pub cloud_sample_index: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// documented defaults for anything unset.
    pub fn from_env() -> Self {
        let base_dir = env_path("MIXCRAFT_BASE_DIR").unwrap_or_else(|| PathBuf::from("./mixcraft_data"));
        let session_root = env_path("MIXCRAFT_SESSION_ROOT")
            .unwrap_or_else(|| base_dir.join("sessions"));
        let samples_dir =
            env_path("MIXCRAFT_SAMPLES_DIR").unwrap_or_else(|| base_dir.join("assets/samples"));

        Self {
            base_dir,
            session_root,
            samples_dir,
            distributed_store_url: std::env::var("MIXCRAFT_STORE_URL").ok(),
            llm_endpoint: std::env::var("MIXCRAFT_LLM_ENDPOINT").ok(),
            llm_api_key: std::env::var("MIXCRAFT_LLM_API_KEY").ok(),
            default_sample_rate: env_u32("MIXCRAFT_SAMPLE_RATE").unwrap_or(44_100),
            max_upload_mb: env_u64("MIXCRAFT_MAX_UPLOAD_MB").unwrap_or(200),
            cloud_sample_index: env_path("MIXCRAFT_CLOUD_SAMPLE_INDEX"),
        }
    }
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var(name).ok().map(PathBuf::from)
}

fn env_u32(name: &str) -> Option<u32> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane_when_unset() {
        let cfg = Config {
            base_dir: PathBuf::from("./mixcraft_data"),
            session_root: PathBuf::from("./mixcraft_data/sessions"),
            samples_dir: PathBuf::from("./mixcraft_data/assets/samples"),
            distributed_store_url: None,
            llm_endpoint: None,
            llm_api_key: None,
            default_sample_rate: 44_100,
            max_upload_mb: 200,
            cloud_sample_index: None,
        };
        assert_eq!(cfg.default_sample_rate, 44_100);
        assert!(cfg.distributed_store_url.is_none());
    }
}
