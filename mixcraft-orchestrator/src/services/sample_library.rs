//! Sample Library (C4)
//!
//! Catalogs local and cloud overlay samples with cached BPM/key metadata,
//! and filters them by BPM tolerance and Camelot distance (§4.4).

use crate::services::analyzer::AudioAnalyzer;
use mixcraft_common::harmonic::camelot_distance;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Overlay category (§4.4: instruments, vocals, percussion).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleCategory {
    Instrument,
    Vocal,
    Percussion,
}

/// One catalog entry, from either the local filesystem catalog or the
/// cloud index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleEntry {
    pub name: String,
    /// Local filesystem path, or a cloud URL.
    pub location: String,
    pub bpm: f64,
    pub camelot: String,
    pub category: SampleCategory,
    pub is_cloud: bool,
}

/// Sidecar metadata cache keyed by absolute file path (local catalog only).
type MetadataCache = HashMap<PathBuf, (f64, String)>;

/// Catalogs local and cloud overlay samples.
pub struct SampleLibrary {
    samples_dir: PathBuf,
    analyzer: Arc<dyn AudioAnalyzer>,
    local: RwLock<Vec<SampleEntry>>,
    cloud: RwLock<Vec<SampleEntry>>,
    metadata_cache: RwLock<MetadataCache>,
}

impl SampleLibrary {
    pub fn new(samples_dir: PathBuf, analyzer: Arc<dyn AudioAnalyzer>) -> Self {
        Self {
            samples_dir,
            analyzer,
            local: RwLock::new(Vec::new()),
            cloud: RwLock::new(Vec::new()),
            metadata_cache: RwLock::new(HashMap::new()),
        }
    }

    /// Load the cloud catalog from a JSON index file declaring
    /// `{name, url, bpm, key, category}` entries (§4.4).
    pub async fn load_cloud_index(&self, index_path: &Path) -> mixcraft_common::Result<()> {
        let text = tokio::fs::read_to_string(index_path).await?;
        let raw: Vec<CloudIndexEntry> = serde_json::from_str(&text)
            .map_err(|e| mixcraft_common::Error::Config(format!("bad cloud index: {e}")))?;
        let entries = raw
            .into_iter()
            .map(|e| SampleEntry {
                name: e.name,
                location: e.url,
                bpm: e.bpm,
                camelot: e.key,
                category: e.category,
                is_cloud: true,
            })
            .collect();
        *self.cloud.write().await = entries;
        Ok(())
    }

    /// Rescan the local filesystem catalog under
    /// `assets/samples/{instruments,vocals,percussion}`. Drops cache
    /// entries for files that no longer exist, and lazily populates BPM/key
    /// metadata via the Audio Analyzer on first sight of a file (§4.4).
    pub async fn refresh(&self) {
        let mut entries = Vec::new();
        for (dir, category) in [
            ("instruments", SampleCategory::Instrument),
            ("vocals", SampleCategory::Vocal),
            ("percussion", SampleCategory::Percussion),
        ] {
            let dir_path = self.samples_dir.join(dir);
            if !dir_path.is_dir() {
                continue;
            }
            for entry in walkdir::WalkDir::new(&dir_path)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                let path = entry.path().to_path_buf();
                let (bpm, camelot) = self.metadata_for(&path).await;
                entries.push(SampleEntry {
                    name: entry.file_name().to_string_lossy().to_string(),
                    location: path.to_string_lossy().to_string(),
                    bpm,
                    camelot,
                    category,
                    is_cloud: false,
                });
            }
        }

        let known: std::collections::HashSet<PathBuf> =
            entries.iter().map(|e| PathBuf::from(&e.location)).collect();
        self.metadata_cache
            .write()
            .await
            .retain(|path, _| known.contains(path));

        debug!(count = entries.len(), "Refreshed local sample catalog");
        *self.local.write().await = entries;
    }

    async fn metadata_for(&self, path: &Path) -> (f64, String) {
        if let Some(cached) = self.metadata_cache.read().await.get(path) {
            return cached.clone();
        }
        let analysis = self.analyzer.analyze(path).await;
        let meta = (analysis.bpm, analysis.key_camelot);
        self.metadata_cache
            .write()
            .await
            .insert(path.to_path_buf(), meta.clone());
        meta
    }

    /// Entries (local + cloud) whose BPM is within `bpm_tol` of `bpm` AND
    /// whose Camelot distance to `camelot` is `<= max_dist` (§4.4).
    pub async fn get_compatible(
        &self,
        bpm: f64,
        camelot: &str,
        categories: &[SampleCategory],
        bpm_tol: f64,
        max_dist: u8,
    ) -> Vec<SampleEntry> {
        let local = self.local.read().await;
        let cloud = self.cloud.read().await;
        local
            .iter()
            .chain(cloud.iter())
            .filter(|e| categories.contains(&e.category))
            .filter(|e| (e.bpm - bpm).abs() <= bpm_tol)
            .filter(|e| camelot_distance(Some(&e.camelot), Some(camelot)) <= max_dist)
            .cloned()
            .collect()
    }

    /// Whether any cloud overlay entries are currently loaded (used by the
    /// two-track "force overlay" policy, §4.6 step 8).
    pub async fn has_cloud_entries(&self) -> bool {
        !self.cloud.read().await.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct CloudIndexEntry {
    name: String,
    url: String,
    bpm: f64,
    key: String,
    category: SampleCategory,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::analyzer::StubAnalyzer;

    fn lib_with(entries: Vec<SampleEntry>) -> SampleLibrary {
        let lib = SampleLibrary::new(PathBuf::from("/nonexistent"), Arc::new(StubAnalyzer::default()));
        lib.cloud = RwLock::new(entries);
        lib
    }

    #[tokio::test]
    async fn filters_by_bpm_tolerance_and_camelot_distance() {
        let lib = lib_with(vec![
            SampleEntry {
                name: "close".into(),
                location: "a".into(),
                bpm: 122.0,
                camelot: "8A".into(),
                category: SampleCategory::Instrument,
                is_cloud: true,
            },
            SampleEntry {
                name: "far_bpm".into(),
                location: "b".into(),
                bpm: 200.0,
                camelot: "8A".into(),
                category: SampleCategory::Instrument,
                is_cloud: true,
            },
            SampleEntry {
                name: "far_key".into(),
                location: "c".into(),
                bpm: 122.0,
                camelot: "2A".into(),
                category: SampleCategory::Instrument,
                is_cloud: true,
            },
        ]);

        let result = lib
            .get_compatible(120.0, "8A", &[SampleCategory::Instrument], 5.0, 1)
            .await;
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].name, "close");
    }
}
