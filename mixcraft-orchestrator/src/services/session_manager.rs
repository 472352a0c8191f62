//! Session Manager (C9)
//!
//! Owns the on-disk per-session directory: allocation, upload acceptance,
//! streamed download, and guaranteed cleanup (§4.9). Session *metadata* is
//! owned by the Job State Store (C12); this module never touches it.

use mixcraft_common::Error;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

const ALLOWED_EXTENSIONS: &[&str] = &["wav", "mp3", "flac", "ogg", "m4a"];
pub const CHUNK_SIZE: usize = 1024 * 1024;

pub struct SessionManager {
    session_root: PathBuf,
    max_upload_bytes: u64,
}

impl SessionManager {
    pub fn new(session_root: PathBuf, max_upload_mb: u64) -> Self {
        Self {
            session_root,
            max_upload_bytes: max_upload_mb * 1024 * 1024,
        }
    }

    /// Allocate a new opaque session id. No directory is created yet; that
    /// happens lazily on first upload (§4.9).
    pub fn create(&self) -> Uuid {
        Uuid::new_v4()
    }

    fn dir_for(&self, session_id: Uuid) -> PathBuf {
        self.session_root.join(session_id.to_string())
    }

    /// Accept one uploaded file, creating the session directory on first
    /// call. The extension is whitelisted; unknown extensions are coerced
    /// to `.wav` so downstream code always sees a recognized suffix.
    pub async fn accept_upload(
        &self,
        session_id: Uuid,
        label: &str,
        bytes: &[u8],
    ) -> mixcraft_common::Result<PathBuf> {
        if bytes.len() as u64 > self.max_upload_bytes {
            return Err(Error::InvalidInput(format!(
                "upload of {} bytes exceeds the {}-byte cap",
                bytes.len(),
                self.max_upload_bytes
            )));
        }

        let dir = self.dir_for(session_id);
        tokio::fs::create_dir_all(&dir).await?;

        let ext = guess_extension(label, bytes);
        let path = dir.join(format!("song_{label}.{ext}"));
        let mut file = tokio::fs::File::create(&path).await?;
        file.write_all(bytes).await?;
        file.flush().await?;

        info!(?session_id, label, bytes = bytes.len(), "Accepted upload");
        Ok(path)
    }

    /// Stream an artifact without deleting the session directory afterward
    /// (used for the tracklist, which remains downloadable, §6).
    pub async fn stream_artifact_keep<F>(
        &self,
        artifact_path: &Path,
        mut on_chunk: F,
    ) -> mixcraft_common::Result<()>
    where
        F: FnMut(Vec<u8>) -> std::io::Result<()>,
    {
        use tokio::io::AsyncReadExt;

        let mut file = tokio::fs::File::open(artifact_path).await?;
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            on_chunk(buf[..n].to_vec())
                .map_err(|e| Error::Internal(format!("chunk delivery failed: {e}")))?;
        }
        Ok(())
    }

    pub async fn delete_session_dir(&self, session_id: Uuid) -> mixcraft_common::Result<()> {
        let dir = self.dir_for(session_id);
        if dir.exists() {
            tokio::fs::remove_dir_all(&dir).await?;
        }
        Ok(())
    }

    /// Remove any on-disk session directory whose id isn't in `live_ids`
    /// (§4.9). Callers supply the known set from the Job State Store so
    /// this module never needs to reach into C12 directly.
    pub async fn reap_abandoned(&self, live_ids: &HashSet<Uuid>) -> mixcraft_common::Result<usize> {
        let mut removed = 0;
        let mut entries = match tokio::fs::read_dir(&self.session_root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let Ok(id) = entry.file_name().to_string_lossy().parse::<Uuid>() else {
                continue;
            };
            if !live_ids.contains(&id) {
                if let Err(e) = tokio::fs::remove_dir_all(entry.path()).await {
                    warn!(?id, error = %e, "Failed to reap abandoned session directory");
                } else {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}

fn guess_extension(label: &str, bytes: &[u8]) -> &'static str {
    let from_label = label.rsplit('.').next().map(|s| s.to_ascii_lowercase());
    if let Some(ext) = from_label {
        if let Some(matched) = ALLOWED_EXTENSIONS.iter().find(|&&a| a == ext) {
            return matched;
        }
    }
    if bytes.starts_with(b"RIFF") {
        "wav"
    } else if bytes.starts_with(b"fLaC") {
        "flac"
    } else if bytes.starts_with(b"OggS") {
        "ogg"
    } else if bytes.starts_with(&[0xFF, 0xFB]) || bytes.starts_with(b"ID3") {
        "mp3"
    } else {
        "wav"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn accept_upload_creates_directory_and_writes_file() {
        let dir = tempdir().unwrap();
        let mgr = SessionManager::new(dir.path().to_path_buf(), 10);
        let id = mgr.create();

        let path = mgr.accept_upload(id, "a", b"RIFFxxxx").await.unwrap();
        assert!(path.exists());
        assert_eq!(path.extension().unwrap(), "wav");
    }

    #[tokio::test]
    async fn accept_upload_rejects_oversized_payload() {
        let dir = tempdir().unwrap();
        let mgr = SessionManager::new(dir.path().to_path_buf(), 0);
        let id = mgr.create();
        let result = mgr.accept_upload(id, "a", b"some bytes").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn stream_artifact_keep_reads_full_contents_without_deleting() {
        let dir = tempdir().unwrap();
        let mgr = SessionManager::new(dir.path().to_path_buf(), 10);
        let id = mgr.create();
        let path = mgr.accept_upload(id, "a", b"RIFFxxxx").await.unwrap();

        let mut collected = Vec::new();
        mgr.stream_artifact_keep(&path, |chunk| {
            collected.extend(chunk);
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(collected, b"RIFFxxxx");
        assert!(mgr.dir_for(id).exists());
    }

    #[tokio::test]
    async fn reap_abandoned_removes_only_dead_sessions() {
        let dir = tempdir().unwrap();
        let mgr = SessionManager::new(dir.path().to_path_buf(), 10);
        let live = mgr.create();
        let dead = mgr.create();
        mgr.accept_upload(live, "a", b"RIFFxxxx").await.unwrap();
        mgr.accept_upload(dead, "a", b"RIFFxxxx").await.unwrap();

        let mut live_ids = HashSet::new();
        live_ids.insert(live);
        let removed = mgr.reap_abandoned(&live_ids).await.unwrap();

        assert_eq!(removed, 1);
        assert!(mgr.dir_for(live).exists());
        assert!(!mgr.dir_for(dead).exists());
    }

    #[test]
    fn guess_extension_falls_back_to_wav_for_unknown() {
        assert_eq!(guess_extension("a.xyz", b"whatever"), "wav");
        assert_eq!(guess_extension("a.mp3", b"whatever"), "mp3");
    }
}
