//! Job State Store (C12)
//!
//! Durable-enough session state keyed by `session_id`, with a TTL so
//! abandoned sessions expire on their own (§4.12). Two implementations
//! share one trait: an in-process store for single-instance deployments and
//! tests, and a Redis-backed store for horizontally-scaled deployments
//! where multiple orchestrator instances must observe the same state.

use async_trait::async_trait;
use mixcraft_common::models::Session;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Sessions older than this since their last write are eligible for reap
/// (§4.9's background reaper, §4.12's TTL).
pub const SESSION_TTL: Duration = Duration::from_secs(3600);

#[async_trait]
pub trait JobStateStore: Send + Sync {
    async fn put(&self, session: Session) -> mixcraft_common::Result<()>;
    async fn get(&self, session_id: Uuid) -> mixcraft_common::Result<Option<Session>>;
    async fn delete(&self, session_id: Uuid) -> mixcraft_common::Result<()>;
    /// IDs of sessions whose last write is older than [`SESSION_TTL`].
    async fn expired_ids(&self) -> mixcraft_common::Result<Vec<Uuid>>;
}

struct Entry {
    session: Session,
    written_at: Instant,
}

/// Single-process implementation backed by a mutex-guarded map. Sufficient
/// for a single orchestrator instance; state is lost on restart.
pub struct InProcessStore {
    entries: Mutex<HashMap<Uuid, Entry>>,
}

impl InProcessStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InProcessStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStateStore for InProcessStore {
    async fn put(&self, session: Session) -> mixcraft_common::Result<()> {
        self.entries.lock().unwrap().insert(
            session.session_id,
            Entry {
                session,
                written_at: Instant::now(),
            },
        );
        Ok(())
    }

    async fn get(&self, session_id: Uuid) -> mixcraft_common::Result<Option<Session>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(&session_id)
            .map(|e| e.session.clone()))
    }

    async fn delete(&self, session_id: Uuid) -> mixcraft_common::Result<()> {
        self.entries.lock().unwrap().remove(&session_id);
        Ok(())
    }

    async fn expired_ids(&self) -> mixcraft_common::Result<Vec<Uuid>> {
        let now = Instant::now();
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, e)| now.duration_since(e.written_at) > SESSION_TTL)
            .map(|(id, _)| *id)
            .collect())
    }
}

/// Distributed implementation backed by Redis, using native key TTL instead
/// of scanning for expiry (§4.12). A separate `ZSET` tracks session IDs by
/// write time so `expired_ids` doesn't require a full key scan.
pub struct RedisStore {
    conn: redis::aio::ConnectionManager,
}

impl RedisStore {
    pub fn new(conn: redis::aio::ConnectionManager) -> Self {
        Self { conn }
    }

    fn key(session_id: Uuid) -> String {
        format!("mixcraft:session:{session_id}")
    }

    const INDEX_KEY: &'static str = "mixcraft:session:index";
}

#[async_trait]
impl JobStateStore for RedisStore {
    async fn put(&self, session: Session) -> mixcraft_common::Result<()> {
        use redis::AsyncCommands;
        let mut conn = self.conn.clone();
        let text = serde_json::to_string(&session)
            .map_err(|e| mixcraft_common::Error::Internal(e.to_string()))?;
        let ttl_secs = SESSION_TTL.as_secs() as usize;
        conn.set_ex::<_, _, ()>(Self::key(session.session_id), text, ttl_secs)
            .await
            .map_err(|e| mixcraft_common::Error::Internal(e.to_string()))?;
        let now = chrono::Utc::now().timestamp() as f64;
        conn.zadd::<_, _, _, ()>(Self::INDEX_KEY, session.session_id.to_string(), now)
            .await
            .map_err(|e| mixcraft_common::Error::Internal(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, session_id: Uuid) -> mixcraft_common::Result<Option<Session>> {
        use redis::AsyncCommands;
        let mut conn = self.conn.clone();
        let text: Option<String> = conn
            .get(Self::key(session_id))
            .await
            .map_err(|e| mixcraft_common::Error::Internal(e.to_string()))?;
        text.map(|t| {
            serde_json::from_str(&t).map_err(|e| mixcraft_common::Error::Internal(e.to_string()))
        })
        .transpose()
    }

    async fn delete(&self, session_id: Uuid) -> mixcraft_common::Result<()> {
        use redis::AsyncCommands;
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(Self::key(session_id))
            .await
            .map_err(|e| mixcraft_common::Error::Internal(e.to_string()))?;
        conn.zrem::<_, _, ()>(Self::INDEX_KEY, session_id.to_string())
            .await
            .map_err(|e| mixcraft_common::Error::Internal(e.to_string()))?;
        Ok(())
    }

    async fn expired_ids(&self) -> mixcraft_common::Result<Vec<Uuid>> {
        use redis::AsyncCommands;
        let mut conn = self.conn.clone();
        let cutoff = (chrono::Utc::now().timestamp() - SESSION_TTL.as_secs() as i64) as f64;
        let ids: Vec<String> = conn
            .zrangebyscore(Self::INDEX_KEY, f64::NEG_INFINITY, cutoff)
            .await
            .map_err(|e| mixcraft_common::Error::Internal(e.to_string()))?;
        Ok(ids.into_iter().filter_map(|s| s.parse().ok()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mixcraft_common::models::SessionStatus;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = InProcessStore::new();
        let session = Session::new(Uuid::new_v4());
        let id = session.session_id;
        store.put(session).await.unwrap();

        let fetched = store.get(id).await.unwrap().unwrap();
        assert_eq!(fetched.session_id, id);
        assert_eq!(fetched.status, SessionStatus::New);
    }

    #[tokio::test]
    async fn get_missing_session_returns_none() {
        let store = InProcessStore::new();
        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_removes_the_session() {
        let store = InProcessStore::new();
        let session = Session::new(Uuid::new_v4());
        let id = session.session_id;
        store.put(session).await.unwrap();
        store.delete(id).await.unwrap();
        assert!(store.get(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fresh_sessions_are_not_expired() {
        let store = InProcessStore::new();
        store.put(Session::new(Uuid::new_v4())).await.unwrap();
        assert!(store.expired_ids().await.unwrap().is_empty());
    }
}
