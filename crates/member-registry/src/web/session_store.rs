//! Session store kept in the registry database.
//!
//! Sessions live in the `sessions` table next to the members, so queued
//! flash messages survive a restart. Expired rows are skipped on load and
//! swept by a background task started with
//! [`SqliteSessionStore::spawn_cleanup`].

use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tower_sessions::cookie::time::OffsetDateTime;
use tower_sessions::session::{Id, Record};
use tower_sessions::session_store::{self, ExpiredDeletion, SessionStore};
use tracing::{debug, warn};

use super::state::AppState;
use crate::error::Error;

/// How often the cleanup task deletes expired sessions.
pub const CLEANUP_PERIOD: Duration = Duration::from_secs(5 * 60);

/// A [`SessionStore`] over the `sessions` table.
///
/// Like the request handlers, every call opens its own connection on the
/// blocking thread pool.
#[derive(Debug, Clone)]
pub struct SqliteSessionStore {
    state: AppState,
}

impl SqliteSessionStore {
    /// Create a store over the database named by `state`.
    #[must_use]
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Delete expired sessions every `period` until the task is aborted.
    ///
    /// The first sweep runs immediately.
    #[must_use]
    pub fn spawn_cleanup(self, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(err) = self.delete_expired().await {
                    warn!(error = %err, "session cleanup failed");
                }
            }
        })
    }
}

fn backend(err: Error) -> session_store::Error {
    session_store::Error::Backend(err.to_string())
}

fn encode(record: &Record) -> session_store::Result<String> {
    serde_json::to_string(record).map_err(|err| session_store::Error::Encode(err.to_string()))
}

fn decode(data: &str) -> session_store::Result<Record> {
    serde_json::from_str(data).map_err(|err| session_store::Error::Decode(err.to_string()))
}

fn now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn create(&self, record: &mut Record) -> session_store::Result<()> {
        loop {
            let id = record.id.to_string();
            let data = encode(record)?;
            let expires_at = record.expiry_date.unix_timestamp();
            let inserted = self
                .state
                .with_store(move |store| store.insert_session(&id, &data, expires_at))
                .await
                .map_err(backend)?;
            if inserted {
                return Ok(());
            }
            debug!("session id collision, drawing a new one");
            record.id = Id::default();
        }
    }

    async fn save(&self, record: &Record) -> session_store::Result<()> {
        let id = record.id.to_string();
        let data = encode(record)?;
        let expires_at = record.expiry_date.unix_timestamp();
        self.state
            .with_store(move |store| store.save_session(&id, &data, expires_at))
            .await
            .map_err(backend)
    }

    async fn load(&self, session_id: &Id) -> session_store::Result<Option<Record>> {
        let id = session_id.to_string();
        let now = now();
        let data = self
            .state
            .with_store(move |store| store.load_session(&id, now))
            .await
            .map_err(backend)?;
        data.as_deref().map(decode).transpose()
    }

    async fn delete(&self, session_id: &Id) -> session_store::Result<()> {
        let id = session_id.to_string();
        self.state
            .with_store(move |store| store.delete_session(&id))
            .await
            .map_err(backend)?;
        Ok(())
    }
}

#[async_trait]
impl ExpiredDeletion for SqliteSessionStore {
    async fn delete_expired(&self) -> session_store::Result<()> {
        let now = now();
        self.state
            .with_store(move |store| store.prune_expired_sessions(now))
            .await
            .map_err(backend)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tower_sessions::cookie::time::Duration as TimeDuration;

    use super::*;
    use crate::config::Config;

    struct TestStore {
        store: SqliteSessionStore,
        state: AppState,
    }

    impl TestStore {
        fn new(name: &str) -> Self {
            let dir = std::env::temp_dir().join(format!(
                "member_registry_sessions_{}_{name}",
                std::process::id()
            ));
            let _ = std::fs::remove_dir_all(&dir);
            let mut config = Config::default();
            config.storage.database_path = Some(dir.join("members.db"));
            let state = AppState::new(config);
            Self {
                store: SqliteSessionStore::new(state.clone()),
                state,
            }
        }

        async fn session_count(&self) -> i64 {
            self.state
                .with_store(|store| store.session_count())
                .await
                .unwrap()
        }
    }

    impl Drop for TestStore {
        fn drop(&mut self) {
            if let Some(dir) = self.state.database_path.parent() {
                let _ = std::fs::remove_dir_all(dir);
            }
        }
    }

    fn record(expires_in: TimeDuration) -> Record {
        let mut record = Record {
            id: Id::default(),
            data: Default::default(),
            expiry_date: OffsetDateTime::now_utc() + expires_in,
        };
        record
            .data
            .insert("_flashes".to_string(), serde_json::json!(["hello"]));
        record
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let test = TestStore::new("save_load");
        let record = record(TimeDuration::minutes(10));

        test.store.save(&record).await.unwrap();

        let loaded = test.store.load(&record.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, record.id);
        assert_eq!(loaded.data, record.data);
        assert_eq!(
            loaded.expiry_date.unix_timestamp(),
            record.expiry_date.unix_timestamp()
        );
    }

    #[tokio::test]
    async fn test_load_unknown_id() {
        let test = TestStore::new("unknown");
        assert!(test.store.load(&Id::default()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_replaces_taken_id() {
        let test = TestStore::new("collision");
        let first = record(TimeDuration::minutes(10));
        test.store.save(&first).await.unwrap();

        let mut second = record(TimeDuration::minutes(10));
        second.id = first.id;
        test.store.create(&mut second).await.unwrap();

        assert_ne!(second.id, first.id);
        assert_eq!(test.session_count().await, 2);
        assert!(test.store.load(&second.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete() {
        let test = TestStore::new("delete");
        let record = record(TimeDuration::minutes(10));
        test.store.save(&record).await.unwrap();

        test.store.delete(&record.id).await.unwrap();

        assert!(test.store.load(&record.id).await.unwrap().is_none());
        assert_eq!(test.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_expired_session_not_loaded() {
        let test = TestStore::new("expired_load");
        let record = record(TimeDuration::minutes(-1));
        test.store.save(&record).await.unwrap();

        assert!(test.store.load(&record.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_expired_removes_only_expired() {
        let test = TestStore::new("delete_expired");
        let stale = record(TimeDuration::minutes(-5));
        let live = record(TimeDuration::minutes(5));
        test.store.save(&stale).await.unwrap();
        test.store.save(&live).await.unwrap();
        assert_eq!(test.session_count().await, 2);

        test.store.delete_expired().await.unwrap();

        assert_eq!(test.session_count().await, 1);
        assert!(test.store.load(&live.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_cleanup_task_sweeps_expired() {
        let test = TestStore::new("cleanup_task");
        test.store
            .save(&record(TimeDuration::minutes(-5)))
            .await
            .unwrap();

        let handle = test
            .store
            .clone()
            .spawn_cleanup(Duration::from_millis(20));

        let mut remaining = test.session_count().await;
        for _ in 0..50 {
            if remaining == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            remaining = test.session_count().await;
        }
        handle.abort();

        assert_eq!(remaining, 0);
    }
}
