//! Shared application state.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::storage::Storage;

/// State handed to every request handler.
///
/// Holds no open connection: each request opens its own store.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Loaded configuration.
    pub config: Arc<Config>,
    /// Database file every request opens.
    pub database_path: PathBuf,
}

impl AppState {
    /// Build state from a loaded configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let database_path = config.database_path();
        Self {
            config: Arc::new(config),
            database_path,
        }
    }

    /// Page title from the configuration.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.config.site.title
    }

    /// Run `f` against a store opened for this call only.
    ///
    /// The store is opened on the blocking thread pool and dropped as soon
    /// as `f` returns, whether it succeeded or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened, if `f` fails, or if
    /// the blocking task panics.
    pub async fn with_store<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Storage) -> Result<T> + Send + 'static,
    {
        let path = self.database_path.clone();
        tokio::task::spawn_blocking(move || {
            let storage = Storage::open(&path)?;
            f(&storage)
        })
        .await?
    }
}
