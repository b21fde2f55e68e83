//! Session-backed flash messages.
//!
//! Messages are queued in the visitor's session by a write request and
//! shown once by the next page render.

use tower_sessions::cookie::time::Duration;
use tower_sessions::cookie::SameSite;
use tower_sessions::{Expiry, Session, SessionManagerLayer};

use super::session_store::SqliteSessionStore;
use super::state::AppState;
use crate::config::Config;
use crate::error::Result;
use crate::handlers::Flash;

/// Session key holding the pending messages.
const FLASHES_KEY: &str = "_flashes";

/// Create the session layer, storing sessions in the registry database.
#[must_use]
pub fn session_layer(state: &AppState) -> SessionManagerLayer<SqliteSessionStore> {
    let config = &state.config;
    SessionManagerLayer::new(SqliteSessionStore::new(state.clone()))
        .with_name(config.session.cookie_name.clone())
        .with_expiry(Expiry::OnInactivity(idle_expiry(config)))
        .with_secure(config.session.secure)
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}

/// Inactivity window of a session.
fn idle_expiry(config: &Config) -> Duration {
    Duration::try_from(config.session_idle()).unwrap_or(Duration::MAX)
}

/// Queue a message for the next page.
///
/// # Errors
///
/// Returns an error if the session cannot be read or written.
pub async fn push(session: &Session, flash: Flash) -> Result<()> {
    let mut pending: Vec<Flash> = session.get(FLASHES_KEY).await?.unwrap_or_default();
    pending.push(flash);
    session.insert(FLASHES_KEY, pending).await?;
    Ok(())
}

/// Remove and return every queued message, oldest first.
///
/// # Errors
///
/// Returns an error if the session cannot be read or written.
pub async fn take(session: &Session) -> Result<Vec<Flash>> {
    Ok(session
        .remove::<Vec<Flash>>(FLASHES_KEY)
        .await?
        .unwrap_or_default())
}
