//! HTTP surface of the member registry.
//!
//! Builds the axum [`Router`] and runs the server. Route handlers live in
//! [`routes`]; each request opens its own store through
//! [`AppState::with_store`]. Sessions are kept in the same database by
//! [`session_store::SqliteSessionStore`].

pub mod flash;
pub mod routes;
pub mod session_store;
pub mod state;
pub mod templates;

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub use session_store::SqliteSessionStore;
pub use state::AppState;

use crate::config::Config;
use crate::error::{Error, Result};

/// Body of every 500 response.
const INTERNAL_ERROR_PAGE: &str = "<!DOCTYPE html>\n<html lang=\"en\">\n\
    <head><meta charset=\"utf-8\"><title>Server error</title></head>\n\
    <body><h1>Server error</h1><p>Something went wrong. Please try again.</p>\
    <p><a href=\"/\">Back to the list</a></p></body>\n</html>\n";

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        error!(error = %self, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, Html(INTERNAL_ERROR_PAGE)).into_response()
    }
}

/// Build the application router.
#[must_use]
pub fn router(state: AppState) -> Router {
    let sessions = flash::session_layer(&state);

    Router::new()
        .route("/", get(routes::index).post(routes::create))
        .route("/edit/{id}", get(routes::edit_page).post(routes::edit_submit))
        .route("/delete/{id}", post(routes::delete))
        .layer(sessions)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the web server until Ctrl-C or SIGTERM.
///
/// # Errors
///
/// Returns an error if the database cannot be prepared or the listener
/// cannot be bound.
pub async fn serve(config: Config) -> Result<()> {
    let addr = config.bind_addr()?;
    let state = AppState::new(config);

    state.with_store(|store| store.ensure_schema()).await?;

    let listener = TcpListener::bind(addr).await?;
    let cleanup =
        SqliteSessionStore::new(state.clone()).spawn_cleanup(session_store::CLEANUP_PERIOD);
    info!(
        %addr,
        database = %state.database_path.display(),
        "member registry listening"
    );

    let served = axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await;
    cleanup.abort();
    served?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received");
}
