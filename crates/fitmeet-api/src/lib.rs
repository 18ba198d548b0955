pub mod auth;
pub mod error;
pub mod events;
pub mod extract;
pub mod messages;
pub mod middleware;
pub mod plans;
pub mod ratings;
pub mod routes;
pub mod trainers;
pub mod users;
mod validate;

use fitmeet_db::Database;
use tracing::error;

use crate::auth::AppState;
use crate::error::ApiError;

pub use routes::router;

/// Run a blocking DB call off the async runtime.
pub(crate) async fn run_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.into())
        })?
        .map_err(ApiError::Internal)
}

/// Page size for list endpoints: 50 unless asked, never above 200.
pub(crate) fn clamp_limit(limit: Option<u32>) -> u32 {
    limit.unwrap_or(50).clamp(1, 200)
}
