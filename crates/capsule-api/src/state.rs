use std::sync::Arc;
use std::time::Duration;

use capsule_db::{CapsuleStore, Database};
use tracing::error;

use crate::error::ApiError;
use crate::media::MediaStore;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub store: CapsuleStore,
    pub media: MediaStore,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    /// Upper bound on any single trip to the database.
    pub db_timeout: Duration,
}

/// Run blocking store work off the async runtime, bounded by `db_timeout`.
/// A timeout surfaces as a retryable error.
pub async fn blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&AppStateInner) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let inner = state.clone();
    let task = tokio::task::spawn_blocking(move || f(&inner));

    match tokio::time::timeout(state.db_timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            error!("spawn_blocking join error: {}", e);
            Err(ApiError::Internal(e.to_string()))
        }
        Err(_) => Err(ApiError::Store(capsule_db::StoreError::Transient(format!(
            "no response from the database within {:?}",
            state.db_timeout
        )))),
    }
}
