use std::sync::{Arc, OnceLock};

use anyhow::anyhow;
use tracing::error;

use itsm_db::Database;

use crate::error::{ApiResult, ItsmError};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub auth: AuthSettings,
}

pub struct AuthSettings {
    pub jwt_secret: String,
    pub session_ttl: chrono::Duration,
    pub cookie_secure: bool,
    /// Cost used for new password hashes. Verification reads the cost
    /// stored in each hash.
    pub password_params: argon2::Params,
    /// Hash verified against when a login names an unknown user, so both
    /// failure paths cost one Argon2 verification.
    pub(crate) dummy_hash: OnceLock<String>,
}

impl AuthSettings {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            session_ttl: chrono::Duration::hours(24),
            cookie_secure: false,
            password_params: argon2::Params::default(),
            dummy_hash: OnceLock::new(),
        }
    }
}

impl AppStateInner {
    pub fn new(db: Database, auth: AuthSettings) -> AppState {
        Arc::new(Self { db, auth })
    }
}

/// Run blocking DB work off the async runtime.
pub(crate) async fn blocking<F, T>(state: &AppState, f: F) -> ApiResult<T>
where
    F: FnOnce(&AppStateInner) -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ItsmError::Internal(anyhow!("blocking task failed"))
        })?
}
