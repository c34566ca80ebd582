use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use itsm_db::format_timestamp;

use crate::state::AppState;

/// Background task that drops sessions past their `expires_at`.
pub async fn run_session_cleanup_loop(state: AppState, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        let st = state.clone();
        let result = tokio::task::spawn_blocking(move || {
            st.db.purge_expired_sessions(&format_timestamp(Utc::now()))
        })
        .await;

        match result {
            Ok(Ok(count)) => {
                if count > 0 {
                    info!("Cleanup: purged {} expired sessions", count);
                }
            }
            Ok(Err(e)) => warn!("Cleanup error: {}", e),
            Err(e) => warn!("Cleanup task failed: {}", e),
        }
    }
}
