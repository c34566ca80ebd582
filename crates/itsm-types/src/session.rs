use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Role;

/// Identity of the caller for the duration of one request. Built by the
/// authentication middleware from the server-side session record; the role
/// is the snapshot taken at login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionContext {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
}
