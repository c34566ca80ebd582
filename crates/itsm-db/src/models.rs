//! Database row types. These map directly to SQLite rows and stay
//! independent of the itsm-types API models; ids and timestamps are kept as
//! their stored text.

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub is_admin: bool,
    pub is_tech_officer: bool,
    pub is_default_officer: bool,
    pub created_at: String,
}

pub struct SessionRow {
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub role: String,
    pub created_at: String,
    pub expires_at: String,
}

pub struct ServiceLineRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub created_at: String,
}

pub struct ServiceRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub is_business: bool,
    pub is_technical: bool,
    pub service_line_id: Option<String>,
    pub created_at: String,
}

/// Writable columns of a service.
pub struct ServiceFields<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub is_business: bool,
    pub is_technical: bool,
    pub service_line_id: Option<&'a str>,
}

/// Incident with owner and responsible usernames joined in.
pub struct IncidentRow {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: String,
    pub owner_id: String,
    pub owner_username: String,
    pub responsible_user_id: Option<String>,
    pub responsible_username: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct NewIncident<'a> {
    pub id: &'a str,
    pub owner_id: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub status: &'a str,
    pub created_at: &'a str,
}

pub struct IncidentChanges<'a> {
    pub status: &'a str,
    /// Statuses the incident must currently have for the change to apply.
    pub allowed_from: &'a [&'a str],
    pub responsible_user_id: Option<&'a str>,
    /// `Some` replaces every link of the incident.
    pub service_ids: Option<&'a [String]>,
    pub updated_at: &'a str,
}

pub struct DialogRow {
    pub id: String,
    pub user1_id: String,
    pub user2_id: String,
    pub created_at: String,
}

pub struct DialogSummaryRow {
    pub id: String,
    pub counterpart_id: String,
    pub counterpart_username: String,
    pub created_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub dialog_id: String,
    pub sender_id: String,
    pub sender_username: String,
    pub receiver_id: String,
    pub content: String,
    pub created_at: String,
}
