//! Row → model conversion. Corrupt stored values are logged and replaced
//! with defaults rather than failing the whole request.

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use itsm_db::models::{
    DialogRow, DialogSummaryRow, IncidentRow, MessageRow, ServiceLineRow, ServiceRow, UserRow,
};
use itsm_types::models::{
    Dialog, DialogSummary, Incident, IncidentStatus, IncidentSummary, Message, RoleFlags, Service,
    ServiceLine, User,
};

pub(crate) fn id(raw: &str, what: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, raw, e);
        Uuid::default()
    })
}

pub(crate) fn timestamp(raw: &str, what: &str) -> DateTime<Utc> {
    itsm_db::parse_timestamp(raw).unwrap_or_else(|e| {
        warn!("Corrupt {}: {}", what, e);
        DateTime::default()
    })
}

pub(crate) fn status(raw: &str, incident_id: &str) -> IncidentStatus {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt status on incident '{}': {}", incident_id, e);
        IncidentStatus::Open
    })
}

pub(crate) fn role_flags(row: &UserRow) -> RoleFlags {
    RoleFlags {
        is_admin: row.is_admin,
        is_tech_officer: row.is_tech_officer,
        is_default_officer: row.is_default_officer,
    }
}

pub(crate) fn user(row: &UserRow) -> User {
    User {
        id: id(&row.id, "user id"),
        username: row.username.clone(),
        roles: role_flags(row),
        created_at: timestamp(&row.created_at, "user created_at"),
    }
}

pub(crate) fn service_line(row: &ServiceLineRow) -> ServiceLine {
    ServiceLine {
        id: id(&row.id, "service line id"),
        name: row.name.clone(),
        description: row.description.clone(),
        created_at: timestamp(&row.created_at, "service line created_at"),
    }
}

pub(crate) fn service(row: &ServiceRow) -> Service {
    Service {
        id: id(&row.id, "service id"),
        name: row.name.clone(),
        description: row.description.clone(),
        is_business: row.is_business,
        is_technical: row.is_technical,
        service_line_id: row.service_line_id.as_deref().map(|l| id(l, "service line id")),
        created_at: timestamp(&row.created_at, "service created_at"),
    }
}

pub(crate) fn incident(row: &IncidentRow) -> Incident {
    Incident {
        id: id(&row.id, "incident id"),
        title: row.title.clone(),
        description: row.description.clone(),
        status: status(&row.status, &row.id),
        owner_id: id(&row.owner_id, "incident owner_id"),
        responsible_user_id: row
            .responsible_user_id
            .as_deref()
            .map(|r| id(r, "incident responsible_user_id")),
        created_at: timestamp(&row.created_at, "incident created_at"),
        updated_at: timestamp(&row.updated_at, "incident updated_at"),
    }
}

pub(crate) fn incident_summary(row: &IncidentRow) -> IncidentSummary {
    let incident = incident(row);
    IncidentSummary {
        id: incident.id,
        title: incident.title,
        status: incident.status,
        owner_id: incident.owner_id,
        owner_username: row.owner_username.clone(),
        responsible_user_id: incident.responsible_user_id,
        responsible_username: row.responsible_username.clone(),
        created_at: incident.created_at,
        updated_at: incident.updated_at,
    }
}

pub(crate) fn dialog(row: &DialogRow) -> Dialog {
    Dialog {
        id: id(&row.id, "dialog id"),
        user1_id: id(&row.user1_id, "dialog user1_id"),
        user2_id: id(&row.user2_id, "dialog user2_id"),
        created_at: timestamp(&row.created_at, "dialog created_at"),
    }
}

pub(crate) fn dialog_summary(row: &DialogSummaryRow) -> DialogSummary {
    DialogSummary {
        id: id(&row.id, "dialog id"),
        counterpart_id: id(&row.counterpart_id, "dialog counterpart id"),
        counterpart_username: row.counterpart_username.clone(),
        created_at: timestamp(&row.created_at, "dialog created_at"),
    }
}

pub(crate) fn message(row: &MessageRow) -> Message {
    Message {
        id: id(&row.id, "message id"),
        dialog_id: id(&row.dialog_id, "message dialog_id"),
        sender_id: id(&row.sender_id, "message sender_id"),
        sender_username: row.sender_username.clone(),
        receiver_id: id(&row.receiver_id, "message receiver_id"),
        content: row.content.clone(),
        timestamp: timestamp(&row.created_at, "message created_at"),
    }
}
