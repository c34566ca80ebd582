use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- Roles --

/// The three independent role flags as they are persisted on a user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleFlags {
    pub is_admin: bool,
    pub is_tech_officer: bool,
    pub is_default_officer: bool,
}

impl RoleFlags {
    pub const CLIENT: Self = Self {
        is_admin: false,
        is_tech_officer: false,
        is_default_officer: false,
    };

    pub const ADMIN: Self = Self {
        is_admin: true,
        is_tech_officer: false,
        is_default_officer: false,
    };

    pub const TECH_OFFICER: Self = Self {
        is_admin: false,
        is_tech_officer: true,
        is_default_officer: false,
    };

    pub const DEFAULT_OFFICER: Self = Self {
        is_admin: false,
        is_tech_officer: false,
        is_default_officer: true,
    };
}

/// Closed role a session acts under. A user carrying several flags gets the
/// strongest one: Admin > TechOfficer > DefaultOfficer > Client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Client,
    Admin,
    TechOfficer,
    DefaultOfficer,
}

impl Role {
    pub fn from_flags(flags: RoleFlags) -> Self {
        if flags.is_admin {
            Role::Admin
        } else if flags.is_tech_officer {
            Role::TechOfficer
        } else if flags.is_default_officer {
            Role::DefaultOfficer
        } else {
            Role::Client
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Admin => "admin",
            Role::TechOfficer => "tech_officer",
            Role::DefaultOfficer => "default_officer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown value '{}'", self.0)
    }
}

impl std::error::Error for UnknownVariant {}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(Role::Client),
            "admin" => Ok(Role::Admin),
            "tech_officer" => Ok(Role::TechOfficer),
            "default_officer" => Ok(Role::DefaultOfficer),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

// -- Users --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(flatten)]
    pub roles: RoleFlags,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn role(&self) -> Role {
        Role::from_flags(self.roles)
    }
}

// -- Service catalog --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Business,
    Technical,
}

impl FromStr for ServiceKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "business" => Ok(ServiceKind::Business),
            "technical" => Ok(ServiceKind::Technical),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceLine {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub is_business: bool,
    pub is_technical: bool,
    pub service_line_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Service {
    pub fn is_kind(&self, kind: ServiceKind) -> bool {
        match kind {
            ServiceKind::Business => self.is_business,
            ServiceKind::Technical => self.is_technical,
        }
    }
}

/// Fields an admin supplies when creating or editing a service.
#[derive(Debug, Clone, Default)]
pub struct ServiceDraft {
    pub name: String,
    pub description: String,
    pub is_business: bool,
    pub is_technical: bool,
    pub service_line_id: Option<Uuid>,
}

// -- Incidents --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IncidentStatus {
    Open,
    #[serde(rename = "In Progress")]
    InProgress,
    Resolved,
    Closed,
}

impl IncidentStatus {
    pub const ALL: [IncidentStatus; 4] = [
        IncidentStatus::Open,
        IncidentStatus::InProgress,
        IncidentStatus::Resolved,
        IncidentStatus::Closed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            IncidentStatus::Open => "Open",
            IncidentStatus::InProgress => "In Progress",
            IncidentStatus::Resolved => "Resolved",
            IncidentStatus::Closed => "Closed",
        }
    }

    /// Staying in the same status is always allowed.
    pub fn can_transition_to(self, next: IncidentStatus) -> bool {
        use IncidentStatus::*;

        if self == next {
            return true;
        }
        match self {
            Open => matches!(next, InProgress | Resolved | Closed),
            InProgress => matches!(next, Open | Resolved | Closed),
            Resolved => matches!(next, InProgress | Closed | Open),
            Closed => matches!(next, Open),
        }
    }

    /// Statuses reachable from `self`, including `self`.
    pub fn next_statuses(self) -> Vec<IncidentStatus> {
        Self::ALL
            .into_iter()
            .filter(|s| self.can_transition_to(*s))
            .collect()
    }

    /// Statuses an incident may be in for a move to `self`.
    pub fn previous_statuses(self) -> Vec<IncidentStatus> {
        Self::ALL
            .into_iter()
            .filter(|s| s.can_transition_to(self))
            .collect()
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IncidentStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Open" => Ok(IncidentStatus::Open),
            "In Progress" => Ok(IncidentStatus::InProgress),
            "Resolved" => Ok(IncidentStatus::Resolved),
            "Closed" => Ok(IncidentStatus::Closed),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub status: IncidentStatus,
    pub owner_id: Uuid,
    pub responsible_user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One row of the incident list, with display names joined in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentSummary {
    pub id: Uuid,
    pub title: String,
    pub status: IncidentStatus,
    pub owner_id: Uuid,
    pub owner_username: String,
    pub responsible_user_id: Option<Uuid>,
    pub responsible_username: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentDetail {
    #[serde(flatten)]
    pub incident: Incident,
    pub owner_username: String,
    pub responsible_username: Option<String>,
    pub services: Vec<Service>,
}

/// Staff edit of an incident. `None` leaves the field as it is; a
/// `Some` service list replaces the whole link set.
#[derive(Debug, Clone)]
pub struct IncidentUpdate {
    pub status: IncidentStatus,
    pub responsible_user_id: Option<Uuid>,
    pub service_ids: Option<Vec<Uuid>>,
}

// -- Messaging --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dialog {
    pub id: Uuid,
    pub user1_id: Uuid,
    pub user2_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Dialog {
    /// Canonical storage order for an unordered participant pair.
    pub fn normalize_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
        if a <= b { (a, b) } else { (b, a) }
    }

    pub fn has_participant(&self, user_id: Uuid) -> bool {
        self.user1_id == user_id || self.user2_id == user_id
    }

    /// The participant that is not `user_id`.
    pub fn counterpart(&self, user_id: Uuid) -> Uuid {
        if self.user1_id == user_id {
            self.user2_id
        } else {
            self.user1_id
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogSummary {
    pub id: Uuid,
    pub counterpart_id: Uuid,
    pub counterpart_username: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub dialog_id: Uuid,
    pub sender_id: Uuid,
    pub sender_username: String,
    pub receiver_id: Uuid,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}
