//! Access control rules. Everything here is a pure function of the caller's
//! role (and, for incidents, ownership).

use uuid::Uuid;

use crate::models::{Role, RoleFlags};
use crate::session::SessionContext;

impl Role {
    pub fn is_client(self) -> bool {
        matches!(self, Role::Client)
    }

    pub fn is_staff(self) -> bool {
        !self.is_client()
    }

    pub fn can_manage_all_incidents(self) -> bool {
        match self {
            Role::Admin | Role::TechOfficer => true,
            Role::DefaultOfficer | Role::Client => false,
        }
    }

    pub fn can_manage_catalog(self) -> bool {
        match self {
            Role::Admin => true,
            Role::TechOfficer | Role::DefaultOfficer | Role::Client => false,
        }
    }
}

/// Which incidents a caller may list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncidentScope {
    All,
    OwnedBy(Uuid),
}

pub fn incident_scope(session: &SessionContext) -> IncidentScope {
    if session.role.can_manage_all_incidents() {
        IncidentScope::All
    } else {
        IncidentScope::OwnedBy(session.user_id)
    }
}

pub fn can_view_incident(session: &SessionContext, owner_id: Uuid) -> bool {
    session.role.can_manage_all_incidents() || session.user_id == owner_id
}

/// Only tech officers may be made responsible for an incident.
pub fn can_be_responsible(flags: RoleFlags) -> bool {
    flags.is_tech_officer
}

/// Candidate messaging recipients are staff members.
pub fn is_messaging_recipient(flags: RoleFlags) -> bool {
    Role::from_flags(flags).is_staff()
}
