use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::{self, Unexpected, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::models::{
    DialogSummary, IncidentDetail, IncidentStatus, IncidentSummary, Role, Service, ServiceDraft,
    ServiceKind, User,
};

// -- JWT Claims --

/// Claims of the signed session token. `sid` points at the server-side
/// session record, which is what logout deletes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub sid: Uuid,
    pub username: String,
    pub exp: usize,
}

/// HTML forms send an empty string for an unselected optional field.
pub fn empty_string_as_none<'de, D, T>(de: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw = Option::<String>::deserialize(de)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// HTML checkboxes submit `on` when ticked and nothing when not; explicit
/// `true`/`false` (and JSON booleans) are accepted too.
pub fn checkbox<'de, D>(de: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    struct Checkbox;

    impl Visitor<'_> for Checkbox {
        type Value = bool;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a checkbox value")
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<bool, E> {
            Ok(v)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<bool, E> {
            match v.trim() {
                "on" | "true" | "1" | "yes" => Ok(true),
                "" | "off" | "false" | "0" | "no" => Ok(false),
                other => Err(E::invalid_value(Unexpected::Str(other), &self)),
            }
        }
    }

    de.deserialize_any(Checkbox)
}

// -- Auth --

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

// -- Dashboard --

#[derive(Debug, Serialize, Deserialize)]
pub struct DashboardView {
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
    pub is_client: bool,
    pub show_admin_links: bool,
    pub can_manage_incidents: bool,
    pub can_manage_catalog: bool,
    pub visible_incidents: usize,
    pub open_incidents: usize,
}

// -- Service catalog --

#[derive(Debug, Deserialize)]
pub struct ServicesQuery {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub kind: Option<ServiceKind>,
}

/// Service create/edit form. The legacy single `serviceType` selector and
/// the two explicit checkboxes are both honoured.
#[derive(Debug, Deserialize)]
pub struct ServiceForm {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(
        default,
        rename = "serviceType",
        deserialize_with = "empty_string_as_none"
    )]
    pub service_type: Option<ServiceKind>,
    #[serde(default, deserialize_with = "checkbox")]
    pub is_business: bool,
    #[serde(default, deserialize_with = "checkbox")]
    pub is_technical: bool,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub service_line_id: Option<Uuid>,
}

impl From<ServiceForm> for ServiceDraft {
    fn from(form: ServiceForm) -> Self {
        ServiceDraft {
            name: form.name,
            description: form.description,
            is_business: form.is_business || form.service_type == Some(ServiceKind::Business),
            is_technical: form.is_technical || form.service_type == Some(ServiceKind::Technical),
            service_line_id: form.service_line_id,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceLineRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServicesView {
    pub kind: Option<ServiceKind>,
    pub services: Vec<Service>,
    pub can_manage: bool,
}

// -- Incidents --

#[derive(Debug, Deserialize)]
pub struct CreateIncidentForm {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub service_ids: Vec<Uuid>,
}

/// Staff edit form. Service checkboxes only replace the link set when the
/// form says it carries them, so an edit page without the service picker
/// does not wipe existing links.
#[derive(Debug, Deserialize)]
pub struct UpdateIncidentForm {
    pub status: IncidentStatus,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub responsible_user_id: Option<Uuid>,
    #[serde(default, deserialize_with = "checkbox")]
    pub update_services: bool,
    #[serde(default)]
    pub service_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IncidentsView {
    pub incidents: Vec<IncidentSummary>,
    pub is_client: bool,
    pub can_manage: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IncidentFormView {
    pub services: Vec<Service>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IncidentView {
    pub incident: IncidentDetail,
    pub is_editable: bool,
    pub statuses: Vec<IncidentStatus>,
    pub tech_officers: Vec<User>,
    pub services: Vec<Service>,
}

// -- Messaging --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateDialogRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub dialog_id: Uuid,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    #[serde(
        default,
        rename = "lastTimestamp",
        deserialize_with = "empty_string_as_none"
    )]
    pub last_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessengerView {
    pub dialogs: Vec<DialogSummary>,
    pub candidates: Vec<User>,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
