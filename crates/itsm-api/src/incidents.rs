use axum::{
    Extension, Json,
    extract::{Path, State},
    response::Redirect,
};
use axum_extra::extract::Form;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use itsm_db::{IncidentWrite, format_timestamp};
use itsm_db::models::{IncidentChanges, NewIncident};
use itsm_types::api::{
    CreateIncidentForm, IncidentFormView, IncidentView, IncidentsView, UpdateIncidentForm,
};
use itsm_types::models::{
    Incident, IncidentDetail, IncidentStatus, IncidentSummary, IncidentUpdate,
};
use itsm_types::policy::{self, IncidentScope};
use itsm_types::session::SessionContext;

use crate::auth::list_tech_officers;
use crate::catalog::list_services;
use crate::convert;
use crate::error::{ApiResult, ItsmError};
use crate::state::{AppState, AppStateInner, blocking};

const MAX_TITLE_LEN: usize = 200;

/// Deduplicate (keeping first-seen order) and confirm every id names a
/// catalog service.
fn resolve_service_ids(state: &AppStateInner, ids: &[Uuid]) -> ApiResult<Vec<String>> {
    let mut unique: Vec<String> = Vec::with_capacity(ids.len());
    for id in ids {
        let id = id.to_string();
        if !unique.contains(&id) {
            unique.push(id);
        }
    }

    let missing = state.db.missing_services(&unique)?;
    if let Some(first) = missing.first() {
        return Err(ItsmError::validation(format!("unknown service {first}")));
    }
    Ok(unique)
}

pub fn create_incident(
    state: &AppStateInner,
    session: &SessionContext,
    title: &str,
    description: &str,
    service_ids: &[Uuid],
) -> ApiResult<Incident> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ItsmError::validation("title is required"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ItsmError::validation("title is too long"));
    }

    let service_ids = resolve_service_ids(state, service_ids)?;

    let id = Uuid::new_v4().to_string();
    let owner_id = session.user_id.to_string();
    let now = format_timestamp(Utc::now());
    state.db.insert_incident(
        &NewIncident {
            id: &id,
            owner_id: &owner_id,
            title,
            description: description.trim(),
            status: IncidentStatus::Open.as_str(),
            created_at: &now,
        },
        &service_ids,
    )?;

    info!(
        "{} opened incident {} with {} linked services",
        session.username,
        id,
        service_ids.len()
    );

    let row = state
        .db
        .get_incident(&id)?
        .ok_or(ItsmError::NotFound("incident"))?;
    Ok(convert::incident(&row))
}

pub fn get_incident(state: &AppStateInner, session: &SessionContext, id: Uuid) -> ApiResult<IncidentDetail> {
    let id = id.to_string();
    let row = state
        .db
        .get_incident(&id)?
        .ok_or(ItsmError::NotFound("incident"))?;

    let incident = convert::incident(&row);
    if !policy::can_view_incident(session, incident.owner_id) {
        return Err(ItsmError::Forbidden);
    }

    let services = state
        .db
        .get_incident_services(&id)?
        .iter()
        .map(convert::service)
        .collect();

    Ok(IncidentDetail {
        incident,
        owner_username: row.owner_username,
        responsible_username: row.responsible_username,
        services,
    })
}

pub fn update_incident(
    state: &AppStateInner,
    session: &SessionContext,
    id: Uuid,
    update: &IncidentUpdate,
) -> ApiResult<Incident> {
    if !session.role.can_manage_all_incidents() {
        return Err(ItsmError::Forbidden);
    }

    let responsible = match update.responsible_user_id {
        Some(user_id) => {
            let user = state
                .db
                .get_user_by_id(&user_id.to_string())?
                .ok_or_else(|| ItsmError::validation("unknown responsible user"))?;
            if !policy::can_be_responsible(convert::role_flags(&user)) {
                return Err(ItsmError::validation(format!(
                    "{} is not a tech officer",
                    user.username
                )));
            }
            Some(user.id)
        }
        None => None,
    };

    let service_ids = match &update.service_ids {
        Some(ids) => Some(resolve_service_ids(state, ids)?),
        None => None,
    };

    // The transition check runs in the write transaction, against the
    // status the incident has at that moment.
    let allowed_from: Vec<&str> = update
        .status
        .previous_statuses()
        .into_iter()
        .map(IncidentStatus::as_str)
        .collect();

    let id = id.to_string();
    let now = format_timestamp(Utc::now());
    let changes = IncidentChanges {
        status: update.status.as_str(),
        allowed_from: &allowed_from,
        responsible_user_id: responsible.as_deref(),
        service_ids: service_ids.as_deref(),
        updated_at: &now,
    };

    match state.db.update_incident(&id, &changes)? {
        IncidentWrite::Applied => {}
        IncidentWrite::Missing => return Err(ItsmError::NotFound("incident")),
        IncidentWrite::Refused { current } => {
            return Err(ItsmError::validation(format!(
                "cannot move incident from {} to {}",
                current, update.status
            )));
        }
    }

    info!("{} moved incident {} to {}", session.username, id, update.status);

    let row = state
        .db
        .get_incident(&id)?
        .ok_or(ItsmError::NotFound("incident"))?;
    Ok(convert::incident(&row))
}

pub fn list_incidents(state: &AppStateInner, session: &SessionContext) -> ApiResult<Vec<IncidentSummary>> {
    let rows = match policy::incident_scope(session) {
        IncidentScope::All => state.db.list_incidents(None)?,
        IncidentScope::OwnedBy(owner) => state.db.list_incidents(Some(owner.to_string().as_str()))?,
    };
    Ok(rows.iter().map(convert::incident_summary).collect())
}

// -- Handlers --

/// GET /incidents
pub async fn incidents_page(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> ApiResult<Json<IncidentsView>> {
    let is_client = session.role.is_client();
    let can_manage = session.role.can_manage_all_incidents();
    let incidents = blocking(&state, move |st| list_incidents(st, &session)).await?;

    Ok(Json(IncidentsView {
        incidents,
        is_client,
        can_manage,
    }))
}

/// GET /incidents/add
pub async fn add_incident_page(State(state): State<AppState>) -> ApiResult<Json<IncidentFormView>> {
    let services = blocking(&state, |st| list_services(st, None)).await?;
    Ok(Json(IncidentFormView { services }))
}

/// POST /incidents/create
pub async fn create_incident_form(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Form(form): Form<CreateIncidentForm>,
) -> ApiResult<Redirect> {
    blocking(&state, move |st| {
        create_incident(st, &session, &form.title, &form.description, &form.service_ids)
    })
    .await?;
    Ok(Redirect::to("/incidents"))
}

/// GET /incident/{id}
pub async fn incident_page(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<IncidentView>> {
    let view = blocking(&state, move |st| {
        let incident = get_incident(st, &session, id)?;
        let is_editable = session.role.can_manage_all_incidents();

        let (tech_officers, services) = if is_editable {
            (list_tech_officers(st)?, list_services(st, None)?)
        } else {
            (vec![], vec![])
        };

        Ok(IncidentView {
            statuses: incident.incident.status.next_statuses(),
            incident,
            is_editable,
            tech_officers,
            services,
        })
    })
    .await?;

    Ok(Json(view))
}

/// POST /incident/{id}/update
pub async fn update_incident_form(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<Uuid>,
    Form(form): Form<UpdateIncidentForm>,
) -> ApiResult<Redirect> {
    let update = IncidentUpdate {
        status: form.status,
        responsible_user_id: form.responsible_user_id,
        service_ids: form.update_services.then_some(form.service_ids),
    };

    blocking(&state, move |st| update_incident(st, &session, id, &update)).await?;
    Ok(Redirect::to("/incidents"))
}
