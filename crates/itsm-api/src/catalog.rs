use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect},
};
use axum_extra::extract::Form;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use itsm_db::models::ServiceFields;
use itsm_db::{ServiceFilter, format_timestamp, is_constraint_violation};
use itsm_types::api::{ServiceForm, ServiceLineRequest, ServicesQuery, ServicesView};
use itsm_types::models::{Service, ServiceDraft, ServiceKind, ServiceLine};
use itsm_types::session::SessionContext;

use crate::convert;
use crate::error::{ApiResult, ItsmError};
use crate::state::{AppState, AppStateInner, blocking};

const MAX_NAME_LEN: usize = 200;

fn require_catalog_admin(session: &SessionContext) -> ApiResult<()> {
    if session.role.can_manage_catalog() {
        Ok(())
    } else {
        Err(ItsmError::Forbidden)
    }
}

fn validate_name(name: &str) -> ApiResult<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ItsmError::validation("name is required"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ItsmError::validation("name is too long"));
    }
    Ok(name)
}

fn filter_for(kind: Option<ServiceKind>) -> ServiceFilter {
    match kind {
        None => ServiceFilter::All,
        Some(ServiceKind::Business) => ServiceFilter::Business,
        Some(ServiceKind::Technical) => ServiceFilter::Technical,
    }
}

// -- Services --

pub fn list_services(state: &AppStateInner, kind: Option<ServiceKind>) -> ApiResult<Vec<Service>> {
    let rows = state.db.list_services(filter_for(kind))?;
    Ok(rows.iter().map(convert::service).collect())
}

pub fn get_service(state: &AppStateInner, id: Uuid) -> ApiResult<Service> {
    state
        .db
        .get_service(&id.to_string())?
        .map(|row| convert::service(&row))
        .ok_or(ItsmError::NotFound("service"))
}

/// Shared validation for create and update. Returns the trimmed name and
/// the service line id as stored.
fn check_draft<'a>(state: &AppStateInner, draft: &'a ServiceDraft) -> ApiResult<(&'a str, Option<String>)> {
    let name = validate_name(&draft.name)?;

    let line_id = draft.service_line_id.map(|id| id.to_string());
    if let Some(line_id) = &line_id {
        if state.db.get_service_line(line_id)?.is_none() {
            return Err(ItsmError::validation("unknown service line"));
        }
    }

    Ok((name, line_id))
}

pub fn create_service(
    state: &AppStateInner,
    session: &SessionContext,
    draft: &ServiceDraft,
) -> ApiResult<Service> {
    require_catalog_admin(session)?;
    let (name, line_id) = check_draft(state, draft)?;

    let id = Uuid::new_v4().to_string();
    let fields = ServiceFields {
        name,
        description: draft.description.trim(),
        is_business: draft.is_business,
        is_technical: draft.is_technical,
        service_line_id: line_id.as_deref(),
    };
    state
        .db
        .insert_service(&id, &fields, &format_timestamp(Utc::now()))?;

    info!("{} created service '{}' ({})", session.username, name, id);

    let row = state
        .db
        .get_service(&id)?
        .ok_or(ItsmError::NotFound("service"))?;
    Ok(convert::service(&row))
}

pub fn update_service(
    state: &AppStateInner,
    session: &SessionContext,
    id: Uuid,
    draft: &ServiceDraft,
) -> ApiResult<Service> {
    require_catalog_admin(session)?;
    let (name, line_id) = check_draft(state, draft)?;

    let fields = ServiceFields {
        name,
        description: draft.description.trim(),
        is_business: draft.is_business,
        is_technical: draft.is_technical,
        service_line_id: line_id.as_deref(),
    };
    if !state.db.update_service(&id.to_string(), &fields)? {
        return Err(ItsmError::NotFound("service"));
    }

    info!("{} updated service {}", session.username, id);
    get_service(state, id)
}

pub fn delete_service(state: &AppStateInner, session: &SessionContext, id: Uuid) -> ApiResult<()> {
    require_catalog_admin(session)?;

    if !state.db.delete_service(&id.to_string())? {
        return Err(ItsmError::NotFound("service"));
    }

    info!("{} deleted service {}", session.username, id);
    Ok(())
}

// -- Service lines --

pub fn list_service_lines(state: &AppStateInner) -> ApiResult<Vec<ServiceLine>> {
    let rows = state.db.list_service_lines()?;
    Ok(rows.iter().map(convert::service_line).collect())
}

fn duplicate_line_name(e: anyhow::Error) -> ItsmError {
    if is_constraint_violation(&e) {
        ItsmError::validation("a service line with that name already exists")
    } else {
        ItsmError::Internal(e)
    }
}

pub fn create_service_line(
    state: &AppStateInner,
    session: &SessionContext,
    name: &str,
    description: &str,
) -> ApiResult<ServiceLine> {
    require_catalog_admin(session)?;
    let name = validate_name(name)?;

    let id = Uuid::new_v4().to_string();
    state
        .db
        .insert_service_line(&id, name, description.trim(), &format_timestamp(Utc::now()))
        .map_err(duplicate_line_name)?;

    info!("{} created service line '{}'", session.username, name);

    let row = state
        .db
        .get_service_line(&id)?
        .ok_or(ItsmError::NotFound("service line"))?;
    Ok(convert::service_line(&row))
}

pub fn update_service_line(
    state: &AppStateInner,
    session: &SessionContext,
    id: Uuid,
    name: &str,
    description: &str,
) -> ApiResult<ServiceLine> {
    require_catalog_admin(session)?;
    let name = validate_name(name)?;

    let id = id.to_string();
    let found = state
        .db
        .update_service_line(&id, name, description.trim())
        .map_err(duplicate_line_name)?;
    if !found {
        return Err(ItsmError::NotFound("service line"));
    }

    let row = state
        .db
        .get_service_line(&id)?
        .ok_or(ItsmError::NotFound("service line"))?;
    Ok(convert::service_line(&row))
}

/// Services on the line stay in the catalog, detached from it.
pub fn delete_service_line(state: &AppStateInner, session: &SessionContext, id: Uuid) -> ApiResult<()> {
    require_catalog_admin(session)?;

    if !state.db.delete_service_line(&id.to_string())? {
        return Err(ItsmError::NotFound("service line"));
    }

    info!("{} deleted service line {}", session.username, id);
    Ok(())
}

// -- Handlers --

async fn services_view(
    state: &AppState,
    session: &SessionContext,
    kind: Option<ServiceKind>,
) -> ApiResult<Json<ServicesView>> {
    let services = blocking(state, move |st| list_services(st, kind)).await?;
    Ok(Json(ServicesView {
        kind,
        services,
        can_manage: session.role.can_manage_catalog(),
    }))
}

/// GET /business-services
pub async fn business_services(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> ApiResult<Json<ServicesView>> {
    services_view(&state, &session, Some(ServiceKind::Business)).await
}

/// GET /technical-services
pub async fn technical_services(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> ApiResult<Json<ServicesView>> {
    services_view(&state, &session, Some(ServiceKind::Technical)).await
}

/// GET /services?kind=
pub async fn services_index(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Query(query): Query<ServicesQuery>,
) -> ApiResult<Json<ServicesView>> {
    services_view(&state, &session, query.kind).await
}

fn list_page_for(service: &Service) -> &'static str {
    if service.is_business {
        "/business-services"
    } else if service.is_technical {
        "/technical-services"
    } else {
        "/services"
    }
}

/// POST /services
pub async fn create_service_form(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Form(form): Form<ServiceForm>,
) -> ApiResult<Redirect> {
    let draft = ServiceDraft::from(form);
    let service = blocking(&state, move |st| create_service(st, &session, &draft)).await?;
    Ok(Redirect::to(list_page_for(&service)))
}

/// GET /services/{id}
pub async fn show_service(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Service>> {
    let service = blocking(&state, move |st| get_service(st, id)).await?;
    Ok(Json(service))
}

/// PUT /services/{id}
pub async fn update_service_form(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<Uuid>,
    Form(form): Form<ServiceForm>,
) -> ApiResult<Redirect> {
    let draft = ServiceDraft::from(form);
    let service = blocking(&state, move |st| update_service(st, &session, id, &draft)).await?;
    Ok(Redirect::to(list_page_for(&service)))
}

/// DELETE /services/{id}
pub async fn remove_service(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    blocking(&state, move |st| delete_service(st, &session, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /service-lines
pub async fn service_lines(State(state): State<AppState>) -> ApiResult<Json<Vec<ServiceLine>>> {
    let lines = blocking(&state, list_service_lines).await?;
    Ok(Json(lines))
}

/// POST /service-lines
pub async fn add_service_line(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Json(req): Json<ServiceLineRequest>,
) -> ApiResult<impl IntoResponse> {
    let line = blocking(&state, move |st| {
        create_service_line(st, &session, &req.name, &req.description)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(line)))
}

/// PUT /service-lines/{id}
pub async fn edit_service_line(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<ServiceLineRequest>,
) -> ApiResult<Json<ServiceLine>> {
    let line = blocking(&state, move |st| {
        update_service_line(st, &session, id, &req.name, &req.description)
    })
    .await?;
    Ok(Json(line))
}

/// DELETE /service-lines/{id}
pub async fn remove_service_line(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    blocking(&state, move |st| delete_service_line(st, &session, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
