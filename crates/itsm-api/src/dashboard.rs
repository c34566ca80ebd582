use axum::{Extension, Json, extract::State};

use itsm_types::api::DashboardView;
use itsm_types::models::IncidentStatus;
use itsm_types::policy::{self, IncidentScope};
use itsm_types::session::SessionContext;

use crate::error::ApiResult;
use crate::state::{AppState, AppStateInner, blocking};

/// Landing page data: who the caller is, what they may do, and how many
/// incidents they can see.
pub fn dashboard(state: &AppStateInner, session: &SessionContext) -> ApiResult<DashboardView> {
    let owner = match policy::incident_scope(session) {
        IncidentScope::All => None,
        IncidentScope::OwnedBy(owner) => Some(owner.to_string()),
    };
    let counts = state
        .db
        .count_incidents(owner.as_deref(), IncidentStatus::Open.as_str())?;

    let role = session.role;
    Ok(DashboardView {
        user_id: session.user_id,
        username: session.username.clone(),
        role,
        is_client: role.is_client(),
        show_admin_links: role.is_staff(),
        can_manage_incidents: role.can_manage_all_incidents(),
        can_manage_catalog: role.can_manage_catalog(),
        visible_incidents: counts.total,
        open_incidents: counts.open,
    })
}

/// GET /dashboard
pub async fn dashboard_page(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> ApiResult<Json<DashboardView>> {
    let view = blocking(&state, move |st| dashboard(st, &session)).await?;
    Ok(Json(view))
}
