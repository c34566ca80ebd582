use axum::{
    Router, middleware,
    routing::{get, post, put},
};

use crate::middleware::require_session;
use crate::state::AppState;
use crate::{auth, catalog, dashboard, incidents, messenger};

async fn health() -> &'static str {
    "ok"
}

/// All application routes. Transport layers (CORS, tracing) are added by
/// the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/", post(auth::login))
        .route("/auth", post(auth::login))
        .route("/logout", get(auth::logout).post(auth::logout))
        .route("/health", get(health));

    let protected_routes = Router::new()
        .route("/dashboard", get(dashboard::dashboard_page))
        // Service catalog
        .route("/business-services", get(catalog::business_services))
        .route("/technical-services", get(catalog::technical_services))
        .route(
            "/services",
            get(catalog::services_index).post(catalog::create_service_form),
        )
        .route(
            "/services/{id}",
            get(catalog::show_service)
                .put(catalog::update_service_form)
                .delete(catalog::remove_service),
        )
        .route(
            "/service-lines",
            get(catalog::service_lines).post(catalog::add_service_line),
        )
        .route(
            "/service-lines/{id}",
            put(catalog::edit_service_line).delete(catalog::remove_service_line),
        )
        // Incidents
        .route("/incidents", get(incidents::incidents_page))
        .route("/incidents/add", get(incidents::add_incident_page))
        .route("/incidents/create", post(incidents::create_incident_form))
        .route("/incident/{id}", get(incidents::incident_page))
        .route("/incident/{id}/update", post(incidents::update_incident_form))
        // Messaging
        .route("/messenger", get(messenger::messenger_page))
        .route("/users/get", get(messenger::candidates))
        .route("/dialogs/get", get(messenger::dialogs))
        .route("/dialogs/create", post(messenger::open_dialog))
        .route("/messages/get/{dialog_id}", get(messenger::messages))
        .route("/messages/send", post(messenger::send))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
