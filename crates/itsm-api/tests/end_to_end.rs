mod common;

use itsm_api::auth::{authenticate, register_user, resolve_session};
use itsm_api::dashboard::dashboard;
use itsm_api::incidents::{create_incident, get_incident, list_incidents, update_incident};
use itsm_types::models::{IncidentStatus, IncidentUpdate, Role};

#[test]
fn client_reports_and_staff_resolve() {
    let state = common::state();
    let admin = common::admin(&state, "root");
    let tom = common::tech(&state, "tom");

    register_user(&state, "alice", "pw1").unwrap();
    let login = authenticate(&state, "alice", "pw1").unwrap();
    let alice = resolve_session(&state, &login.token).unwrap();
    assert_eq!(alice.role, Role::Client);

    let created = create_incident(&state, &alice, "Printer down", "", &[]).unwrap();

    let mine = list_incidents(&state, &alice).unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].title, "Printer down");
    assert_eq!(mine[0].status, IncidentStatus::Open);

    let view = dashboard(&state, &alice).unwrap();
    assert!(view.is_client);
    assert!(!view.show_admin_links);
    assert_eq!((view.visible_incidents, view.open_incidents), (1, 1));

    let update = IncidentUpdate {
        status: IncidentStatus::Resolved,
        responsible_user_id: Some(tom.user_id),
        service_ids: None,
    };
    update_incident(&state, &admin, created.id, &update).unwrap();

    let detail = get_incident(&state, &alice, created.id).unwrap();
    assert_eq!(detail.incident.status, IncidentStatus::Resolved);
    assert_eq!(detail.responsible_username.as_deref(), Some("tom"));
    assert_eq!(detail.owner_username, "alice");

    let view = dashboard(&state, &alice).unwrap();
    assert_eq!((view.visible_incidents, view.open_incidents), (1, 0));

    let admin_view = dashboard(&state, &admin).unwrap();
    assert!(admin_view.show_admin_links);
    assert!(admin_view.can_manage_catalog);
    assert!(admin_view.can_manage_incidents);
}
