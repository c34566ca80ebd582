mod common;

use itsm_api::ItsmError;
use itsm_api::messenger::{
    create_dialog, list_candidate_recipients, list_dialogs, list_messages_since, send_message,
};
use uuid::Uuid;

#[test]
fn dialog_per_pair_is_unique() {
    let state = common::state();
    let alice = common::client(&state, "alice");
    let tom = common::tech(&state, "tom");

    let first = create_dialog(&state, &alice, tom.user_id).unwrap();
    let again = create_dialog(&state, &alice, tom.user_id).unwrap();
    let reversed = create_dialog(&state, &tom, alice.user_id).unwrap();

    assert_eq!(first.id, again.id);
    assert_eq!(first.id, reversed.id);
    assert!(first.user1_id < first.user2_id);
    assert_eq!(list_dialogs(&state, &alice).unwrap().len(), 1);
}

#[test]
fn dialog_partner_must_exist_and_differ() {
    let state = common::state();
    let alice = common::client(&state, "alice");

    assert!(matches!(
        create_dialog(&state, &alice, alice.user_id).unwrap_err(),
        ItsmError::Validation(_)
    ));
    assert!(matches!(
        create_dialog(&state, &alice, Uuid::new_v4()).unwrap_err(),
        ItsmError::NotFound("user")
    ));
}

#[test]
fn candidates_are_staff_without_a_dialog() {
    let state = common::state();
    let alice = common::client(&state, "alice");
    let tom = common::tech(&state, "tom");
    common::officer(&state, "dora");
    common::admin(&state, "root");
    common::client(&state, "bob");

    let names = |users: Vec<itsm_types::models::User>| -> Vec<String> {
        users.into_iter().map(|u| u.username).collect()
    };

    let before = names(list_candidate_recipients(&state, &alice).unwrap());
    assert_eq!(before, ["dora", "root", "tom"]);

    create_dialog(&state, &alice, tom.user_id).unwrap();
    let after = names(list_candidate_recipients(&state, &alice).unwrap());
    assert_eq!(after, ["dora", "root"]);

    // A staff member never sees themselves.
    let for_tom = names(list_candidate_recipients(&state, &tom).unwrap());
    assert!(!for_tom.contains(&"tom".to_string()));
}

#[test]
fn dialog_summaries_name_the_counterpart() {
    let state = common::state();
    let alice = common::client(&state, "alice");
    let tom = common::tech(&state, "tom");
    create_dialog(&state, &alice, tom.user_id).unwrap();

    let for_alice = list_dialogs(&state, &alice).unwrap();
    assert_eq!(for_alice[0].counterpart_id, tom.user_id);
    assert_eq!(for_alice[0].counterpart_username, "tom");

    let for_tom = list_dialogs(&state, &tom).unwrap();
    assert_eq!(for_tom[0].counterpart_username, "alice");
}

#[test]
fn messages_are_ordered_and_polled_incrementally() {
    let state = common::state();
    let alice = common::client(&state, "alice");
    let tom = common::tech(&state, "tom");
    let dialog = create_dialog(&state, &alice, tom.user_id).unwrap();

    let m1 = send_message(&state, &alice, dialog.id, "hello").unwrap();
    let m2 = send_message(&state, &tom, dialog.id, "hi").unwrap();
    let m3 = send_message(&state, &alice, dialog.id, "printer?").unwrap();

    assert!(m1.timestamp < m2.timestamp);
    assert!(m2.timestamp < m3.timestamp);
    assert_eq!(m1.receiver_id, tom.user_id);
    assert_eq!(m2.receiver_id, alice.user_id);
    assert_eq!(m2.sender_username, "tom");

    let all = list_messages_since(&state, &tom, dialog.id, None).unwrap();
    let ids: Vec<_> = all.iter().map(|m| m.id).collect();
    assert_eq!(ids, [m1.id, m2.id, m3.id]);

    let newer = list_messages_since(&state, &tom, dialog.id, Some(m1.timestamp)).unwrap();
    let ids: Vec<_> = newer.iter().map(|m| m.id).collect();
    assert_eq!(ids, [m2.id, m3.id]);

    assert!(list_messages_since(&state, &tom, dialog.id, Some(m3.timestamp))
        .unwrap()
        .is_empty());
}

#[test]
fn outsiders_cannot_read_or_write() {
    let state = common::state();
    let alice = common::client(&state, "alice");
    let tom = common::tech(&state, "tom");
    let eve = common::client(&state, "eve");
    let dialog = create_dialog(&state, &alice, tom.user_id).unwrap();
    send_message(&state, &alice, dialog.id, "private").unwrap();

    assert!(matches!(
        send_message(&state, &eve, dialog.id, "hi").unwrap_err(),
        ItsmError::Forbidden
    ));
    assert!(matches!(
        list_messages_since(&state, &eve, dialog.id, None).unwrap_err(),
        ItsmError::Forbidden
    ));
    assert!(matches!(
        send_message(&state, &alice, Uuid::new_v4(), "hi").unwrap_err(),
        ItsmError::NotFound("dialog")
    ));
}

#[test]
fn message_content_is_checked() {
    let state = common::state();
    let alice = common::client(&state, "alice");
    let tom = common::tech(&state, "tom");
    let dialog = create_dialog(&state, &alice, tom.user_id).unwrap();

    assert!(matches!(
        send_message(&state, &alice, dialog.id, "   ").unwrap_err(),
        ItsmError::Validation(_)
    ));
    assert!(matches!(
        send_message(&state, &alice, dialog.id, &"x".repeat(4001)).unwrap_err(),
        ItsmError::Validation(_)
    ));

    let trimmed = send_message(&state, &alice, dialog.id, "  ok  ").unwrap();
    assert_eq!(trimmed.content, "ok");
}
