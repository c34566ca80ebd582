use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use itsm_db::format_timestamp;
use itsm_db::models::DialogRow;
use itsm_types::api::{CreateDialogRequest, MessagesQuery, MessengerView, SendMessageRequest};
use itsm_types::models::{Dialog, DialogSummary, Message, User};
use itsm_types::policy;
use itsm_types::session::SessionContext;

use crate::convert;
use crate::error::{ApiResult, ItsmError};
use crate::state::{AppState, AppStateInner, blocking};

const MAX_MESSAGE_LEN: usize = 4000;

/// Load a dialog the caller takes part in.
fn participant_dialog(state: &AppStateInner, session: &SessionContext, dialog_id: Uuid) -> ApiResult<Dialog> {
    let row: DialogRow = state
        .db
        .get_dialog(&dialog_id.to_string())?
        .ok_or(ItsmError::NotFound("dialog"))?;

    let dialog = convert::dialog(&row);
    if !dialog.has_participant(session.user_id) {
        return Err(ItsmError::Forbidden);
    }
    Ok(dialog)
}

/// Staff the caller has not started a dialog with yet.
pub fn list_candidate_recipients(state: &AppStateInner, session: &SessionContext) -> ApiResult<Vec<User>> {
    let rows = state
        .db
        .list_recipient_candidates(&session.user_id.to_string())?;
    Ok(rows
        .iter()
        .filter(|row| policy::is_messaging_recipient(convert::role_flags(row)))
        .map(convert::user)
        .collect())
}

/// Returns the existing dialog when the pair already has one.
pub fn create_dialog(state: &AppStateInner, session: &SessionContext, other: Uuid) -> ApiResult<Dialog> {
    if other == session.user_id {
        return Err(ItsmError::validation("cannot open a dialog with yourself"));
    }
    if state.db.get_user_by_id(&other.to_string())?.is_none() {
        return Err(ItsmError::NotFound("user"));
    }

    let (user1, user2) = Dialog::normalize_pair(session.user_id, other);
    let row = state.db.create_dialog(
        &Uuid::new_v4().to_string(),
        &user1.to_string(),
        &user2.to_string(),
        &format_timestamp(Utc::now()),
    )?;

    debug!("{} opened dialog {} with {}", session.username, row.id, other);
    Ok(convert::dialog(&row))
}

pub fn list_dialogs(state: &AppStateInner, session: &SessionContext) -> ApiResult<Vec<DialogSummary>> {
    let rows = state.db.list_dialogs_for(&session.user_id.to_string())?;
    Ok(rows.iter().map(convert::dialog_summary).collect())
}

pub fn send_message(
    state: &AppStateInner,
    session: &SessionContext,
    dialog_id: Uuid,
    content: &str,
) -> ApiResult<Message> {
    let content = content.trim();
    if content.is_empty() {
        return Err(ItsmError::validation("message is empty"));
    }
    if content.chars().count() > MAX_MESSAGE_LEN {
        return Err(ItsmError::validation("message is too long"));
    }

    let dialog = participant_dialog(state, session, dialog_id)?;
    let receiver = dialog.counterpart(session.user_id);

    let id = Uuid::new_v4().to_string();
    state.db.insert_message(
        &id,
        &dialog_id.to_string(),
        &session.user_id.to_string(),
        &receiver.to_string(),
        content,
        Utc::now(),
    )?;

    info!("{} sent a message in dialog {}", session.username, dialog_id);

    let row = state
        .db
        .get_message(&id)?
        .ok_or(ItsmError::NotFound("message"))?;
    Ok(convert::message(&row))
}

/// Messages strictly newer than `since`, oldest first.
pub fn list_messages_since(
    state: &AppStateInner,
    session: &SessionContext,
    dialog_id: Uuid,
    since: Option<DateTime<Utc>>,
) -> ApiResult<Vec<Message>> {
    participant_dialog(state, session, dialog_id)?;

    let since = since.map(format_timestamp);
    let rows = state
        .db
        .list_messages(&dialog_id.to_string(), since.as_deref())?;
    Ok(rows.iter().map(convert::message).collect())
}

// -- Handlers --

/// GET /messenger
pub async fn messenger_page(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> ApiResult<Json<MessengerView>> {
    let view = blocking(&state, move |st| {
        Ok(MessengerView {
            dialogs: list_dialogs(st, &session)?,
            candidates: list_candidate_recipients(st, &session)?,
        })
    })
    .await?;
    Ok(Json(view))
}

/// GET /users/get
pub async fn candidates(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> ApiResult<Json<Vec<User>>> {
    let users = blocking(&state, move |st| list_candidate_recipients(st, &session)).await?;
    Ok(Json(users))
}

/// GET /dialogs/get
pub async fn dialogs(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> ApiResult<Json<Vec<DialogSummary>>> {
    let dialogs = blocking(&state, move |st| list_dialogs(st, &session)).await?;
    Ok(Json(dialogs))
}

/// GET /messages/get/{dialog_id}?lastTimestamp=
pub async fn messages(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(dialog_id): Path<Uuid>,
    Query(query): Query<MessagesQuery>,
) -> ApiResult<Json<Vec<Message>>> {
    let messages = blocking(&state, move |st| {
        list_messages_since(st, &session, dialog_id, query.last_timestamp)
    })
    .await?;
    Ok(Json(messages))
}

/// POST /messages/send
pub async fn send(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let message = blocking(&state, move |st| {
        send_message(st, &session, req.dialog_id, &req.content)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// POST /dialogs/create
pub async fn open_dialog(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Json(req): Json<CreateDialogRequest>,
) -> ApiResult<Json<Dialog>> {
    let dialog = blocking(&state, move |st| create_dialog(st, &session, req.user_id)).await?;
    Ok(Json(dialog))
}
