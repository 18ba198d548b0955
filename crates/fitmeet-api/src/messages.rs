use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use fitmeet_db::MessageRow;
use fitmeet_types::api::{Claims, ConversationSummary, MessageResponse, SendMessageRequest};
use fitmeet_types::{MessageId, UserId};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::extract::{PathParam, Payload, QueryParams};
use crate::{clamp_limit, run_db, validate};

const MAX_MESSAGE_CHARS: usize = 2000;

#[derive(Debug, Deserialize)]
pub struct ThreadQuery {
    pub limit: Option<u32>,
    /// Cursor-based pagination: pass the `created_at` and `id` of the
    /// oldest message from the previous page to fetch older messages.
    pub before: Option<DateTime<Utc>>,
    pub before_id: Option<MessageId>,
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Payload(req): Payload<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.recipient_id == claims.sub {
        return Err(ApiError::validation("you cannot message yourself"));
    }
    let content = validate::required("content", &req.content, MAX_MESSAGE_CHARS)?;

    let id = MessageId::generate();
    let sender = claims.sub;
    let recipient = req.recipient_id;
    let row = run_db(&state, move |db| {
        if db.get_user_by_id(recipient)?.is_none() {
            return Ok(None);
        }
        db.insert_message(id, sender, recipient, &content, Utc::now()).map(Some)
    })
    .await?
    .ok_or(ApiError::NotFound("recipient"))?;

    debug!("Message {} from {} to {}", row.id, sender, recipient);
    Ok((StatusCode::CREATED, Json(message_response(row))))
}

/// GET /messages/conversation/{user_id}: the thread with one user.
pub async fn get_conversation(
    State(state): State<AppState>,
    PathParam(other): PathParam<UserId>,
    QueryParams(query): QueryParams<ThreadQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let me = claims.sub;
    let limit = clamp_limit(query.limit);
    let before = match (query.before, query.before_id) {
        (Some(at), id) => Some((at, id)),
        (None, None) => None,
        (None, Some(_)) => return Err(ApiError::validation("before_id needs before")),
    };

    let rows = run_db(&state, move |db| db.get_thread(me, other, limit, before)).await?;
    Ok(Json(rows.into_iter().map(message_response).collect::<Vec<_>>()))
}

/// GET /messages/conversations: one entry per counterpart, latest first.
pub async fn get_conversations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let me = claims.sub;
    let rows = run_db(&state, move |db| db.get_conversations(me)).await?;

    let summaries: Vec<ConversationSummary> = rows
        .into_iter()
        .map(|row| ConversationSummary {
            partner: row.partner,
            last_message: message_response(row.last_message),
        })
        .collect();
    Ok(Json(summaries))
}

fn message_response(row: MessageRow) -> MessageResponse {
    MessageResponse {
        id: row.id,
        sender_id: row.sender_id,
        recipient_id: row.recipient_id,
        content: row.content,
        created_at: row.created_at,
    }
}
