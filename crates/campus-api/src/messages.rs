use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::{error, warn};
use uuid::Uuid;

use campus_db::models::MessageRow;
use campus_db::{format_timestamp, parse_timestamp};
use campus_types::api::{Claims, SendMessageRequest, SendMessageResponse};
use campus_types::models::{DeliveryState, Message};

use crate::auth::AppState;

/// Upper bound on stored message length, in bytes.
const MAX_CONTENT_LEN: usize = 4000;

/// Without `limit` the whole history is returned; the chat core polls it that
/// way and treats the result as the complete log.
#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(default)]
    pub limit: Option<u32>,
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.sender_id != claims.sub {
        return Err(StatusCode::FORBIDDEN);
    }
    let content = req.content.trim().to_string();
    if content.is_empty() || content.len() > MAX_CONTENT_LEN {
        return Err(StatusCode::BAD_REQUEST);
    }

    let message = Message {
        id: Uuid::now_v7(),
        chat_id: req.chat_id,
        sender_id: req.sender_id,
        content,
        created_at: chrono::Utc::now(),
        delivery_state: DeliveryState::Confirmed,
    };

    // Run blocking DB work off the async runtime
    let db = state.clone();
    let row = message.clone();
    tokio::task::spawn_blocking(move || -> anyhow::Result<Result<(), StatusCode>> {
        let cid = row.chat_id.to_string();
        let sid = row.sender_id.to_string();
        match db.db.get_chat_participants(&cid)? {
            Some((low, high)) if low == sid || high == sid => {}
            Some(_) => return Ok(Err(StatusCode::FORBIDDEN)),
            None => return Ok(Err(StatusCode::NOT_FOUND)),
        }
        db.db.insert_message(
            &row.id.to_string(),
            &cid,
            &sid,
            &row.content,
            &format_timestamp(row.created_at),
        )?;
        Ok(Ok(()))
    })
    .await
    .map_err(|e| { error!("spawn_blocking join error: {}", e); StatusCode::INTERNAL_SERVER_ERROR })?
    .map_err(|e| { error!("Failed to store message: {}", e); StatusCode::INTERNAL_SERVER_ERROR })??;

    Ok((StatusCode::CREATED, Json(SendMessageResponse { message })))
}

pub async fn get_messages(
    State(state): State<AppState>,
    Path(chat_id): Path<Uuid>,
    Query(query): Query<MessageQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.clone();
    let cid = chat_id.to_string();
    let me = claims.sub.to_string();
    let limit = query.limit;

    let rows = tokio::task::spawn_blocking(move || -> anyhow::Result<Result<Vec<MessageRow>, StatusCode>> {
        match db.db.get_chat_participants(&cid)? {
            Some((low, high)) if low == me || high == me => {}
            Some(_) => return Ok(Err(StatusCode::FORBIDDEN)),
            None => return Ok(Err(StatusCode::NOT_FOUND)),
        }
        Ok(Ok(db.db.get_messages(&cid, limit)?))
    })
    .await
    .map_err(|e| { error!("spawn_blocking join error: {}", e); StatusCode::INTERNAL_SERVER_ERROR })?
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)??;

    let messages: Vec<Message> = rows.into_iter().filter_map(message_from_row).collect();
    Ok(Json(messages))
}

fn message_from_row(row: MessageRow) -> Option<Message> {
    let parse = |raw: &str, what: &str| {
        raw.parse::<Uuid>()
            .map_err(|e| warn!("Corrupt {} '{}' on message '{}': {}", what, raw, row.id, e))
            .ok()
    };

    Some(Message {
        id: parse(&row.id, "id")?,
        chat_id: parse(&row.chat_id, "chat_id")?,
        sender_id: parse(&row.sender_id, "sender_id")?,
        created_at: parse_timestamp(&row.created_at)
            .map_err(|e| warn!("Message '{}': {}", row.id, e))
            .ok()?,
        content: row.content,
        delivery_state: DeliveryState::Confirmed,
    })
}
