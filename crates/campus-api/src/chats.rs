use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use campus_db::models::ChatRow;
use campus_db::{format_timestamp, parse_timestamp};
use campus_types::api::{Claims, CreateChatRequest, CreateChatResponse};
use campus_types::models::{Chat, LastMessage, User};

use crate::auth::{AppState, user_from_row};
use crate::is_constraint_violation;

/// Chats of `user_id`, newest activity first. Callers may only list their own.
pub async fn list_user_chats(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    if claims.sub != user_id {
        return Err(StatusCode::FORBIDDEN);
    }

    let db = state.clone();
    let uid = user_id.to_string();
    let rows = tokio::task::spawn_blocking(move || db.db.get_chats_for_user(&uid))
        .await
        .map_err(|e| { error!("spawn_blocking join error: {}", e); StatusCode::INTERNAL_SERVER_ERROR })?
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let chats: Vec<Chat> = rows.into_iter().filter_map(chat_from_row).collect();
    Ok(Json(chats))
}

/// Users `user_id` could start a chat with: everyone but themselves.
pub async fn available_users(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    if claims.sub != user_id {
        return Err(StatusCode::FORBIDDEN);
    }

    let rows = state
        .db
        .list_users_except(&user_id.to_string())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let users: Vec<User> = rows
        .into_iter()
        .filter_map(|row| {
            let id = row.id.clone();
            user_from_row(row)
                .map_err(|e| warn!("Skipping corrupt user '{}': {}", id, e))
                .ok()
        })
        .collect();

    Ok(Json(users))
}

/// Find or create the chat for a pair. An existing chat is a success with
/// `created: false`, never an error.
pub async fn create_chat(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateChatRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.user_id1 == req.user_id2 {
        return Err(StatusCode::BAD_REQUEST);
    }
    if claims.sub != req.user_id1 && claims.sub != req.user_id2 {
        return Err(StatusCode::FORBIDDEN);
    }

    let db = state.clone();
    let (a, b) = (req.user_id1.to_string(), req.user_id2.to_string());
    let result = tokio::task::spawn_blocking(move || -> anyhow::Result<Option<(String, bool)>> {
        for id in [&a, &b] {
            if db.db.get_user_by_id(id)?.is_none() {
                return Ok(None);
            }
        }
        let chat_id = Uuid::now_v7().to_string();
        let now = format_timestamp(chrono::Utc::now());
        db.db.find_or_create_chat(&chat_id, &a, &b, &now).map(Some)
    })
    .await
    .map_err(|e| { error!("spawn_blocking join error: {}", e); StatusCode::INTERNAL_SERVER_ERROR })?;

    let (chat_id, created) = match result {
        Ok(Some(found)) => found,
        Ok(None) => return Err(StatusCode::NOT_FOUND),
        Err(e) if is_constraint_violation(&e) => {
            warn!("Unresolved duplicate chat for {} / {}: {}", req.user_id1, req.user_id2, e);
            return Err(StatusCode::CONFLICT);
        }
        Err(e) => {
            error!("Chat creation failed: {}", e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let chat_id: Uuid = chat_id.parse().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    if created {
        info!("Created chat {} for {} / {}", chat_id, req.user_id1, req.user_id2);
    }

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(CreateChatResponse { chat_id, created })))
}

fn chat_from_row(row: ChatRow) -> Option<Chat> {
    let parse = |raw: &str, what: &str| {
        raw.parse::<Uuid>()
            .map_err(|e| warn!("Corrupt {} '{}' on chat '{}': {}", what, raw, row.id, e))
            .ok()
    };

    let id = parse(&row.id, "id")?;
    let low = parse(&row.user_low, "user_low")?;
    let high = parse(&row.user_high, "user_high")?;
    let created_at = parse_timestamp(&row.created_at)
        .map_err(|e| warn!("Chat '{}': {}", row.id, e))
        .ok()?;

    let last_message = match (row.last_content, row.last_time) {
        (Some(content), Some(time)) => match parse_timestamp(&time) {
            Ok(time) => Some(LastMessage { content, time }),
            Err(e) => {
                warn!("Chat '{}' last message: {}", row.id, e);
                None
            }
        },
        _ => None,
    };

    let peer_name = format!(
        "{} {}",
        row.peer_name.unwrap_or_default(),
        row.peer_surname.unwrap_or_default()
    )
    .trim()
    .to_string();

    Some(Chat {
        id,
        participant_ids: [low, high],
        created_at,
        last_message,
        peer_name,
    })
}
