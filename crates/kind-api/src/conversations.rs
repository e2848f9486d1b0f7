use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::debug;

use kind_db::models::parse_ts;
use kind_match::ThreadRef;
use kind_types::api::{
    Claims, CreateDirectConversationRequest, MarkReadResponse, SendMessageRequest, SendMessageResponse,
};
use kind_types::events::GatewayEvent;
use kind_types::models::{Conversation, Message, Role};

use crate::error::ApiError;
use crate::matches::{conversation_for_match, participant_match};
use crate::state::AppState;

const MAX_MESSAGE_LEN: usize = 4000;

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Cursor-based pagination: pass the `created_at` timestamp of the
    /// oldest message from the previous page to fetch older messages.
    pub before: Option<String>,
}

fn default_limit() -> u32 {
    50
}

/// Resolve a thread id from the URL to a conversation row.
///
/// A `new-<matchId>` placeholder resolves to the match's conversation. When
/// none exists yet it is created if `create` is set, otherwise `None`.
async fn resolve_thread(
    state: &AppState,
    claims: &Claims,
    thread: ThreadRef,
    create: bool,
) -> Result<Option<Conversation>, ApiError> {
    match thread {
        ThreadRef::Real(conversation_id) => {
            let conversation = state
                .run_db(move |db| db.get_conversation(conversation_id))
                .await?
                .filter(|c| c.involves(&claims.sub))
                .ok_or(ApiError::NotFound("conversation"))?;
            Ok(Some(conversation))
        }
        ThreadRef::Synthetic(match_id) => {
            let (m, _) = participant_match(state, claims, match_id).await?;
            if create {
                let (conversation, _) = conversation_for_match(state, m).await?;
                return Ok(Some(conversation));
            }
            let found = state
                .run_db(move |db| db.find_conversation_for_match(&m))
                .await?;
            if found.is_none() {
                debug!("No conversation yet for match {}", match_id);
            }
            Ok(found)
        }
    }
}

/// GET /conversations — every conversation the caller takes part in,
/// without match gating. The inbox is the gated view.
pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let conversations = state
        .run_db(move |db| db.list_conversations_for_user(&claims.sub))
        .await?;
    Ok(Json(conversations))
}

/// POST /conversations — admins open a support thread with any user.
pub async fn create_direct_conversation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateDirectConversationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if claims.role != Role::Admin {
        return Err(ApiError::Forbidden("requires the admin role".into()));
    }
    let counterpart_id = req.counterpart_id.trim().to_string();
    if counterpart_id.is_empty() || counterpart_id == claims.sub {
        return Err(ApiError::BadRequest("invalid counterpart".into()));
    }

    let (conversation, created) = state
        .run_db(move |db| db.create_direct_conversation(&claims.sub, &counterpart_id))
        .await?;

    if created {
        state
            .notify(
                &[conversation.participant_one.as_str(), conversation.participant_two.as_str()],
                GatewayEvent::ConversationCreated {
                    conversation: conversation.clone(),
                },
            )
            .await;
    }

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(conversation)))
}

/// GET /conversations/{thread}/messages — newest first. A placeholder with
/// no conversation behind it has no messages.
pub async fn get_messages(
    State(state): State<AppState>,
    Path(thread): Path<ThreadRef>,
    Query(query): Query<MessageQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.min(200);
    let before = query
        .before
        .as_deref()
        .map(parse_ts)
        .transpose()
        .map_err(|_| ApiError::BadRequest("invalid before cursor".into()))?;

    let Some(conversation) = resolve_thread(&state, &claims, thread, false).await? else {
        return Ok(Json(Vec::<Message>::new()));
    };
    let messages = state
        .run_db(move |db| {
            db.mark_delivered(conversation.id, &claims.sub)?;
            db.get_messages(conversation.id, limit, before)
        })
        .await?;

    Ok(Json(messages))
}

/// POST /conversations/{thread}/messages — sending to a `new-<matchId>`
/// placeholder creates the conversation first.
pub async fn send_message(
    State(state): State<AppState>,
    Path(thread): Path<ThreadRef>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = req.content.trim().to_string();
    if content.is_empty() {
        return Err(ApiError::BadRequest("message is empty".into()));
    }
    if content.chars().count() > MAX_MESSAGE_LEN {
        return Err(ApiError::BadRequest("message is too long".into()));
    }

    let conversation = resolve_thread(&state, &claims, thread, true)
        .await?
        .ok_or(ApiError::NotFound("conversation"))?;

    let conversation_id = conversation.id;
    let sender_id = claims.sub.clone();
    let (message, conversation) = state
        .run_db(move |db| {
            let message = db.insert_message(conversation_id, &sender_id, &content)?;
            let conversation = db.get_conversation(conversation_id)?.unwrap_or(conversation);
            Ok((message, conversation))
        })
        .await?;

    state
        .notify(
            &[conversation.participant_one.as_str(), conversation.participant_two.as_str()],
            GatewayEvent::MessageCreate {
                message: message.clone(),
            },
        )
        .await;

    Ok((
        StatusCode::CREATED,
        Json(SendMessageResponse {
            conversation,
            message,
        }),
    ))
}

/// POST /conversations/{thread}/read
pub async fn mark_read(
    State(state): State<AppState>,
    Path(thread): Path<ThreadRef>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(conversation) = resolve_thread(&state, &claims, thread, false).await? else {
        return Ok(Json(MarkReadResponse { updated: 0 }));
    };

    let conversation_id = conversation.id;
    let reader_id = claims.sub.clone();
    let updated = state
        .run_db(move |db| db.mark_conversation_read(conversation_id, &reader_id))
        .await?;

    if updated > 0 {
        state
            .notify(
                &[conversation.counterpart(&claims.sub)],
                GatewayEvent::MessagesRead {
                    conversation_id,
                    reader_id: claims.sub.clone(),
                },
            )
            .await;
    }

    Ok(Json(MarkReadResponse { updated }))
}
