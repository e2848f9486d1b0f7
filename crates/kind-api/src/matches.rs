use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use kind_types::api::Claims;
use kind_types::events::GatewayEvent;
use kind_types::models::{Conversation, Match, MatchSide};

use crate::error::ApiError;
use crate::state::AppState;

/// Load a match the caller takes part in. Non-participants get 404.
pub(crate) async fn participant_match(
    state: &AppState,
    claims: &Claims,
    match_id: Uuid,
) -> Result<(Match, MatchSide), ApiError> {
    let m = state
        .run_db(move |db| db.get_match(match_id))
        .await?
        .ok_or(ApiError::NotFound("match"))?;
    let side = m.side_of(&claims.sub).ok_or(ApiError::NotFound("match"))?;
    Ok((m, side))
}

/// Get or lazily create the match's conversation, notifying both sides
/// when a row was inserted.
pub(crate) async fn conversation_for_match(state: &AppState, m: Match) -> Result<(Conversation, bool), ApiError> {
    let (conversation, created) = state
        .run_db(move |db| db.get_or_create_conversation(&m))
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
    Ok((conversation, created))
}

/// GET /matches
pub async fn list_matches(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let matches = state
        .run_db(move |db| db.list_matches_for_user(&claims.sub))
        .await?;
    Ok(Json(matches))
}

/// POST /matches/{match_id}/open — set the caller's opened flag.
pub async fn open_match(
    State(state): State<AppState>,
    Path(match_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let (m, side) = participant_match(&state, &claims, match_id).await?;

    let changed = state
        .run_db(move |db| db.mark_match_opened(match_id, side))
        .await?;
    if changed {
        state
            .notify(
                &[m.employer_id.as_str(), m.worker_id.as_str()],
                GatewayEvent::MatchOpened { match_id, side },
            )
            .await;
    }

    let updated = state
        .run_db(move |db| db.get_match(match_id))
        .await?
        .ok_or(ApiError::NotFound("match"))?;
    Ok(Json(updated))
}

/// POST /matches/{match_id}/conversation — resolves a `new-<matchId>`
/// placeholder to a real conversation.
pub async fn get_or_create_conversation(
    State(state): State<AppState>,
    Path(match_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let (m, _) = participant_match(&state, &claims, match_id).await?;
    let (conversation, created) = conversation_for_match(&state, m).await?;

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(conversation)))
}

/// DELETE /matches/{match_id}
pub async fn delete_match(
    State(state): State<AppState>,
    Path(match_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let (m, _) = participant_match(&state, &claims, match_id).await?;

    state.run_db(move |db| db.delete_match(match_id)).await?;
    info!("Match {} deleted by {}", match_id, claims.sub);

    state
        .notify(
            &[m.employer_id.as_str(), m.worker_id.as_str()],
            GatewayEvent::MatchDeleted { match_id },
        )
        .await;
    Ok(StatusCode::NO_CONTENT)
}
