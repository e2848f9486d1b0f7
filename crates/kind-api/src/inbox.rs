use axum::{Extension, Json, extract::State, response::IntoResponse};
use serde::{Deserialize, Serialize};
use tracing::warn;

use kind_match::{Thread, reconcile};
use kind_types::api::Claims;
use kind_types::models::{Conversation, Match};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct InboxThread {
    #[serde(flatten)]
    pub thread: Thread,
    pub unread_count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InboxResponse {
    pub unopened_matches: Vec<Match>,
    /// Conversations waiting behind an unopened match. They move to
    /// `threads` once the caller opens the match.
    pub pending_conversations: Vec<Conversation>,
    pub threads: Vec<InboxThread>,
}

/// GET /inbox — both surfaces for the caller, reconciled server-side.
pub async fn get_inbox(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let side = claims
        .role
        .match_side()
        .ok_or_else(|| ApiError::Forbidden(format!("the {} role has no inbox", claims.role)))?;

    let user_id = claims.sub.clone();
    let (matches, conversations, unread) = state
        .run_db(move |db| {
            let matches = db.list_matches_for_user(&user_id)?;
            let conversations = db.list_conversations_for_user(&user_id)?;
            let unread = db.unread_counts_for_user(&user_id)?;
            Ok((matches, conversations, unread))
        })
        .await?;

    let (matches, foreign): (Vec<Match>, Vec<Match>) = matches
        .into_iter()
        .partition(|m| m.participant(side) == claims.sub);
    for m in &foreign {
        warn!("{} is on the wrong side of match {} for role {}", claims.sub, m.id, claims.role);
    }

    let reconciled = reconcile(&matches, &conversations, side, &claims.sub);
    let threads = reconciled
        .threads
        .into_iter()
        .map(|thread| {
            let unread_count = thread
                .id
                .conversation_id()
                .and_then(|id| unread.get(&id).copied())
                .unwrap_or(0);
            InboxThread { thread, unread_count }
        })
        .collect();

    Ok(Json(InboxResponse {
        unopened_matches: reconciled.unopened_matches,
        pending_conversations: reconciled.suppressed,
        threads,
    }))
}
