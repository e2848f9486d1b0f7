use serde::{Deserialize, Serialize};

use crate::models::{Conversation, Message, Role};

// -- JWT Claims --

/// Claims of the bearer tokens issued by the external auth provider.
/// Shared by kind-api (REST middleware) and the gateway upgrade handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub exp: usize,
}

// -- Users --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpsertProfileRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

// -- Jobs --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateJobPostRequest {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub salary: Option<String>,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub content: String,
}

/// Returned from a send. `conversation` is the real row, which lets a client
/// that sent to a `new-<matchId>` thread swap in the real id.
#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub conversation: Conversation,
    pub message: Message,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MarkReadResponse {
    pub updated: usize,
}

// -- Conversations --

/// Support thread opened by an admin. Carries no match.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateDirectConversationRequest {
    pub counterpart_id: String,
}
