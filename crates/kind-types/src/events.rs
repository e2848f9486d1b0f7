use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Conversation, Match, MatchSide, Message};

/// Events pushed to participants over the WebSocket gateway. Clients re-run
/// their inbox reconciliation when one arrives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms the connection is authenticated
    Ready { user_id: String },

    /// An application was accepted and a match created
    MatchCreated { r#match: Match },

    /// One side opened a match
    MatchOpened { match_id: Uuid, side: MatchSide },

    MatchDeleted { match_id: Uuid },

    /// A conversation row was created (lazily, on first message or explicit open)
    ConversationCreated { conversation: Conversation },

    /// A new message was posted
    MessageCreate { message: Message },

    /// `reader_id` has read every message in the conversation not sent by them
    MessagesRead {
        conversation_id: Uuid,
        reader_id: String,
    },
}

impl GatewayEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ready { .. } => "ready",
            Self::MatchCreated { .. } => "match_created",
            Self::MatchOpened { .. } => "match_opened",
            Self::MatchDeleted { .. } => "match_deleted",
            Self::ConversationCreated { .. } => "conversation_created",
            Self::MessageCreate { .. } => "message_create",
            Self::MessagesRead { .. } => "messages_read",
        }
    }
}
