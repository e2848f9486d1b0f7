use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use kind_types::models::{Conversation, Match, MatchSide, ParseError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Prefix of placeholder thread ids fabricated for a match that has no
/// conversation row yet.
pub const SYNTHETIC_PREFIX: &str = "new-";

/// Identifies a row on the messages surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadRef {
    /// A conversation row that exists on the server.
    Real(Uuid),
    /// A placeholder for the match with this id, written `new-<matchId>`.
    Synthetic(Uuid),
}

impl ThreadRef {
    pub fn is_synthetic(&self) -> bool {
        matches!(self, Self::Synthetic(_))
    }

    pub fn conversation_id(&self) -> Option<Uuid> {
        match self {
            Self::Real(id) => Some(*id),
            Self::Synthetic(_) => None,
        }
    }

    pub fn synthetic_match_id(&self) -> Option<Uuid> {
        match self {
            Self::Real(_) => None,
            Self::Synthetic(id) => Some(*id),
        }
    }
}

impl fmt::Display for ThreadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Real(id) => write!(f, "{id}"),
            Self::Synthetic(match_id) => write!(f, "{SYNTHETIC_PREFIX}{match_id}"),
        }
    }
}

impl FromStr for ThreadRef {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = match s.strip_prefix(SYNTHETIC_PREFIX) {
            Some(rest) => rest.parse().map(Self::Synthetic),
            None => s.parse().map(Self::Real),
        };
        parsed.map_err(|_| ParseError::new("thread id", s))
    }
}

impl Serialize for ThreadRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ThreadRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One entry of the messages surface, real or synthetic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub id: ThreadRef,
    pub match_id: Option<Uuid>,
    pub counterpart_id: String,
    pub last_message_id: Option<Uuid>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Thread {
    pub fn from_conversation(conversation: &Conversation, viewer_id: &str) -> Self {
        Self {
            id: ThreadRef::Real(conversation.id),
            match_id: conversation.match_id,
            counterpart_id: conversation.counterpart(viewer_id).to_string(),
            last_message_id: conversation.last_message_id,
            last_message_at: conversation.last_message_at,
            created_at: conversation.created_at,
        }
    }

    pub fn synthetic(m: &Match, side: MatchSide) -> Self {
        Self {
            id: ThreadRef::Synthetic(m.id),
            match_id: Some(m.id),
            counterpart_id: m.participant(side.other()).to_string(),
            last_message_id: None,
            last_message_at: None,
            created_at: m.created_at,
        }
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_message_at.unwrap_or(self.created_at)
    }
}
