use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: '{value}'")]
pub struct ParseError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseError {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// Enums stored as lowercase TEXT columns and sent as lowercase JSON strings.
macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(ParseError::new($kind, other)),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// KindBossing: households hiring help.
    Employer,
    /// KindTao: domestic workers.
    Worker,
    Admin,
}

text_enum!(Role, "role", {
    Employer => "employer",
    Worker => "worker",
    Admin => "admin",
});

impl Role {
    /// Which side of a match this role stands on. Admins are never party to a match.
    pub fn match_side(&self) -> Option<MatchSide> {
        match self {
            Self::Employer => Some(MatchSide::Employer),
            Self::Worker => Some(MatchSide::Worker),
            Self::Admin => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchSide {
    Employer,
    Worker,
}

text_enum!(MatchSide, "match side", {
    Employer => "employer",
    Worker => "worker",
});

impl MatchSide {
    pub fn other(&self) -> Self {
        match self {
            Self::Employer => Self::Worker,
            Self::Worker => Self::Employer,
        }
    }
}

/// Users are never hard-deleted; `Deleted` is a soft status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Suspended,
    Deleted,
}

text_enum!(UserStatus, "user status", {
    Active => "active",
    Suspended => "suspended",
    Deleted => "deleted",
});

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Identifier issued by the external auth provider.
    pub id: String,
    pub role: Role,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Open,
    Closed,
}

text_enum!(JobStatus, "job status", {
    Open => "open",
    Closed => "closed",
});

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPost {
    pub id: Uuid,
    pub employer_id: String,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub salary: Option<String>,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Accepted,
    Rejected,
    Withdrawn,
}

text_enum!(ApplicationStatus, "application status", {
    Pending => "pending",
    Accepted => "accepted",
    Rejected => "rejected",
    Withdrawn => "withdrawn",
});

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobApplication {
    pub id: Uuid,
    pub job_post_id: Uuid,
    pub worker_id: String,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
}

/// Pairs one employer and one worker around a job post. Each side
/// opens the match independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub id: Uuid,
    pub job_post_id: Uuid,
    pub employer_id: String,
    pub worker_id: String,
    pub is_opened_by_employer: bool,
    pub is_opened_by_worker: bool,
    pub created_at: DateTime<Utc>,
}

impl Match {
    pub fn is_opened_by(&self, side: MatchSide) -> bool {
        match side {
            MatchSide::Employer => self.is_opened_by_employer,
            MatchSide::Worker => self.is_opened_by_worker,
        }
    }

    pub fn participant(&self, side: MatchSide) -> &str {
        match side {
            MatchSide::Employer => &self.employer_id,
            MatchSide::Worker => &self.worker_id,
        }
    }

    /// The side `user_id` stands on, or `None` if they are not a participant.
    pub fn side_of(&self, user_id: &str) -> Option<MatchSide> {
        if self.employer_id == user_id {
            Some(MatchSide::Employer)
        } else if self.worker_id == user_id {
            Some(MatchSide::Worker)
        } else {
            None
        }
    }
}

/// A messaging thread. Created lazily on first message, so a match may
/// exist for a long time without one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub match_id: Option<Uuid>,
    /// The match this conversation belonged to before it was deleted.
    /// Detached conversations never stand in for another match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detached_match_id: Option<Uuid>,
    pub participant_one: String,
    pub participant_two: String,
    pub last_message_id: Option<Uuid>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn involves(&self, user_id: &str) -> bool {
        self.participant_one == user_id || self.participant_two == user_id
    }

    /// The other participant from `user_id`'s point of view.
    pub fn counterpart(&self, user_id: &str) -> &str {
        if self.participant_one == user_id {
            &self.participant_two
        } else {
            &self.participant_one
        }
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_message_at.unwrap_or(self.created_at)
    }

    /// Never linked to a match, so it may be matched up by participant pair.
    pub fn is_pair_fallback(&self) -> bool {
        self.match_id.is_none() && self.detached_match_id.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

text_enum!(MessageStatus, "message status", {
    Sent => "sent",
    Delivered => "delivered",
    Read => "read",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: String,
    pub content: String,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_match() -> Match {
        Match {
            id: Uuid::new_v4(),
            job_post_id: Uuid::new_v4(),
            employer_id: "user_boss".into(),
            worker_id: "user_tao".into(),
            is_opened_by_employer: true,
            is_opened_by_worker: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_enum_text_roundtrip() {
        assert_eq!("worker".parse::<Role>().unwrap(), Role::Worker);
        assert_eq!(MessageStatus::Delivered.as_str(), "delivered");
        let err = "owner".parse::<Role>().unwrap_err();
        assert_eq!(err.kind, "role");
        assert_eq!(err.value, "owner");
    }

    #[test]
    fn test_enum_serde_lowercase() {
        let json = serde_json::to_string(&ApplicationStatus::Accepted).unwrap();
        assert_eq!(json, "\"accepted\"");
    }

    #[test]
    fn test_admin_has_no_side() {
        assert_eq!(Role::Admin.match_side(), None);
        assert_eq!(Role::Employer.match_side(), Some(MatchSide::Employer));
        assert_eq!(MatchSide::Worker.other(), MatchSide::Employer);
    }

    #[test]
    fn test_match_sides() {
        let m = sample_match();
        assert!(m.is_opened_by(MatchSide::Employer));
        assert!(!m.is_opened_by(MatchSide::Worker));
        assert_eq!(m.side_of("user_tao"), Some(MatchSide::Worker));
        assert_eq!(m.side_of("someone_else"), None);
        assert_eq!(m.participant(MatchSide::Employer), "user_boss");
    }

    #[test]
    fn test_detached_conversation_not_pair_fallback() {
        let mut c = Conversation {
            id: Uuid::new_v4(),
            match_id: None,
            detached_match_id: None,
            participant_one: "user_boss".into(),
            participant_two: "user_tao".into(),
            last_message_id: None,
            last_message_at: None,
            created_at: Utc::now(),
        };
        assert!(c.is_pair_fallback());
        let json = serde_json::to_value(&c).unwrap();
        assert!(json.get("detached_match_id").is_none());

        c.detached_match_id = Some(Uuid::new_v4());
        assert!(!c.is_pair_fallback());
        let back: Conversation = serde_json::from_value(serde_json::to_value(&c).unwrap()).unwrap();
        assert_eq!(back, c);
    }
}
