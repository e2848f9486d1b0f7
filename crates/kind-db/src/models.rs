//! Database row types — these map directly to SQLite rows.
//! Distinct from kind-types models to keep the DB layer independent;
//! conversion parses the TEXT columns and fails on corrupt data.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use kind_types::models::{
    Conversation, JobApplication, JobPost, Match, Message, User,
};
use uuid::Uuid;

/// Timestamp format written to every TEXT time column. Fixed width, so
/// lexical order is chronological order.
pub fn now_ts() -> String {
    format_ts(Utc::now())
}

pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite's datetime('now') has no timezone. Parse as naive UTC.
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .with_context(|| format!("corrupt timestamp '{}'", raw))
}

fn parse_id(raw: &str) -> Result<Uuid> {
    raw.parse().with_context(|| format!("corrupt id '{}'", raw))
}

fn parse_opt_id(raw: Option<&str>) -> Result<Option<Uuid>> {
    raw.map(parse_id).transpose()
}

pub struct UserRow {
    pub id: String,
    pub role: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub status: String,
    pub created_at: String,
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            role: row.role.parse()?,
            status: row.status.parse()?,
            created_at: parse_ts(&row.created_at)?,
            id: row.id,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
        })
    }
}

pub struct JobPostRow {
    pub id: String,
    pub employer_id: String,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub salary: Option<String>,
    pub status: String,
    pub created_at: String,
}

impl TryFrom<JobPostRow> for JobPost {
    type Error = anyhow::Error;

    fn try_from(row: JobPostRow) -> Result<Self> {
        Ok(JobPost {
            id: parse_id(&row.id)?,
            status: row.status.parse()?,
            created_at: parse_ts(&row.created_at)?,
            employer_id: row.employer_id,
            title: row.title,
            description: row.description,
            location: row.location,
            salary: row.salary,
        })
    }
}

pub struct ApplicationRow {
    pub id: String,
    pub job_post_id: String,
    pub worker_id: String,
    pub status: String,
    pub created_at: String,
}

impl TryFrom<ApplicationRow> for JobApplication {
    type Error = anyhow::Error;

    fn try_from(row: ApplicationRow) -> Result<Self> {
        Ok(JobApplication {
            id: parse_id(&row.id)?,
            job_post_id: parse_id(&row.job_post_id)?,
            status: row.status.parse()?,
            created_at: parse_ts(&row.created_at)?,
            worker_id: row.worker_id,
        })
    }
}

pub struct MatchRow {
    pub id: String,
    pub job_post_id: String,
    pub employer_id: String,
    pub worker_id: String,
    pub is_opened_by_employer: bool,
    pub is_opened_by_worker: bool,
    pub created_at: String,
}

impl TryFrom<MatchRow> for Match {
    type Error = anyhow::Error;

    fn try_from(row: MatchRow) -> Result<Self> {
        Ok(Match {
            id: parse_id(&row.id)?,
            job_post_id: parse_id(&row.job_post_id)?,
            created_at: parse_ts(&row.created_at)?,
            employer_id: row.employer_id,
            worker_id: row.worker_id,
            is_opened_by_employer: row.is_opened_by_employer,
            is_opened_by_worker: row.is_opened_by_worker,
        })
    }
}

pub struct ConversationRow {
    pub id: String,
    pub match_id: Option<String>,
    pub detached_match_id: Option<String>,
    pub participant_one: String,
    pub participant_two: String,
    pub last_message_id: Option<String>,
    pub last_message_at: Option<String>,
    pub created_at: String,
}

impl TryFrom<ConversationRow> for Conversation {
    type Error = anyhow::Error;

    fn try_from(row: ConversationRow) -> Result<Self> {
        Ok(Conversation {
            id: parse_id(&row.id)?,
            match_id: parse_opt_id(row.match_id.as_deref())?,
            detached_match_id: parse_opt_id(row.detached_match_id.as_deref())?,
            last_message_id: parse_opt_id(row.last_message_id.as_deref())?,
            last_message_at: row.last_message_at.as_deref().map(parse_ts).transpose()?,
            created_at: parse_ts(&row.created_at)?,
            participant_one: row.participant_one,
            participant_two: row.participant_two,
        })
    }
}

pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    pub status: String,
    pub created_at: String,
}

impl TryFrom<MessageRow> for Message {
    type Error = anyhow::Error;

    fn try_from(row: MessageRow) -> Result<Self> {
        Ok(Message {
            id: parse_id(&row.id)?,
            conversation_id: parse_id(&row.conversation_id)?,
            status: row.status.parse()?,
            created_at: parse_ts(&row.created_at)?,
            sender_id: row.sender_id,
            content: row.content,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ts_formats() {
        let now = Utc::now();
        let written = format_ts(now);
        assert_eq!(parse_ts(&written).unwrap().timestamp_micros(), now.timestamp_micros());
        assert!(parse_ts("2026-01-02 03:04:05").is_ok());
        assert!(parse_ts("yesterday").is_err());
    }

    #[test]
    fn test_corrupt_row_rejected() {
        let row = MessageRow {
            id: "not-a-uuid".into(),
            conversation_id: Uuid::new_v4().to_string(),
            sender_id: "user_1".into(),
            content: "hi".into(),
            status: "sent".into(),
            created_at: now_ts(),
        };
        assert!(Message::try_from(row).is_err());
    }
}
