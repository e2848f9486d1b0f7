use std::collections::HashMap;

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use kind_match::pair_key;
use kind_types::models::{
    ApplicationStatus, Conversation, JobApplication, JobPost, JobStatus, Match, MatchSide, Message,
    Role, User, UserStatus,
};
use rusqlite::{Connection, params};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{Conflict, Database};
use crate::models::{
    ApplicationRow, ConversationRow, JobPostRow, MatchRow, MessageRow, UserRow, format_ts, now_ts,
};

const USER_COLUMNS: &str = "id, role, email, first_name, last_name, status, created_at";
const JOB_POST_COLUMNS: &str =
    "id, employer_id, title, description, location, salary, status, created_at";
const APPLICATION_COLUMNS: &str = "id, job_post_id, worker_id, status, created_at";
const MATCH_COLUMNS: &str = "id, job_post_id, employer_id, worker_id, is_opened_by_employer, is_opened_by_worker, created_at";
const CONVERSATION_COLUMNS: &str =
    "id, match_id, detached_match_id, participant_one, participant_two, last_message_id, last_message_at, created_at";
const MESSAGE_COLUMNS: &str = "id, conversation_id, sender_id, content, status, created_at";

/// Fields of a new job post.
pub struct NewJobPost<'a> {
    pub employer_id: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub location: Option<&'a str>,
    pub salary: Option<&'a str>,
}

impl Database {
    // -- Users --

    /// Insert or refresh a profile synced from the auth provider.
    pub fn upsert_user(
        &self,
        id: &str,
        role: Role,
        email: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<User> {
        self.with_conn(|conn| {
            let now = now_ts();
            conn.execute(
                "INSERT INTO users (id, role, email, first_name, last_name, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'active', ?6, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                    role = excluded.role,
                    email = excluded.email,
                    first_name = excluded.first_name,
                    last_name = excluded.last_name,
                    updated_at = excluded.updated_at",
                params![id, role.as_str(), email, first_name, last_name, now],
            )?;
            query_user(conn, id)?.ok_or_else(|| anyhow!("User missing after upsert: {}", id))
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<User>> {
        self.with_conn(|conn| query_user(conn, id))
    }

    pub fn set_user_status(&self, id: &str, status: UserStatus) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET status = ?2, updated_at = ?3 WHERE id = ?1",
                params![id, status.as_str(), now_ts()],
            )?;
            Ok(changed > 0)
        })
    }

    // -- Job posts --

    pub fn create_job_post(&self, post: &NewJobPost<'_>) -> Result<JobPost> {
        self.with_conn(|conn| {
            let id = Uuid::new_v4().to_string();
            conn.execute(
                "INSERT INTO job_posts (id, employer_id, title, description, location, salary, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'open', ?7)",
                params![
                    id,
                    post.employer_id,
                    post.title,
                    post.description,
                    post.location,
                    post.salary,
                    now_ts()
                ],
            )?;
            query_job_post(conn, &id)?.ok_or_else(|| anyhow!("Job post missing after insert: {}", id))
        })
    }

    pub fn get_job_post(&self, id: Uuid) -> Result<Option<JobPost>> {
        self.with_conn(|conn| query_job_post(conn, &id.to_string()))
    }

    pub fn list_open_job_posts(&self, limit: u32) -> Result<Vec<JobPost>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {JOB_POST_COLUMNS} FROM job_posts
                 WHERE status = ?1
                 ORDER BY created_at DESC
                 LIMIT ?2"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![JobStatus::Open.as_str(), limit], map_job_post)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(convert_rows(rows))
        })
    }

    pub fn close_job_post(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE job_posts SET status = ?2 WHERE id = ?1",
                params![id.to_string(), JobStatus::Closed.as_str()],
            )?;
            Ok(changed > 0)
        })
    }

    // -- Applications --

    pub fn create_application(&self, job_post_id: Uuid, worker_id: &str) -> Result<JobApplication> {
        self.with_conn(|conn| {
            let id = Uuid::new_v4().to_string();
            let inserted = conn.execute(
                "INSERT INTO job_applications (id, job_post_id, worker_id, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    id,
                    job_post_id.to_string(),
                    worker_id,
                    ApplicationStatus::Pending.as_str(),
                    now_ts()
                ],
            );
            match inserted {
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
                {
                    return Err(Conflict("already applied".into()).into());
                }
                other => {
                    other?;
                }
            }
            query_application(conn, &id)?
                .ok_or_else(|| anyhow!("Application missing after insert: {}", id))
        })
    }

    pub fn get_application(&self, id: Uuid) -> Result<Option<JobApplication>> {
        self.with_conn(|conn| query_application(conn, &id.to_string()))
    }

    pub fn find_application(&self, job_post_id: Uuid, worker_id: &str) -> Result<Option<JobApplication>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {APPLICATION_COLUMNS} FROM job_applications WHERE job_post_id = ?1 AND worker_id = ?2"
            );
            let row = conn
                .query_row(&sql, params![job_post_id.to_string(), worker_id], map_application)
                .optional()?;
            row.map(JobApplication::try_from).transpose()
        })
    }

    pub fn list_applications_for_post(&self, job_post_id: Uuid) -> Result<Vec<JobApplication>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {APPLICATION_COLUMNS} FROM job_applications
                 WHERE job_post_id = ?1
                 ORDER BY created_at ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([job_post_id.to_string()], map_application)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(convert_rows(rows))
        })
    }

    pub fn set_application_status(&self, id: Uuid, status: ApplicationStatus) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE job_applications SET status = ?2 WHERE id = ?1",
                params![id.to_string(), status.as_str()],
            )?;
            Ok(changed > 0)
        })
    }

    /// Accept an application and create its match in one transaction.
    /// Accepting an already-accepted application returns the existing match;
    /// a rejected or withdrawn one fails with [`Conflict`].
    pub fn accept_application(&self, id: Uuid) -> Result<Match> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let application = query_application(&tx, &id.to_string())?
                .ok_or_else(|| anyhow!("Application not found: {}", id))?;
            match application.status {
                ApplicationStatus::Pending | ApplicationStatus::Accepted => {}
                other => return Err(Conflict(format!("application is {}", other)).into()),
            }
            let post = query_job_post(&tx, &application.job_post_id.to_string())?
                .ok_or_else(|| anyhow!("Job post not found: {}", application.job_post_id))?;

            tx.execute(
                "UPDATE job_applications SET status = ?2 WHERE id = ?1",
                params![id.to_string(), ApplicationStatus::Accepted.as_str()],
            )?;

            let sql = format!("SELECT {MATCH_COLUMNS} FROM matches WHERE job_post_id = ?1 AND worker_id = ?2");
            let existing = tx
                .query_row(&sql, params![post.id.to_string(), application.worker_id], map_match)
                .optional()?;
            if let Some(row) = existing {
                tx.commit()?;
                return Match::try_from(row);
            }

            let match_id = Uuid::new_v4().to_string();
            tx.execute(
                "INSERT INTO matches (id, job_post_id, employer_id, worker_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    match_id,
                    post.id.to_string(),
                    post.employer_id,
                    application.worker_id,
                    now_ts()
                ],
            )?;
            let created = query_match(&tx, &match_id)?
                .ok_or_else(|| anyhow!("Match missing after insert: {}", match_id))?;
            tx.commit()?;

            info!(
                "Match {} created for job {} ({} <-> {})",
                created.id, post.id, created.employer_id, created.worker_id
            );
            Ok(created)
        })
    }

    // -- Matches --

    pub fn get_match(&self, id: Uuid) -> Result<Option<Match>> {
        self.with_conn(|conn| query_match(conn, &id.to_string()))
    }

    pub fn list_matches_for_user(&self, user_id: &str) -> Result<Vec<Match>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MATCH_COLUMNS} FROM matches
                 WHERE employer_id = ?1 OR worker_id = ?1
                 ORDER BY created_at DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], map_match)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(convert_rows(rows))
        })
    }

    /// Set one side's opened flag. Returns false if it was already set or
    /// the match does not exist.
    pub fn mark_match_opened(&self, id: Uuid, side: MatchSide) -> Result<bool> {
        let sql = match side {
            MatchSide::Employer => {
                "UPDATE matches SET is_opened_by_employer = 1 WHERE id = ?1 AND is_opened_by_employer = 0"
            }
            MatchSide::Worker => {
                "UPDATE matches SET is_opened_by_worker = 1 WHERE id = ?1 AND is_opened_by_worker = 0"
            }
        };
        self.with_conn(|conn| Ok(conn.execute(sql, [id.to_string()])? > 0))
    }

    /// Conversations linked to the match survive with `match_id` cleared.
    /// Delete a match. Its conversation survives, detached: `match_id` is
    /// cleared by the foreign key and the old id kept in `detached_match_id`.
    pub fn delete_match(&self, id: Uuid) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mid = id.to_string();
            tx.execute(
                "UPDATE conversations SET detached_match_id = ?1 WHERE match_id = ?1",
                [&mid],
            )?;
            let deleted = tx.execute("DELETE FROM matches WHERE id = ?1", [&mid])? > 0;
            tx.commit()?;
            Ok(deleted)
        })
    }

    // -- Conversations --

    pub fn get_conversation(&self, id: Uuid) -> Result<Option<Conversation>> {
        self.with_conn(|conn| query_conversation(conn, &id.to_string()))
    }

    pub fn list_conversations_for_user(&self, user_id: &str) -> Result<Vec<Conversation>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversations
                 WHERE participant_one = ?1 OR participant_two = ?1
                 ORDER BY COALESCE(last_message_at, created_at) DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], map_conversation)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(convert_rows(rows))
        })
    }

    /// Look up the conversation for a match: by `match_id` first, then a
    /// match-less conversation between the same two users.
    pub fn find_conversation_for_match(&self, m: &Match) -> Result<Option<Conversation>> {
        self.with_conn(|conn| query_conversation_for_match(conn, m))
    }

    /// Return the match's conversation, creating it if needed. A match-less
    /// conversation between the pair is adopted by linking it to the match.
    /// The bool is true when a row was inserted.
    pub fn get_or_create_conversation(&self, m: &Match) -> Result<(Conversation, bool)> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if let Some(existing) = query_conversation_for_match(&tx, m)? {
                if existing.match_id.is_some() {
                    return Ok((existing, false));
                }
                tx.execute(
                    "UPDATE conversations SET match_id = ?2 WHERE id = ?1",
                    params![existing.id.to_string(), m.id.to_string()],
                )?;
                let adopted = query_conversation(&tx, &existing.id.to_string())?
                    .ok_or_else(|| anyhow!("Conversation missing after update: {}", existing.id))?;
                tx.commit()?;
                debug!("Linked conversation {} to match {}", adopted.id, m.id);
                return Ok((adopted, false));
            }

            let id = insert_conversation(&tx, Some(m.id), &m.employer_id, &m.worker_id)?;
            let created = query_conversation(&tx, &id)?
                .ok_or_else(|| anyhow!("Conversation missing after insert: {}", id))?;
            tx.commit()?;
            info!("Conversation {} created for match {}", created.id, m.id);
            Ok((created, true))
        })
    }

    /// Return the match-less conversation between two users, creating it if needed.
    pub fn create_direct_conversation(&self, user_a: &str, user_b: &str) -> Result<(Conversation, bool)> {
        let key = pair_key(user_a, user_b).ok_or_else(|| anyhow!("Conversation needs two participant ids"))?;
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let sql = format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversations
                 WHERE pair_key = ?1 AND match_id IS NULL AND detached_match_id IS NULL
                 ORDER BY created_at ASC
                 LIMIT 1"
            );
            if let Some(row) = tx.query_row(&sql, [key.as_str()], map_conversation).optional()? {
                return Ok((Conversation::try_from(row)?, false));
            }

            let id = insert_conversation(&tx, None, user_a, user_b)?;
            let created = query_conversation(&tx, &id)?
                .ok_or_else(|| anyhow!("Conversation missing after insert: {}", id))?;
            tx.commit()?;
            Ok((created, true))
        })
    }

    // -- Messages --

    /// Insert a message and move the conversation's last-message pointer.
    pub fn insert_message(&self, conversation_id: Uuid, sender_id: &str, content: &str) -> Result<Message> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let id = Uuid::new_v4().to_string();
            let cid = conversation_id.to_string();
            let now = now_ts();

            tx.execute(
                "INSERT INTO messages (id, conversation_id, sender_id, content, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, 'sent', ?5)",
                params![id, cid, sender_id, content, now],
            )?;
            tx.execute(
                "UPDATE conversations SET last_message_id = ?2, last_message_at = ?3 WHERE id = ?1",
                params![cid, id, now],
            )?;

            let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1");
            let row = tx.query_row(&sql, [&id], map_message)?;
            tx.commit()?;
            Message::try_from(row)
        })
    }

    /// Newest first. `before` is the `created_at` of the oldest message of
    /// the previous page.
    pub fn get_messages(
        &self,
        conversation_id: Uuid,
        limit: u32,
        before: Option<DateTime<Utc>>,
    ) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let cid = conversation_id.to_string();
            let rows = match before {
                Some(cursor) => {
                    // Stored values are fixed-width, compare in the same format.
                    let cursor = format_ts(cursor);
                    let sql = format!(
                        "SELECT {MESSAGE_COLUMNS} FROM messages
                         WHERE conversation_id = ?1 AND created_at < ?2
                         ORDER BY created_at DESC
                         LIMIT ?3"
                    );
                    let mut stmt = conn.prepare(&sql)?;
                    let rows = stmt
                        .query_map(params![cid, cursor, limit], map_message)?
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    rows
                }
                None => {
                    let sql = format!(
                        "SELECT {MESSAGE_COLUMNS} FROM messages
                         WHERE conversation_id = ?1
                         ORDER BY created_at DESC
                         LIMIT ?2"
                    );
                    let mut stmt = conn.prepare(&sql)?;
                    let rows = stmt
                        .query_map(params![cid, limit], map_message)?
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    rows
                }
            };
            Ok(convert_rows(rows))
        })
    }

    /// Mark every message not sent by `recipient_id` that is still `sent` as `delivered`.
    pub fn mark_delivered(&self, conversation_id: Uuid, recipient_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE messages SET status = 'delivered'
                 WHERE conversation_id = ?1 AND sender_id != ?2 AND status = 'sent'",
                params![conversation_id.to_string(), recipient_id],
            )?)
        })
    }

    pub fn mark_conversation_read(&self, conversation_id: Uuid, reader_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE messages SET status = 'read'
                 WHERE conversation_id = ?1 AND sender_id != ?2 AND status != 'read'",
                params![conversation_id.to_string(), reader_id],
            )?)
        })
    }

    /// Unread message counts per conversation for everything `user_id` takes part in.
    pub fn unread_counts_for_user(&self, user_id: &str) -> Result<HashMap<Uuid, i64>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.conversation_id, COUNT(*)
                 FROM messages m
                 JOIN conversations c ON c.id = m.conversation_id
                 WHERE (c.participant_one = ?1 OR c.participant_two = ?1)
                   AND m.sender_id != ?1
                   AND m.status != 'read'
                 GROUP BY m.conversation_id",
            )?;
            let rows = stmt
                .query_map([user_id], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut counts = HashMap::with_capacity(rows.len());
            for (id, count) in rows {
                match id.parse::<Uuid>() {
                    Ok(id) => {
                        counts.insert(id, count);
                    }
                    Err(e) => warn!("Corrupt conversation id '{}': {}", id, e),
                }
            }
            Ok(counts)
        })
    }
}

fn insert_conversation(conn: &Connection, match_id: Option<Uuid>, a: &str, b: &str) -> Result<String> {
    let key = pair_key(a, b).ok_or_else(|| anyhow!("Conversation needs two participant ids"))?;
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO conversations (id, match_id, participant_one, participant_two, pair_key, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![id, match_id.map(|m| m.to_string()), a, b, key.as_str(), now_ts()],
    )?;
    Ok(id)
}

fn query_conversation_for_match(conn: &Connection, m: &Match) -> Result<Option<Conversation>> {
    let sql = format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE match_id = ?1");
    if let Some(row) = conn.query_row(&sql, [m.id.to_string()], map_conversation).optional()? {
        return Conversation::try_from(row).map(Some);
    }

    let Some(key) = pair_key(&m.employer_id, &m.worker_id) else {
        return Ok(None);
    };
    let sql = format!(
        "SELECT {CONVERSATION_COLUMNS} FROM conversations
         WHERE pair_key = ?1 AND match_id IS NULL AND detached_match_id IS NULL
         ORDER BY created_at ASC
         LIMIT 1"
    );
    let row = conn.query_row(&sql, [key.as_str()], map_conversation).optional()?;
    row.map(Conversation::try_from).transpose()
}

fn query_user(conn: &Connection, id: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
    let row = conn.query_row(&sql, [id], map_user).optional()?;
    row.map(User::try_from).transpose()
}

fn query_job_post(conn: &Connection, id: &str) -> Result<Option<JobPost>> {
    let sql = format!("SELECT {JOB_POST_COLUMNS} FROM job_posts WHERE id = ?1");
    let row = conn.query_row(&sql, [id], map_job_post).optional()?;
    row.map(JobPost::try_from).transpose()
}

fn query_application(conn: &Connection, id: &str) -> Result<Option<JobApplication>> {
    let sql = format!("SELECT {APPLICATION_COLUMNS} FROM job_applications WHERE id = ?1");
    let row = conn.query_row(&sql, [id], map_application).optional()?;
    row.map(JobApplication::try_from).transpose()
}

fn query_match(conn: &Connection, id: &str) -> Result<Option<Match>> {
    let sql = format!("SELECT {MATCH_COLUMNS} FROM matches WHERE id = ?1");
    let row = conn.query_row(&sql, [id], map_match).optional()?;
    row.map(Match::try_from).transpose()
}

fn query_conversation(conn: &Connection, id: &str) -> Result<Option<Conversation>> {
    let sql = format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1");
    let row = conn.query_row(&sql, [id], map_conversation).optional()?;
    row.map(Conversation::try_from).transpose()
}

/// Convert rows for a list query, skipping (and logging) corrupt ones.
fn convert_rows<R, M>(rows: Vec<R>) -> Vec<M>
where
    M: TryFrom<R, Error = anyhow::Error>,
{
    rows.into_iter()
        .filter_map(|row| match M::try_from(row) {
            Ok(model) => Some(model),
            Err(e) => {
                warn!("Skipping corrupt row: {:#}", e);
                None
            }
        })
        .collect()
}

fn map_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        role: row.get(1)?,
        email: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        status: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn map_job_post(row: &rusqlite::Row<'_>) -> rusqlite::Result<JobPostRow> {
    Ok(JobPostRow {
        id: row.get(0)?,
        employer_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        location: row.get(4)?,
        salary: row.get(5)?,
        status: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn map_application(row: &rusqlite::Row<'_>) -> rusqlite::Result<ApplicationRow> {
    Ok(ApplicationRow {
        id: row.get(0)?,
        job_post_id: row.get(1)?,
        worker_id: row.get(2)?,
        status: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn map_match(row: &rusqlite::Row<'_>) -> rusqlite::Result<MatchRow> {
    Ok(MatchRow {
        id: row.get(0)?,
        job_post_id: row.get(1)?,
        employer_id: row.get(2)?,
        worker_id: row.get(3)?,
        is_opened_by_employer: row.get(4)?,
        is_opened_by_worker: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn map_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationRow> {
    Ok(ConversationRow {
        id: row.get(0)?,
        match_id: row.get(1)?,
        detached_match_id: row.get(2)?,
        participant_one: row.get(3)?,
        participant_two: row.get(4)?,
        last_message_id: row.get(5)?,
        last_message_at: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn map_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_id: row.get(2)?,
        content: row.get(3)?,
        status: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kind_types::models::MessageStatus;

    const BOSS: &str = "user_boss";
    const TAO: &str = "user_tao";

    fn seeded() -> (Database, Match) {
        let db = Database::open_in_memory().unwrap();
        db.upsert_user(BOSS, Role::Employer, "boss@example.com", "Bea", "Santos").unwrap();
        db.upsert_user(TAO, Role::Worker, "tao@example.com", "Tala", "Reyes").unwrap();
        let post = db
            .create_job_post(&NewJobPost {
                employer_id: BOSS,
                title: "Live-in helper",
                description: "Cooking and cleaning",
                location: Some("Quezon City"),
                salary: None,
            })
            .unwrap();
        let application = db.create_application(post.id, TAO).unwrap();
        let m = db.accept_application(application.id).unwrap();
        (db, m)
    }

    #[test]
    fn test_upsert_user_updates_profile() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_user(TAO, Role::Worker, "old@example.com", "Tala", "Reyes").unwrap();
        let user = db.upsert_user(TAO, Role::Worker, "new@example.com", "Tala", "Cruz").unwrap();
        assert_eq!(user.email, "new@example.com");
        assert_eq!(user.last_name, "Cruz");
        assert_eq!(user.status, UserStatus::Active);

        assert!(db.set_user_status(TAO, UserStatus::Deleted).unwrap());
        let user = db.get_user_by_id(TAO).unwrap().unwrap();
        assert_eq!(user.status, UserStatus::Deleted);
        assert!(db.get_user_by_id("user_missing").unwrap().is_none());
    }

    #[test]
    fn test_accept_application_creates_match_once() {
        let (db, m) = seeded();
        assert_eq!(m.employer_id, BOSS);
        assert_eq!(m.worker_id, TAO);
        assert!(!m.is_opened_by_employer && !m.is_opened_by_worker);

        let application = db.find_application(m.job_post_id, TAO).unwrap().unwrap();
        assert_eq!(application.status, ApplicationStatus::Accepted);
        let again = db.accept_application(application.id).unwrap();
        assert_eq!(again.id, m.id);
        assert_eq!(db.list_matches_for_user(BOSS).unwrap().len(), 1);
        assert_eq!(db.list_matches_for_user(TAO).unwrap().len(), 1);
    }

    fn second_match(db: &Database) -> Match {
        let post = db
            .create_job_post(&NewJobPost {
                employer_id: BOSS,
                title: "Weekend cook",
                description: "Saturdays only",
                location: None,
                salary: Some("800/day"),
            })
            .unwrap();
        let application = db.create_application(post.id, TAO).unwrap();
        db.accept_application(application.id).unwrap()
    }

    #[test]
    fn test_duplicate_application_is_conflict() {
        let (db, m) = seeded();
        let err = db.create_application(m.job_post_id, TAO).unwrap_err();
        assert!(err.downcast_ref::<Conflict>().is_some());
    }

    #[test]
    fn test_rejected_application_cannot_be_accepted() {
        let (db, m) = seeded();
        let post = db.get_job_post(m.job_post_id).unwrap().unwrap();
        db.upsert_user("user_ana", Role::Worker, "ana@example.com", "Ana", "Lim").unwrap();
        let application = db.create_application(post.id, "user_ana").unwrap();
        db.set_application_status(application.id, ApplicationStatus::Rejected).unwrap();

        let err = db.accept_application(application.id).unwrap_err();
        assert!(err.downcast_ref::<Conflict>().is_some());
        assert_eq!(db.list_matches_for_user("user_ana").unwrap().len(), 0);
        let unchanged = db.get_application(application.id).unwrap().unwrap();
        assert_eq!(unchanged.status, ApplicationStatus::Rejected);
    }

    #[test]
    fn test_open_jobs_exclude_closed() {
        let (db, m) = seeded();
        assert_eq!(db.list_open_job_posts(10).unwrap().len(), 1);
        assert!(db.close_job_post(m.job_post_id).unwrap());
        assert!(db.list_open_job_posts(10).unwrap().is_empty());
    }

    #[test]
    fn test_mark_match_opened_per_side() {
        let (db, m) = seeded();
        assert!(db.mark_match_opened(m.id, MatchSide::Worker).unwrap());
        assert!(!db.mark_match_opened(m.id, MatchSide::Worker).unwrap());

        let m = db.get_match(m.id).unwrap().unwrap();
        assert!(m.is_opened_by_worker);
        assert!(!m.is_opened_by_employer);
    }

    #[test]
    fn test_get_or_create_conversation_is_idempotent() {
        let (db, m) = seeded();
        assert!(db.find_conversation_for_match(&m).unwrap().is_none());

        let (first, created) = db.get_or_create_conversation(&m).unwrap();
        assert!(created);
        assert_eq!(first.match_id, Some(m.id));

        let (second, created) = db.get_or_create_conversation(&m).unwrap();
        assert!(!created);
        assert_eq!(second.id, first.id);
        assert_eq!(db.list_conversations_for_user(TAO).unwrap().len(), 1);
    }

    #[test]
    fn test_matchless_pair_conversation_is_adopted() {
        let (db, m) = seeded();
        let (direct, created) = db.create_direct_conversation(TAO, BOSS).unwrap();
        assert!(created);
        assert_eq!(direct.match_id, None);
        assert_eq!(db.find_conversation_for_match(&m).unwrap().unwrap().id, direct.id);

        let (adopted, created) = db.get_or_create_conversation(&m).unwrap();
        assert!(!created);
        assert_eq!(adopted.id, direct.id);
        assert_eq!(adopted.match_id, Some(m.id));
    }

    #[test]
    fn test_direct_conversation_reused() {
        let db = Database::open_in_memory().unwrap();
        let (a, _) = db.create_direct_conversation("user_admin", TAO).unwrap();
        let (b, created) = db.create_direct_conversation(TAO, "user_admin").unwrap();
        assert!(!created);
        assert_eq!(a.id, b.id);
        assert!(db.create_direct_conversation("", TAO).is_err());
    }

    #[test]
    fn test_messages_update_conversation_and_status() {
        let (db, m) = seeded();
        let (conversation, _) = db.get_or_create_conversation(&m).unwrap();

        db.insert_message(conversation.id, BOSS, "Hello!").unwrap();
        db.insert_message(conversation.id, BOSS, "When can you start?").unwrap();
        let last = db.insert_message(conversation.id, TAO, "Monday").unwrap();

        let refreshed = db.get_conversation(conversation.id).unwrap().unwrap();
        assert_eq!(refreshed.last_message_id, Some(last.id));
        assert_eq!(refreshed.last_message_at, Some(last.created_at));

        let unread = db.unread_counts_for_user(TAO).unwrap();
        assert_eq!(unread.get(&conversation.id), Some(&2));

        assert_eq!(db.mark_delivered(conversation.id, TAO).unwrap(), 2);
        assert_eq!(db.mark_conversation_read(conversation.id, TAO).unwrap(), 2);
        assert!(db.unread_counts_for_user(TAO).unwrap().is_empty());
        assert_eq!(db.unread_counts_for_user(BOSS).unwrap().get(&conversation.id), Some(&1));

        let messages = db.get_messages(conversation.id, 50, None).unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].content, "Monday");
        assert_eq!(messages[0].status, MessageStatus::Sent);
        assert_eq!(messages[2].status, MessageStatus::Read);
    }

    #[test]
    fn test_message_pagination() {
        let (db, m) = seeded();
        let (conversation, _) = db.get_or_create_conversation(&m).unwrap();
        for i in 0..5 {
            db.insert_message(conversation.id, BOSS, &format!("msg {i}")).unwrap();
        }

        let page = db.get_messages(conversation.id, 2, None).unwrap();
        assert_eq!(page.len(), 2);
        let older = db.get_messages(conversation.id, 10, Some(page[1].created_at)).unwrap();
        assert_eq!(older.len(), 3);
        assert!(older.iter().all(|msg| msg.created_at < page[1].created_at));
    }

    #[test]
    fn test_delete_match_keeps_conversation() {
        let (db, m) = seeded();
        let (conversation, _) = db.get_or_create_conversation(&m).unwrap();
        assert!(db.delete_match(m.id).unwrap());
        assert!(db.get_match(m.id).unwrap().is_none());

        let orphan = db.get_conversation(conversation.id).unwrap().unwrap();
        assert_eq!(orphan.match_id, None);
        assert_eq!(orphan.detached_match_id, Some(m.id));
    }

    #[test]
    fn test_deleted_match_history_not_adopted_by_sibling() {
        let (db, first) = seeded();
        let second = second_match(&db);
        let (old, _) = db.get_or_create_conversation(&first).unwrap();
        db.insert_message(old.id, TAO, "hi").unwrap();
        db.delete_match(first.id).unwrap();

        assert!(db.find_conversation_for_match(&second).unwrap().is_none());
        let (fresh, created) = db.get_or_create_conversation(&second).unwrap();
        assert!(created);
        assert_ne!(fresh.id, old.id);
        assert!(db.get_messages(fresh.id, 50, None).unwrap().is_empty());

        // Nor does it pass for a direct conversation between the pair.
        let (direct, created) = db.create_direct_conversation(BOSS, TAO).unwrap();
        assert!(created);
        assert_ne!(direct.id, old.id);
    }

    #[test]
    fn test_message_cursor_ignores_fraction_formatting() {
        let (db, m) = seeded();
        let (conversation, _) = db.get_or_create_conversation(&m).unwrap();
        db.with_conn(|conn| {
            for (id, second) in [("m0", 1), ("m1", 2), ("m2", 3)] {
                conn.execute(
                    "INSERT INTO messages (id, conversation_id, sender_id, content, status, created_at)
                     VALUES (?1, ?2, ?3, ?4, 'sent', ?5)",
                    params![
                        Uuid::new_v4().to_string(),
                        conversation.id.to_string(),
                        BOSS,
                        id,
                        format!("2026-03-01T09:00:0{second}.000000Z")
                    ],
                )?;
            }
            Ok(())
        })
        .unwrap();

        // Clients echo `created_at` as serialized, without the zero fraction.
        let cursor = crate::models::parse_ts("2026-03-01T09:00:03Z").unwrap();
        let older = db.get_messages(conversation.id, 10, Some(cursor)).unwrap();
        let contents: Vec<&str> = older.iter().map(|msg| msg.content.as_str()).collect();
        assert_eq!(contents, vec!["m1", "m0"]);
    }
}
