//! User registry backed by SQLite.

use std::path::Path;

use chrono::{DateTime, Utc};
use mien_core::FaceObservation;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("observation serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("username {0:?} is already registered")]
    DuplicateUser(String),
    #[error("observation is missing core landmarks (both eyes and nose base)")]
    MissingCoreLandmarks,
    #[error("stored record for {username:?} is corrupt: {detail}")]
    CorruptRecord { username: String, detail: String },
}

/// A registered user: identity plus the reference face captured at
/// registration time.
#[derive(Debug, Clone, Serialize)]
pub struct RegisteredUser {
    pub id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
    /// PNG-encoded reference photo. Skipped in JSON output; fetch it
    /// through [`Registry::lookup`] when the bytes are needed.
    #[serde(skip_serializing)]
    pub photo_png: Vec<u8>,
    pub observation: FaceObservation,
}

/// Listing entry: record metadata without the photo or observation.
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

const SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS users (
    id          TEXT PRIMARY KEY,
    username    TEXT NOT NULL UNIQUE,
    created_at  TEXT NOT NULL,
    photo_png   BLOB NOT NULL,
    observation TEXT NOT NULL
);
";

/// SQLite-backed user registry.
pub struct Registry {
    conn: Connection,
}

impl Registry {
    /// Open (or create) the registry database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        tracing::debug!(path = %path.display(), "registry opened");
        Ok(Self { conn })
    }

    /// In-memory registry for tests and ephemeral runs.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Register a user with their reference photo and face observation.
    ///
    /// The observation must carry the core landmarks (both eyes and the
    /// nose base); registering a face that later cannot be compared would
    /// only defer the failure to verification time.
    pub fn register(
        &self,
        username: &str,
        photo_png: Vec<u8>,
        observation: &FaceObservation,
    ) -> Result<RegisteredUser, StoreError> {
        if !observation.has_core_landmarks() {
            return Err(StoreError::MissingCoreLandmarks);
        }
        let exists = self
            .conn
            .query_row(
                "SELECT 1 FROM users WHERE username = ?1",
                params![username],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if exists {
            return Err(StoreError::DuplicateUser(username.to_owned()));
        }

        let user = RegisteredUser {
            id: Uuid::new_v4(),
            username: username.to_owned(),
            created_at: Utc::now(),
            photo_png,
            observation: observation.clone(),
        };
        let observation_json = serde_json::to_string(&user.observation)?;
        self.conn.execute(
            "INSERT INTO users (id, username, created_at, photo_png, observation)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user.id.to_string(),
                user.username,
                user.created_at.to_rfc3339(),
                user.photo_png,
                observation_json,
            ],
        )?;
        tracing::info!(username, user_id = %user.id, "user registered");
        Ok(user)
    }

    /// Fetch a user by username.
    pub fn lookup(&self, username: &str) -> Result<Option<RegisteredUser>, StoreError> {
        let raw = self
            .conn
            .query_row(
                "SELECT id, username, created_at, photo_png, observation
                 FROM users WHERE username = ?1",
                params![username],
                |row| {
                    Ok(RawUser {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        created_at: row.get(2)?,
                        photo_png: row.get(3)?,
                        observation: row.get(4)?,
                    })
                },
            )
            .optional()?;
        raw.map(parse_user).transpose()
    }

    /// All registered users, ordered by username. Metadata only.
    pub fn list(&self) -> Result<Vec<UserSummary>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, username, created_at FROM users ORDER BY username")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut users = Vec::new();
        for row in rows {
            let (id, username, created_at) = row?;
            users.push(UserSummary {
                id: parse_uuid(&username, &id)?,
                created_at: parse_timestamp(&username, &created_at)?,
                username,
            });
        }
        Ok(users)
    }

    /// Remove a user. Returns whether a record was deleted.
    pub fn remove(&self, username: &str) -> Result<bool, StoreError> {
        let deleted = self
            .conn
            .execute("DELETE FROM users WHERE username = ?1", params![username])?;
        if deleted > 0 {
            tracing::info!(username, "user removed");
        }
        Ok(deleted > 0)
    }
}

struct RawUser {
    id: String,
    username: String,
    created_at: String,
    photo_png: Vec<u8>,
    observation: String,
}

fn parse_user(raw: RawUser) -> Result<RegisteredUser, StoreError> {
    let id = parse_uuid(&raw.username, &raw.id)?;
    let created_at = parse_timestamp(&raw.username, &raw.created_at)?;
    let observation: FaceObservation =
        serde_json::from_str(&raw.observation).map_err(|e| StoreError::CorruptRecord {
            username: raw.username.clone(),
            detail: e.to_string(),
        })?;
    Ok(RegisteredUser {
        id,
        username: raw.username,
        created_at,
        photo_png: raw.photo_png,
        observation,
    })
}

fn parse_uuid(username: &str, value: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(value).map_err(|e| StoreError::CorruptRecord {
        username: username.to_owned(),
        detail: e.to_string(),
    })
}

fn parse_timestamp(username: &str, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::CorruptRecord {
            username: username.to_owned(),
            detail: e.to_string(),
        })
}
