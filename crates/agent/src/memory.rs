//! SQLite-backed conversation log.

use proto::{AgentMessage, DatabaseError, Role, SessionId, ToolCall};
use sqlx::{Row, sqlite::SqlitePool};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// SQLite-backed conversation memory.
///
/// Messages are append-only per session and ordered by an insertion
/// sequence, so replay order never depends on timestamp resolution.
pub struct SqliteMemory {
    pool: SqlitePool,
}

impl SqliteMemory {
    /// Open (or create) the SQLite database and run migrations
    pub async fn open(db_url: &str) -> Result<Self, DatabaseError> {
        let url = expand_home(db_url);

        if let Some(parent) = std::path::Path::new(&url).parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DatabaseError::Sqlx(e.to_string()))?;
        }

        let pool = SqlitePool::connect(&format!("sqlite:{url}?mode=rwc"))
            .await
            .map_err(|e| DatabaseError::Sqlx(e.to_string()))?;

        let migrations_dir =
            std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../migrations");
        let migrator = sqlx::migrate::Migrator::new(migrations_dir.as_path())
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;
        migrator
            .run(&pool)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;

        info!("SQLite memory opened: {url}");
        Ok(Self { pool })
    }

    /// Ensure a session exists (create if not)
    pub async fn ensure_session(
        &self,
        session_id: &SessionId,
        channel_id: &str,
    ) -> Result<(), DatabaseError> {
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT OR IGNORE INTO sessions (id, channel_id, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(session_id.as_str())
        .bind(channel_id)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::Sqlx(e.to_string()))?;
        Ok(())
    }

    /// Appends a message to the end of its session.
    pub async fn append_message(&self, msg: &AgentMessage) -> Result<(), DatabaseError> {
        let tool_calls_json = msg
            .tool_calls
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| DatabaseError::Sqlx(e.to_string()))?;

        sqlx::query(
            "INSERT INTO messages (id, session_id, seq, role, content, tool_call_id, tool_name, tool_calls_json, created_at) \
             VALUES (?, ?, (SELECT COALESCE(MAX(seq), 0) + 1 FROM messages WHERE session_id = ?), ?, ?, ?, ?, ?, ?)",
        )
        .bind(&msg.id)
        .bind(msg.session_id.as_str())
        .bind(msg.session_id.as_str())
        .bind(msg.role.to_string())
        .bind(&msg.content)
        .bind(&msg.tool_call_id)
        .bind(&msg.tool_name)
        .bind(tool_calls_json)
        .bind(msg.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::Sqlx(e.to_string()))?;

        debug!(id = %msg.id, role = %msg.role, "Appended message");
        Ok(())
    }

    /// Load all messages for a session in insertion order
    pub async fn load_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<AgentMessage>, DatabaseError> {
        let rows = sqlx::query(
            "SELECT id, session_id, role, content, tool_call_id, tool_name, tool_calls_json, created_at \
             FROM messages WHERE session_id = ? ORDER BY seq ASC",
        )
        .bind(session_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DatabaseError::Sqlx(e.to_string()))?;

        let messages = rows
            .into_iter()
            .map(|row| {
                let role_str: String = row.get("role");
                let role = Role::from_str(&role_str).unwrap_or_else(|_| {
                    warn!(role = %role_str, "Unknown stored role, treating as user");
                    Role::User
                });
                let created_at_str: String = row.get("created_at");
                let created_at = chrono::DateTime::parse_from_rfc3339(&created_at_str)
                    .map(|dt| dt.with_timezone(&chrono::Utc))
                    .unwrap_or_else(|_| chrono::Utc::now());
                let tool_calls_json: Option<String> = row.get("tool_calls_json");
                let tool_calls = tool_calls_json
                    .as_deref()
                    .and_then(|raw| serde_json::from_str::<Vec<ToolCall>>(raw).ok());

                AgentMessage {
                    id: row.get("id"),
                    session_id: SessionId::from(row.get::<String, _>("session_id")),
                    role,
                    content: row.get("content"),
                    tool_call_id: row.get("tool_call_id"),
                    tool_name: row.get("tool_name"),
                    tool_calls,
                    created_at,
                }
            })
            .collect();

        Ok(messages)
    }

    pub async fn touch_session(&self, session_id: &SessionId) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE sessions SET updated_at = ? WHERE id = ?")
            .bind(chrono::Utc::now().to_rfc3339())
            .bind(session_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| DatabaseError::Sqlx(e.to_string()))?;
        Ok(())
    }

    /// Deletes every message of a session and returns how many were removed.
    pub async fn clear_session(&self, session_id: &SessionId) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM messages WHERE session_id = ?")
            .bind(session_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| DatabaseError::Sqlx(e.to_string()))?;
        debug!(session = %session_id, removed = result.rows_affected(), "Session cleared");
        Ok(result.rows_affected())
    }
}

fn expand_home(db_url: &str) -> String {
    if db_url.starts_with('~') {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        db_url.replacen('~', &home, 1)
    } else {
        db_url.to_string()
    }
}
