//! Habit owner repository.

use super::{ensure_connection_ready, parse_uuid, RepoResult};
use crate::model::habit::{User, UserId};
use rusqlite::{params, Connection};

/// Repository interface for habit owners.
pub trait UserRepository {
    fn create_user(&self, user: &User) -> RepoResult<UserId>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
}

/// SQLite-backed user repository.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["users"])?;
        Ok(Self { conn })
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_user(&self, user: &User) -> RepoResult<UserId> {
        self.conn.execute(
            "INSERT INTO users (uuid, email, chat_id) VALUES (?1, ?2, ?3);",
            params![user.id.to_string(), user.email.as_str(), user.chat_id.as_deref()],
        )?;
        Ok(user.id)
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        let mut stmt = self
            .conn
            .prepare("SELECT uuid, email, chat_id FROM users WHERE uuid = ?1;")?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            let uuid_text: String = row.get("uuid")?;
            return Ok(Some(User {
                id: parse_uuid(&uuid_text, "users.uuid")?,
                email: row.get("email")?,
                chat_id: row.get("chat_id")?,
            }));
        }
        Ok(None)
    }
}
