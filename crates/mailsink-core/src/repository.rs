//! Message and mailbox storage.
//!
//! The protocol servers only see the [`MessagesRepository`] and
//! [`MailboxRepository`] interfaces. Every call is one short-lived unit of
//! work; no connection or transaction is held between calls.

use std::future::Future;

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use tracing::debug;

use crate::model::{Folder, INBOX, Mailbox, NewMessage, StoredMessage};
use crate::{Error, Result};

/// Message storage operations.
pub trait MessagesRepository: Send + Sync {
    /// Lists messages of a mailbox in insertion order.
    ///
    /// `folder` of `None` means the root folder.
    fn get_messages(
        &self,
        mailbox: &str,
        folder: Option<&str>,
        unread_only: bool,
    ) -> impl Future<Output = Result<Vec<StoredMessage>>> + Send;

    /// Fetches one message by id.
    fn try_get_message_by_id(
        &self,
        id: i64,
    ) -> impl Future<Output = Result<Option<StoredMessage>>> + Send;

    /// Stores a message, creating the mailbox and folder if needed.
    fn add_message(
        &self,
        mailbox: &str,
        folder: Option<&str>,
        message: NewMessage,
    ) -> impl Future<Output = Result<StoredMessage>> + Send;

    /// Deletes a message.
    fn delete_message(&self, id: i64) -> impl Future<Output = Result<()>> + Send;

    /// Clears the unread flag.
    fn mark_message_read(&self, id: i64) -> impl Future<Output = Result<()>> + Send;

    /// Copies a message into another folder of the same mailbox.
    fn copy_message_to_folder(
        &self,
        id: i64,
        folder: &str,
    ) -> impl Future<Output = Result<StoredMessage>> + Send;
}

/// Mailbox and folder operations.
pub trait MailboxRepository: Send + Sync {
    /// Looks up a mailbox by name.
    fn get_mailbox_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<Mailbox>>> + Send;

    /// Returns a folder, creating it (and its mailbox) if missing.
    fn get_folder_or_create(
        &self,
        mailbox: &str,
        path: &str,
    ) -> impl Future<Output = Result<Folder>> + Send;

    /// Creates a folder; creating an existing folder is not an error.
    fn create_folder(&self, mailbox: &str, path: &str) -> impl Future<Output = Result<Folder>> + Send;

    /// Deletes a folder and the messages in it.
    fn delete_folder(&self, mailbox: &str, path: &str) -> impl Future<Output = Result<()>> + Send;

    /// Lists every folder of a mailbox, the root folder included.
    fn get_all_folders(&self, mailbox: &str) -> impl Future<Output = Result<Vec<Folder>>> + Send;
}

/// `SQLite`-backed repository.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Create a new repository with the given database path.
    ///
    /// Creates the database and tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn new(database_path: &str) -> Result<Self> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let repo = Self { pool };
        repo.initialize().await?;
        Ok(repo)
    }

    /// Create an in-memory repository.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let repo = Self { pool };
        repo.initialize().await?;
        Ok(repo)
    }

    /// Initialize database schema.
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS mailboxes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS folders (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                mailbox TEXT NOT NULL,
                path TEXT NOT NULL,
                UNIQUE(mailbox, path)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                mailbox TEXT NOT NULL,
                folder TEXT NOT NULL,
                from_address TEXT NOT NULL DEFAULT '',
                to_addresses TEXT NOT NULL DEFAULT '[]',
                subject TEXT NOT NULL DEFAULT '',
                received_date TEXT NOT NULL,
                is_unread INTEGER NOT NULL DEFAULT 1,
                secure_connection INTEGER NOT NULL DEFAULT 0,
                data BLOB NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_messages_folder
            ON messages(mailbox, folder)
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn ensure_mailbox(&self, name: &str) -> Result<()> {
        sqlx::query(r"INSERT OR IGNORE INTO mailboxes (name) VALUES (?)")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn fetch_folder(&self, mailbox: &str, path: &str) -> Result<Option<Folder>> {
        let row = sqlx::query(r"SELECT id, mailbox, path FROM folders WHERE mailbox = ? AND path = ?")
            .bind(mailbox)
            .bind(path)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| Folder {
            id: row.get::<i64, _>("id"),
            mailbox: row.get("mailbox"),
            path: row.get("path"),
        }))
    }
}

fn message_from_row(row: &SqliteRow) -> Result<StoredMessage> {
    let id: i64 = row.try_get("id")?;
    let corrupt = |reason: String| Error::CorruptMessage { id, reason };

    let received: String = row.try_get("received_date")?;
    let received_date = DateTime::parse_from_rfc3339(&received)
        .map_err(|e| corrupt(format!("received date {received:?}: {e}")))?
        .with_timezone(&Utc);
    let to_json: String = row.try_get("to_addresses")?;
    let to = serde_json::from_str(&to_json)
        .map_err(|e| corrupt(format!("recipient list: {e}")))?;
    let imap_uid = u32::try_from(id).map_err(|_| corrupt("id exceeds the UID range".into()))?;

    Ok(StoredMessage {
        id,
        mailbox: row.try_get("mailbox")?,
        folder: row.try_get("folder")?,
        imap_uid,
        from: row.try_get("from_address")?,
        to,
        subject: row.try_get("subject")?,
        received_date,
        is_unread: row.try_get("is_unread")?,
        secure_connection: row.try_get("secure_connection")?,
        data: row.try_get("data")?,
    })
}

const MESSAGE_COLUMNS: &str = "id, mailbox, folder, from_address, to_addresses, subject, \
     received_date, is_unread, secure_connection, data";

impl MessagesRepository for SqliteRepository {
    async fn get_messages(
        &self,
        mailbox: &str,
        folder: Option<&str>,
        unread_only: bool,
    ) -> Result<Vec<StoredMessage>> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE mailbox = ? AND folder = ? AND (? = 0 OR is_unread = 1) \
             ORDER BY id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(mailbox)
            .bind(folder.unwrap_or(INBOX))
            .bind(unread_only)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(message_from_row).collect()
    }

    async fn try_get_message_by_id(&self, id: i64) -> Result<Option<StoredMessage>> {
        let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(message_from_row).transpose()
    }

    async fn add_message(
        &self,
        mailbox: &str,
        folder: Option<&str>,
        message: NewMessage,
    ) -> Result<StoredMessage> {
        let folder = folder.unwrap_or(INBOX);
        self.get_folder_or_create(mailbox, folder).await?;

        let to_json = serde_json::to_string(&message.to)?;
        let result = sqlx::query(
            r"
            INSERT INTO messages
                (mailbox, folder, from_address, to_addresses, subject, received_date,
                 is_unread, secure_connection, data)
            VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?)
            ",
        )
        .bind(mailbox)
        .bind(folder)
        .bind(&message.from)
        .bind(&to_json)
        .bind(&message.subject)
        .bind(message.received_date.to_rfc3339())
        .bind(message.secure_connection)
        .bind(&message.data)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!(id, mailbox, folder, "Stored message");

        Ok(StoredMessage {
            id,
            mailbox: mailbox.to_string(),
            folder: folder.to_string(),
            imap_uid: u32::try_from(id).map_err(|_| Error::MessageNotFound(id))?,
            from: message.from,
            to: message.to,
            subject: message.subject,
            received_date: message.received_date,
            is_unread: true,
            secure_connection: message.secure_connection,
            data: message.data,
        })
    }

    async fn delete_message(&self, id: i64) -> Result<()> {
        sqlx::query(r"DELETE FROM messages WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_message_read(&self, id: i64) -> Result<()> {
        sqlx::query(r"UPDATE messages SET is_unread = 0 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn copy_message_to_folder(&self, id: i64, folder: &str) -> Result<StoredMessage> {
        let source = self
            .try_get_message_by_id(id)
            .await?
            .ok_or(Error::MessageNotFound(id))?;

        let copy = NewMessage {
            from: source.from,
            to: source.to,
            subject: source.subject,
            received_date: source.received_date,
            secure_connection: source.secure_connection,
            data: source.data,
        };
        let mut stored = self
            .add_message(&source.mailbox, Some(folder), copy)
            .await?;

        if !source.is_unread {
            self.mark_message_read(stored.id).await?;
            stored.is_unread = false;
        }
        Ok(stored)
    }
}

impl MailboxRepository for SqliteRepository {
    async fn get_mailbox_by_name(&self, name: &str) -> Result<Option<Mailbox>> {
        let row = sqlx::query(r"SELECT id, name FROM mailboxes WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| Mailbox {
            id: row.get::<i64, _>("id"),
            name: row.get("name"),
        }))
    }

    async fn get_folder_or_create(&self, mailbox: &str, path: &str) -> Result<Folder> {
        if let Some(folder) = self.fetch_folder(mailbox, path).await? {
            return Ok(folder);
        }
        self.create_folder(mailbox, path).await
    }

    async fn create_folder(&self, mailbox: &str, path: &str) -> Result<Folder> {
        self.ensure_mailbox(mailbox).await?;
        sqlx::query(r"INSERT OR IGNORE INTO folders (mailbox, path) VALUES (?, ?)")
            .bind(mailbox)
            .bind(path)
            .execute(&self.pool)
            .await?;

        self.fetch_folder(mailbox, path)
            .await?
            .ok_or_else(|| Error::FolderNotFound(path.to_string()))
    }

    async fn delete_folder(&self, mailbox: &str, path: &str) -> Result<()> {
        if self.fetch_folder(mailbox, path).await?.is_none() {
            return Err(Error::FolderNotFound(path.to_string()));
        }

        sqlx::query(r"DELETE FROM messages WHERE mailbox = ? AND folder = ?")
            .bind(mailbox)
            .bind(path)
            .execute(&self.pool)
            .await?;
        sqlx::query(r"DELETE FROM folders WHERE mailbox = ? AND path = ?")
            .bind(mailbox)
            .bind(path)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_all_folders(&self, mailbox: &str) -> Result<Vec<Folder>> {
        self.get_folder_or_create(mailbox, INBOX).await?;

        let rows = sqlx::query(r"SELECT id, mailbox, path FROM folders WHERE mailbox = ? ORDER BY path")
            .bind(mailbox)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| Folder {
                id: row.get::<i64, _>("id"),
                mailbox: row.get("mailbox"),
                path: row.get("path"),
            })
            .collect())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    fn sample(subject: &str) -> NewMessage {
        NewMessage::from_data(format!("From: a@b.com\r\nTo: c@d.com\r\nSubject: {subject}\r\n\r\nbody").into_bytes())
    }

    #[tokio::test]
    async fn test_add_and_list_in_order() {
        let repo = SqliteRepository::in_memory().await.unwrap();
        let first = repo.add_message("Default", None, sample("one")).await.unwrap();
        let second = repo.add_message("Default", None, sample("two")).await.unwrap();

        let messages = repo.get_messages("Default", None, false).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, first.id);
        assert_eq!(messages[1].id, second.id);
        assert_eq!(messages[0].subject, "one");
        assert_eq!(messages[0].to, vec!["c@d.com".to_string()]);
        assert!(messages[0].is_unread);
    }

    #[tokio::test]
    async fn test_corrupt_row_is_an_error() {
        let repo = SqliteRepository::in_memory().await.unwrap();
        repo.add_message("Default", None, sample("good")).await.unwrap();
        let bad = repo.add_message("Default", None, sample("bad")).await.unwrap();
        sqlx::query("UPDATE messages SET received_date = 'yesterday' WHERE id = ?")
            .bind(bad.id)
            .execute(&repo.pool)
            .await
            .unwrap();

        let err = repo.get_messages("Default", None, false).await.unwrap_err();
        assert!(matches!(err, Error::CorruptMessage { id, .. } if id == bad.id));
        let err = repo.try_get_message_by_id(bad.id).await.unwrap_err();
        assert!(matches!(err, Error::CorruptMessage { .. }));
    }

    #[tokio::test]
    async fn test_bad_recipient_json_is_an_error() {
        let repo = SqliteRepository::in_memory().await.unwrap();
        let msg = repo.add_message("Default", None, sample("x")).await.unwrap();
        sqlx::query("UPDATE messages SET to_addresses = '{' WHERE id = ?")
            .bind(msg.id)
            .execute(&repo.pool)
            .await
            .unwrap();

        let err = repo.try_get_message_by_id(msg.id).await.unwrap_err();
        assert!(err.to_string().contains("recipient list"));
    }

    #[tokio::test]
    async fn test_mailboxes_are_isolated() {
        let repo = SqliteRepository::in_memory().await.unwrap();
        repo.add_message("A", None, sample("a")).await.unwrap();
        repo.add_message("B", None, sample("b")).await.unwrap();

        assert_eq!(repo.get_messages("A", None, false).await.unwrap().len(), 1);
        assert!(repo.get_mailbox_by_name("B").await.unwrap().is_some());
        assert!(repo.get_mailbox_by_name("C").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mark_read_and_unread_filter() {
        let repo = SqliteRepository::in_memory().await.unwrap();
        let msg = repo.add_message("Default", None, sample("x")).await.unwrap();
        repo.add_message("Default", None, sample("y")).await.unwrap();

        repo.mark_message_read(msg.id).await.unwrap();

        let unread = repo.get_messages("Default", None, true).await.unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].subject, "y");
    }

    #[tokio::test]
    async fn test_delete_message() {
        let repo = SqliteRepository::in_memory().await.unwrap();
        let msg = repo.add_message("Default", None, sample("x")).await.unwrap();
        repo.delete_message(msg.id).await.unwrap();
        assert!(repo.try_get_message_by_id(msg.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_copy_to_folder() {
        let repo = SqliteRepository::in_memory().await.unwrap();
        let msg = repo.add_message("Default", None, sample("x")).await.unwrap();
        repo.mark_message_read(msg.id).await.unwrap();

        let copy = repo.copy_message_to_folder(msg.id, "Archive").await.unwrap();
        assert_ne!(copy.id, msg.id);
        assert_eq!(copy.folder, "Archive");
        assert!(!copy.is_unread);

        let archived = repo.get_messages("Default", Some("Archive"), false).await.unwrap();
        assert_eq!(archived.len(), 1);
    }

    #[tokio::test]
    async fn test_folders() {
        let repo = SqliteRepository::in_memory().await.unwrap();
        repo.create_folder("Default", "Work").await.unwrap();
        repo.create_folder("Default", "Work/Reports").await.unwrap();

        let paths: Vec<String> = repo
            .get_all_folders("Default")
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.path)
            .collect();
        assert_eq!(paths, vec!["INBOX", "Work", "Work/Reports"]);

        repo.delete_folder("Default", "Work").await.unwrap();
        assert!(repo.delete_folder("Default", "Work").await.is_err());
    }
}
