//! Server configuration.
//!
//! Settings are stored as camelCase JSON. Every key is optional; a missing
//! settings file yields [`ServerOptions::default`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{DEFAULT_MAILBOX, Result};

/// TLS mode of a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TlsMode {
    /// Plaintext only.
    #[default]
    None,
    /// Plaintext with in-band upgrade (STARTTLS / STLS).
    StartTls,
    /// TLS from the first byte.
    ImplicitTls,
}

/// A configured mail user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOptions {
    /// Login name, matched case-insensitively.
    pub username: String,
    /// Plaintext password.
    pub password: String,
    /// Mailbox this user's messages are read from.
    #[serde(default)]
    pub default_mailbox: Option<String>,
}

/// Options shared by the SMTP, POP3 and IMAP servers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[allow(clippy::struct_excessive_bools)]
pub struct ServerOptions {
    /// Host name announced in greetings.
    pub host_name: String,
    /// Address all listeners bind to.
    pub bind_address: String,
    /// SMTP port.
    pub port: u16,
    /// POP3 port.
    pub pop3_port: u16,
    /// IMAP port.
    pub imap_port: u16,
    /// SMTP TLS mode.
    pub smtp_tls_mode: TlsMode,
    /// POP3 TLS mode; falls back to `smtp_tls_mode` when unset.
    pub pop3_tls_mode: Option<TlsMode>,
    /// PEM certificate chain path.
    pub tls_certificate: Option<PathBuf>,
    /// PEM private key path.
    pub tls_certificate_private_key: Option<PathBuf>,
    /// Whether clients must authenticate.
    pub authentication_required: bool,
    /// Accept any well-formed SMTP credentials.
    pub smtp_allow_any_credentials: bool,
    /// SMTP AUTH mechanisms offered on plaintext connections.
    pub smtp_enabled_auth_types_when_not_secure_connection: Vec<String>,
    /// SMTP AUTH mechanisms offered on secure connections.
    pub smtp_enabled_auth_types_when_secure_connection: Vec<String>,
    /// Maximum accepted message size in bytes.
    pub max_message_size: Option<u64>,
    /// Consecutive unrecognised SMTP commands before disconnecting; 0 disables.
    pub max_sequential_bad_commands: u32,
    /// Idle receive timeout in seconds.
    pub receive_timeout_secs: u64,
    /// Configured users.
    pub users: Vec<UserOptions>,
    /// `SQLite` database path; in-memory when absent.
    pub database_path: Option<PathBuf>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host_name: "localhost".to_string(),
            bind_address: "127.0.0.1".to_string(),
            port: 25,
            pop3_port: 110,
            imap_port: 143,
            smtp_tls_mode: TlsMode::None,
            pop3_tls_mode: None,
            tls_certificate: None,
            tls_certificate_private_key: None,
            authentication_required: false,
            smtp_allow_any_credentials: true,
            smtp_enabled_auth_types_when_not_secure_connection: ["PLAIN", "LOGIN", "CRAM-MD5"]
                .map(String::from)
                .to_vec(),
            smtp_enabled_auth_types_when_secure_connection: [
                "PLAIN",
                "LOGIN",
                "CRAM-MD5",
                "ANONYMOUS",
                "XOAUTH2",
            ]
            .map(String::from)
            .to_vec(),
            max_message_size: None,
            max_sequential_bad_commands: 10,
            receive_timeout_secs: 300,
            users: Vec::new(),
            database_path: None,
        }
    }
}

impl ServerOptions {
    /// Returns the default settings file location.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("mailsink").join("settings.json"))
    }

    /// Loads options from a JSON file, returning defaults if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load(path: &Path) -> Result<Self> {
        if !tokio::fs::try_exists(path).await? {
            debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = tokio::fs::read_to_string(path).await?;
        let options = serde_json::from_str(&contents)?;
        info!("Loaded settings from {}", path.display());
        Ok(options)
    }

    /// Returns the TLS mode used by the POP3 listener.
    #[must_use]
    pub fn effective_pop3_tls_mode(&self) -> TlsMode {
        self.pop3_tls_mode.unwrap_or(self.smtp_tls_mode)
    }

    /// Returns the receive timeout.
    #[must_use]
    pub const fn receive_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.receive_timeout_secs)
    }

    /// Finds a configured user by name, ignoring case.
    #[must_use]
    pub fn find_user(&self, username: &str) -> Option<&UserOptions> {
        self.users
            .iter()
            .find(|u| u.username.eq_ignore_ascii_case(username))
    }

    /// Checks a username/password pair against the configured users.
    #[must_use]
    pub fn check_password(&self, username: &str, password: &str) -> bool {
        self.find_user(username)
            .is_some_and(|u| u.password == password)
    }

    /// Resolves the mailbox a session reads from.
    ///
    /// Uses the configured user's default mailbox, or [`DEFAULT_MAILBOX`]
    /// when the user is unknown, has none, or nobody is logged in.
    #[must_use]
    pub fn mailbox_for_user(&self, username: Option<&str>) -> String {
        username
            .and_then(|name| self.find_user(name))
            .and_then(|u| u.default_mailbox.clone())
            .unwrap_or_else(|| DEFAULT_MAILBOX.to_string())
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

    fn with_user() -> ServerOptions {
        ServerOptions {
            users: vec![UserOptions {
                username: "Alice".to_string(),
                password: "secret".to_string(),
                default_mailbox: Some("AliceBox".to_string()),
            }],
            ..ServerOptions::default()
        }
    }

    #[test]
    fn test_defaults() {
        let options = ServerOptions::default();
        assert_eq!(options.port, 25);
        assert_eq!(options.max_sequential_bad_commands, 10);
        assert_eq!(options.effective_pop3_tls_mode(), TlsMode::None);
    }

    #[test]
    fn test_pop3_mode_falls_back_to_smtp_mode() {
        let mut options = ServerOptions {
            smtp_tls_mode: TlsMode::StartTls,
            ..ServerOptions::default()
        };
        assert_eq!(options.effective_pop3_tls_mode(), TlsMode::StartTls);
        options.pop3_tls_mode = Some(TlsMode::ImplicitTls);
        assert_eq!(options.effective_pop3_tls_mode(), TlsMode::ImplicitTls);
    }

    #[test]
    fn test_find_user_case_insensitive() {
        let options = with_user();
        assert!(options.find_user("alice").is_some());
        assert!(options.check_password("ALICE", "secret"));
        assert!(!options.check_password("alice", "Secret"));
    }

    #[test]
    fn test_mailbox_for_user() {
        let options = with_user();
        assert_eq!(options.mailbox_for_user(Some("alice")), "AliceBox");
        assert_eq!(options.mailbox_for_user(Some("bob")), DEFAULT_MAILBOX);
        assert_eq!(options.mailbox_for_user(None), DEFAULT_MAILBOX);
    }

    #[test]
    fn test_deserialize_camel_case() {
        let json = r#"{"hostName":"mail.test","pop3TlsMode":"ImplicitTls","users":[{"username":"u","password":"p"}]}"#;
        let options: ServerOptions = serde_json::from_str(json).unwrap();
        assert_eq!(options.host_name, "mail.test");
        assert_eq!(options.pop3_tls_mode, Some(TlsMode::ImplicitTls));
        assert_eq!(options.users[0].default_mailbox, None);
        assert_eq!(options.port, 25);
    }

    #[tokio::test]
    async fn test_load_missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("mailsink-does-not-exist/settings.json");
        let options = ServerOptions::load(&path).await.unwrap();
        assert_eq!(options.host_name, "localhost");
    }
}
