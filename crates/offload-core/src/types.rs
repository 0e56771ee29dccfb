// SPDX-License-Identifier: AGPL-3.0
// Offload Core - Type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operating mode chosen by the user.
///
/// "Unset" (no choice made yet) is modeled as `Option<Mode>` = `None`
/// wherever a mode is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Process files on this device only.
    Local,
    /// Process files on a remote server.
    Cloud,
}

/// One saved remote endpoint with its credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerProfile {
    /// Natural key: `username@serverAddress`. Collisions overwrite.
    pub id: String,
    pub server_address: String,
    pub username: String,
    /// Kept only so the frontend can re-authenticate when the token expires.
    pub password: String,
    pub access_token: String,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
}

impl ServerProfile {
    /// Derive the profile id from username and normalized address.
    pub fn profile_id(username: &str, server_address: &str) -> String {
        format!("{}@{}", username, server_address)
    }

    /// Build a profile from a successful login.
    pub fn new(server_address: &str, username: &str, password: &str, access_token: &str) -> Self {
        let server_address = normalize_address(server_address);
        Self {
            id: Self::profile_id(username, &server_address),
            server_address,
            username: username.to_string(),
            password: password.to_string(),
            access_token: access_token.to_string(),
            last_login: Some(Utc::now()),
        }
    }
}

/// Process-wide persisted state, read as whole snapshots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Preferences {
    /// `None` until the user has picked a mode.
    pub mode: Option<Mode>,
    /// Saved server profiles, ordered, unique by id.
    pub servers: Vec<ServerProfile>,
    /// Either `None` or the id of an entry in `servers`.
    pub active_server_id: Option<String>,
}

impl Preferences {
    /// Resolve the active pointer to its profile, if any.
    ///
    /// Mode can be `Cloud` while this returns `None`; consumers must check
    /// before treating cloud mode as actionable.
    pub fn active_server(&self) -> Option<&ServerProfile> {
        let id = self.active_server_id.as_deref()?;
        self.servers.iter().find(|s| s.id == id)
    }
}

/// Trim whitespace and strip a single trailing slash from a user-entered
/// server address.
pub fn normalize_address(address: &str) -> String {
    let trimmed = address.trim();
    trimmed.strip_suffix('/').unwrap_or(trimmed).to_string()
}

// --- Wire types (fixed contract with the processing server) ---

/// Generic success/message/data envelope used by the token endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub data: Option<T>,
}

/// Bearer token issued by `/token`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
}

/// Username/password pair, sent as form fields on login and as a JSON body
/// on registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Account record returned by `/users/` and `/users/me`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
}

/// One remote file as reported by the server. The server assigns `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileItem {
    pub id: String,
    pub name: String,
    /// Size in bytes.
    pub size: u64,
}

/// Confirmation payload from `/api/delete-file`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    #[serde(default)]
    pub message: String,
}

/// Error body the server sends with HTTP 400 on registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub detail: String,
}

/// Error types for the application
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid server address: {0}")]
    InvalidAddress(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("DNS resolution failed: {0}")]
    DnsResolution(String),

    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    #[error("{0}")]
    Api(String),

    #[error("Request to {url} failed with status {status}")]
    Status { url: String, status: u16 },

    #[error("Unexpected response from {url} (status {status}): {body}")]
    UnexpectedResponse {
        url: String,
        status: u16,
        body: String,
    },

    #[error("File I/O error: {0}")]
    FileIo(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AppError {
    /// Connectivity failures are the only class retried against an
    /// alternate URL scheme; everything else terminates the attempt.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            AppError::Network(_) | AppError::DnsResolution(_) | AppError::ConnectionRefused(_)
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::FileIo(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_id_derivation() {
        assert_eq!(
            ServerProfile::profile_id("alice", "example.com"),
            "alice@example.com"
        );
    }

    #[test]
    fn test_new_profile_normalizes_address() {
        let profile = ServerProfile::new("  example.com/  ", "alice", "secret", "tok123");
        assert_eq!(profile.server_address, "example.com");
        assert_eq!(profile.id, "alice@example.com");
        assert!(profile.last_login.is_some());
    }

    #[test]
    fn test_normalize_strips_one_trailing_slash() {
        assert_eq!(normalize_address("example.com//"), "example.com/");
        assert_eq!(normalize_address(" https://example.com/ "), "https://example.com");
    }

    #[test]
    fn test_mode_serde_strings() {
        assert_eq!(serde_json::to_string(&Mode::Local).unwrap(), "\"local\"");
        assert_eq!(
            serde_json::from_str::<Mode>("\"cloud\"").unwrap(),
            Mode::Cloud
        );
    }

    #[test]
    fn test_token_envelope_decode() {
        let body = r#"{"success":true,"message":"ok","data":{"access_token":"tok123","token_type":"bearer"}}"#;
        let envelope: ApiResponse<Token> = serde_json::from_str(body).unwrap();
        assert!(envelope.success);
        assert_eq!(envelope.data.unwrap().access_token, "tok123");
    }

    #[test]
    fn test_envelope_data_defaults_to_none() {
        let body = r#"{"success":false,"message":"bad credentials"}"#;
        let envelope: ApiResponse<Token> = serde_json::from_str(body).unwrap();
        assert!(!envelope.success);
        assert!(envelope.data.is_none());
    }

    #[test]
    fn test_active_server_resolution() {
        let profile = ServerProfile::new("example.com", "alice", "secret", "tok123");
        let prefs = Preferences {
            mode: Some(Mode::Cloud),
            servers: vec![profile.clone()],
            active_server_id: Some(profile.id.clone()),
        };
        assert_eq!(prefs.active_server(), Some(&profile));

        let dangling = Preferences {
            active_server_id: Some("bob@nowhere".to_string()),
            ..prefs.clone()
        };
        assert!(dangling.active_server().is_none());
    }
}
