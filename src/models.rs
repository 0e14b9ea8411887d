//! Data models for Google Drive API responses and local OAuth2 files.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// MIME type Drive uses to mark a folder.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Default Google authorization endpoint.
pub const GOOGLE_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";

/// Default Google OAuth2 token endpoint.
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Metadata for a file or folder in Google Drive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_size")]
    pub size: Option<u64>,
    #[serde(default)]
    pub created_time: Option<String>,
}

fn deserialize_size<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt {
        Some(s) => s.parse::<u64>().map(Some).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

impl FileMetadata {
    pub fn is_folder(&self) -> bool {
        self.mime_type.as_deref() == Some(FOLDER_MIME_TYPE)
    }
}

/// Format bytes into human-readable size.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Response from the files.list API endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileListResponse {
    #[serde(default)]
    pub files: Vec<FileMetadata>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Google API error response.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    pub code: u16,
    pub message: String,
}

/// OAuth2 client secret file as downloaded from the Google Cloud console.
///
/// Desktop clients keep their secret under `installed`, web clients under `web`.
#[derive(Debug, Deserialize)]
pub struct ClientSecretFile {
    pub installed: Option<ClientSecret>,
    pub web: Option<ClientSecret>,
}

/// OAuth2 client registration used by the authorization-code flow.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    GOOGLE_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

/// Authorized-user credential persisted in `token.json`.
///
/// The layout matches what Google's own client libraries write, so a token
/// file produced by either side can be reused by the other.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credential {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expiry: Option<OffsetDateTime>,
}

impl Credential {
    /// True when the access token expires within `leeway` of `now`.
    ///
    /// A credential without an expiry is never considered expired.
    pub fn is_expired_at(&self, now: OffsetDateTime, leeway: time::Duration) -> bool {
        match self.expiry {
            Some(expiry) => expiry <= now + leeway,
            None => false,
        }
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &self.token.as_ref().map(|_| "*****"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "*****"))
            .field("token_uri", &self.token_uri)
            .field("client_id", &self.client_id)
            .field("scopes", &self.scopes)
            .field("expiry", &self.expiry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1048576), "1.00 MB");
        assert_eq!(format_size(1073741824), "1.00 GB");
    }

    #[test]
    fn test_file_metadata_deserialize() {
        let json = r#"{
            "id": "abc123",
            "name": "arquivo.txt",
            "mimeType": "application/octet-stream",
            "parents": ["folder1"],
            "size": "1024"
        }"#;

        let metadata: FileMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(metadata.id, "abc123");
        assert_eq!(metadata.name, "arquivo.txt");
        assert_eq!(metadata.parents, vec!["folder1".to_string()]);
        assert_eq!(metadata.size, Some(1024));
        assert!(!metadata.is_folder());
    }

    #[test]
    fn test_file_metadata_id_only() {
        let metadata: FileMetadata = serde_json::from_str(r#"{"id": "xyz"}"#).unwrap();
        assert_eq!(metadata.id, "xyz");
        assert!(metadata.name.is_empty());
        assert!(metadata.parents.is_empty());
    }

    #[test]
    fn test_credential_google_layout() {
        let json = r#"{
            "token": "ya29.access",
            "refresh_token": "1//refresh",
            "token_uri": "https://oauth2.googleapis.com/token",
            "client_id": "client.apps.googleusercontent.com",
            "client_secret": "secret",
            "scopes": ["https://www.googleapis.com/auth/drive"],
            "universe_domain": "googleapis.com",
            "account": "",
            "expiry": "2030-01-01T10:00:00.123456Z"
        }"#;

        let credential: Credential = serde_json::from_str(json).unwrap();
        assert_eq!(credential.token.as_deref(), Some("ya29.access"));
        assert!(credential.has_scope("https://www.googleapis.com/auth/drive"));
        assert_eq!(credential.expiry.unwrap().year(), 2030);
    }

    #[test]
    fn test_credential_expiry_leeway() {
        let now = OffsetDateTime::now_utc();
        let mut credential = Credential {
            token: Some("t".to_string()),
            refresh_token: None,
            token_uri: GOOGLE_TOKEN_URI.to_string(),
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            scopes: vec![],
            expiry: Some(now + time::Duration::seconds(30)),
        };
        assert!(credential.is_expired_at(now, time::Duration::seconds(60)));
        assert!(!credential.is_expired_at(now, time::Duration::ZERO));

        credential.expiry = None;
        assert!(!credential.is_expired_at(now, time::Duration::seconds(60)));
    }

    #[test]
    fn test_credential_debug_masks_secrets() {
        let credential = Credential {
            token: Some("ya29.secret-access".to_string()),
            refresh_token: Some("1//secret-refresh".to_string()),
            token_uri: GOOGLE_TOKEN_URI.to_string(),
            client_id: "id".to_string(),
            client_secret: "client-secret".to_string(),
            scopes: vec![],
            expiry: None,
        };
        let debug = format!("{:?}", credential);
        assert!(!debug.contains("secret-access"));
        assert!(!debug.contains("secret-refresh"));
        assert!(!debug.contains("client-secret"));
    }

    #[test]
    fn test_client_secret_defaults() {
        let json = r#"{"installed": {"client_id": "id", "client_secret": "secret"}}"#;
        let file: ClientSecretFile = serde_json::from_str(json).unwrap();
        let secret = file.installed.unwrap();
        assert_eq!(secret.auth_uri, GOOGLE_AUTH_URI);
        assert_eq!(secret.token_uri, GOOGLE_TOKEN_URI);
        assert!(file.web.is_none());
    }
}
