//! drive_upload - Upload a local file to Google Drive, mirroring its directory path.
//!
//! This library provides:
//! - OAuth2 installed-application login with a cached `token.json`
//! - Folder lookup-or-create by (name, parent)
//! - Recreating a relative directory path as nested Drive folders
//! - Chunked resumable uploads into the deepest folder
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use drive_upload::{upload_into_path, Authenticator, DriveClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let auth = Authenticator::new("credentials.json", "token.json");
//!     auth.obtain_credentials().await?;
//!
//!     let client = DriveClient::new(auth);
//!     let file = upload_into_path(&client, Path::new("pr/report/arquivo.txt"), "root").await?;
//!     println!("{}", file.id);
//!
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod error;
pub mod login;
pub mod models;
pub mod resolver;
pub mod upload;
pub mod url_parser;
pub mod walker;

// Re-exports for convenience
pub use auth::{Authenticator, TokenStore, DRIVE_SCOPE};
pub use client::{DriveApi, DriveClient};
pub use error::{DriveError, ErrorKind, Result};
pub use models::{Credential, FileMetadata};
pub use resolver::resolve_or_create_folder;
pub use upload::upload_into_path;
pub use url_parser::extract_folder_id;
pub use walker::{ensure_path, relative_dir};
