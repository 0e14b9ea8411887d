//! Google Drive API client for folder lookup, folder creation and uploads.

use std::path::Path;

use async_trait::async_trait;
use log::{debug, info};
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, LOCATION, RANGE};
use reqwest::{Client, Response, StatusCode};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};

use crate::auth::Authenticator;
use crate::error::{DriveError, Result};
use crate::models::{format_size, ApiErrorResponse, FileListResponse, FileMetadata, FOLDER_MIME_TYPE};

/// Base URL for Google Drive API v3.
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Upload URL for Google Drive API.
const UPLOAD_API_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// Resumable chunks must be a multiple of this size.
pub const CHUNK_ALIGNMENT: usize = 256 * 1024;

/// Default resumable chunk size (100 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 100 * 1024 * 1024;

/// Content type declared for every uploaded file.
const UPLOAD_CONTENT_TYPE: &str = "application/octet-stream";

/// Fields requested for every returned file resource.
const FILE_FIELDS: &str = "id, name, mimeType, parents, size, createdTime";

/// The remote operations the upload pipeline needs from Drive.
#[async_trait]
pub trait DriveApi: Send + Sync {
    /// List non-trashed folders called `name`, under `parent_id` when given,
    /// earliest-created first.
    async fn find_folders(&self, name: &str, parent_id: Option<&str>) -> Result<Vec<FileMetadata>>;

    /// Create a folder called `name`, under `parent_id` when given.
    async fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<FileMetadata>;

    /// Upload a local file into `parent_id`, named after its base name.
    async fn upload_file(&self, local_path: &Path, parent_id: &str) -> Result<FileMetadata>;
}

/// Build the Drive query matching a folder by name and optional parent.
pub fn folder_query(name: &str, parent_id: Option<&str>) -> String {
    let mut query = format!(
        "name = '{}' and mimeType = '{}' and trashed = false",
        escape_query_value(name),
        FOLDER_MIME_TYPE
    );
    if let Some(parent_id) = parent_id {
        query.push_str(&format!(" and '{}' in parents", escape_query_value(parent_id)));
    }
    query
}

fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Round a requested chunk size up to the resumable-upload alignment.
pub fn aligned_chunk_size(requested: usize) -> usize {
    let chunks = requested.max(1).div_ceil(CHUNK_ALIGNMENT);
    chunks * CHUNK_ALIGNMENT
}

/// Client for interacting with Google Drive.
pub struct DriveClient {
    auth: Authenticator,
    http: Client,
    api_base: String,
    upload_base: String,
    chunk_size: usize,
}

impl DriveClient {
    /// Create a new DriveClient.
    ///
    /// # Arguments
    /// * `auth` - Authenticator for obtaining access tokens
    pub fn new(auth: Authenticator) -> Self {
        Self {
            auth,
            http: Client::new(),
            api_base: DRIVE_API_BASE.to_string(),
            upload_base: UPLOAD_API_BASE.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Point the client at different API endpoints.
    pub fn with_base_urls(mut self, api_base: &str, upload_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self.upload_base = upload_base.trim_end_matches('/').to_string();
        self
    }

    /// Set the resumable chunk size in bytes, rounded up to [`CHUNK_ALIGNMENT`].
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = aligned_chunk_size(chunk_size);
        self
    }

    /// Query files using Google Drive query syntax, in `order_by` order.
    pub async fn query_files(&self, query: &str, order_by: &str) -> Result<Vec<FileMetadata>> {
        let token = self.auth.access_token().await?;
        let fields = format!("nextPageToken, files({})", FILE_FIELDS);
        let mut all_files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(format!("{}/files", self.api_base))
                .bearer_auth(&token)
                .query(&[
                    ("q", query),
                    ("orderBy", order_by),
                    ("includeItemsFromAllDrives", "true"),
                    ("supportsAllDrives", "true"),
                    ("spaces", "drive"),
                    ("fields", fields.as_str()),
                ]);

            if let Some(ref token) = page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let response = check_status(request.send().await?).await?;
            let list_response: FileListResponse = response.json().await?;
            all_files.extend(list_response.files);

            match list_response.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(all_files)
    }

    /// Open a resumable upload session and return its session URL.
    async fn start_resumable_session(
        &self,
        token: &str,
        filename: &str,
        parent_id: &str,
        file_size: u64,
    ) -> Result<String> {
        let metadata = serde_json::json!({
            "name": filename,
            "parents": [parent_id]
        });

        let response = self
            .http
            .post(format!("{}/files", self.upload_base))
            .bearer_auth(token)
            .query(&[
                ("uploadType", "resumable"),
                ("supportsAllDrives", "true"),
                ("fields", FILE_FIELDS),
            ])
            .header("X-Upload-Content-Type", UPLOAD_CONTENT_TYPE)
            .header("X-Upload-Content-Length", file_size.to_string())
            .json(&metadata)
            .send()
            .await?;

        let response = check_status(response).await?;

        let session_url = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| DriveError::ApiError {
                status: response.status().as_u16(),
                message: "No upload URL in response".to_string(),
            })?
            .to_string();

        Ok(session_url)
    }

    /// Send the file's bytes to an open session, one chunk per request.
    async fn send_chunks(
        &self,
        session_url: &str,
        file: &mut File,
        file_size: u64,
    ) -> Result<FileMetadata> {
        if file_size == 0 {
            let response = self
                .http
                .put(session_url)
                .header(CONTENT_LENGTH, "0")
                .header(CONTENT_RANGE, "bytes */0")
                .send()
                .await?;
            let response = check_status(response).await?;
            return Ok(response.json().await?);
        }

        let mut offset: u64 = 0;

        loop {
            let remaining = file_size.saturating_sub(offset).min(self.chunk_size as u64) as usize;
            let mut buffer = Vec::with_capacity(remaining);
            file.seek(SeekFrom::Start(offset)).await?;
            let read = (&mut *file)
                .take(self.chunk_size as u64)
                .read_to_end(&mut buffer)
                .await?;

            if read == 0 {
                return Err(DriveError::ApiError {
                    status: StatusCode::PERMANENT_REDIRECT.as_u16(),
                    message: format!(
                        "Upload session still incomplete after sending {} of {} bytes",
                        offset, file_size
                    ),
                });
            }

            let end = offset + read as u64 - 1;
            let response = self
                .http
                .put(session_url)
                .header(CONTENT_TYPE, UPLOAD_CONTENT_TYPE)
                .header(CONTENT_RANGE, format!("bytes {}-{}/{}", offset, end, file_size))
                .body(buffer)
                .send()
                .await?;

            if response.status() == StatusCode::PERMANENT_REDIRECT {
                offset = next_offset(&response);
                debug!(
                    "Uploaded {} of {}",
                    format_size(offset),
                    format_size(file_size)
                );
                continue;
            }

            let response = check_status(response).await?;
            return Ok(response.json().await?);
        }
    }
}

/// Offset to resume from after a `308 Resume Incomplete` answer.
///
/// The `Range` header reports what the server has persisted (`bytes=0-N`);
/// without it nothing was kept and the transfer restarts at zero.
fn next_offset(response: &Response) -> u64 {
    response
        .headers()
        .get(RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.rsplit('-').next())
        .and_then(|last| last.trim().parse::<u64>().ok())
        .map(|last| last + 1)
        .unwrap_or(0)
}

/// Turn a non-success response into a [`DriveError::ApiError`].
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_body = response.text().await.unwrap_or_default();
    if let Ok(api_error) = serde_json::from_str::<ApiErrorResponse>(&error_body) {
        return Err(DriveError::ApiError {
            status: api_error.error.code,
            message: api_error.error.message,
        });
    }
    Err(DriveError::ApiError {
        status: status.as_u16(),
        message: error_body,
    })
}

#[async_trait]
impl DriveApi for DriveClient {
    async fn find_folders(&self, name: &str, parent_id: Option<&str>) -> Result<Vec<FileMetadata>> {
        let query = folder_query(name, parent_id);
        debug!("Folder query: {}", query);
        self.query_files(&query, "createdTime").await
    }

    async fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<FileMetadata> {
        let token = self.auth.access_token().await?;

        let mut metadata = serde_json::json!({
            "name": name,
            "mimeType": FOLDER_MIME_TYPE,
        });
        if let Some(parent_id) = parent_id {
            metadata["parents"] = serde_json::json!([parent_id]);
        }

        let response = self
            .http
            .post(format!("{}/files", self.api_base))
            .bearer_auth(&token)
            .query(&[("supportsAllDrives", "true"), ("fields", FILE_FIELDS)])
            .json(&metadata)
            .send()
            .await?;

        let folder: FileMetadata = check_status(response).await?.json().await?;
        info!("Created folder '{}' ({})", name, folder.id);
        Ok(folder)
    }

    /// Upload a file using a resumable session.
    ///
    /// The file is read from disk one chunk at a time; a `308` answer resumes
    /// from whatever offset the server reports as persisted.
    async fn upload_file(&self, local_path: &Path, parent_id: &str) -> Result<FileMetadata> {
        let filename = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| DriveError::FileNotFound(local_path.display().to_string()))?;

        let mut file = match File::open(local_path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DriveError::FileNotFound(local_path.display().to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let file_size = file.metadata().await?.len();

        let token = self.auth.access_token().await?;
        let session_url = self
            .start_resumable_session(&token, &filename, parent_id, file_size)
            .await?;
        debug!("Resumable session opened for {} ({})", filename, format_size(file_size));

        let metadata = self.send_chunks(&session_url, &mut file, file_size).await?;
        info!("Uploaded '{}' as {}", filename, metadata.id);
        Ok(metadata)
    }
}
