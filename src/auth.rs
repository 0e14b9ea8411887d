//! OAuth2 user authentication for Google APIs with an on-disk token cache.

use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use oauth2::basic::{BasicClient, BasicErrorResponse, BasicTokenResponse};
use oauth2::reqwest::async_http_client;
use oauth2::{AuthType, AuthUrl, ClientId, RefreshToken, RequestTokenError, TokenResponse, TokenUrl};
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::error::{DriveError, Result};
use crate::login::LoginFlow;
use crate::models::{ClientSecret, ClientSecretFile, Credential, GOOGLE_AUTH_URI};

/// Google Drive API scope.
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// Tokens this close to expiry are treated as expired.
const EXPIRY_LEEWAY: time::Duration = time::Duration::seconds(60);

/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(300);

/// Reads and writes the persisted credential file.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Load the stored credential.
    ///
    /// A missing file yields `None`. So does a file that is not a valid
    /// credential, which then gets replaced by the next successful login.
    pub fn load(&self) -> Result<Option<Credential>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                debug!("No token file at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<Credential>(&content) {
            Ok(credential) => {
                debug!("Token file found at {}", self.path.display());
                Ok(Some(credential))
            }
            Err(e) => {
                warn!("Ignoring unreadable token file {}: {}", self.path.display(), e);
                Ok(None)
            }
        }
    }

    pub fn save(&self, credential: &Credential) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                debug!("Creating directory {}", dir.display());
                fs::create_dir_all(dir)?;
            }
        }

        let json = serde_json::to_string(credential)?;
        fs::write(&self.path, json)?;
        debug!("Token saved to {}", self.path.display());
        Ok(())
    }
}

/// Load the OAuth2 client registration from a `credentials.json` file.
pub fn load_client_secret<P: AsRef<Path>>(path: P) -> Result<ClientSecret> {
    let path = path.as_ref();
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == IoErrorKind::NotFound => {
            return Err(DriveError::FileNotFound(path.display().to_string()))
        }
        Err(e) => return Err(e.into()),
    };

    let file: ClientSecretFile = serde_json::from_str(&content)?;
    file.installed.or(file.web).ok_or_else(|| {
        DriveError::ClientSecretError(format!(
            "{} has neither an 'installed' nor a 'web' section",
            path.display()
        ))
    })
}

/// OAuth2 client for the given registration. Google expects the client
/// secret in the request body rather than in a Basic auth header.
pub(crate) fn oauth_client(secret: &ClientSecret) -> Result<BasicClient> {
    let auth_url = AuthUrl::new(secret.auth_uri.clone())
        .map_err(|e| DriveError::ClientSecretError(format!("invalid auth_uri: {}", e)))?;
    let token_url = TokenUrl::new(secret.token_uri.clone())
        .map_err(|e| DriveError::ClientSecretError(format!("invalid token_uri: {}", e)))?;

    Ok(BasicClient::new(
        ClientId::new(secret.client_id.clone()),
        Some(oauth2::ClientSecret::new(secret.client_secret.clone())),
        auth_url,
        Some(token_url),
    )
    .set_auth_type(AuthType::RequestBody))
}

/// Readable message for a failed token request.
pub(crate) fn describe_token_error<RE>(err: RequestTokenError<RE, BasicErrorResponse>) -> String
where
    RE: std::error::Error + 'static,
{
    match err {
        RequestTokenError::ServerResponse(response) => response.to_string(),
        RequestTokenError::Request(e) => format!("request failed: {}", e),
        RequestTokenError::Parse(e, _) => format!("invalid token response: {}", e),
        RequestTokenError::Other(message) => message,
    }
}

/// Fold a token endpoint response into an existing credential.
pub(crate) fn apply_token_response(credential: &mut Credential, response: &BasicTokenResponse) {
    let lifetime = response
        .expires_in()
        .unwrap_or(Duration::from_secs(DEFAULT_TOKEN_LIFETIME_SECS));
    credential.token = Some(response.access_token().secret().to_string());
    credential.expiry = Some(OffsetDateTime::now_utc() + lifetime);

    // Refresh responses usually omit the refresh token; keep the old one then.
    if let Some(refresh_token) = response.refresh_token() {
        credential.refresh_token = Some(refresh_token.secret().to_string());
    }
    if let Some(scopes) = response.scopes() {
        credential.scopes = scopes.iter().map(|scope| scope.as_str().to_string()).collect();
    }
}

/// Authenticator for Google APIs using the installed-application OAuth2 flow.
#[derive(Clone)]
pub struct Authenticator {
    secret_path: PathBuf,
    store: TokenStore,
    scopes: Vec<String>,
    login_timeout: Duration,
    cached: Arc<RwLock<Option<Credential>>>,
}

impl Authenticator {
    /// Create an authenticator reading the client secret from `secret_path`
    /// and caching tokens in `token_path`.
    pub fn new<S: AsRef<Path>, T: AsRef<Path>>(secret_path: S, token_path: T) -> Self {
        Self {
            secret_path: secret_path.as_ref().to_path_buf(),
            store: TokenStore::new(token_path),
            scopes: vec![DRIVE_SCOPE.to_string()],
            login_timeout: DEFAULT_LOGIN_TIMEOUT,
            cached: Arc::new(RwLock::new(None)),
        }
    }

    /// Create an authenticator that starts from an already obtained credential.
    pub fn from_credential<T: AsRef<Path>>(credential: Credential, token_path: T) -> Self {
        let auth = Self::new(PathBuf::new(), token_path);
        Self {
            cached: Arc::new(RwLock::new(Some(credential))),
            ..auth
        }
    }

    pub fn with_login_timeout(mut self, timeout: Duration) -> Self {
        self.login_timeout = timeout;
        self
    }

    /// Load the persisted credential, refreshing it or logging in as needed.
    ///
    /// A refreshed or newly obtained credential is written back to the token
    /// file before it is returned.
    pub async fn obtain_credentials(&self) -> Result<Credential> {
        let stored = self.store.load()?;
        self.settle(stored).await
    }

    /// Get a valid access token, refreshing if necessary.
    pub async fn access_token(&self) -> Result<String> {
        let cached = self.cached.read().await.clone();

        let credential = match cached {
            Some(credential) if self.is_valid(&credential) => credential,
            Some(credential) => self.settle(Some(credential)).await?,
            None => self.obtain_credentials().await?,
        };

        credential.token.ok_or_else(|| {
            DriveError::AuthenticationError("credential carries no access token".to_string())
        })
    }

    fn is_valid(&self, credential: &Credential) -> bool {
        credential.token.is_some()
            && self.has_scopes(credential)
            && !credential.is_expired_at(OffsetDateTime::now_utc(), EXPIRY_LEEWAY)
    }

    fn has_scopes(&self, credential: &Credential) -> bool {
        self.scopes.iter().all(|scope| credential.has_scope(scope))
    }

    async fn settle(&self, current: Option<Credential>) -> Result<Credential> {
        let credential = match current {
            Some(credential) if self.is_valid(&credential) => {
                debug!("Using stored credential: {:?}", credential);
                credential
            }
            Some(credential) if !self.has_scopes(&credential) => {
                warn!("Stored token lacks the requested scopes. Re-authentication required.");
                self.login_and_save().await?
            }
            Some(credential) if credential.refresh_token.is_some() => {
                info!("Access token expired, refreshing");
                let refreshed = self.refresh(credential).await?;
                self.store.save(&refreshed)?;
                refreshed
            }
            Some(_) => {
                info!("Stored token expired and has no refresh token");
                self.login_and_save().await?
            }
            None => self.login_and_save().await?,
        };

        *self.cached.write().await = Some(credential.clone());
        Ok(credential)
    }

    async fn login_and_save(&self) -> Result<Credential> {
        let secret = load_client_secret(&self.secret_path)?;
        let scopes: Vec<&str> = self.scopes.iter().map(String::as_str).collect();

        let flow = LoginFlow::bind(secret, &scopes).await?;
        let credential = flow.run(self.login_timeout).await?;
        info!("Interactive login completed");

        self.store.save(&credential)?;
        Ok(credential)
    }

    /// Exchange the refresh token for a new access token.
    async fn refresh(&self, credential: Credential) -> Result<Credential> {
        let refresh_token = credential.refresh_token.clone().ok_or_else(|| {
            DriveError::TokenRefreshError("no refresh token available".to_string())
        })?;

        let client = oauth_client(&ClientSecret {
            client_id: credential.client_id.clone(),
            client_secret: credential.client_secret.clone(),
            auth_uri: GOOGLE_AUTH_URI.to_string(),
            token_uri: credential.token_uri.clone(),
        })?;

        let token = client
            .exchange_refresh_token(&RefreshToken::new(refresh_token))
            .request_async(async_http_client)
            .await
            .map_err(|e| DriveError::TokenRefreshError(describe_token_error(e)))?;

        let mut refreshed = credential;
        apply_token_response(&mut refreshed, &token);
        Ok(refreshed)
    }
}
