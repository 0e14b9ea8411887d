//! Interactive OAuth2 authorization-code flow with a local callback listener.

use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use log::{debug, info, warn};
use oauth2::basic::BasicClient;
use oauth2::reqwest::async_http_client;
use oauth2::{AuthorizationCode, CsrfToken, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use url::Url;

use crate::auth::{apply_token_response, describe_token_error, oauth_client};
use crate::error::{DriveError, Result};
use crate::models::{ClientSecret, Credential};

/// How long the callback server gets to wind down after the flow finishes.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// A pending authorization-code login bound to a local callback port.
pub struct LoginFlow {
    client: BasicClient,
    secret: ClientSecret,
    scopes: Vec<String>,
    listener: TcpListener,
    redirect_uri: String,
    authorize_url: Url,
    csrf_token: CsrfToken,
    pkce_verifier: PkceCodeVerifier,
}

impl LoginFlow {
    /// Bind the callback listener on an OS-assigned loopback port and prepare
    /// the authorization request for it.
    pub async fn bind(secret: ClientSecret, scopes: &[&str]) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let port = listener.local_addr()?.port();
        debug!("OAuth2 callback listener bound on port {}", port);

        let redirect_uri = format!("http://127.0.0.1:{}/", port);
        let redirect_url = RedirectUrl::new(redirect_uri.clone())
            .map_err(|e| DriveError::AuthenticationError(format!("invalid redirect URI: {}", e)))?;
        let client = oauth_client(&secret)?.set_redirect_uri(redirect_url);

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let mut request = client.authorize_url(CsrfToken::new_random);
        for scope in scopes {
            request = request.add_scope(Scope::new(scope.to_string()));
        }
        let (authorize_url, csrf_token) = request
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .set_pkce_challenge(pkce_challenge)
            .url();

        Ok(Self {
            client,
            secret,
            scopes: scopes.iter().map(|scope| scope.to_string()).collect(),
            listener,
            redirect_uri,
            authorize_url,
            csrf_token,
            pkce_verifier,
        })
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// URL the user opens in a browser to grant access.
    pub fn authorize_url(&self) -> &Url {
        &self.authorize_url
    }

    /// Wait for the browser callback, then exchange the code for a credential.
    pub async fn run(self, timeout: Duration) -> Result<Credential> {
        eprintln!(
            "Please visit this URL to authorize this application: {}",
            self.authorize_url
        );

        let LoginFlow {
            client,
            secret,
            scopes,
            listener,
            csrf_token,
            pkce_verifier,
            ..
        } = self;

        let code = wait_for_callback(listener, csrf_token.secret().clone(), timeout).await?;
        info!("Authorization code received, exchanging for tokens");

        let token = client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(pkce_verifier)
            .request_async(async_http_client)
            .await
            .map_err(|e| {
                DriveError::AuthenticationError(format!(
                    "code exchange failed: {}",
                    describe_token_error(e)
                ))
            })?;

        let mut credential = Credential {
            token: None,
            refresh_token: None,
            token_uri: secret.token_uri,
            client_id: secret.client_id,
            client_secret: secret.client_secret,
            scopes,
            expiry: None,
        };
        apply_token_response(&mut credential, &token);
        Ok(credential)
    }
}

#[derive(Clone)]
struct CallbackState {
    expected_state: String,
    sender: mpsc::Sender<Result<String>>,
}

/// Query parameters of the authorization server's redirect.
#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl CallbackParams {
    fn into_code(self, expected_state: &str) -> Result<String> {
        if let Some(error) = self.error {
            return Err(DriveError::AuthenticationError(format!(
                "authorization denied: {} ({})",
                error,
                self.error_description.as_deref().unwrap_or("no details")
            )));
        }

        if self.state.as_deref() != Some(expected_state) {
            return Err(DriveError::AuthenticationError(
                "state mismatch in authorization callback".to_string(),
            ));
        }

        self.code.filter(|code| !code.is_empty()).ok_or_else(|| {
            DriveError::AuthenticationError("authorization callback carried no code".to_string())
        })
    }
}

async fn wait_for_callback(
    listener: TcpListener,
    expected_state: String,
    timeout: Duration,
) -> Result<String> {
    let (sender, mut receiver) = mpsc::channel::<Result<String>>(1);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let app = Router::new()
        .route("/", get(callback))
        .with_state(CallbackState {
            expected_state,
            sender,
        });

    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
    });

    let received = tokio::time::timeout(timeout, receiver.recv()).await;

    let _ = shutdown_tx.send(());
    match tokio::time::timeout(SHUTDOWN_GRACE, server).await {
        Ok(Ok(Err(e))) => warn!("Callback server error: {}", e),
        Ok(Err(e)) => warn!("Callback server task failed: {}", e),
        Err(_) => warn!("Callback server did not shut down in time"),
        Ok(Ok(Ok(()))) => debug!("Callback server stopped"),
    }

    match received {
        Ok(Some(outcome)) => outcome,
        Ok(None) => Err(DriveError::AuthenticationError(
            "callback server stopped before authorization completed".to_string(),
        )),
        Err(_) => Err(DriveError::AuthenticationError(format!(
            "no authorization received within {}s",
            timeout.as_secs()
        ))),
    }
}

async fn callback(
    State(state): State<CallbackState>,
    Query(params): Query<CallbackParams>,
) -> (StatusCode, &'static str) {
    let outcome = params.into_code(&state.expected_state);
    let response = match &outcome {
        Ok(_) => (
            StatusCode::OK,
            "The authentication flow has completed. You may close this window.",
        ),
        Err(_) => (
            StatusCode::BAD_REQUEST,
            "Authentication failed. Return to the application for details.",
        ),
    };

    // Only the first callback counts.
    if state.sender.try_send(outcome).is_err() {
        debug!("Ignoring extra authorization callback");
    }

    response
}
