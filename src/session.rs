//! Session lifecycle: restore, login, logout.
//!
//! The session is a process-wide singleton built around one persisted
//! credential slot. Login is redirect-based: the service hands out an
//! authorization URL, the provider sends the user agent back to a loopback
//! listener with the token pair as query parameters, and the listener
//! immediately redirects to a parameter-free page so the tokens never stay
//! visible in the browser's location bar or navigation history.
//!
//! Failure policy: a credential the identity endpoint rejects silently
//! demotes the session to unauthenticated. Only a failure to *start* login
//! is surfaced to the user.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::Redirect;
use axum::routing::get;
use axum::Router;
use thiserror::Error;
use tokio::sync::Notify;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::store::CredentialStore;
use crate::types::{Credential, Identity};

const USER_AGENT: &str = concat!("cut_planner/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(45);

#[derive(Debug, Error)]
pub enum SessionError {
    /// Login could not be initiated. Unlike credential rejection this IS
    /// shown to the user.
    #[error("Could not start login: {0}")]
    LoginStart(String),

    #[error("Login callback listener failed: {0}")]
    Callback(String),

    #[error("Could not persist credentials: {0}")]
    Persist(String),

    #[error("Could not build HTTP client: {0}")]
    Init(String),
}

/// Where the session currently stands.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Unauthenticated,
    /// A persisted credential exists and is being validated.
    Restoring,
    Authenticated(Identity),
}

#[derive(serde::Deserialize)]
struct LoginResponse {
    authorization_url: String,
}

/// The token pair delivered on the login return URL. Foreign query
/// parameters are ignored; both tokens must be present for the callback to
/// count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackParams {
    pub access_token: String,
    pub refresh_token: String,
}

impl CallbackParams {
    pub fn from_query(params: &HashMap<String, String>) -> Option<Self> {
        let access_token = params.get("access_token")?.clone();
        let refresh_token = params.get("refresh_token")?.clone();
        if access_token.is_empty() || refresh_token.is_empty() {
            return None;
        }
        Some(Self {
            access_token,
            refresh_token,
        })
    }

    /// Parses a full return URL, for users who paste the redirect target
    /// instead of letting the loopback listener catch it.
    pub fn from_url(raw: &str) -> Option<Self> {
        let url = url::Url::parse(raw).ok()?;
        let params: HashMap<String, String> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Self::from_query(&params)
    }

    fn into_credential(self) -> Credential {
        Credential {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
        }
    }
}

/// Owns the authentication state machine and the credential slot.
pub struct SessionManager {
    http: reqwest::Client,
    api_base: String,
    store: CredentialStore,
    state: SessionState,
    credential: Option<Credential>,
}

impl SessionManager {
    pub fn new(api_base: &str, store: CredentialStore) -> Result<Self, SessionError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SessionError::Init(e.to_string()))?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            store,
            state: SessionState::Unauthenticated,
            credential: None,
        })
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn identity(&self) -> Option<&Identity> {
        match &self.state {
            SessionState::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }

    /// The credential to attach to optimizer and history requests, present
    /// only while authenticated.
    pub fn credential(&self) -> Option<&Credential> {
        match self.state {
            SessionState::Authenticated(_) => self.credential.as_ref(),
            _ => None,
        }
    }

    /// Validates any persisted credential on process start. A rejected
    /// credential is discarded and the session comes up unauthenticated with
    /// no user-visible error; with no persisted credential there is no
    /// network call at all.
    pub async fn restore(&mut self) {
        let Some(credential) = self.store.load() else {
            self.state = SessionState::Unauthenticated;
            return;
        };

        self.state = SessionState::Restoring;
        match self.whoami(&credential).await {
            Ok(identity) => {
                tracing::info!(user = %identity.name, "session restored");
                self.credential = Some(credential);
                self.state = SessionState::Authenticated(identity);
            }
            Err(WhoamiFailure::Rejected) => {
                tracing::info!("persisted credential rejected, clearing it");
                if let Err(e) = self.store.clear() {
                    tracing::warn!(error = %e, "could not remove rejected credential");
                }
                self.credential = None;
                self.state = SessionState::Unauthenticated;
            }
            Err(WhoamiFailure::Unreachable(e)) => {
                // Can't tell whether the credential is still good; keep the
                // file for the next start but run unauthenticated now.
                tracing::warn!(error = %e, "identity endpoint unreachable during restore");
                self.credential = None;
                self.state = SessionState::Unauthenticated;
            }
        }
    }

    /// Asks the service for the provider's authorization URL. The caller
    /// sends the user agent there; state changes only happen when the
    /// provider redirects back. `redirect_uri` tells the provider where the
    /// return redirect should land (the loopback listener, for the CLI).
    pub async fn begin_login(&self, redirect_uri: Option<&str>) -> Result<String, SessionError> {
        let mut request = self.http.get(format!("{}/auth/login", self.api_base));
        if let Some(redirect_uri) = redirect_uri {
            request = request.query(&[("redirect_uri", redirect_uri)]);
        }
        let response = request
            .send()
            .await
            .map_err(|e| SessionError::LoginStart(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SessionError::LoginStart(format!(
                "login endpoint returned {}",
                response.status().as_u16()
            )));
        }

        let login: LoginResponse = response
            .json()
            .await
            .map_err(|e| SessionError::LoginStart(e.to_string()))?;
        Ok(login.authorization_url)
    }

    /// Consumes the token pair from the login return URL: persists it,
    /// validates it against the identity endpoint, and transitions to
    /// authenticated. A pair the identity endpoint rejects is discarded
    /// silently, leaving the session unauthenticated.
    pub async fn complete_login(&mut self, params: CallbackParams) -> Result<(), SessionError> {
        let credential = params.into_credential();
        self.store
            .save(&credential)
            .map_err(|e| SessionError::Persist(e.to_string()))?;

        match self.whoami(&credential).await {
            Ok(identity) => {
                tracing::info!(user = %identity.name, "login complete");
                self.credential = Some(credential);
                self.state = SessionState::Authenticated(identity);
            }
            Err(e) => {
                tracing::warn!(error = ?e, "fresh credential failed validation");
                if let Err(e) = self.store.clear() {
                    tracing::warn!(error = %e, "could not remove invalid credential");
                }
                self.credential = None;
                self.state = SessionState::Unauthenticated;
            }
        }
        Ok(())
    }

    /// Discards the persisted credential and returns to unauthenticated.
    /// The orchestrator also closes any open history view, since history is
    /// scoped to the identity that just left.
    pub fn logout(&mut self) -> Result<(), SessionError> {
        self.store
            .clear()
            .map_err(|e| SessionError::Persist(e.to_string()))?;
        self.credential = None;
        self.state = SessionState::Unauthenticated;
        tracing::info!("logged out");
        Ok(())
    }

    async fn whoami(&self, credential: &Credential) -> Result<Identity, WhoamiFailure> {
        let response = self
            .http
            .get(format!("{}/auth/whoami", self.api_base))
            .bearer_auth(&credential.access_token)
            .send()
            .await
            .map_err(|e| WhoamiFailure::Unreachable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(WhoamiFailure::Rejected);
        }
        response
            .json()
            .await
            .map_err(|e| WhoamiFailure::Unreachable(e.to_string()))
    }
}

#[derive(Debug)]
enum WhoamiFailure {
    /// The endpoint answered and said no: the credential is dead.
    Rejected,
    /// The endpoint never answered; the credential may still be good.
    Unreachable(String),
}

/// Single-use slot for the callback delivery. The first delivery wins;
/// duplicates carry the same tokens and are dropped.
struct CallbackSlot {
    params: std::sync::Mutex<Option<CallbackParams>>,
    done: Notify,
}

impl CallbackSlot {
    fn deliver(&self, params: CallbackParams) {
        let mut slot = self.params.lock().unwrap();
        if slot.is_none() {
            *slot = Some(params);
        }
        self.done.notify_one();
    }
}

/// Loopback HTTP listener the provider redirects back to after login.
pub struct CallbackListener {
    listener: tokio::net::TcpListener,
    addr: SocketAddr,
}

impl CallbackListener {
    /// Binds an ephemeral port on 127.0.0.1.
    pub async fn bind() -> Result<Self, SessionError> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| SessionError::Callback(e.to_string()))?;
        let addr = listener
            .local_addr()
            .map_err(|e| SessionError::Callback(e.to_string()))?;
        Ok(Self { listener, addr })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The URL the provider should redirect back to.
    pub fn redirect_url(&self) -> String {
        format!("http://{}/callback", self.addr)
    }

    /// Serves until the provider delivers the token pair, then shuts down
    /// and returns it. The callback handler answers with a redirect to a
    /// parameter-free page so the tokens do not linger in the visible URL.
    pub async fn wait_for_callback(self) -> Result<CallbackParams, SessionError> {
        let slot = Arc::new(CallbackSlot {
            params: std::sync::Mutex::new(None),
            done: Notify::new(),
        });

        let app = Router::new()
            .route("/callback", get(handle_callback))
            .route("/done", get(handle_done))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                    .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
            )
            .with_state(slot.clone());

        let shutdown = {
            let slot = slot.clone();
            async move { slot.done.notified().await }
        };
        axum::serve(self.listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| SessionError::Callback(e.to_string()))?;

        let params = slot.params.lock().unwrap().take();
        params.ok_or_else(|| SessionError::Callback("no tokens were delivered".to_string()))
    }
}

async fn handle_callback(
    State(slot): State<Arc<CallbackSlot>>,
    Query(params): Query<HashMap<String, String>>,
) -> Redirect {
    if let Some(params) = CallbackParams::from_query(&params) {
        slot.deliver(params);
    } else {
        tracing::warn!("login callback arrived without a token pair");
    }
    Redirect::to("/done")
}

async fn handle_done() -> &'static str {
    "Login complete. You can close this tab and return to the terminal."
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_callback_params_from_query() {
        let params = CallbackParams::from_query(&query(&[
            ("access_token", "at-1"),
            ("refresh_token", "rt-1"),
            ("state", "xyz"),
        ]))
        .unwrap();
        assert_eq!(params.access_token, "at-1");
        assert_eq!(params.refresh_token, "rt-1");
    }

    #[test]
    fn test_callback_params_require_both_tokens() {
        assert!(CallbackParams::from_query(&query(&[("access_token", "at-1")])).is_none());
        assert!(CallbackParams::from_query(&query(&[
            ("access_token", ""),
            ("refresh_token", "rt-1"),
        ]))
        .is_none());
        assert!(CallbackParams::from_query(&query(&[("code", "abc")])).is_none());
    }

    #[test]
    fn test_callback_params_from_url() {
        let params = CallbackParams::from_url(
            "http://127.0.0.1:4000/callback?access_token=at-2&refresh_token=rt-2&foo=bar",
        )
        .unwrap();
        assert_eq!(params.access_token, "at-2");
        assert_eq!(params.refresh_token, "rt-2");

        assert!(CallbackParams::from_url("not a url").is_none());
        assert!(CallbackParams::from_url("http://127.0.0.1/callback?foo=bar").is_none());
    }

    #[test]
    fn test_duplicate_delivery_keeps_first() {
        let slot = CallbackSlot {
            params: std::sync::Mutex::new(None),
            done: Notify::new(),
        };
        slot.deliver(CallbackParams {
            access_token: "first".to_string(),
            refresh_token: "rt".to_string(),
        });
        slot.deliver(CallbackParams {
            access_token: "second".to_string(),
            refresh_token: "rt".to_string(),
        });
        let params = slot.params.lock().unwrap().take().unwrap();
        assert_eq!(params.access_token, "first");
    }

    #[tokio::test]
    async fn test_listener_binds_loopback_ephemeral_port() {
        let listener = CallbackListener::bind().await.unwrap();
        assert!(listener.addr().ip().is_loopback());
        assert_ne!(listener.addr().port(), 0);
        assert!(listener.redirect_url().ends_with("/callback"));
    }
}
