//! Client SDK for the session endpoints.
//!
//! The interesting part is the refresh coordinator in `AuthClient`: because
//! the server rotates refresh tokens on every redemption, two concurrent
//! refresh exchanges with the same token would strand whichever caller lost
//! the race. The coordinator therefore enforces a process-wide single-flight
//! guarantee with an explicit `refresh_in_flight` flag and a FIFO queue of
//! oneshot waiters, and replays each 401'd call at most once.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

pub mod credentials;

pub use credentials::CredentialFile;

/// HTTP request timeout. Also bounds the refresh exchange itself, so a hung
/// refresh call cannot hold the single-flight gate forever.
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The refresh exchange failed or no session exists; the client has
    /// cleared its credentials and the user must log in again.
    #[error("session expired")]
    SessionExpired,

    #[error("server error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("credential storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionPayload {
    access_token: String,
    refresh_token: String,
    user: UserInfo,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    message: String,
}

/// Sent to queued waiters when the in-flight exchange failed; every waiter
/// surfaces it as `SessionExpired`.
#[derive(Debug, Clone, Copy)]
struct RefreshFailed;

type WaiterTx = oneshot::Sender<Result<String, RefreshFailed>>;

#[derive(Default)]
struct CoordinatorState {
    /// In-memory only, never written to durable storage.
    access: Option<String>,
    refresh: Option<String>,
    refresh_in_flight: bool,
    waiters: VecDeque<WaiterTx>,
}

enum Role {
    /// This caller runs the exchange.
    Lead { refresh_token: String },
    /// An exchange is already in flight; await its outcome.
    Wait(oneshot::Receiver<Result<String, RefreshFailed>>),
}

pub struct AuthClient {
    http: reqwest::Client,
    base_url: String,
    credentials: CredentialFile,
    // Guards coordinator state; never held across an await.
    state: Mutex<CoordinatorState>,
}

impl AuthClient {
    /// `credential_path` is the durable location for the refresh token.
    /// Any refresh token already stored there is picked up, so a restarted
    /// application resumes its session without logging in again.
    pub fn new(base_url: &str, credential_path: PathBuf) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        let credentials = CredentialFile::new(credential_path);
        let refresh = credentials.load()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            state: Mutex::new(CoordinatorState {
                refresh,
                ..CoordinatorState::default()
            }),
        })
    }

    /// True when a refresh credential is held, i.e. calls can authenticate
    /// (possibly after a transparent refresh).
    pub fn has_session(&self) -> bool {
        let st = self.state.lock().unwrap();
        st.refresh.is_some()
    }

    pub async fn register(
        &self,
        name: Option<&str>,
        email: &str,
        password: &str,
        password_confirmation: &str,
    ) -> Result<UserInfo, ClientError> {
        let resp = self
            .http
            .post(self.url("/auth/register"))
            .json(&serde_json::json!({
                "name": name,
                "email": email,
                "password": password,
                "password_confirmation": password_confirmation,
            }))
            .send()
            .await?;
        let session: SessionPayload = Self::into_json(resp).await?;
        self.install_session(&session)?;
        Ok(session.user)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<UserInfo, ClientError> {
        let resp = self
            .http
            .post(self.url("/auth/login"))
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;
        let session: SessionPayload = Self::into_json(resp).await?;
        self.install_session(&session)?;
        Ok(session.user)
    }

    /// Revokes the session server-side on a best-effort basis, then clears
    /// local credentials unconditionally.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let (access, refresh) = {
            let st = self.state.lock().unwrap();
            (st.access.clone(), st.refresh.clone())
        };
        if let Some(access) = access {
            let result = self
                .http
                .post(self.url("/auth/logout"))
                .bearer_auth(&access)
                .json(&serde_json::json!({ "refresh_token": refresh }))
                .send()
                .await;
            if let Err(err) = result {
                warn!(error = %err, "server-side logout failed; clearing local session anyway");
            }
        }
        self.clear_session();
        Ok(())
    }

    /// Identity claims of the current session, as the canonical
    /// authenticated call.
    pub async fn me(&self) -> Result<serde_json::Value, ClientError> {
        self.get_json("/me").await
    }

    /// Authenticated GET with transparent refresh-and-replay.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let resp = self.send_authorized(Method::GET, path).await?;
        Ok(resp.json().await?)
    }

    // -----------------------------------------------------------------------
    // Refresh coordination
    // -----------------------------------------------------------------------

    /// Sends the request with the current access credential. On a 401 the
    /// call obtains a post-refresh credential through the single-flight gate
    /// and is replayed exactly once; a second 401 is surfaced, never retried
    /// again, so a misbehaving server cannot trap callers in a loop.
    async fn send_authorized(
        &self,
        method: Method,
        path: &str,
    ) -> Result<reqwest::Response, ClientError> {
        let used = self.current_access();
        let resp = self.send_once(&method, path, used.as_deref()).await?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return Self::check(resp).await;
        }

        let fresh = self.refreshed_access(used.as_deref()).await?;
        debug!(path, "replaying request with refreshed credential");
        let resp = self.send_once(&method, path, Some(&fresh)).await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(ClientError::SessionExpired);
        }
        Self::check(resp).await
    }

    /// Returns an access credential newer than `stale`, performing at most
    /// one refresh exchange process-wide no matter how many callers arrive
    /// here concurrently.
    async fn refreshed_access(&self, stale: Option<&str>) -> Result<String, ClientError> {
        let role = {
            let mut st = self.state.lock().unwrap();
            if let Some(current) = st.access.as_deref() {
                if stale != Some(current) {
                    // Someone else already completed the exchange.
                    return Ok(current.to_string());
                }
            }
            if st.refresh_in_flight {
                let (tx, rx) = oneshot::channel();
                st.waiters.push_back(tx);
                Role::Wait(rx)
            } else {
                match st.refresh.clone() {
                    Some(refresh_token) => {
                        st.refresh_in_flight = true;
                        Role::Lead { refresh_token }
                    }
                    None => return Err(ClientError::SessionExpired),
                }
            }
        };

        match role {
            // A dropped sender (shutdown mid-refresh) rejects us too.
            Role::Wait(rx) => match rx.await {
                Ok(Ok(access)) => Ok(access),
                _ => Err(ClientError::SessionExpired),
            },
            Role::Lead { refresh_token } => {
                let outcome = self.exchange(&refresh_token).await;
                self.settle(outcome)
            }
        }
    }

    /// The single refresh exchange. Bounded by the client timeout.
    async fn exchange(&self, refresh_token: &str) -> Result<SessionPayload, ClientError> {
        let resp = self
            .http
            .post(self.url("/auth/refresh"))
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(ClientError::SessionExpired);
        }
        let resp = Self::check(resp).await?;
        Ok(resp.json().await?)
    }

    /// Publishes the exchange outcome: installs the new pair and resolves
    /// every queued waiter FIFO, or clears both credentials and rejects
    /// them. Either way the in-flight flag is dropped.
    fn settle(&self, outcome: Result<SessionPayload, ClientError>) -> Result<String, ClientError> {
        match outcome {
            Ok(session) => {
                if let Err(err) = self.credentials.save(&session.refresh_token) {
                    warn!(error = %err, "failed to persist rotated refresh token");
                }
                let mut st = self.state.lock().unwrap();
                st.refresh_in_flight = false;
                st.access = Some(session.access_token.clone());
                st.refresh = Some(session.refresh_token.clone());
                while let Some(tx) = st.waiters.pop_front() {
                    let _ = tx.send(Ok(session.access_token.clone()));
                }
                Ok(session.access_token)
            }
            Err(err) => {
                {
                    let mut st = self.state.lock().unwrap();
                    st.refresh_in_flight = false;
                    st.access = None;
                    st.refresh = None;
                    while let Some(tx) = st.waiters.pop_front() {
                        let _ = tx.send(Err(RefreshFailed));
                    }
                }
                if let Err(err) = self.credentials.clear() {
                    warn!(error = %err, "failed to clear stored credentials");
                }
                debug!("refresh exchange failed; session cleared");
                Err(err)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Plumbing
    // -----------------------------------------------------------------------

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn current_access(&self) -> Option<String> {
        self.state.lock().unwrap().access.clone()
    }

    async fn send_once(
        &self,
        method: &Method,
        path: &str,
        access: Option<&str>,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let mut req = self.http.request(method.clone(), self.url(path));
        if let Some(token) = access {
            req = req.bearer_auth(token);
        }
        req.send().await
    }

    fn install_session(&self, session: &SessionPayload) -> Result<(), ClientError> {
        self.credentials.save(&session.refresh_token)?;
        let mut st = self.state.lock().unwrap();
        st.access = Some(session.access_token.clone());
        st.refresh = Some(session.refresh_token.clone());
        Ok(())
    }

    fn clear_session(&self) {
        {
            let mut st = self.state.lock().unwrap();
            st.access = None;
            st.refresh = None;
        }
        if let Err(err) = self.credentials.clear() {
            warn!(error = %err, "failed to clear stored credentials");
        }
    }

    async fn into_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ClientError> {
        let resp = Self::check(resp).await?;
        Ok(resp.json().await?)
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let message = match resp.json::<ApiMessage>().await {
            Ok(body) => body.message,
            Err(_) => "unexpected response".to_string(),
        };
        Err(ClientError::Api { status, message })
    }
}
