//! Dexcom Share HTTP client.
//!
//! [`ShareClient`] implements [`ShareSource`] for the polling engine.  It
//! holds the decrypted credentials and the current session id, logs in
//! lazily on the first fetch, and turns every HTTP outcome into one of the
//! [`FetchOutcome`] variants so no `reqwest` error escapes this module.

pub mod wire;

use std::time::Duration;

use async_trait::async_trait;
use gluco_core::Credentials;
use serde::Serialize;
use tracing::{debug, info};

use crate::application::ports::{FetchOutcome, ShareError, ShareSource};
use wire::{FailureClass, GlucoseEntry, LoginId};

/// Timeouts applied to every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShareClientConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ShareClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(20),
        }
    }
}

/// Client for one Share account.
pub struct ShareClient {
    http: reqwest::Client,
    base_url: String,
    application_id: &'static str,
    credentials: Credentials,
    session_id: Option<String>,
}

impl ShareClient {
    /// Builds a client for the deployment matching `credentials.region`.
    ///
    /// # Errors
    ///
    /// Returns [`ShareError::Transient`] if the TLS backend cannot be
    /// initialised.
    pub fn new(credentials: Credentials, config: ShareClientConfig) -> Result<Self, ShareError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(concat!("dexcom-osc-bridge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ShareError::Transient(format!("HTTP client setup failed: {e}")))?;

        Ok(Self {
            http,
            base_url: wire::base_url(credentials.region).to_string(),
            application_id: wire::application_id(credentials.region),
            credentials,
            session_id: None,
        })
    }

    /// Points the client at another host, e.g. a local mock server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn has_session(&self) -> bool {
        self.session_id.is_some()
    }

    /// Performs the two-step login and keeps the session.  Used by `setup`
    /// to check credentials before they are saved.
    ///
    /// # Errors
    ///
    /// [`ShareError::Auth`] if the service refuses the account or password;
    /// [`ShareError::Transient`] for network or server trouble.
    pub async fn verify_login(&mut self) -> Result<(), ShareError> {
        self.login().await
    }

    async fn login(&mut self) -> Result<(), ShareError> {
        self.session_id = None;

        let body = self
            .post(
                wire::AUTHENTICATE_PATH,
                &[],
                &wire::AuthenticateRequest {
                    account_name: &self.credentials.username,
                    password: &self.credentials.password,
                    application_id: self.application_id,
                },
            )
            .await?;
        let account_id = login_id_or_error(&body, "AuthenticateAccountNotFound")?;
        debug!("Share account id resolved");

        let body = self
            .post(
                wire::LOGIN_BY_ID_PATH,
                &[],
                &wire::LoginByIdRequest {
                    account_id: &account_id,
                    password: &self.credentials.password,
                    application_id: self.application_id,
                },
            )
            .await?;
        let session_id = login_id_or_error(&body, "SessionIdNotFound")?;

        info!("logged in to Share ({})", self.credentials.region);
        self.session_id = Some(session_id);
        Ok(())
    }

    /// POSTs `body` and returns the response text on success.
    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: &B,
    ) -> Result<String, ShareError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(query)
            .json(body)
            .send()
            .await
            .map_err(|e| ShareError::Transient(describe_request_error(&e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ShareError::Transient(describe_request_error(&e)))?;

        if status.is_success() {
            return Ok(text);
        }
        match wire::classify_failure(status.as_u16(), &text) {
            FailureClass::Auth(code) => Err(ShareError::Auth(code)),
            FailureClass::Transient(detail) => Err(ShareError::Transient(detail)),
        }
    }

    async fn read_latest(&self, session_id: &str) -> Result<FetchOutcome, ShareError> {
        let query = [
            ("sessionId", session_id.to_string()),
            ("minutes", wire::LATEST_WINDOW_MINUTES.to_string()),
            ("maxCount", wire::LATEST_MAX_COUNT.to_string()),
        ];
        let body = self
            .post(wire::LATEST_GLUCOSE_PATH, &query, &serde_json::json!({}))
            .await?;

        let entries: Vec<GlucoseEntry> = serde_json::from_str(&body)
            .map_err(|e| ShareError::Transient(format!("unreadable glucose response: {e}")))?;
        let Some(entry) = entries.first() else {
            return Ok(FetchOutcome::NoReading);
        };
        entry
            .to_reading()
            .map(FetchOutcome::Reading)
            .ok_or_else(|| ShareError::Transient(format!("unreadable timestamp '{}'", entry.wt)))
    }
}

#[async_trait]
impl ShareSource for ShareClient {
    async fn fetch_latest(&mut self) -> FetchOutcome {
        if self.session_id.is_none() {
            if let Err(e) = self.login().await {
                return outcome_from_error(e);
            }
        }
        let Some(session_id) = self.session_id.clone() else {
            return FetchOutcome::Auth("SessionIdNotFound".to_string());
        };

        match self.read_latest(&session_id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                if matches!(e, ShareError::Auth(_)) {
                    self.session_id = None;
                }
                outcome_from_error(e)
            }
        }
    }

    async fn reauthenticate(&mut self) -> Result<(), ShareError> {
        self.login().await
    }
}

/// A nil id is a refused login.  Any other unreadable body is transient.
fn login_id_or_error(body: &str, refused_code: &str) -> Result<String, ShareError> {
    match wire::parse_login_id(body) {
        LoginId::Id(id) => Ok(id),
        LoginId::Nil => Err(ShareError::Auth(refused_code.to_string())),
        LoginId::Unparseable => Err(ShareError::Transient(
            "unreadable login response".to_string(),
        )),
    }
}

fn outcome_from_error(e: ShareError) -> FetchOutcome {
    match e {
        ShareError::Auth(code) => FetchOutcome::Auth(code),
        ShareError::Transient(detail) => FetchOutcome::Transient(detail),
    }
}

fn describe_request_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "request timed out".to_string()
    } else if e.is_connect() {
        format!("connection failed: {e}")
    } else {
        format!("request failed: {e}")
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
