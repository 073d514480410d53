//! ListenBrainz API client
//!
//! Covers the two endpoints the importer needs:
//! - `GET /1/validate-token`: credential check before any work starts
//! - `POST /1/submit-listens`: batch submission with `listen_type = "import"`

use crate::error::SubmitError;
use crate::models::Listen;
use crate::services::submission::SubmissionClient;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, AUTHORIZATION};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Mutex;

const USER_AGENT: &str = concat!("lbi-importer/", env!("CARGO_PKG_VERSION"));
const SUBMISSION_CLIENT: &str = "lbi-importer";
const REQUEST_TIMEOUT_SECS: u64 = 30;

const RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
const RATELIMIT_RESET_IN: &str = "x-ratelimit-reset-in";

#[derive(Debug, Serialize)]
struct SubmitListensBody<'a> {
    listen_type: &'static str,
    payload: Vec<ListenPayload<'a>>,
}

#[derive(Debug, Serialize)]
struct ListenPayload<'a> {
    listened_at: i64,
    track_metadata: TrackMetadata<'a>,
}

#[derive(Debug, Serialize)]
struct TrackMetadata<'a> {
    artist_name: &'a str,
    track_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    release_name: Option<&'a str>,
    additional_info: AdditionalInfo<'a>,
}

#[derive(Debug, Serialize)]
struct AdditionalInfo<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    isrc: Option<&'a str>,
    submission_client: &'static str,
    submission_client_version: &'static str,
}

impl<'a> From<&'a Listen> for ListenPayload<'a> {
    fn from(listen: &'a Listen) -> Self {
        let non_empty = |s: &'a str| Some(s).filter(|s| !s.trim().is_empty());
        Self {
            listened_at: listen.listened_at,
            track_metadata: TrackMetadata {
                artist_name: &listen.artist_name,
                track_name: &listen.track_name,
                release_name: non_empty(&listen.release_name),
                additional_info: AdditionalInfo {
                    isrc: non_empty(&listen.isrc),
                    submission_client: SUBMISSION_CLIENT,
                    submission_client_version: env!("CARGO_PKG_VERSION"),
                },
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
struct ValidateTokenResponse {
    valid: bool,
    #[serde(default)]
    user_name: Option<String>,
}

/// Rate limit budget advertised by the last response
#[derive(Debug, Default)]
struct RateLimitState {
    remaining: Option<u64>,
    reset_in: Option<u64>,
}

/// Waits out the rate limit window once the advertised budget is spent
struct RateLimiter {
    state: Mutex<RateLimitState>,
}

impl RateLimiter {
    fn new() -> Self {
        Self {
            state: Mutex::new(RateLimitState::default()),
        }
    }

    async fn wait(&self) {
        let mut state = self.state.lock().await;

        if state.remaining == Some(0) {
            if let Some(reset_in) = state.reset_in {
                tracing::debug!("ListenBrainz rate limit reached, waiting {}s", reset_in);
                tokio::time::sleep(Duration::from_secs(reset_in)).await;
            }
            *state = RateLimitState::default();
        }
    }

    async fn update(&self, headers: &HeaderMap) {
        let header_u64 = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
        };

        let mut state = self.state.lock().await;
        state.remaining = header_u64(RATELIMIT_REMAINING);
        state.reset_in = header_u64(RATELIMIT_RESET_IN);
    }
}

/// Map a transport failure onto the submission error taxonomy
fn classify(err: reqwest::Error) -> SubmitError {
    if err.is_connect() || err.is_timeout() || err.is_request() || err.is_body() {
        SubmitError::Transient(err.to_string())
    } else {
        SubmitError::Unexpected(err.to_string())
    }
}

/// ListenBrainz API client
pub struct ListenBrainzClient {
    http_client: reqwest::Client,
    rate_limiter: RateLimiter,
    api_url: String,
    auth_token: String,
    user_name: Option<String>,
}

impl ListenBrainzClient {
    /// Build a client without contacting the service
    pub fn new(api_url: &str, auth_token: &str) -> Result<Self, SubmitError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| SubmitError::Unexpected(e.to_string()))?;

        Ok(Self {
            http_client,
            rate_limiter: RateLimiter::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            auth_token: auth_token.to_string(),
            user_name: None,
        })
    }

    /// Build a client and validate its token
    ///
    /// Fails with [`SubmitError::InvalidToken`] before any listen is read when the
    /// service does not accept the token.
    pub async fn connect(api_url: &str, auth_token: &str) -> Result<Self, SubmitError> {
        let mut client = Self::new(api_url, auth_token)?;
        client.user_name = Some(client.validate_token().await?);
        Ok(client)
    }

    /// User the token belongs to, once validated
    pub fn user_name(&self) -> Option<&str> {
        self.user_name.as_deref()
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/1/{}", self.api_url, path)
    }

    fn auth_header(&self) -> String {
        format!("Token {}", self.auth_token)
    }

    /// Check the token with the service, returning the owning user name
    pub async fn validate_token(&self) -> Result<String, SubmitError> {
        tracing::debug!("Validating ListenBrainz auth token");

        let response = self
            .http_client
            .get(self.endpoint("validate-token"))
            .header(AUTHORIZATION, self.auth_header())
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(SubmitError::InvalidToken);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SubmitError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: ValidateTokenResponse = response.json().await.map_err(|e| {
            if e.is_decode() {
                SubmitError::Unexpected(e.to_string())
            } else {
                classify(e)
            }
        })?;

        if !body.valid {
            tracing::warn!("ListenBrainz reports the auth token as invalid");
            return Err(SubmitError::InvalidToken);
        }

        let user_name = body.user_name.unwrap_or_default();
        tracing::info!(user = %user_name, "ListenBrainz auth token is valid");
        Ok(user_name)
    }
}

#[async_trait]
impl SubmissionClient for ListenBrainzClient {
    async fn submit_many(&self, listens: &[Listen]) -> Result<(), SubmitError> {
        if listens.is_empty() {
            return Ok(());
        }

        self.rate_limiter.wait().await;

        tracing::info!("Submitting {} listen(s)...", listens.len());

        let body = SubmitListensBody {
            listen_type: "import",
            payload: listens.iter().map(ListenPayload::from).collect(),
        };

        let response = self
            .http_client
            .post(self.endpoint("submit-listens"))
            .header(AUTHORIZATION, self.auth_header())
            .json(&body)
            .send()
            .await
            .map_err(classify)?;

        self.rate_limiter.update(response.headers()).await;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(SubmitError::InvalidToken);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "ListenBrainz rejected submission");
            return Err(SubmitError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: SubmitResponse = response.json().await.map_err(|e| {
            if e.is_decode() {
                SubmitError::Unexpected(e.to_string())
            } else {
                classify(e)
            }
        })?;

        if parsed.status != "ok" {
            return Err(SubmitError::Unexpected(format!(
                "status '{}'",
                parsed.status
            )));
        }

        Ok(())
    }
}
