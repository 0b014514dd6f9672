//! LRCLIB API client.
//!
//! Four calls, each run through [`RetryPolicy::run`]:
//!
//! | call                | endpoint                  | 404 means       |
//! |---------------------|---------------------------|-----------------|
//! | [`get_cached`]      | `GET /get-cached`         | not published   |
//! | [`get_external`]    | `GET /get`                | nothing found   |
//! | [`request_challenge`] | `POST /request-challenge` | protocol error |
//! | [`publish`]         | `POST /publish`           | protocol error  |
//!
//! [`get_cached`]: LrclibClient::get_cached
//! [`get_external`]: LrclibClient::get_external
//! [`request_challenge`]: LrclibClient::request_challenge
//! [`publish`]: LrclibClient::publish

use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use core_runtime::config::AppConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{PublishError, Result};
use crate::models::{ApiRecord, LyricsQuery, LyricsRecord, PublishPayload};
use crate::pow::{Challenge, PublishToken};
use crate::retry::{CallResult, RetryPolicy};

/// Remote and local durations further apart than this get a warning.
pub const DURATION_TOLERANCE_SECS: f64 = 2.0;

pub const PUBLISH_TOKEN_HEADER: &str = "X-Publish-Token";

pub struct LrclibClient {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    user_agent: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl LrclibClient {
    pub fn new(http_client: Arc<dyn HttpClient>, config: &AppConfig) -> Self {
        Self {
            http_client,
            base_url: config.api_base.trim_end_matches('/').to_string(),
            user_agent: config.user_agent.clone(),
            timeout: config.request_timeout,
            retry: RetryPolicy::from_settings(&config.retry),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, request: HttpRequest) -> HttpRequest {
        request
            .header("User-Agent", self.user_agent.as_str())
            .header("Lrclib-Client", self.user_agent.as_str())
            .timeout(self.timeout)
    }

    async fn call(
        &self,
        label: &str,
        request: HttpRequest,
        cancel: &CancellationToken,
    ) -> Result<CallResult> {
        let request = self.request(request);
        self.retry
            .run(label, cancel, || self.http_client.execute(request.clone()))
            .await
    }

    /// Lyrics already published for exactly this track, if any.
    pub async fn get_cached(
        &self,
        query: &LyricsQuery,
        cancel: &CancellationToken,
    ) -> Result<Option<LyricsRecord>> {
        self.lookup("get-cached", query, cancel).await
    }

    /// Lyrics the service can find from external sources, if any.
    pub async fn get_external(
        &self,
        query: &LyricsQuery,
        cancel: &CancellationToken,
    ) -> Result<Option<LyricsRecord>> {
        self.lookup("get", query, cancel).await
    }

    async fn lookup(
        &self,
        endpoint: &str,
        query: &LyricsQuery,
        cancel: &CancellationToken,
    ) -> Result<Option<LyricsRecord>> {
        let mut request = HttpRequest::get(format!("{}/{}", self.base_url, endpoint));
        for (key, value) in query.to_query_pairs() {
            request = request.query(key, value);
        }

        debug!(endpoint, %query, "Looking up lyrics");
        let response = match self.call(endpoint, request, cancel).await? {
            CallResult::NotFound => {
                debug!(endpoint, "No lyrics found");
                return Ok(None);
            }
            CallResult::Success(response) => response,
        };

        let raw: ApiRecord = parse_json(endpoint, &response)?;
        let record = LyricsRecord::from_api(raw);
        check_duration(endpoint, query, &record);
        Ok(Some(record))
    }

    pub async fn request_challenge(&self, cancel: &CancellationToken) -> Result<Challenge> {
        const LABEL: &str = "request-challenge";
        let request = HttpRequest::post(format!("{}/{}", self.base_url, LABEL));

        match self.call(LABEL, request, cancel).await? {
            CallResult::Success(response) => {
                let challenge: Challenge = parse_json(LABEL, &response)?;
                debug!(prefix = %challenge.prefix, target = %challenge.target, "Received challenge");
                Ok(challenge)
            }
            CallResult::NotFound => Err(not_found(LABEL)),
        }
    }

    /// Publish `payload`. Any 2xx counts as success.
    pub async fn publish(
        &self,
        payload: &PublishPayload,
        token: &PublishToken,
        cancel: &CancellationToken,
    ) -> Result<()> {
        const LABEL: &str = "publish";
        let request = HttpRequest::post(format!("{}/{}", self.base_url, LABEL))
            .header(PUBLISH_TOKEN_HEADER, token.to_string())
            .json(payload)?;

        match self.call(LABEL, request, cancel).await? {
            CallResult::Success(response) => {
                info!(
                    status = response.status,
                    track = %payload.track_name,
                    artist = %payload.artist_name,
                    "Published lyrics"
                );
                Ok(())
            }
            CallResult::NotFound => Err(not_found(LABEL)),
        }
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(label: &str, response: &HttpResponse) -> Result<T> {
    response.json().map_err(|e| PublishError::Protocol {
        label: label.to_string(),
        reason: format!("invalid JSON: {}", e),
    })
}

fn not_found(label: &str) -> PublishError {
    PublishError::ClientError {
        label: label.to_string(),
        status: 404,
        body: String::new(),
    }
}

/// Log how far the remote duration is from the local one.
fn check_duration(label: &str, query: &LyricsQuery, record: &LyricsRecord) {
    let Some(remote) = record.duration else {
        return;
    };
    let delta = (remote - query.duration as f64).abs();
    if delta > DURATION_TOLERANCE_SECS {
        warn!(
            label,
            local = query.duration,
            remote,
            "Duration differs from the lyrics record"
        );
    } else {
        info!(label, local = query.duration, remote, "Duration matches");
    }
}
