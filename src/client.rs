//! HTTP client for the remote optimizer.
//!
//! Owns the request/response exchange with `POST /optimize`: building the
//! body from a [`Problem`], attaching the bearer token when a session is
//! present, and classifying the response into a typed success or failure.
//! The optimizer itself runs on free-tier hosting and is suspended between
//! uses, so transport-level failures are reported as a fixed warm-up message
//! rather than the raw network error.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;

use crate::types::{Credential, Problem, Solution};

const USER_AGENT: &str = concat!("cut_planner/", env!("CARGO_PKG_VERSION"));

/// Generous enough to ride out a cold start; hitting it is classified the
/// same as not reaching the service at all.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(45);

/// Shown whenever the optimizer cannot be reached at the transport level.
pub const SERVICE_WAKING_MESSAGE: &str =
    "The optimization service is waking up from sleep. Please try again in about 30 seconds.";

/// Optimizer client errors. `Rejected` carries the service's own message
/// verbatim; everything else has fixed user-facing text.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Add at least one cut and one board before optimizing")]
    EmptyProblem,

    /// The service rejected the problem and said why.
    #[error("{0}")]
    Rejected(String),

    /// The request never reached the service (refused, DNS, timeout).
    #[error("{SERVICE_WAKING_MESSAGE}")]
    ServiceWaking,

    /// A second optimize was attempted while one is outstanding.
    #[error("An optimization is already running, wait for it to finish")]
    RequestInFlight,

    #[error("The optimizer returned an unreadable response: {0}")]
    Parse(String),

    #[error("Could not build HTTP client: {0}")]
    Init(String),
}

/// The structured non-2xx body the service sends on rejection.
#[derive(serde::Deserialize)]
struct ErrorBody {
    error: String,
}

/// Client for the optimizer service.
pub struct OptimizerClient {
    http: reqwest::Client,
    api_base: String,
    // One optimize in flight at a time. Callers cannot be trusted to
    // serialize, so a second concurrent call is rejected, not queued.
    in_flight: Mutex<()>,
}

impl OptimizerClient {
    pub fn new(api_base: &str) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Init(e.to_string()))?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            in_flight: Mutex::new(()),
        })
    }

    /// Submits the problem and returns the optimizer's solution.
    ///
    /// Anonymous submission is permitted: with no credential the request
    /// simply carries no bearer header and the service records no history
    /// entry. History persistence is entirely server-side; a caller must not
    /// assume an entry exists until the history listing shows it.
    pub async fn optimize(
        &self,
        problem: &Problem,
        credential: Option<&Credential>,
    ) -> Result<Solution, ClientError> {
        if !problem.is_submittable() {
            return Err(ClientError::EmptyProblem);
        }

        let _guard = self
            .in_flight
            .try_lock()
            .map_err(|_| ClientError::RequestInFlight)?;

        tracing::info!(
            cuts = problem.cuts.len(),
            boards = problem.boards.len(),
            authenticated = credential.is_some(),
            "submitting optimize request"
        );

        let mut request = self
            .http
            .post(format!("{}/optimize", self.api_base))
            .json(problem);
        if let Some(credential) = credential {
            request = request.bearer_auth(&credential.access_token);
        }

        let response = request.send().await.map_err(|e| {
            tracing::warn!(error = %e, "optimizer unreachable");
            ClientError::ServiceWaking
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Rejected(rejection_message(status, &body)));
        }

        let solution: Solution = response
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))?;

        tracing::info!(
            board_kinds = solution.board_plan.len(),
            total_cost = solution.total_cost,
            "optimize succeeded"
        );
        Ok(solution)
    }

    /// Liveness probe against `GET /up`. Used to check whether the service
    /// is awake before committing to a long optimize call.
    pub async fn ping(&self) -> bool {
        match self.http.get(format!("{}/up", self.api_base)).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(error = %e, "ping failed");
                false
            }
        }
    }
}

/// Extracts the service's own message from a non-2xx body, preferring the
/// structured `{"error": ...}` shape, then raw body text, then a generic
/// line so the user never sees an empty error.
pub(crate) fn rejection_message(status: reqwest::StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return parsed.error;
    }
    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    format!("Optimization failed ({})", status.as_u16())
}
