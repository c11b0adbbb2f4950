//! Paginated history of past optimization runs.
//!
//! Entries are created server-side when an authenticated optimize succeeds;
//! this module only lists, fetches, and deletes them. Every operation
//! requires a credential and fails with a typed "not logged in" error before
//! any network call when none is present. The server returns entries in
//! descending creation-time order and the client never reorders them.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::client::{rejection_message, SERVICE_WAKING_MESSAGE};
use crate::types::{Credential, HistoryEntry};

const USER_AGENT: &str = concat!("cut_planner/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(45);

/// Fixed page size for history listings.
pub const PAGE_SIZE: u64 = 10;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Log in to use your optimization history")]
    NotLoggedIn,

    /// The credential was rejected mid-session.
    #[error("Your session has expired, log in again")]
    Unauthorized,

    /// The service rejected the request and said why.
    #[error("{0}")]
    Rejected(String),

    #[error("{SERVICE_WAKING_MESSAGE}")]
    ServiceWaking,

    #[error("The service returned an unreadable response: {0}")]
    Parse(String),

    #[error("Could not build HTTP client: {0}")]
    Init(String),
}

/// One row of a history listing. The full problem and solution come from
/// [`HistoryClient::fetch`], not the listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HistorySummary {
    pub id: String,
    #[serde(default)]
    pub project_name: Option<String>,
    pub total_cost: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct ListResponse {
    optimizations: Vec<HistorySummary>,
    total: u64,
}

/// One fetched page. Carries the page number it was requested for, so a
/// caller juggling rapid page navigation can discard responses that arrive
/// for a page it has since left (last-issued request wins).
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryPage {
    /// 1-indexed page this response answers.
    pub page: u64,
    pub page_size: u64,
    pub entries: Vec<HistorySummary>,
    /// Total entries across all pages, per the server.
    pub total: u64,
}

impl HistoryPage {
    pub fn total_pages(&self) -> u64 {
        self.total.div_ceil(self.page_size)
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }
}

/// Client for the history endpoints.
pub struct HistoryClient {
    http: reqwest::Client,
    api_base: String,
}

impl HistoryClient {
    pub fn new(api_base: &str) -> Result<Self, HistoryError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| HistoryError::Init(e.to_string()))?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    /// Fetches one page of entry summaries plus the total count.
    pub async fn list(
        &self,
        page: u64,
        credential: Option<&Credential>,
    ) -> Result<HistoryPage, HistoryError> {
        let credential = credential.ok_or(HistoryError::NotLoggedIn)?;
        let page = page.max(1);

        tracing::info!(page, "listing history");
        let response = self
            .http
            .get(format!(
                "{}/optimizations?page={}&limit={}",
                self.api_base, page, PAGE_SIZE
            ))
            .bearer_auth(&credential.access_token)
            .send()
            .await
            .map_err(|e| unreachable_service(&e))?;

        let body: ListResponse = read_json(response).await?;
        Ok(HistoryPage {
            page,
            page_size: PAGE_SIZE,
            entries: body.optimizations,
            total: body.total,
        })
    }

    /// Fetches one full entry by id. The caller splices it into the domain
    /// model wholesale, replacing the current cuts, boards, solution, and
    /// project name.
    pub async fn fetch(
        &self,
        id: &str,
        credential: Option<&Credential>,
    ) -> Result<HistoryEntry, HistoryError> {
        let credential = credential.ok_or(HistoryError::NotLoggedIn)?;

        tracing::info!(id, "fetching history entry");
        let response = self
            .http
            .get(format!("{}/optimizations/{}", self.api_base, id))
            .bearer_auth(&credential.access_token)
            .send()
            .await
            .map_err(|e| unreachable_service(&e))?;

        read_json(response).await
    }

    /// Deletes one entry. The caller must re-list the current page
    /// afterwards; re-fetching, not local splicing, is what keeps the view
    /// correct when the deleted entry was the last one on its page.
    pub async fn delete(
        &self,
        id: &str,
        credential: Option<&Credential>,
    ) -> Result<(), HistoryError> {
        let credential = credential.ok_or(HistoryError::NotLoggedIn)?;

        tracing::info!(id, "deleting history entry");
        let response = self
            .http
            .delete(format!("{}/optimizations/{}", self.api_base, id))
            .bearer_auth(&credential.access_token)
            .send()
            .await
            .map_err(|e| unreachable_service(&e))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(HistoryError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HistoryError::Rejected(rejection_message(status, &body)));
        }
        Ok(())
    }
}

fn unreachable_service(e: &reqwest::Error) -> HistoryError {
    tracing::warn!(error = %e, "history service unreachable");
    HistoryError::ServiceWaking
}

async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, HistoryError> {
    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(HistoryError::Unauthorized);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(HistoryError::Rejected(rejection_message(status, &body)));
    }
    response
        .json()
        .await
        .map_err(|e| HistoryError::Parse(e.to_string()))
}
