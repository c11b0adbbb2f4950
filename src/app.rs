//! Process-wide application state and control flow.
//!
//! [`App`] is the explicit context that replaces ambient globals: it owns the
//! problem being edited, the current solution, the single user-visible
//! message slot, the session, and the last viewed history page. Every
//! operation runs to completion before the next one starts; failures land in
//! the message slot and the next successful operation clears it. A failure
//! never leaves a stale solution on display next to its error.

use crate::client::OptimizerClient;
use crate::error::{Error, Result};
use crate::history::{HistoryClient, HistoryPage};
use crate::report::{build_report, Report};
use crate::session::SessionManager;
use crate::types::{Problem, Solution};

pub struct App {
    pub problem: Problem,
    pub solution: Option<Solution>,
    /// The single user-visible error slot.
    pub message: Option<String>,
    session: SessionManager,
    optimizer: OptimizerClient,
    history: HistoryClient,
    history_view: Option<HistoryPage>,
    /// Tag of the most recently issued history listing; responses for any
    /// other page are stale and dropped.
    requested_page: Option<u64>,
}

impl App {
    pub fn new(api_base: &str, session: SessionManager) -> Result<Self> {
        Ok(Self {
            problem: Problem::default(),
            solution: None,
            message: None,
            session,
            optimizer: OptimizerClient::new(api_base)?,
            history: HistoryClient::new(api_base)?,
            history_view: None,
            requested_page: None,
        })
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionManager {
        &mut self.session
    }

    pub fn history_view(&self) -> Option<&HistoryPage> {
        self.history_view.as_ref()
    }

    /// Submits the current problem. On success the solution replaces any
    /// prior one and the message slot clears; on failure the classified
    /// message replaces any prior solution.
    pub async fn optimize(&mut self) -> Result<()> {
        let result = self
            .optimizer
            .optimize(&self.problem, self.session.credential())
            .await;
        match result {
            Ok(solution) => {
                self.solution = Some(solution);
                self.message = None;
                Ok(())
            }
            Err(e) => {
                self.solution = None;
                Err(self.fail(e.into()))
            }
        }
    }

    /// Builds the presentation model for the current solution.
    pub fn report(&self) -> Result<Option<Report>> {
        let Some(solution) = &self.solution else {
            return Ok(None);
        };
        match build_report(&self.problem.boards, solution) {
            Ok(report) => Ok(Some(report)),
            Err(e) => Err(Error::Report(e)),
        }
    }

    /// Checks whether the optimizer is awake.
    pub async fn ping(&self) -> bool {
        self.optimizer.ping().await
    }

    /// Fetches a history page and makes it the open history view. A response
    /// that arrives for a page other than the one most recently requested is
    /// discarded rather than clobbering the newer view.
    pub async fn open_history(&mut self, page: u64) -> Result<&HistoryPage> {
        let page = page.max(1);
        self.requested_page = Some(page);
        match self.history.list(page, self.session.credential()).await {
            Ok(fetched) => {
                if self.requested_page == Some(fetched.page) {
                    self.history_view = Some(fetched);
                    self.message = None;
                }
                self.history_view
                    .as_ref()
                    .ok_or_else(|| Error::Config("history view vanished".to_string()))
            }
            Err(e) => Err(self.fail(e.into())),
        }
    }

    /// Fetches one full entry for display, without touching the problem.
    pub async fn fetch_entry(&mut self, id: &str) -> Result<crate::types::HistoryEntry> {
        match self.history.fetch(id, self.session.credential()).await {
            Ok(entry) => {
                self.message = None;
                Ok(entry)
            }
            Err(e) => Err(self.fail(e.into())),
        }
    }

    /// Loads a past run, replacing the problem and solution wholesale with
    /// the entry's stored values. The entry itself is untouched; this is a
    /// copy, not a live link.
    pub async fn reload_entry(&mut self, id: &str) -> Result<()> {
        match self.history.fetch(id, self.session.credential()).await {
            Ok(entry) => {
                self.problem = Problem {
                    cuts: entry.cuts,
                    boards: entry.boards,
                    project_name: entry.project_name,
                };
                self.solution = Some(entry.solution);
                self.message = None;
                Ok(())
            }
            Err(e) => Err(self.fail(e.into())),
        }
    }

    /// Deletes a past run, then re-lists the current page so the view
    /// reflects the removal even when the deleted entry was the last one on
    /// its page.
    pub async fn delete_entry(&mut self, id: &str) -> Result<&HistoryPage> {
        let current_page = self.history_view.as_ref().map(|p| p.page).unwrap_or(1);
        if let Err(e) = self.history.delete(id, self.session.credential()).await {
            return Err(self.fail(e.into()));
        }
        self.open_history(current_page).await
    }

    /// Logs out and closes the history view; history is scoped to the
    /// identity that just left and must not stay visible across the change.
    pub fn logout(&mut self) -> Result<()> {
        self.session.logout()?;
        self.history_view = None;
        self.requested_page = None;
        Ok(())
    }

    fn fail(&mut self, e: Error) -> Error {
        self.message = Some(e.to_string());
        e
    }
}
