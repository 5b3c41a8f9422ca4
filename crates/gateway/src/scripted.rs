//! In-process gateway that replays canned responses.
//!
//! Used by runner and orchestrator tests, and handy for driving the
//! orchestration layer without a processor deployment. Progress steps are
//! consumed in order; once the script runs out, the last step repeats.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use hirebatch_core::JobId;

use crate::gateway::{
    GatewayError, ProgressGateway, ProgressSnapshot, SubmissionGateway, SubmitReceipt,
};

/// One scripted response to a progress query.
#[derive(Debug, Clone)]
pub enum ProgressStep {
    Snapshot(ProgressSnapshot),
    /// The processor answers "no such job".
    Missing,
    /// The query fails with a transport error.
    Fail(String),
}

#[derive(Debug, Clone)]
enum SubmitBehaviour {
    Accept(JobId),
    Reject(String),
}

/// Scripted implementation of both gateway traits.
pub struct ScriptedGateway {
    submit: Mutex<SubmitBehaviour>,
    steps: Mutex<VecDeque<ProgressStep>>,
    last_step: Mutex<Option<ProgressStep>>,
    submissions: Mutex<Vec<(String, serde_json::Value)>>,
    polls: Mutex<Vec<String>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedGateway {
    /// Accepts every submission as `job-1`; progress reports zeros until
    /// steps are added.
    pub fn new() -> Self {
        Self {
            submit: Mutex::new(SubmitBehaviour::Accept(JobId::new("job-1"))),
            steps: Mutex::new(VecDeque::new()),
            last_step: Mutex::new(None),
            submissions: Mutex::new(Vec::new()),
            polls: Mutex::new(Vec::new()),
        }
    }

    /// Accept submissions under the given job id.
    pub fn accept_as(self, job_id: impl Into<JobId>) -> Self {
        *lock(&self.submit) = SubmitBehaviour::Accept(job_id.into());
        self
    }

    /// Fail every submission with a transport error.
    pub fn reject_submissions(self, reason: impl Into<String>) -> Self {
        *lock(&self.submit) = SubmitBehaviour::Reject(reason.into());
        self
    }

    pub fn then_progress(self, snapshot: ProgressSnapshot) -> Self {
        self.push(ProgressStep::Snapshot(snapshot))
    }

    /// Append the same snapshot `times` times.
    pub fn then_progress_repeated(self, snapshot: ProgressSnapshot, times: usize) -> Self {
        (0..times).fold(self, |gw, _| gw.then_progress(snapshot))
    }

    pub fn then_missing(self) -> Self {
        self.push(ProgressStep::Missing)
    }

    pub fn then_fail(self, reason: impl Into<String>) -> Self {
        self.push(ProgressStep::Fail(reason.into()))
    }

    /// Append a step after construction (e.g. while a runner is polling).
    pub fn push_step(&self, step: ProgressStep) {
        lock(&self.steps).push_back(step);
    }

    fn push(self, step: ProgressStep) -> Self {
        self.push_step(step);
        self
    }

    pub fn submit_count(&self) -> usize {
        lock(&self.submissions).len()
    }

    pub fn submitted_payloads(&self) -> Vec<(String, serde_json::Value)> {
        lock(&self.submissions).clone()
    }

    pub fn poll_count(&self) -> usize {
        lock(&self.polls).len()
    }

    pub fn polled_endpoints(&self) -> Vec<String> {
        lock(&self.polls).clone()
    }

    fn next_step(&self) -> ProgressStep {
        let next = lock(&self.steps).pop_front();
        let mut last = lock(&self.last_step);
        match next {
            Some(step) => {
                *last = Some(step.clone());
                step
            }
            None => last
                .clone()
                .unwrap_or(ProgressStep::Snapshot(ProgressSnapshot::default())),
        }
    }
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SubmissionGateway for ScriptedGateway {
    async fn submit(
        &self,
        endpoint: &str,
        payload: &serde_json::Value,
    ) -> Result<SubmitReceipt, GatewayError> {
        lock(&self.submissions).push((endpoint.to_string(), payload.clone()));

        let behaviour = lock(&self.submit).clone();
        match behaviour {
            SubmitBehaviour::Accept(job_id) => {
                let item_count = payload
                    .get("item_ids")
                    .and_then(|ids| ids.as_array())
                    .map_or(0, |ids| ids.len() as u64);
                Ok(SubmitReceipt { job_id, item_count })
            }
            SubmitBehaviour::Reject(reason) => Err(GatewayError::Transport(reason)),
        }
    }
}

#[async_trait]
impl ProgressGateway for ScriptedGateway {
    async fn fetch_progress(
        &self,
        endpoint: &str,
    ) -> Result<Option<ProgressSnapshot>, GatewayError> {
        lock(&self.polls).push(endpoint.to_string());

        match self.next_step() {
            ProgressStep::Snapshot(snapshot) => Ok(Some(snapshot)),
            ProgressStep::Missing => Ok(None),
            ProgressStep::Fail(reason) => Err(GatewayError::Transport(reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[tokio::test]
    async fn last_step_repeats_after_script_runs_out() {
        let gw = ScriptedGateway::new()
            .then_progress(ProgressSnapshot::new(10, 1, 0))
            .then_progress(ProgressSnapshot::new(10, 2, 0));

        let a = gw.fetch_progress("/p").await.unwrap().unwrap();
        let b = gw.fetch_progress("/p").await.unwrap().unwrap();
        let c = gw.fetch_progress("/p").await.unwrap().unwrap();

        assert_eq!(a.completed, 1);
        assert_eq!(b.completed, 2);
        assert_eq!(c.completed, 2);
        assert_eq!(gw.poll_count(), 3);
    }

    #[tokio::test]
    async fn accepted_submission_counts_items() {
        let gw = ScriptedGateway::new().accept_as("job-9");
        let payload = serde_json::json!({"target_id": "t", "item_ids": ["a", "b", "c"]});

        let receipt = gw.submit("/batches", &payload).await.unwrap();

        assert_eq!(receipt.job_id.as_str(), "job-9");
        assert_eq!(receipt.item_count, 3);
        assert_eq!(gw.submit_count(), 1);
    }

    #[tokio::test]
    async fn rejected_submission_is_transport_error() {
        let gw = ScriptedGateway::new().reject_submissions("connection refused");
        let result = gw.submit("/batches", &serde_json::json!({})).await;
        assert_matches!(result, Err(GatewayError::Transport(reason)) if reason == "connection refused");
    }

    #[tokio::test]
    async fn missing_and_failing_steps() {
        let gw = ScriptedGateway::new().then_fail("timeout").then_missing();
        assert!(gw.fetch_progress("/p").await.is_err());
        assert_matches!(gw.fetch_progress("/p").await, Ok(None));
    }
}
