use crate::config::PollPolicy;
use crate::error::{PollError, StatusError};
use crate::models::{Artifact, JobId, PollAttempt, PollOutcome};
use crate::services::job_api::{JobApi, JobStatus};
use chrono::Utc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Bounded, strictly sequential status polling for one job.
pub struct Poller<'a> {
    api: &'a dyn JobApi,
    policy: PollPolicy,
    cancel: CancellationToken,
    attempts: Vec<PollAttempt>,
}

impl<'a> Poller<'a> {
    pub fn new(api: &'a dyn JobApi, policy: PollPolicy) -> Self {
        Self {
            api,
            policy,
            cancel: CancellationToken::new(),
            attempts: Vec::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn attempts(&self) -> &[PollAttempt] {
        &self.attempts
    }

    /// Polls until the job yields an artifact, reports an error, or the
    /// attempt budget runs out.
    ///
    /// Transport failures and unrecognised bodies count as attempts but do
    /// not end the loop.
    pub async fn run(&mut self, job_id: &JobId) -> Result<Artifact, PollError> {
        tracing::info!(
            "⏱️  Polling {} up to {} times every {:?} (budget {:?})",
            job_id,
            self.policy.max_attempts,
            self.policy.interval,
            self.policy.budget()
        );

        for sequence in 0..self.policy.max_attempts {
            if sequence > 0 {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Err(self.cancelled(job_id)),
                    _ = sleep(self.policy.interval) => {}
                }
            }

            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(self.cancelled(job_id)),
                result = self.api.job_status(job_id) => result,
            };

            let outcome = match result {
                Ok(JobStatus::Running) => PollOutcome::Running,
                Ok(JobStatus::Completed(artifact)) => PollOutcome::Completed(artifact),
                Ok(JobStatus::Failed(message)) => PollOutcome::Failed(message),
                Err(StatusError::Timeout) => PollOutcome::Timeout,
                Err(e) => PollOutcome::TransientError(e.to_string()),
            };

            tracing::debug!(
                "Poll #{} for {}: {}",
                sequence + 1,
                job_id,
                outcome_label(&outcome)
            );

            self.attempts.push(PollAttempt {
                sequence,
                timestamp: Utc::now(),
                outcome: outcome.clone(),
            });

            match outcome {
                PollOutcome::Completed(artifact) => {
                    tracing::info!("✅ Job {} finished after {} checks", job_id, sequence + 1);
                    return Ok(artifact);
                }
                PollOutcome::Failed(message) => {
                    tracing::error!("❌ Job {} failed: {}", job_id, message);
                    return Err(PollError::Remote(message));
                }
                PollOutcome::Running => {}
                PollOutcome::TransientError(message) => {
                    tracing::warn!("⏳ Still processing or failed: {}", message);
                }
                PollOutcome::Timeout => {
                    tracing::warn!("⏳ Status request for {} timed out", job_id);
                }
            }
        }

        tracing::warn!(
            "⌛ Job {} unresolved after {} checks",
            job_id,
            self.policy.max_attempts
        );
        Err(PollError::Timeout {
            attempts: self.policy.max_attempts,
        })
    }

    fn cancelled(&self, job_id: &JobId) -> PollError {
        tracing::info!(
            "🛑 Polling for {} cancelled after {} checks",
            job_id,
            self.attempts.len()
        );
        PollError::Cancelled
    }
}

fn outcome_label(outcome: &PollOutcome) -> &'static str {
    match outcome {
        PollOutcome::Running => "running",
        PollOutcome::Completed(Artifact::Inline(_)) => "completed (inline)",
        PollOutcome::Completed(Artifact::Reference(_)) => "completed (url)",
        PollOutcome::Failed(_) => "failed",
        PollOutcome::TransientError(_) => "transient error",
        PollOutcome::Timeout => "request timeout",
    }
}

/// Convenience wrapper around [`Poller::run`].
pub async fn poll_until_resolved(
    api: &dyn JobApi,
    job_id: &JobId,
    policy: PollPolicy,
    cancel: CancellationToken,
) -> Result<Artifact, PollError> {
    Poller::new(api, policy)
        .with_cancellation(cancel)
        .run(job_id)
        .await
}
