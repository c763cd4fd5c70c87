//! Training status tracking for remote groups.
//!
//! The remote provider runs an asynchronous training job per group. Local
//! code never observes the job directly; it only reads the reported status
//! and fires the idempotent start-training trigger after member additions.

use std::sync::Arc;

use crate::error::GroupResult;
use crate::models::TrainingStatus;
use crate::remote::RemoteProvider;

/// Queries and triggers the remote training job for a group.
pub struct TrainingTracker<R: RemoteProvider> {
    remote: Arc<R>,
}

impl<R: RemoteProvider> TrainingTracker<R> {
    pub fn new(remote: Arc<R>) -> Self {
        Self { remote }
    }

    /// Read the current training status.
    pub async fn status(&self, remote_group_id: &str) -> GroupResult<TrainingStatus> {
        self.remote.training_status(remote_group_id).await
    }

    /// Make sure training is running (or done) after a member addition.
    ///
    /// Queries the status and, unless it is already Completed, fires
    /// start_training. A failed status read does not block the trigger: we
    /// attempt the start anyway, since training must not be wedged by a
    /// transient read failure. Trigger failures are logged and reported as
    /// Pending; the returned status is advisory for the caller's 200/202
    /// decision, not a gate on data already written.
    pub async fn ensure_training(&self, remote_group_id: &str) -> TrainingStatus {
        let observed = match self.remote.training_status(remote_group_id).await {
            Ok(status) => Some(status),
            Err(e) => {
                tracing::warn!(
                    remote_group_id = %remote_group_id,
                    error = %e,
                    "Training status read failed, attempting start anyway"
                );
                None
            }
        };

        if let Some(TrainingStatus::Completed) = observed {
            return TrainingStatus::Completed;
        }

        match self.remote.start_training(remote_group_id).await {
            Ok(()) => match observed {
                // A running job keeps its observed state; everything else is
                // now queued.
                Some(TrainingStatus::Training) => TrainingStatus::Training,
                _ => TrainingStatus::Pending,
            },
            Err(e) => {
                tracing::warn!(
                    remote_group_id = %remote_group_id,
                    error = %e,
                    "Failed to start training"
                );
                observed.unwrap_or(TrainingStatus::Pending)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FailKind, MockRemote};

    fn make_tracker() -> (TrainingTracker<MockRemote>, Arc<MockRemote>) {
        let remote = Arc::new(MockRemote::new());
        (TrainingTracker::new(remote.clone()), remote)
    }

    #[tokio::test]
    async fn test_completed_group_is_not_retrained() {
        let (tracker, remote) = make_tracker();
        remote.insert_group("rgrp_1", vec![]);
        remote.set_training("rgrp_1", TrainingStatus::Completed);

        let status = tracker.ensure_training("rgrp_1").await;

        assert_eq!(status, TrainingStatus::Completed);
        assert_eq!(remote.call_count("start_training"), 0);
    }

    #[tokio::test]
    async fn test_not_started_group_gets_triggered() {
        let (tracker, remote) = make_tracker();
        remote.insert_group("rgrp_1", vec![]);

        let status = tracker.ensure_training("rgrp_1").await;

        assert_eq!(status, TrainingStatus::Pending);
        assert_eq!(remote.call_count("start_training"), 1);
    }

    #[tokio::test]
    async fn test_double_trigger_never_errors() {
        let (tracker, remote) = make_tracker();
        remote.insert_group("rgrp_1", vec![]);

        tracker.ensure_training("rgrp_1").await;
        let status = tracker.ensure_training("rgrp_1").await;

        // Second call sees Training and re-fires the idempotent start
        assert_eq!(status, TrainingStatus::Training);
        assert_eq!(remote.call_count("start_training"), 2);
    }

    #[tokio::test]
    async fn test_status_read_failure_still_triggers_start() {
        let (tracker, remote) = make_tracker();
        remote.insert_group("rgrp_1", vec![]);
        remote.fail_status(FailKind::Unavailable);

        let status = tracker.ensure_training("rgrp_1").await;

        assert_eq!(status, TrainingStatus::Pending);
        assert_eq!(remote.call_count("start_training"), 1);
    }

    #[tokio::test]
    async fn test_start_failure_reports_observed_status() {
        let (tracker, remote) = make_tracker();
        remote.insert_group("rgrp_1", vec![]);
        remote.set_training("rgrp_1", TrainingStatus::Failed);
        remote.fail_start(FailKind::Unavailable);

        let status = tracker.ensure_training("rgrp_1").await;

        // Trigger failed; caller sees the last observed state, never an error
        assert_eq!(status, TrainingStatus::Failed);
    }

    #[tokio::test]
    async fn test_failed_training_is_requeued() {
        let (tracker, remote) = make_tracker();
        remote.insert_group("rgrp_1", vec![]);
        remote.set_training("rgrp_1", TrainingStatus::Failed);

        let status = tracker.ensure_training("rgrp_1").await;

        assert_eq!(status, TrainingStatus::Pending);
        assert_eq!(remote.call_count("start_training"), 1);
    }
}
