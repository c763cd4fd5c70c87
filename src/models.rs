//! Shared status models for GroupCore.
//!
//! The persisted entity shapes (GroupRow, AssetRow) live in the store
//! module; this module holds the status vocabularies shared between the
//! store, the remote client, and the engine.

use serde::{Deserialize, Serialize};

/// Remote acceptance status of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RemoteStatus {
    /// Asset has not been pushed to the remote provider
    #[default]
    Unset,
    /// Accepted by the remote provider, processing not finished
    Pending,
    /// Fully processed and usable remotely
    Ready,
    /// Remote processing failed
    Failed,
}

impl RemoteStatus {
    /// Database / wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteStatus::Unset => "unset",
            RemoteStatus::Pending => "pending",
            RemoteStatus::Ready => "ready",
            RemoteStatus::Failed => "failed",
        }
    }

    /// Parse a stored or remote-reported status string.
    ///
    /// The remote API reports per-member status with varying vocabulary
    /// ("completed" and "ready" both mean usable). Unrecognized values map to
    /// Pending so a member is not treated as failed on a vocabulary change.
    pub fn parse(value: &str) -> Self {
        match value {
            "unset" => RemoteStatus::Unset,
            "pending" | "processing" | "in_progress" => RemoteStatus::Pending,
            "ready" | "completed" | "success" => RemoteStatus::Ready,
            "failed" | "error" => RemoteStatus::Failed,
            _ => RemoteStatus::Pending,
        }
    }
}

/// State of the remote asynchronous training job for a group.
///
/// The machine moves `NotStarted -> Pending -> Training -> Completed`, with
/// `Failed` reachable from Pending or Training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingStatus {
    NotStarted,
    Pending,
    Training,
    Completed,
    Failed,
}

impl TrainingStatus {
    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            TrainingStatus::NotStarted => "not_started",
            TrainingStatus::Pending => "pending",
            TrainingStatus::Training => "training",
            TrainingStatus::Completed => "completed",
            TrainingStatus::Failed => "failed",
        }
    }

    /// Parse a remote-reported training status string.
    ///
    /// Unknown values map to Pending: that keeps the training trigger armed
    /// (anything not Completed gets a start_training call) without reporting
    /// a spurious failure.
    pub fn parse(value: &str) -> Self {
        match value {
            "not_started" | "empty" => TrainingStatus::NotStarted,
            "pending" | "queued" => TrainingStatus::Pending,
            "training" | "in_progress" | "running" => TrainingStatus::Training,
            "completed" | "ready" | "success" => TrainingStatus::Completed,
            "failed" | "error" => TrainingStatus::Failed,
            _ => TrainingStatus::Pending,
        }
    }

    /// Check if training has finished successfully
    pub fn is_completed(&self) -> bool {
        matches!(self, TrainingStatus::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_status_round_trip() {
        for status in [
            RemoteStatus::Unset,
            RemoteStatus::Pending,
            RemoteStatus::Ready,
            RemoteStatus::Failed,
        ] {
            assert_eq!(RemoteStatus::parse(status.as_str()), status);
        }
    }

    #[test]
    fn test_remote_status_lenient_parse() {
        assert_eq!(RemoteStatus::parse("completed"), RemoteStatus::Ready);
        assert_eq!(RemoteStatus::parse("processing"), RemoteStatus::Pending);
        assert_eq!(RemoteStatus::parse("whatever"), RemoteStatus::Pending);
    }

    #[test]
    fn test_remote_status_serde_snake_case() {
        let json = serde_json::to_string(&RemoteStatus::Ready).unwrap();
        assert_eq!(json, "\"ready\"");
    }

    #[test]
    fn test_training_status_round_trip() {
        for status in [
            TrainingStatus::NotStarted,
            TrainingStatus::Pending,
            TrainingStatus::Training,
            TrainingStatus::Completed,
            TrainingStatus::Failed,
        ] {
            assert_eq!(TrainingStatus::parse(status.as_str()), status);
        }
    }

    #[test]
    fn test_training_status_lenient_parse() {
        assert_eq!(TrainingStatus::parse("in_progress"), TrainingStatus::Training);
        assert_eq!(TrainingStatus::parse("ready"), TrainingStatus::Completed);
        // Unknown strings keep the trigger armed
        assert_eq!(TrainingStatus::parse("mystery"), TrainingStatus::Pending);
        assert!(!TrainingStatus::parse("mystery").is_completed());
    }
}
