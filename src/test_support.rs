//! Shared test fixtures: an in-memory remote provider with programmable
//! failures, used by the training, lifecycle, and sync tests.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{GroupError, GroupResult};
use crate::models::{RemoteStatus, TrainingStatus};
use crate::remote::{RemoteMember, RemoteProvider};

/// Which error a programmed failure should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailKind {
    Unavailable,
    NotFound,
    Conflict,
}

impl FailKind {
    fn to_error(self, context: &str) -> GroupError {
        match self {
            FailKind::Unavailable => {
                GroupError::remote_unavailable(format!("{}: injected failure", context))
            }
            FailKind::NotFound => GroupError::not_found(format!("{}: injected failure", context)),
            FailKind::Conflict => {
                GroupError::RemoteConflict(format!("{}: injected failure", context))
            }
        }
    }
}

#[derive(Debug, Default)]
struct MockRemoteState {
    groups: HashMap<String, Vec<RemoteMember>>,
    training: HashMap<String, TrainingStatus>,
    group_seq: u64,
    member_seq: u64,
    create_fails: Option<FailKind>,
    add_fails: Option<FailKind>,
    list_fails: Option<FailKind>,
    remove_fails: Option<FailKind>,
    start_fails: Option<FailKind>,
    status_fails: Option<FailKind>,
}

/// In-memory stand-in for the remote provider.
///
/// Records every call in a log so tests can assert on exact call sequences
/// (for example, that create_group always receives a seed locator).
#[derive(Debug, Default)]
pub struct MockRemote {
    state: Mutex<MockRemoteState>,
    calls: Mutex<Vec<String>>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a copy of the call log
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Count calls whose log entry starts with `prefix`
    pub fn call_count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn log(&self, entry: String) {
        self.calls.lock().unwrap().push(entry);
    }

    /// Get the members of a remote group (test inspection)
    pub fn members(&self, remote_group_id: &str) -> Vec<RemoteMember> {
        self.state
            .lock()
            .unwrap()
            .groups
            .get(remote_group_id)
            .cloned()
            .unwrap_or_default()
    }

    /// True if the remote group exists
    pub fn group_exists(&self, remote_group_id: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .groups
            .contains_key(remote_group_id)
    }

    /// Seed a pre-existing remote group with members (for claim/sync tests)
    pub fn insert_group(&self, remote_group_id: &str, members: Vec<RemoteMember>) {
        let mut state = self.state.lock().unwrap();
        state.groups.insert(remote_group_id.to_string(), members);
        state
            .training
            .entry(remote_group_id.to_string())
            .or_insert(TrainingStatus::NotStarted);
    }

    /// Delete a remote group out-of-band (simulates remote-side deletion)
    pub fn drop_group(&self, remote_group_id: &str) {
        let mut state = self.state.lock().unwrap();
        state.groups.remove(remote_group_id);
        state.training.remove(remote_group_id);
    }

    /// Force the training status of a group
    pub fn set_training(&self, remote_group_id: &str, status: TrainingStatus) {
        self.state
            .lock()
            .unwrap()
            .training
            .insert(remote_group_id.to_string(), status);
    }

    pub fn fail_create(&self, kind: FailKind) {
        self.state.lock().unwrap().create_fails = Some(kind);
    }

    pub fn fail_add(&self, kind: FailKind) {
        self.state.lock().unwrap().add_fails = Some(kind);
    }

    pub fn fail_list(&self, kind: FailKind) {
        self.state.lock().unwrap().list_fails = Some(kind);
    }

    pub fn fail_remove(&self, kind: FailKind) {
        self.state.lock().unwrap().remove_fails = Some(kind);
    }

    pub fn fail_start(&self, kind: FailKind) {
        self.state.lock().unwrap().start_fails = Some(kind);
    }

    pub fn fail_status(&self, kind: FailKind) {
        self.state.lock().unwrap().status_fails = Some(kind);
    }

    /// Fail every remote call with RemoteUnavailable
    pub fn fail_everything(&self) {
        let mut state = self.state.lock().unwrap();
        state.create_fails = Some(FailKind::Unavailable);
        state.add_fails = Some(FailKind::Unavailable);
        state.list_fails = Some(FailKind::Unavailable);
        state.remove_fails = Some(FailKind::Unavailable);
        state.start_fails = Some(FailKind::Unavailable);
        state.status_fails = Some(FailKind::Unavailable);
    }

    /// Clear all programmed failures
    pub fn heal(&self) {
        let mut state = self.state.lock().unwrap();
        state.create_fails = None;
        state.add_fails = None;
        state.list_fails = None;
        state.remove_fails = None;
        state.start_fails = None;
        state.status_fails = None;
    }
}

impl RemoteProvider for MockRemote {
    async fn create_group(&self, name: &str, seed_locator: &str) -> GroupResult<String> {
        self.log(format!("create_group:{}:{}", name, seed_locator));

        let mut state = self.state.lock().unwrap();
        if let Some(kind) = state.create_fails {
            return Err(kind.to_error("create_group"));
        }
        assert!(
            !seed_locator.trim().is_empty(),
            "create_group called without a seed locator"
        );

        state.group_seq += 1;
        state.member_seq += 1;
        let group_id = format!("rgrp_{}", state.group_seq);
        let member = RemoteMember {
            member_id: format!("rmem_{}", state.member_seq),
            locator: seed_locator.to_string(),
            status: RemoteStatus::Pending,
        };
        state.groups.insert(group_id.clone(), vec![member]);
        state
            .training
            .insert(group_id.clone(), TrainingStatus::NotStarted);

        Ok(group_id)
    }

    async fn add_members(
        &self,
        remote_group_id: &str,
        locators: &[String],
        batch_name: &str,
    ) -> GroupResult<Vec<RemoteMember>> {
        self.log(format!(
            "add_members:{}:{}:{}",
            remote_group_id,
            locators.join(","),
            batch_name
        ));

        let mut state = self.state.lock().unwrap();
        if let Some(kind) = state.add_fails {
            return Err(kind.to_error("add_members"));
        }

        let seq = &mut state.member_seq;
        let mut added = Vec::new();
        for locator in locators {
            *seq += 1;
            added.push(RemoteMember {
                member_id: format!("rmem_{}", seq),
                locator: locator.clone(),
                status: RemoteStatus::Pending,
            });
        }

        match state.groups.get_mut(remote_group_id) {
            Some(members) => members.extend(added.clone()),
            None => return Err(GroupError::not_found(format!("group {}", remote_group_id))),
        }

        Ok(added)
    }

    async fn list_members(&self, remote_group_id: &str) -> GroupResult<Vec<RemoteMember>> {
        self.log(format!("list_members:{}", remote_group_id));

        let state = self.state.lock().unwrap();
        if let Some(kind) = state.list_fails {
            return Err(kind.to_error("list_members"));
        }

        match state.groups.get(remote_group_id) {
            Some(members) => Ok(members.clone()),
            None => Err(GroupError::not_found(format!("group {}", remote_group_id))),
        }
    }

    async fn remove_member(&self, remote_group_id: &str, locator: &str) -> GroupResult<()> {
        self.log(format!("remove_member:{}:{}", remote_group_id, locator));

        let mut state = self.state.lock().unwrap();
        if let Some(kind) = state.remove_fails {
            return Err(kind.to_error("remove_member"));
        }

        if let Some(members) = state.groups.get_mut(remote_group_id) {
            members.retain(|m| m.locator != locator);
        }
        Ok(())
    }

    async fn start_training(&self, remote_group_id: &str) -> GroupResult<()> {
        self.log(format!("start_training:{}", remote_group_id));

        let mut state = self.state.lock().unwrap();
        if let Some(kind) = state.start_fails {
            return Err(kind.to_error("start_training"));
        }

        // Restarting while a job is running is not an error
        state
            .training
            .insert(remote_group_id.to_string(), TrainingStatus::Training);
        Ok(())
    }

    async fn training_status(&self, remote_group_id: &str) -> GroupResult<TrainingStatus> {
        self.log(format!("training_status:{}", remote_group_id));

        let state = self.state.lock().unwrap();
        if let Some(kind) = state.status_fails {
            return Err(kind.to_error("training_status"));
        }

        Ok(state
            .training
            .get(remote_group_id)
            .copied()
            .unwrap_or(TrainingStatus::NotStarted))
    }
}
