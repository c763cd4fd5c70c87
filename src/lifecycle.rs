//! Group lifecycle orchestration.
//!
//! This module implements the add/remove/delete/claim operations that keep
//! the local store and the remote provider in agreement. The local store is
//! authoritative: critical-path remote failures (group creation, member
//! addition) propagate to the caller, while remote cleanup is best-effort
//! and reported through explicit `Outcome` values instead of bare logs.

use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::error::{GroupError, GroupResult};
use crate::models::{RemoteStatus, TrainingStatus};
use crate::remote::{RemoteMember, RemoteProvider};
use crate::store::{AssetRow, GroupRow, Store};
use crate::training::TrainingTracker;
use crate::validation::{validate_display_name, validate_remote_id};

/// Result of one best-effort sub-step, aggregated into operation responses.
///
/// Best-effort failures must stay visible to callers (and tests) without
/// failing the overall operation, so they travel as data rather than as logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum Outcome {
    Ok,
    Failed(String),
}

impl Outcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        Outcome::Failed(reason.into())
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok)
    }
}

/// Response for a successful add_asset call.
#[derive(Debug, Clone, Serialize)]
pub struct AddAssetResponse {
    pub remote_group_id: String,
    pub remote_member_id: Option<String>,
    pub training_status: TrainingStatus,
}

impl AddAssetResponse {
    /// Advisory HTTP status: 202 while training is still running, 200 once
    /// complete. UI hint only, never a gate on the data already written.
    pub fn http_status(&self) -> u16 {
        if self.training_status.is_completed() {
            200
        } else {
            202
        }
    }
}

/// Response for a remove_asset call.
///
/// `local_deleted` reflects the authoritative outcome; the remote fields are
/// advisory so UIs can show a non-blocking warning.
#[derive(Debug, Clone, Serialize)]
pub struct RemoveAssetResponse {
    pub local_deleted: bool,
    pub remote_removed: Outcome,
    pub orphan_sweep: Outcome,
}

/// Response for a delete_group call.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteGroupResponse {
    pub deleted_asset_count: usize,
    pub remote_removed: Outcome,
}

/// Response for a claim_existing call.
#[derive(Debug, Clone, Serialize)]
pub struct ClaimResponse {
    pub group_id: String,
    pub imported_asset_count: usize,
}

/// Response for a training_status read.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingStatusResponse {
    pub training_status: TrainingStatus,
    pub remote_member_count: usize,
}

/// Orchestrates create/add/remove/delete/claim operations against the local
/// store and the remote provider.
pub struct GroupLifecycleManager<R: RemoteProvider> {
    store: Arc<Mutex<Store>>,
    remote: Arc<R>,
    training: TrainingTracker<R>,
}

impl<R: RemoteProvider> GroupLifecycleManager<R> {
    pub fn new(store: Arc<Mutex<Store>>, remote: Arc<R>) -> Self {
        let training = TrainingTracker::new(remote.clone());
        Self {
            store,
            remote,
            training,
        }
    }

    /// Add an asset to a group, creating the remote group on first add.
    ///
    /// The remote provider cannot create an empty group, so the first asset
    /// becomes the seed of the create call itself and is not re-added
    /// afterwards. For a group that already has a remote id, the id is
    /// verified first (list_members); if the remote group vanished
    /// out-of-band, a replacement is created seeded with this asset and the
    /// stale id is overwritten.
    pub async fn add_asset(
        &self,
        group_id: &str,
        asset_id: &str,
    ) -> GroupResult<AddAssetResponse> {
        let (group, asset) = self.load_group_and_asset(group_id, asset_id)?;

        let (remote_group_id, member) = match &group.remote_group_id {
            None => self.create_remote_group(&group, &asset).await?,
            Some(existing) => {
                match self.remote.list_members(existing).await {
                    Ok(_) => {
                        // Verified alive; normal member addition
                        let added = self
                            .remote
                            .add_members(existing, &[asset.url.clone()], &asset.id)
                            .await?;
                        (existing.clone(), added.into_iter().next())
                    }
                    Err(GroupError::NotFound(_)) => {
                        // Destructive recovery: the old remote group is gone.
                        // Recreate seeded with this asset; members that lived
                        // under the old id become reachable again only via a
                        // later sync pass.
                        tracing::warn!(
                            group_id = %group.id,
                            stale_remote_group_id = %existing,
                            "Remote group vanished, creating replacement"
                        );
                        let new_id = self
                            .remote
                            .create_group(&group.display_name, &asset.url)
                            .await?;
                        {
                            let store = self.store.lock().unwrap();
                            store.set_remote_group_id(&group.id, &new_id)?;
                        }
                        let member = self.find_member_by_locator(&new_id, &asset.url).await;
                        (new_id, member)
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        // Persist whatever the remote accepted for this asset
        {
            let store = self.store.lock().unwrap();
            let (member_id, status) = match &member {
                Some(m) => (Some(m.member_id.as_str()), m.status),
                None => (None, RemoteStatus::Pending),
            };
            store.set_asset_remote(&group.id, &asset.id, member_id, status)?;
        }

        let training_status = self.training.ensure_training(&remote_group_id).await;

        Ok(AddAssetResponse {
            remote_group_id,
            remote_member_id: member.map(|m| m.member_id),
            training_status,
        })
    }

    /// First-add path: create the remote group seeded with this asset.
    ///
    /// Two concurrent first adds can both reach create_group; the
    /// compare-and-set write on remote_group_id picks a single winner. The
    /// loser's freshly created remote group is orphaned (logged), and the
    /// loser's asset is added to the winner's group instead.
    async fn create_remote_group(
        &self,
        group: &GroupRow,
        asset: &AssetRow,
    ) -> GroupResult<(String, Option<RemoteMember>)> {
        let created_id = self
            .remote
            .create_group(&group.display_name, &asset.url)
            .await?;

        let won = {
            let store = self.store.lock().unwrap();
            store.set_remote_group_id_if_unset(&group.id, &created_id)?
        };

        if won {
            let member = self.find_member_by_locator(&created_id, &asset.url).await;
            return Ok((created_id, member));
        }

        // Lost the race: another request set remote_group_id first.
        let winner_id = {
            let store = self.store.lock().unwrap();
            store
                .get_group(&group.id)?
                .and_then(|g| g.remote_group_id)
                .ok_or_else(|| {
                    GroupError::invalid_state("remote_group_id cleared during creation race")
                })?
        };

        tracing::warn!(
            group_id = %group.id,
            orphaned_remote_group_id = %created_id,
            winner_remote_group_id = %winner_id,
            "Concurrent group creation, abandoning losing remote group"
        );

        let added = self
            .remote
            .add_members(&winner_id, &[asset.url.clone()], &asset.id)
            .await?;
        Ok((winner_id, added.into_iter().next()))
    }

    /// Look up the remote member created for `locator`, best-effort.
    ///
    /// Group creation seeds a member but its response does not identify it,
    /// so we read it back via list_members. A failure here only costs us the
    /// member id on the asset record until the next sync.
    async fn find_member_by_locator(
        &self,
        remote_group_id: &str,
        locator: &str,
    ) -> Option<RemoteMember> {
        match self.remote.list_members(remote_group_id).await {
            Ok(members) => members.into_iter().find(|m| m.locator == locator),
            Err(e) => {
                tracing::warn!(
                    remote_group_id = %remote_group_id,
                    error = %e,
                    "Could not read back seeded member"
                );
                None
            }
        }
    }

    /// Remove an asset. Local deletion is authoritative and happens first;
    /// remote removal and the orphan sweep are best-effort.
    pub async fn remove_asset(
        &self,
        group_id: &str,
        asset_id: &str,
    ) -> GroupResult<RemoveAssetResponse> {
        let (group, asset) = self.load_group_and_asset(group_id, asset_id)?;

        let local_deleted = {
            let store = self.store.lock().unwrap();
            store.delete_asset(&group.id, &asset.id)?
        };

        let Some(remote_group_id) = group.remote_group_id.clone() else {
            return Ok(RemoveAssetResponse {
                local_deleted,
                remote_removed: Outcome::Ok,
                orphan_sweep: Outcome::Ok,
            });
        };

        let remote_removed = match self.remote.remove_member(&remote_group_id, &asset.url).await
        {
            Ok(()) => Outcome::Ok,
            Err(e) => {
                tracing::warn!(
                    group_id = %group.id,
                    asset_id = %asset.id,
                    error = %e,
                    "Best-effort remote member removal failed"
                );
                Outcome::failed(e.to_string())
            }
        };

        let orphan_sweep = self.sweep_orphans(&group.id, &remote_group_id).await;

        Ok(RemoveAssetResponse {
            local_deleted,
            remote_removed,
            orphan_sweep,
        })
    }

    /// Remove remote members that no longer have a local asset.
    ///
    /// Never fails the caller: any error is folded into the returned Outcome.
    async fn sweep_orphans(&self, group_id: &str, remote_group_id: &str) -> Outcome {
        let members = match self.remote.list_members(remote_group_id).await {
            Ok(members) => members,
            Err(e) => {
                tracing::warn!(
                    group_id = %group_id,
                    error = %e,
                    "Orphan sweep could not list remote members"
                );
                return Outcome::failed(format!("list_members: {}", e));
            }
        };

        let local_urls: Vec<String> = {
            let store = self.store.lock().unwrap();
            match store.list_assets(group_id) {
                Ok(assets) => assets.into_iter().map(|a| a.url).collect(),
                Err(e) => return Outcome::failed(format!("list_assets: {}", e)),
            }
        };

        let mut failures = 0usize;
        for member in members {
            if member.locator.is_empty() || local_urls.iter().any(|u| u == &member.locator) {
                continue;
            }
            if let Err(e) = self
                .remote
                .remove_member(remote_group_id, &member.locator)
                .await
            {
                tracing::warn!(
                    group_id = %group_id,
                    member_id = %member.member_id,
                    error = %e,
                    "Orphan sweep removal failed"
                );
                failures += 1;
            }
        }

        if failures == 0 {
            Outcome::Ok
        } else {
            Outcome::failed(format!("{} orphan removals failed", failures))
        }
    }

    /// Delete a group, cascading local asset deletion. Remote member removal
    /// is best-effort; there is no remote delete-group capability to lean on.
    pub async fn delete_group(&self, group_id: &str) -> GroupResult<DeleteGroupResponse> {
        let group = self.load_group(group_id)?;

        let (deleted_asset_count, asset_urls) = {
            let store = self.store.lock().unwrap();
            let urls: Vec<String> = store
                .list_assets(&group.id)?
                .into_iter()
                .map(|a| a.url)
                .collect();
            let count = store.delete_assets_for_group(&group.id)?;
            (count, urls)
        };

        let remote_removed = match &group.remote_group_id {
            None => Outcome::Ok,
            Some(remote_group_id) => {
                self.remove_all_remote_members(&group.id, remote_group_id, &asset_urls)
                    .await
            }
        };

        {
            let store = self.store.lock().unwrap();
            store.delete_group(&group.id)?;
        }

        Ok(DeleteGroupResponse {
            deleted_asset_count,
            remote_removed,
        })
    }

    async fn remove_all_remote_members(
        &self,
        group_id: &str,
        remote_group_id: &str,
        known_urls: &[String],
    ) -> Outcome {
        // Prefer the remote's own member list; fall back to the locators we
        // knew locally if the listing fails.
        let locators: Vec<String> = match self.remote.list_members(remote_group_id).await {
            Ok(members) => members
                .into_iter()
                .map(|m| m.locator)
                .filter(|l| !l.is_empty())
                .collect(),
            Err(GroupError::NotFound(_)) => {
                // Remote group already gone; nothing to clean up
                return Outcome::Ok;
            }
            Err(e) => {
                tracing::warn!(
                    group_id = %group_id,
                    error = %e,
                    "Could not list remote members for deletion, using local locators"
                );
                known_urls.to_vec()
            }
        };

        let mut failures = 0usize;
        for locator in &locators {
            if let Err(e) = self.remote.remove_member(remote_group_id, locator).await {
                tracing::warn!(
                    group_id = %group_id,
                    locator = %locator,
                    error = %e,
                    "Best-effort remote member removal failed during group delete"
                );
                failures += 1;
            }
        }

        if failures == 0 {
            Outcome::Ok
        } else {
            Outcome::failed(format!(
                "{} of {} member removals failed",
                failures,
                locators.len()
            ))
        }
    }

    /// Claim an existing remote group: import its members into a new local
    /// group. The inverse of add_asset — remote truth flows inward.
    pub async fn claim_existing(
        &self,
        remote_group_id: &str,
        display_name: &str,
    ) -> GroupResult<ClaimResponse> {
        validate_remote_id(remote_group_id, "remote_group_id")?;
        validate_display_name(display_name)?;

        // Cannot claim a group that does not exist remotely; NotFound here is
        // fatal for the whole operation.
        let members = self.remote.list_members(remote_group_id).await?;

        let store = self.store.lock().unwrap();
        let group_id = store.create_group_with_remote(display_name, Some(remote_group_id))?;

        let mut imported = 0usize;
        for member in &members {
            let file_name = file_name_from_locator(&member.locator, &member.member_id);
            store.create_synced_asset(
                &group_id,
                &member.locator,
                &file_name,
                Some(&member.member_id),
                member.status,
            )?;
            imported += 1;
        }

        tracing::info!(
            group_id = %group_id,
            remote_group_id = %remote_group_id,
            imported = imported,
            "Claimed existing remote group"
        );

        Ok(ClaimResponse {
            group_id,
            imported_asset_count: imported,
        })
    }

    /// Read the training status and remote member count for a group.
    ///
    /// A group with no remote id reports NotStarted with zero members.
    pub async fn training_status(&self, group_id: &str) -> GroupResult<TrainingStatusResponse> {
        let group = self.load_group(group_id)?;

        let Some(remote_group_id) = group.remote_group_id else {
            return Ok(TrainingStatusResponse {
                training_status: TrainingStatus::NotStarted,
                remote_member_count: 0,
            });
        };

        let training_status = self.training.status(&remote_group_id).await?;
        let remote_member_count = self.remote.list_members(&remote_group_id).await?.len();

        Ok(TrainingStatusResponse {
            training_status,
            remote_member_count,
        })
    }

    fn load_group(&self, group_id: &str) -> GroupResult<GroupRow> {
        let store = self.store.lock().unwrap();
        store
            .get_group(group_id)?
            .ok_or_else(|| GroupError::not_found(format!("group {}", group_id)))
    }

    fn load_group_and_asset(
        &self,
        group_id: &str,
        asset_id: &str,
    ) -> GroupResult<(GroupRow, AssetRow)> {
        let store = self.store.lock().unwrap();
        let group = store
            .get_group(group_id)?
            .ok_or_else(|| GroupError::not_found(format!("group {}", group_id)))?;
        let asset = store
            .get_asset(group_id, asset_id)?
            .ok_or_else(|| GroupError::not_found(format!("asset {}", asset_id)))?;
        Ok((group, asset))
    }
}

/// Derive a display file name from a locator, falling back to the member id.
fn file_name_from_locator(locator: &str, member_id: &str) -> String {
    locator
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.to_string())
        .unwrap_or_else(|| member_id.to_string())
}
