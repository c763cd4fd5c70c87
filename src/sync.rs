//! Bidirectional reconciliation between local assets and remote members.
//!
//! The sync policy is deliberately asymmetric: remote truth is additive to
//! the local store (unknown members are imported), while local truth is
//! subtractive from the local store only (assets with no remote counterpart
//! are deleted locally, never propagated as remote deletions). Remote
//! members are never deleted by a sync pass.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::error::{GroupError, GroupResult};
use crate::models::RemoteStatus;
use crate::remote::RemoteProvider;
use crate::store::Store;

/// Counts reported back to the caller after a sync pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Assets imported into the local store from remote members
    pub added: usize,
    /// Local assets deleted for lack of a remote counterpart
    pub removed: usize,
    /// Total member count reported by the remote provider
    pub remote_member_count: usize,
}

/// Performs full bidirectional diff/sync for one group.
pub struct ReconciliationEngine<R: RemoteProvider> {
    store: Arc<Mutex<Store>>,
    remote: Arc<R>,
}

impl<R: RemoteProvider> ReconciliationEngine<R> {
    pub fn new(store: Arc<Mutex<Store>>, remote: Arc<R>) -> Self {
        Self { store, remote }
    }

    /// Reconcile a group's local assets with its remote members.
    ///
    /// If the group has no remote id yet, one is created seeded with an
    /// arbitrary local asset (there is no way to create an empty remote
    /// group). With neither a remote id nor local assets the sync has
    /// nothing to anchor on and fails with InvalidState. Re-running a sync
    /// is always safe; the net effect is idempotent.
    pub async fn sync(&self, group_id: &str) -> GroupResult<SyncReport> {
        let (group_id, remote_group_id, local_assets) = {
            let store = self.store.lock().unwrap();
            let group = store
                .get_group(group_id)?
                .ok_or_else(|| GroupError::not_found(format!("group {}", group_id)))?;
            let assets = store.list_assets(&group.id)?;
            (group.id, group.remote_group_id, assets)
        };

        let remote_group_id = match remote_group_id {
            Some(id) => id,
            None => {
                self.create_remote_for_sync(&group_id, &local_assets)
                    .await?
            }
        };

        let members = match self.remote.list_members(&remote_group_id).await {
            Ok(members) => members,
            Err(GroupError::NotFound(_)) if !local_assets.is_empty() => {
                // Stale remote id: heal exactly like the add path does, by
                // creating a replacement seeded with a local asset.
                tracing::warn!(
                    group_id = %group_id,
                    stale_remote_group_id = %remote_group_id,
                    "Remote group vanished, recreating during sync"
                );
                let replacement = self
                    .seed_remote_group(&group_id, &local_assets[0])
                    .await?;
                self.remote.list_members(&replacement).await?
            }
            Err(e) => return Err(e),
        };

        let remote_locators: HashSet<&str> = members
            .iter()
            .map(|m| m.locator.as_str())
            .filter(|l| !l.is_empty())
            .collect();
        let local_locators: HashSet<&str> =
            local_assets.iter().map(|a| a.url.as_str()).collect();

        let store = self.store.lock().unwrap();

        // Remote-only members become local assets flagged as sync imports
        let mut added = 0usize;
        for member in &members {
            if member.locator.is_empty() || local_locators.contains(member.locator.as_str()) {
                continue;
            }
            let file_name = member
                .locator
                .rsplit('/')
                .next()
                .filter(|s| !s.is_empty())
                .unwrap_or(member.member_id.as_str());
            store.create_synced_asset(
                &group_id,
                &member.locator,
                file_name,
                Some(&member.member_id),
                member.status,
            )?;
            added += 1;
        }

        // Local-only assets are deleted; their remote counterparts are gone
        // (or never existed) and the remote list is the membership authority
        let mut removed = 0usize;
        for asset in &local_assets {
            if remote_locators.contains(asset.url.as_str()) {
                continue;
            }
            if store.delete_asset(&group_id, &asset.id)? {
                removed += 1;
            }
        }

        tracing::info!(
            group_id = %group_id,
            added = added,
            removed = removed,
            remote_member_count = members.len(),
            "Sync pass complete"
        );

        Ok(SyncReport {
            added,
            removed,
            remote_member_count: members.len(),
        })
    }

    /// Lazily create the remote group for a never-pushed group.
    async fn create_remote_for_sync(
        &self,
        group_id: &str,
        local_assets: &[crate::store::AssetRow],
    ) -> GroupResult<String> {
        let Some(seed) = local_assets.first() else {
            return Err(GroupError::invalid_state(
                "group has no remote counterpart and no local assets to seed one",
            ));
        };
        self.seed_remote_group(group_id, seed).await
    }

    /// Create a remote group seeded with `seed` and persist its id.
    ///
    /// Uses the same CAS-then-fallback as the add path so a concurrent
    /// first-asset add cannot leave two referenced remote groups.
    async fn seed_remote_group(
        &self,
        group_id: &str,
        seed: &crate::store::AssetRow,
    ) -> GroupResult<String> {
        let (display_name, seed_url) = {
            let store = self.store.lock().unwrap();
            let group = store
                .get_group(group_id)?
                .ok_or_else(|| GroupError::not_found(format!("group {}", group_id)))?;
            (group.display_name, seed.url.clone())
        };

        let created_id = self.remote.create_group(&display_name, &seed_url).await?;

        let store = self.store.lock().unwrap();
        let won = store.set_remote_group_id_if_unset(group_id, &created_id)?;
        if !won {
            // Column already held a (stale or racing) id; the group we just
            // created and verified replaces it.
            store.set_remote_group_id(group_id, &created_id)?;
        }
        store.set_asset_remote(group_id, &seed.id, None, RemoteStatus::Pending)?;

        Ok(created_id)
    }
}
