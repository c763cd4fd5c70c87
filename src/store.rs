//! Local metadata store for GroupCore.
//!
//! This module provides all data access functionality using SQLite. The
//! local store is authoritative: every operation reports success based on
//! what is committed here, with remote-side state treated as advisory.
//!
//! UUIDs are stored as BLOB (16 bytes) and converted to hex strings for JSON
//! output. All timestamps are store-assigned Unix seconds; callers never
//! supply their own clock values.

use std::path::Path;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{GroupError, GroupResult};
use crate::models::RemoteStatus;
use crate::validation::validate_local_id;

/// Group data returned from store queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupRow {
    pub id: String,
    pub display_name: String,
    pub remote_group_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl GroupRow {
    /// Check if the group has been created remotely
    pub fn has_remote(&self) -> bool {
        self.remote_group_id.is_some()
    }
}

/// Asset data returned from store queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetRow {
    pub id: String,
    pub group_id: String,
    pub url: String,
    pub file_name: String,
    pub remote_member_id: Option<String>,
    pub remote_status: RemoteStatus,
    pub synced_from_remote: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// SQLite-backed local store for groups and their assets.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) a store at the given path.
    pub fn new(db_path: impl AsRef<Path>) -> GroupResult<Self> {
        let conn = Connection::open(db_path)?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Open an in-memory store. Used by tests and throwaway tooling.
    pub fn in_memory() -> GroupResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Get the underlying connection (for maintenance tooling)
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn initialize_schema(&self) -> GroupResult<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS groups (
                id BLOB PRIMARY KEY,
                display_name TEXT NOT NULL,
                remote_group_id TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS assets (
                id BLOB PRIMARY KEY,
                group_id BLOB NOT NULL,
                url TEXT NOT NULL,
                file_name TEXT NOT NULL,
                remote_member_id TEXT,
                remote_status TEXT NOT NULL DEFAULT 'unset',
                synced_from_remote INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                FOREIGN KEY (group_id) REFERENCES groups (id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_assets_group_id ON assets(group_id);
            CREATE INDEX IF NOT EXISTS idx_assets_url ON assets(group_id, url);
            "#,
        )?;
        Ok(())
    }

    fn row_to_group(&self, row: &Row) -> rusqlite::Result<GroupRow> {
        let id_bytes: Vec<u8> = row.get(0)?;
        Ok(GroupRow {
            id: bytes_to_hex(&id_bytes),
            display_name: row.get(1)?,
            remote_group_id: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }

    fn row_to_asset(&self, row: &Row) -> rusqlite::Result<AssetRow> {
        let id_bytes: Vec<u8> = row.get(0)?;
        let group_id_bytes: Vec<u8> = row.get(1)?;
        let status: String = row.get(5)?;
        let synced: i64 = row.get(6)?;
        Ok(AssetRow {
            id: bytes_to_hex(&id_bytes),
            group_id: bytes_to_hex(&group_id_bytes),
            url: row.get(2)?,
            file_name: row.get(3)?,
            remote_member_id: row.get(4)?,
            remote_status: RemoteStatus::parse(&status),
            synced_from_remote: synced != 0,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    // =========================================================================
    // Groups
    // =========================================================================

    /// Create a new group. Returns the group ID as a hex string.
    pub fn create_group(&self, display_name: &str) -> GroupResult<String> {
        self.create_group_with_remote(display_name, None)
    }

    /// Create a new group with `remote_group_id` preset.
    ///
    /// Used by the claim flow, which imports an already-existing remote group.
    pub fn create_group_with_remote(
        &self,
        display_name: &str,
        remote_group_id: Option<&str>,
    ) -> GroupResult<String> {
        let group_id = Uuid::now_v7();
        let uuid_bytes = group_id.as_bytes().to_vec();

        self.conn.execute(
            r#"
            INSERT INTO groups (id, display_name, remote_group_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
            params![uuid_bytes, display_name, remote_group_id, now(), now()],
        )?;

        Ok(group_id.simple().to_string())
    }

    /// Get a group by ID
    pub fn get_group(&self, group_id: &str) -> GroupResult<Option<GroupRow>> {
        let uuid = validate_local_id(group_id, "group_id")?;
        let uuid_bytes = uuid.as_bytes().to_vec();

        let group = self
            .conn
            .query_row(
                r#"
                SELECT id, display_name, remote_group_id, created_at, updated_at
                FROM groups WHERE id = ?
                "#,
                [uuid_bytes],
                |row| self.row_to_group(row),
            )
            .optional()?;

        Ok(group)
    }

    /// List all groups, newest first
    pub fn list_groups(&self) -> GroupResult<Vec<GroupRow>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, display_name, remote_group_id, created_at, updated_at
            FROM groups
            ORDER BY created_at DESC
            "#,
        )?;

        let groups = stmt
            .query_map([], |row| self.row_to_group(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(groups)
    }

    /// Rename a group. Returns false if the group does not exist.
    pub fn rename_group(&self, group_id: &str, display_name: &str) -> GroupResult<bool> {
        let uuid = validate_local_id(group_id, "group_id")?;
        let uuid_bytes = uuid.as_bytes().to_vec();

        let updated = self.conn.execute(
            r#"
            UPDATE groups
            SET display_name = ?, updated_at = ?
            WHERE id = ?
            "#,
            params![display_name, now(), uuid_bytes],
        )?;

        Ok(updated > 0)
    }

    /// Set (or overwrite) a group's remote ID unconditionally.
    ///
    /// Used by the recreate-on-missing recovery path, where the stale remote
    /// ID must be replaced regardless of its current value.
    pub fn set_remote_group_id(&self, group_id: &str, remote_group_id: &str) -> GroupResult<bool> {
        let uuid = validate_local_id(group_id, "group_id")?;
        let uuid_bytes = uuid.as_bytes().to_vec();

        let updated = self.conn.execute(
            r#"
            UPDATE groups
            SET remote_group_id = ?, updated_at = ?
            WHERE id = ?
            "#,
            params![remote_group_id, now(), uuid_bytes],
        )?;

        Ok(updated > 0)
    }

    /// Compare-and-set a group's remote ID: the write succeeds only if the
    /// column is still NULL.
    ///
    /// Two concurrent first-asset adds can both reach the remote create call;
    /// the loser of this CAS must treat the winner's remote group as
    /// authoritative and fall back to the add-to-existing path.
    pub fn set_remote_group_id_if_unset(
        &self,
        group_id: &str,
        remote_group_id: &str,
    ) -> GroupResult<bool> {
        let uuid = validate_local_id(group_id, "group_id")?;
        let uuid_bytes = uuid.as_bytes().to_vec();

        let updated = self.conn.execute(
            r#"
            UPDATE groups
            SET remote_group_id = ?, updated_at = ?
            WHERE id = ? AND remote_group_id IS NULL
            "#,
            params![remote_group_id, now(), uuid_bytes],
        )?;

        Ok(updated > 0)
    }

    /// Delete a group row. Asset rows cascade at the SQL level, but callers
    /// normally delete them explicitly first to get an accurate count.
    pub fn delete_group(&self, group_id: &str) -> GroupResult<bool> {
        let uuid = validate_local_id(group_id, "group_id")?;
        let uuid_bytes = uuid.as_bytes().to_vec();

        let deleted = self
            .conn
            .execute("DELETE FROM groups WHERE id = ?", [uuid_bytes])?;

        Ok(deleted > 0)
    }

    // =========================================================================
    // Assets
    // =========================================================================

    /// Create a new locally uploaded asset. Returns the asset ID as a hex string.
    pub fn create_asset(&self, group_id: &str, url: &str, file_name: &str) -> GroupResult<String> {
        self.insert_asset(group_id, url, file_name, None, RemoteStatus::Unset, false)
    }

    /// Create an asset imported from the remote provider during sync or claim.
    ///
    /// The record carries the remote member ID and status it already has
    /// remotely, and is flagged `synced_from_remote`.
    pub fn create_synced_asset(
        &self,
        group_id: &str,
        url: &str,
        file_name: &str,
        remote_member_id: Option<&str>,
        remote_status: RemoteStatus,
    ) -> GroupResult<String> {
        self.insert_asset(group_id, url, file_name, remote_member_id, remote_status, true)
    }

    fn insert_asset(
        &self,
        group_id: &str,
        url: &str,
        file_name: &str,
        remote_member_id: Option<&str>,
        remote_status: RemoteStatus,
        synced_from_remote: bool,
    ) -> GroupResult<String> {
        let group_uuid = validate_local_id(group_id, "group_id")?;
        let asset_id = Uuid::now_v7();

        let inserted = self.conn.execute(
            r#"
            INSERT INTO assets
                (id, group_id, url, file_name, remote_member_id, remote_status,
                 synced_from_remote, created_at, updated_at)
            SELECT ?, id, ?, ?, ?, ?, ?, ?, ?
            FROM groups WHERE id = ?
            "#,
            params![
                asset_id.as_bytes().to_vec(),
                url,
                file_name,
                remote_member_id,
                remote_status.as_str(),
                synced_from_remote as i64,
                now(),
                now(),
                group_uuid.as_bytes().to_vec(),
            ],
        )?;

        if inserted == 0 {
            return Err(GroupError::not_found(format!("group {}", group_id)));
        }

        Ok(asset_id.simple().to_string())
    }

    /// Get an asset by ID, scoped to its group
    pub fn get_asset(&self, group_id: &str, asset_id: &str) -> GroupResult<Option<AssetRow>> {
        let group_uuid = validate_local_id(group_id, "group_id")?;
        let asset_uuid = validate_local_id(asset_id, "asset_id")?;

        let asset = self
            .conn
            .query_row(
                r#"
                SELECT id, group_id, url, file_name, remote_member_id, remote_status,
                       synced_from_remote, created_at, updated_at
                FROM assets
                WHERE id = ? AND group_id = ?
                "#,
                params![
                    asset_uuid.as_bytes().to_vec(),
                    group_uuid.as_bytes().to_vec()
                ],
                |row| self.row_to_asset(row),
            )
            .optional()?;

        Ok(asset)
    }

    /// List all assets belonging to a group, oldest first
    pub fn list_assets(&self, group_id: &str) -> GroupResult<Vec<AssetRow>> {
        let group_uuid = validate_local_id(group_id, "group_id")?;

        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, group_id, url, file_name, remote_member_id, remote_status,
                   synced_from_remote, created_at, updated_at
            FROM assets
            WHERE group_id = ?
            ORDER BY created_at ASC, id ASC
            "#,
        )?;

        let assets = stmt
            .query_map([group_uuid.as_bytes().to_vec()], |row| {
                self.row_to_asset(row)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(assets)
    }

    /// Record the remote provider's acceptance of an asset.
    pub fn set_asset_remote(
        &self,
        group_id: &str,
        asset_id: &str,
        remote_member_id: Option<&str>,
        remote_status: RemoteStatus,
    ) -> GroupResult<bool> {
        let group_uuid = validate_local_id(group_id, "group_id")?;
        let asset_uuid = validate_local_id(asset_id, "asset_id")?;

        let updated = self.conn.execute(
            r#"
            UPDATE assets
            SET remote_member_id = ?, remote_status = ?, updated_at = ?
            WHERE id = ? AND group_id = ?
            "#,
            params![
                remote_member_id,
                remote_status.as_str(),
                now(),
                asset_uuid.as_bytes().to_vec(),
                group_uuid.as_bytes().to_vec(),
            ],
        )?;

        Ok(updated > 0)
    }

    /// Delete an asset. Returns false if it did not exist.
    pub fn delete_asset(&self, group_id: &str, asset_id: &str) -> GroupResult<bool> {
        let group_uuid = validate_local_id(group_id, "group_id")?;
        let asset_uuid = validate_local_id(asset_id, "asset_id")?;

        let deleted = self.conn.execute(
            "DELETE FROM assets WHERE id = ? AND group_id = ?",
            params![
                asset_uuid.as_bytes().to_vec(),
                group_uuid.as_bytes().to_vec()
            ],
        )?;

        Ok(deleted > 0)
    }

    /// Delete all assets belonging to a group. Returns the number deleted.
    pub fn delete_assets_for_group(&self, group_id: &str) -> GroupResult<usize> {
        let group_uuid = validate_local_id(group_id, "group_id")?;

        let deleted = self.conn.execute(
            "DELETE FROM assets WHERE group_id = ?",
            [group_uuid.as_bytes().to_vec()],
        )?;

        Ok(deleted)
    }

    /// Count assets belonging to a group
    pub fn count_assets(&self, group_id: &str) -> GroupResult<i64> {
        let group_uuid = validate_local_id(group_id, "group_id")?;

        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM assets WHERE group_id = ?",
            [group_uuid.as_bytes().to_vec()],
            |row| row.get(0),
        )?;

        Ok(count)
    }
}

/// Store-assigned timestamp: current Unix seconds.
fn now() -> i64 {
    Utc::now().timestamp()
}

fn bytes_to_hex(bytes: &[u8]) -> String {
    match Uuid::from_slice(bytes) {
        Ok(uuid) => uuid.simple().to_string(),
        Err(_) => String::new(),
    }
}
