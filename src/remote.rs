//! Remote provider client for GroupCore.
//!
//! This module provides the typed wrapper over the remote provider's HTTP
//! API: create group, add members, list members, remove member, start
//! training, get training status.
//!
//! Every mutating call here is a real network round trip with no local
//! caching. A request may fail after the remote side already applied it, so
//! callers design idempotent recovery around these operations rather than
//! assuming at-least-once delivery.

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::RemoteConfig;
use crate::error::{GroupError, GroupResult};
use crate::models::{RemoteStatus, TrainingStatus};

/// Header carrying the API credential on every request
const API_KEY_HEADER: &str = "X-Api-Key";

/// A group member as reported by the remote provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteMember {
    /// Member identifier assigned by the remote provider
    pub member_id: String,
    /// Locator of the asset content this member was created from
    pub locator: String,
    /// Remote processing status for this member
    pub status: RemoteStatus,
}

/// Contract for the remote provider.
///
/// This is the seam the lifecycle manager and reconciliation engine are
/// generic over; tests substitute an in-memory implementation with
/// programmable failures.
pub trait RemoteProvider: Send + Sync {
    /// Create a remote group seeded with an initial asset.
    ///
    /// The remote provider cannot create an empty group, so a seed locator is
    /// always required. The seed asset becomes the group's first member as a
    /// side effect of creation.
    fn create_group(
        &self,
        name: &str,
        seed_locator: &str,
    ) -> impl Future<Output = GroupResult<String>> + Send;

    /// Add members to an existing remote group. All-or-nothing per call.
    fn add_members(
        &self,
        remote_group_id: &str,
        locators: &[String],
        batch_name: &str,
    ) -> impl Future<Output = GroupResult<Vec<RemoteMember>>> + Send;

    /// List the members of a remote group.
    ///
    /// Returns an empty vec for an existing group with zero members and
    /// `GroupError::NotFound` if the group itself no longer exists.
    fn list_members(
        &self,
        remote_group_id: &str,
    ) -> impl Future<Output = GroupResult<Vec<RemoteMember>>> + Send;

    /// Remove a member by locator. Best-effort from the caller's perspective.
    fn remove_member(
        &self,
        remote_group_id: &str,
        locator: &str,
    ) -> impl Future<Output = GroupResult<()>> + Send;

    /// Start the training job for a group.
    ///
    /// Idempotent: an "already training" response is success, not an error.
    fn start_training(
        &self,
        remote_group_id: &str,
    ) -> impl Future<Output = GroupResult<()>> + Send;

    /// Get the current training status for a group.
    fn training_status(
        &self,
        remote_group_id: &str,
    ) -> impl Future<Output = GroupResult<TrainingStatus>> + Send;
}

// Wire types

#[derive(Debug, Serialize)]
struct CreateGroupRequest<'a> {
    name: &'a str,
    seed_url: &'a str,
}

#[derive(Debug, Serialize)]
struct AddMembersRequest<'a> {
    name: &'a str,
    urls: &'a [String],
}

#[derive(Debug, Serialize)]
struct RemoveMemberRequest<'a> {
    url: &'a str,
}

/// HTTP client for the remote provider.
pub struct RemoteProviderClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl RemoteProviderClient {
    /// Create a new client.
    ///
    /// The API key is a constructor dependency resolved once at startup
    /// (see `Config::resolve_api_key`), not ambient process state.
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> GroupResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GroupError::remote_unavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Create a client from a remote config section plus a resolved API key.
    pub fn from_config(config: &RemoteConfig, api_key: String) -> GroupResult<Self> {
        Self::new(
            api_key,
            config.base_url.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read_error(&self, context: &str, response: reqwest::Response) -> GroupError {
        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        let message = extract_error_message(&body)
            .unwrap_or_else(|| format!("{} failed with status {}", context, status));

        match status {
            StatusCode::NOT_FOUND => GroupError::not_found(message),
            StatusCode::CONFLICT => GroupError::RemoteConflict(message),
            s if s.is_server_error() => GroupError::remote_unavailable(message),
            _ => GroupError::Other(message),
        }
    }
}

impl RemoteProvider for RemoteProviderClient {
    async fn create_group(&self, name: &str, seed_locator: &str) -> GroupResult<String> {
        let request = CreateGroupRequest {
            name,
            seed_url: seed_locator,
        };

        let response = self
            .client
            .post(self.url("/asset_group/create"))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| GroupError::remote_unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(self.read_error("create_group", response).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| GroupError::remote_unavailable(e.to_string()))?;

        extract_remote_group_id(&body).ok_or_else(|| {
            GroupError::remote_unavailable("create_group response carried no group id")
        })
    }

    async fn add_members(
        &self,
        remote_group_id: &str,
        locators: &[String],
        batch_name: &str,
    ) -> GroupResult<Vec<RemoteMember>> {
        let request = AddMembersRequest {
            name: batch_name,
            urls: locators,
        };

        let response = self
            .client
            .post(self.url(&format!(
                "/asset_group/{}/members/add",
                urlencoding::encode(remote_group_id)
            )))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| GroupError::remote_unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(self.read_error("add_members", response).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| GroupError::remote_unavailable(e.to_string()))?;

        Ok(extract_members(&body))
    }

    async fn list_members(&self, remote_group_id: &str) -> GroupResult<Vec<RemoteMember>> {
        let response = self
            .client
            .get(self.url(&format!(
                "/asset_group/{}/members",
                urlencoding::encode(remote_group_id)
            )))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| GroupError::remote_unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(self.read_error("list_members", response).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| GroupError::remote_unavailable(e.to_string()))?;

        // An existing group with zero members is an empty list, never an error
        Ok(extract_members(&body))
    }

    async fn remove_member(&self, remote_group_id: &str, locator: &str) -> GroupResult<()> {
        let request = RemoveMemberRequest { url: locator };

        let response = self
            .client
            .post(self.url(&format!(
                "/asset_group/{}/members/remove",
                urlencoding::encode(remote_group_id)
            )))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| GroupError::remote_unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(self.read_error("remove_member", response).await);
        }

        Ok(())
    }

    async fn start_training(&self, remote_group_id: &str) -> GroupResult<()> {
        let response = self
            .client
            .post(self.url(&format!(
                "/asset_group/{}/train",
                urlencoding::encode(remote_group_id)
            )))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| GroupError::remote_unavailable(e.to_string()))?;

        if response.status().is_success() {
            return Ok(());
        }

        let err = self.read_error("start_training", response).await;

        // The provider rejects a second train call while a job is running.
        // That is success from our point of view.
        let message = err.to_string().to_lowercase();
        if message.contains("already") || message.contains("in progress") {
            tracing::debug!(
                remote_group_id = %remote_group_id,
                "Training already in progress, treating as started"
            );
            return Ok(());
        }

        Err(err)
    }

    async fn training_status(&self, remote_group_id: &str) -> GroupResult<TrainingStatus> {
        let response = self
            .client
            .get(self.url(&format!(
                "/asset_group/{}/train/status",
                urlencoding::encode(remote_group_id)
            )))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| GroupError::remote_unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(self.read_error("training_status", response).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| GroupError::remote_unavailable(e.to_string()))?;

        Ok(extract_training_status(&body))
    }
}

// =============================================================================
// Response normalization
// =============================================================================
// The remote API's response shapes vary across endpoints and versions: the
// group id may arrive as `id`, `group_id`, or `avatar_group_id`, sometimes
// wrapped in a `data` envelope. Each shape gets one normalization function
// with an explicit ordered field list; untyped maps never cross this module
// boundary.

/// Field names that may carry the group id, in lookup order.
const GROUP_ID_FIELDS: &[&str] = &["id", "group_id", "avatar_group_id"];

/// Field names that may carry a member id, in lookup order.
const MEMBER_ID_FIELDS: &[&str] = &["id", "member_id", "image_key", "avatar_id"];

/// Field names that may carry a member locator, in lookup order.
const MEMBER_LOCATOR_FIELDS: &[&str] = &["url", "image_url", "locator"];

/// Field names that may carry the member list, in lookup order.
const MEMBER_LIST_FIELDS: &[&str] = &["members", "avatar_list", "looks", "items"];

/// Field names that may carry an error message, in lookup order.
const ERROR_MESSAGE_FIELDS: &[&str] = &["message", "error", "detail"];

fn unwrap_data(body: &Value) -> &Value {
    match body.get("data") {
        Some(inner) if inner.is_object() || inner.is_array() => inner,
        _ => body,
    }
}

fn first_string_field(value: &Value, fields: &[&str]) -> Option<String> {
    for field in fields {
        if let Some(s) = value.get(field).and_then(Value::as_str) {
            if !s.is_empty() {
                return Some(s.to_string());
            }
        }
    }
    None
}

/// Extract the remote group id from a create-group response body.
pub fn extract_remote_group_id(body: &Value) -> Option<String> {
    let inner = unwrap_data(body);
    first_string_field(inner, GROUP_ID_FIELDS)
        .or_else(|| first_string_field(body, GROUP_ID_FIELDS))
}

/// Extract the member list from a list/add-members response body.
///
/// Entries missing a member id are skipped with a warning; a missing locator
/// degrades to an empty string (the member still counts toward totals but can
/// never match a local asset).
pub fn extract_members(body: &Value) -> Vec<RemoteMember> {
    let inner = unwrap_data(body);

    let list = if inner.is_array() {
        inner.as_array()
    } else {
        MEMBER_LIST_FIELDS
            .iter()
            .find_map(|field| inner.get(field).and_then(Value::as_array))
    };

    let Some(list) = list else {
        return Vec::new();
    };

    let mut members = Vec::with_capacity(list.len());
    for entry in list {
        let Some(member_id) = first_string_field(entry, MEMBER_ID_FIELDS) else {
            tracing::warn!("Skipping remote member without an id: {}", entry);
            continue;
        };
        let locator = first_string_field(entry, MEMBER_LOCATOR_FIELDS).unwrap_or_default();
        let status = entry
            .get("status")
            .and_then(Value::as_str)
            .map(RemoteStatus::parse)
            .unwrap_or(RemoteStatus::Pending);

        members.push(RemoteMember {
            member_id,
            locator,
            status,
        });
    }

    members
}

/// Extract the training status from a status response body.
pub fn extract_training_status(body: &Value) -> TrainingStatus {
    let inner = unwrap_data(body);
    inner
        .get("status")
        .or_else(|| body.get("status"))
        .and_then(Value::as_str)
        .map(TrainingStatus::parse)
        .unwrap_or(TrainingStatus::Pending)
}

/// Extract a human-readable error message from an error response body.
pub fn extract_error_message(body: &Value) -> Option<String> {
    first_string_field(body, ERROR_MESSAGE_FIELDS)
        .or_else(|| first_string_field(unwrap_data(body), ERROR_MESSAGE_FIELDS))
}
