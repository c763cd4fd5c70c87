//! HTTP server surface using Axum.
//!
//! This module exposes the group lifecycle over HTTP:
//! - POST   /groups                                  - Create a local group
//! - GET    /groups                                  - List local groups
//! - POST   /groups/:group_id/assets                 - Register a local asset record
//! - POST   /groups/:group_id/assets/:asset_id       - Push an asset to the remote group
//! - DELETE /groups/:group_id/assets/:asset_id       - Remove an asset
//! - DELETE /groups/:group_id                        - Delete a group
//! - POST   /groups/claim                            - Claim an existing remote group
//! - POST   /groups/:group_id/sync                   - Reconcile with the remote provider
//! - GET    /groups/:group_id/training-status        - Training job state
//! - GET    /status                                  - Health check

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, OnceLock};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::error::{GroupError, GroupResult};
use crate::lifecycle::GroupLifecycleManager;
use crate::remote::RemoteProvider;
use crate::store::Store;
use crate::sync::ReconciliationEngine;
use crate::validation::{validate_display_name, validate_file_name, validate_locator};

/// Server shutdown handle
static SHUTDOWN_TX: OnceLock<Mutex<Option<oneshot::Sender<()>>>> = OnceLock::new();

/// Shared server state
struct AppState<R: RemoteProvider> {
    store: Arc<Mutex<Store>>,
    manager: Arc<GroupLifecycleManager<R>>,
    engine: Arc<ReconciliationEngine<R>>,
}

impl<R: RemoteProvider> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            manager: self.manager.clone(),
            engine: self.engine.clone(),
        }
    }
}

// Request/Response types

#[derive(Debug, Deserialize)]
struct CreateGroupRequest {
    display_name: String,
}

#[derive(Debug, Serialize)]
struct CreateGroupResponse {
    group_id: String,
}

#[derive(Debug, Deserialize)]
struct RegisterAssetRequest {
    url: String,
    file_name: String,
}

#[derive(Debug, Serialize)]
struct RegisterAssetResponse {
    asset_id: String,
}

#[derive(Debug, Deserialize)]
struct ClaimRequest {
    remote_group_id: String,
    display_name: String,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    status: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(e: GroupError) -> Response {
    let status =
        StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        tracing::error!("Request failed: {}", e);
    } else {
        tracing::debug!("Request rejected: {}", e);
    }
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
        .into_response()
}

// Route handlers

async fn create_group<R: RemoteProvider + Send + Sync + 'static>(
    State(state): State<AppState<R>>,
    Json(request): Json<CreateGroupRequest>,
) -> Response {
    if let Err(e) = validate_display_name(&request.display_name) {
        return error_response(e);
    }

    let result = {
        let store = state.store.lock().unwrap();
        store.create_group(&request.display_name)
    };

    match result {
        Ok(group_id) => {
            tracing::info!(group_id = %group_id, "Created group");
            (StatusCode::CREATED, Json(CreateGroupResponse { group_id })).into_response()
        }
        Err(e) => error_response(e),
    }
}

async fn list_groups<R: RemoteProvider + Send + Sync + 'static>(
    State(state): State<AppState<R>>,
) -> Response {
    let result = {
        let store = state.store.lock().unwrap();
        store.list_groups()
    };

    match result {
        Ok(groups) => Json(groups).into_response(),
        Err(e) => error_response(e),
    }
}

async fn register_asset<R: RemoteProvider + Send + Sync + 'static>(
    State(state): State<AppState<R>>,
    Path(group_id): Path<String>,
    Json(request): Json<RegisterAssetRequest>,
) -> Response {
    if let Err(e) = validate_locator(&request.url) {
        return error_response(e);
    }
    if let Err(e) = validate_file_name(&request.file_name) {
        return error_response(e);
    }

    let result = {
        let store = state.store.lock().unwrap();
        store.create_asset(&group_id, &request.url, &request.file_name)
    };

    match result {
        Ok(asset_id) => {
            (StatusCode::CREATED, Json(RegisterAssetResponse { asset_id })).into_response()
        }
        Err(e) => error_response(e),
    }
}

async fn add_asset<R: RemoteProvider + Send + Sync + 'static>(
    State(state): State<AppState<R>>,
    Path((group_id, asset_id)): Path<(String, String)>,
) -> Response {
    match state.manager.add_asset(&group_id, &asset_id).await {
        Ok(response) => {
            let status = StatusCode::from_u16(response.http_status())
                .unwrap_or(StatusCode::ACCEPTED);
            (status, Json(response)).into_response()
        }
        Err(e) => error_response(e),
    }
}

async fn remove_asset<R: RemoteProvider + Send + Sync + 'static>(
    State(state): State<AppState<R>>,
    Path((group_id, asset_id)): Path<(String, String)>,
) -> Response {
    match state.manager.remove_asset(&group_id, &asset_id).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => error_response(e),
    }
}

async fn delete_group<R: RemoteProvider + Send + Sync + 'static>(
    State(state): State<AppState<R>>,
    Path(group_id): Path<String>,
) -> Response {
    match state.manager.delete_group(&group_id).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => error_response(e),
    }
}

async fn claim_group<R: RemoteProvider + Send + Sync + 'static>(
    State(state): State<AppState<R>>,
    Json(request): Json<ClaimRequest>,
) -> Response {
    match state
        .manager
        .claim_existing(&request.remote_group_id, &request.display_name)
        .await
    {
        Ok(response) => Json(response).into_response(),
        Err(e) => error_response(e),
    }
}

async fn sync_group<R: RemoteProvider + Send + Sync + 'static>(
    State(state): State<AppState<R>>,
    Path(group_id): Path<String>,
) -> Response {
    match state.engine.sync(&group_id).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => error_response(e),
    }
}

async fn training_status<R: RemoteProvider + Send + Sync + 'static>(
    State(state): State<AppState<R>>,
    Path(group_id): Path<String>,
) -> Response {
    match state.manager.training_status(&group_id).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => error_response(e),
    }
}

async fn status() -> Response {
    Json(StatusResponse {
        status: "ok".to_string(),
    })
    .into_response()
}

/// Build the router with all group routes
pub fn create_router<R: RemoteProvider + Send + Sync + 'static>(
    store: Arc<Mutex<Store>>,
    remote: Arc<R>,
) -> Router {
    let manager = Arc::new(GroupLifecycleManager::new(store.clone(), remote.clone()));
    let engine = Arc::new(ReconciliationEngine::new(store.clone(), remote));
    let state = AppState {
        store,
        manager,
        engine,
    };

    Router::new()
        .route("/groups", post(create_group::<R>).get(list_groups::<R>))
        .route("/groups/claim", post(claim_group::<R>))
        .route(
            "/groups/:group_id",
            delete(delete_group::<R>),
        )
        .route("/groups/:group_id/assets", post(register_asset::<R>))
        .route(
            "/groups/:group_id/assets/:asset_id",
            post(add_asset::<R>).delete(remove_asset::<R>),
        )
        .route("/groups/:group_id/sync", post(sync_group::<R>))
        .route(
            "/groups/:group_id/training-status",
            get(training_status::<R>),
        )
        .route("/status", get(status))
        .with_state(state)
}

/// Start the HTTP server on the given port
pub async fn start_server<R: RemoteProvider + Send + Sync + 'static>(
    store: Arc<Mutex<Store>>,
    remote: Arc<R>,
    port: u16,
) -> GroupResult<()> {
    let router = create_router(store, remote);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let (tx, rx) = oneshot::channel();
    SHUTDOWN_TX.get_or_init(|| Mutex::new(Some(tx)));

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            rx.await.ok();
        })
        .await?;

    Ok(())
}

/// Signal the running server to shut down
pub fn stop_server() {
    if let Some(mutex) = SHUTDOWN_TX.get() {
        if let Ok(mut guard) = mutex.lock() {
            if let Some(tx) = guard.take() {
                let _ = tx.send(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_status_mapping() {
        let response = error_response(GroupError::not_found("group"));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = error_response(GroupError::validation("url", "empty"));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = error_response(GroupError::remote_unavailable("timeout"));
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let response = error_response(GroupError::invalid_state("no assets"));
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
