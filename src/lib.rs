//! GroupCore - local-first asset group management with a remote provider.
//!
//! This library keeps an authoritative local SQLite store of groups and
//! their assets in agreement with a remote, group-based asset provider:
//! - Data store (SQLite: groups, assets)
//! - Remote provider client (HTTP) and trait seam
//! - Group lifecycle (add/remove/delete/claim)
//! - Bidirectional reconciliation
//! - Training job tracking
//! - Configuration management
//!
//! The local store is the source of truth for which groups exist; the remote
//! provider is the source of truth for group membership and training state.
//!
//! # Feature Flags
//!
//! - `server`: Include the HTTP server surface (axum). Library consumers that
//!   embed the lifecycle manager directly do not need it.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod remote;
#[cfg(feature = "server")]
pub mod server;
pub mod store;
pub mod sync;
pub mod training;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use config::Config;
pub use error::{GroupError, GroupResult};
pub use lifecycle::{
    AddAssetResponse, ClaimResponse, DeleteGroupResponse, GroupLifecycleManager, Outcome,
    RemoveAssetResponse, TrainingStatusResponse,
};
pub use models::{RemoteStatus, TrainingStatus};
pub use remote::{RemoteMember, RemoteProvider, RemoteProviderClient};
pub use store::{AssetRow, GroupRow, Store};
pub use sync::{ReconciliationEngine, SyncReport};
pub use training::TrainingTracker;
