//! Narrow interfaces to the services the collaboration core depends on.
//!
//! The gateway, registry and scheduler only ever talk to these traits, so
//! tests swap in in-memory fakes and production wires the app service and
//! the local file store.

pub mod app_service_client;
pub mod file_service;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::models::{FileNode, SyncError};

/// Identity attached to a session once its bearer credential checks out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserIdentity {
    pub id: String,
    pub email: Option<String>,
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Resolve a bearer token to a user, or fail with [`SyncError::Auth`].
    async fn verify(&self, token: &str) -> Result<UserIdentity, SyncError>;
}

#[async_trait]
pub trait AccessPolicy: Send + Sync {
    async fn has_access(&self, user_id: &str, project_id: &str) -> Result<bool, SyncError>;
}

#[async_trait]
pub trait FileService: Send + Sync {
    async fn resolve_path(&self, file_id: &str) -> Result<PathBuf, SyncError>;
    async fn read_text(&self, path: &Path) -> Result<String, SyncError>;
    async fn write_text(&self, path: &Path, text: &str) -> Result<(), SyncError>;
    /// Unknown files are not text files.
    async fn is_text_file(&self, file_id: &str) -> Result<bool, SyncError>;
    async fn list_file_tree(&self, project_id: &str) -> Result<Vec<FileNode>, SyncError>;
}
