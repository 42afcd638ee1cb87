use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

use crate::clients::app_service_client::AppServiceClient;
use crate::clients::FileService;
use crate::models::{FileMeta, FileNode, SyncError};

/// File contents on local disk, addressed through metadata from the app service.
///
/// A file lives at `<storage_root>/<project_id>/<path>`.
pub struct AppFileService {
    app: Arc<AppServiceClient>,
    storage_root: PathBuf,
}

impl AppFileService {
    pub fn new(app: Arc<AppServiceClient>, storage_root: PathBuf) -> Self {
        Self { app, storage_root }
    }

    async fn meta(&self, file_id: &str) -> Result<FileMeta, SyncError> {
        self.app
            .get_file_meta(file_id)
            .await?
            .ok_or_else(|| SyncError::NotFound(format!("File '{}'", file_id)))
    }
}

/// Join `<project>/<relative>` under `root`, refusing anything that could escape it.
pub fn storage_path(root: &Path, project_id: &str, relative: &str) -> Result<PathBuf, SyncError> {
    let mut path = root.to_path_buf();
    for part in [project_id, relative] {
        for component in Path::new(part).components() {
            match component {
                Component::Normal(segment) => path.push(segment),
                Component::CurDir => {}
                _ => {
                    error!("Rejected file path '{}/{}'", project_id, relative);
                    return Err(SyncError::Storage(format!("Invalid file path '{}'", relative)));
                }
            }
        }
    }
    Ok(path)
}

#[async_trait]
impl FileService for AppFileService {
    async fn resolve_path(&self, file_id: &str) -> Result<PathBuf, SyncError> {
        let meta = self.meta(file_id).await?;
        storage_path(&self.storage_root, &meta.project_id, &meta.path)
    }

    async fn read_text(&self, path: &Path) -> Result<String, SyncError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(SyncError::NotFound(format!("File at '{}'", path.display())))
            }
            Err(e) => Err(SyncError::Storage(format!("Failed to read '{}': {}", path.display(), e))),
        }
    }

    async fn write_text(&self, path: &Path, text: &str) -> Result<(), SyncError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SyncError::Storage(format!("Failed to create '{}': {}", parent.display(), e)))?;
        }
        tokio::fs::write(path, text)
            .await
            .map_err(|e| SyncError::Storage(format!("Failed to write '{}': {}", path.display(), e)))?;
        info!("Wrote {} bytes to {}", text.len(), path.display());
        Ok(())
    }

    async fn is_text_file(&self, file_id: &str) -> Result<bool, SyncError> {
        Ok(self.app.get_file_meta(file_id).await?.is_some_and(|meta| meta.is_text()))
    }

    async fn list_file_tree(&self, project_id: &str) -> Result<Vec<FileNode>, SyncError> {
        self.app.get_file_tree(project_id).await
    }
}
