use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One node of a project's file tree, as served by the app service.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileNode {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub children: Vec<FileNode>,
}

/// Metadata of a single file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileMeta {
    pub id: String,
    pub project_id: String,
    pub path: String,
    pub mime_type: String,
}

impl FileMeta {
    pub fn is_text(&self) -> bool {
        self.mime_type.contains("text")
    }
}

/// Response of the file-list refresh hook.
#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileListRefreshResponse {
    pub project_id: String,
    pub n_sessions: u32,
}
