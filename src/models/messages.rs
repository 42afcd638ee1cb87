use serde::{Deserialize, Serialize};
use serde_with::{serde_as, base64::Base64};

use crate::models::FileNode;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JoinFileListMessage {
    pub project_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JoinFileMessage {
    pub project_id: String,
    pub file_id: String,
}

/// CRDT update or presence payload sent by a client.
#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileUpdateMessage {
    pub project_id: String,
    pub file_id: String,
    #[serde_as(as = "Base64")]
    pub update: Vec<u8>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SaveFileMessage {
    pub project_id: String,
    pub file_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "joinProjectFileList")]
    JoinProjectFileList(JoinFileListMessage),
    #[serde(rename = "joinProjectFile")]
    JoinProjectFile(JoinFileMessage),
    #[serde(rename = "update", alias = "yjs-update")]
    Update(FileUpdateMessage),
    #[serde(rename = "awareness-update")]
    AwarenessUpdate(FileUpdateMessage),
    #[serde(rename = "saveFile")]
    SaveFile(SaveFileMessage),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileListMessage {
    pub project_id: String,
    pub files: Vec<FileNode>,
}

/// Full CRDT state handed to a joining client.
#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncMessage {
    pub file_id: String,
    #[serde_as(as = "Base64")]
    pub state: Vec<u8>,
}

/// Update or presence bytes relayed verbatim to co-editors.
#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RelayMessage {
    pub file_id: String,
    #[serde_as(as = "Base64")]
    pub update: Vec<u8>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileSavedMessage {
    pub file_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorMessage {
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "fileList")]
    FileList(FileListMessage),
    #[serde(rename = "sync", alias = "yjs-sync")]
    Sync(SyncMessage),
    #[serde(rename = "update", alias = "yjs-update")]
    Update(RelayMessage),
    #[serde(rename = "awareness-update")]
    AwarenessUpdate(RelayMessage),
    #[serde(rename = "fileSaved")]
    FileSaved(FileSavedMessage),
    #[serde(rename = "error")]
    Error(ErrorMessage),
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error(ErrorMessage { message: message.into() })
    }
}
