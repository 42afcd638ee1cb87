//! In-memory collaborators for unit tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::clients::{AccessPolicy, Authenticator, FileService, UserIdentity};
use crate::models::{FileNode, SyncError};

pub struct CountingPolicy {
    allowed: HashSet<(String, String)>,
    calls: Mutex<HashMap<(String, String), usize>>,
    failures: AtomicUsize,
}

impl CountingPolicy {
    pub fn allowing(pairs: &[(&str, &str)]) -> Self {
        Self {
            allowed: pairs.iter().map(|(u, p)| (u.to_string(), p.to_string())).collect(),
            calls: Mutex::new(HashMap::new()),
            failures: AtomicUsize::new(0),
        }
    }

    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    pub fn calls_for(&self, user_id: &str, project_id: &str) -> usize {
        let calls = self.calls.lock().unwrap();
        calls.get(&(user_id.to_string(), project_id.to_string())).copied().unwrap_or(0)
    }
}

#[async_trait]
impl AccessPolicy for CountingPolicy {
    async fn has_access(&self, user_id: &str, project_id: &str) -> Result<bool, SyncError> {
        let key = (user_id.to_string(), project_id.to_string());
        *self.calls.lock().unwrap().entry(key.clone()).or_default() += 1;
        if self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(SyncError::Upstream("project service unavailable".into()));
        }
        Ok(self.allowed.contains(&key))
    }
}

/// Accepts tokens of the form `token-<user>`.
pub struct StaticAuthenticator;

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn verify(&self, token: &str) -> Result<UserIdentity, SyncError> {
        token
            .strip_prefix("token-")
            .map(|id| UserIdentity { id: id.to_string(), email: None })
            .ok_or_else(|| SyncError::Auth("invalid token".into()))
    }
}

struct MemFile {
    path: PathBuf,
    mime_type: String,
}

#[derive(Default)]
pub struct MemoryFileService {
    files: Mutex<HashMap<String, MemFile>>,
    contents: Mutex<HashMap<PathBuf, String>>,
    trees: Mutex<HashMap<String, Vec<FileNode>>>,
    writes: Mutex<Vec<(PathBuf, String)>>,
    reads: AtomicUsize,
    write_failures: AtomicUsize,
    read_delay: Option<Duration>,
}

impl MemoryFileService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_read_delay(delay: Duration) -> Self {
        Self { read_delay: Some(delay), ..Self::default() }
    }

    pub fn add_file(&self, file_id: &str, mime_type: &str, content: &str) {
        let path = PathBuf::from(format!("/data/{}.tex", file_id));
        self.contents.lock().unwrap().insert(path.clone(), content.to_string());
        self.files
            .lock()
            .unwrap()
            .insert(file_id.to_string(), MemFile { path, mime_type: mime_type.to_string() });
    }

    /// Keep the file's metadata but drop its stored content.
    pub fn remove_content(&self, file_id: &str) {
        let path = self.files.lock().unwrap().get(file_id).map(|f| f.path.clone());
        if let Some(path) = path {
            self.contents.lock().unwrap().remove(&path);
        }
    }

    pub fn set_tree(&self, project_id: &str, tree: Vec<FileNode>) {
        self.trees.lock().unwrap().insert(project_id.to_string(), tree);
    }

    pub fn fail_writes(&self, n: usize) {
        self.write_failures.store(n, Ordering::SeqCst);
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> Vec<(PathBuf, String)> {
        self.writes.lock().unwrap().clone()
    }

    pub fn content_of(&self, file_id: &str) -> Option<String> {
        let path = self.files.lock().unwrap().get(file_id)?.path.clone();
        self.contents.lock().unwrap().get(&path).cloned()
    }
}

#[async_trait]
impl FileService for MemoryFileService {
    async fn resolve_path(&self, file_id: &str) -> Result<PathBuf, SyncError> {
        self.files
            .lock()
            .unwrap()
            .get(file_id)
            .map(|f| f.path.clone())
            .ok_or_else(|| SyncError::NotFound(format!("File '{}'", file_id)))
    }

    async fn read_text(&self, path: &Path) -> Result<String, SyncError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
        self.contents
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| SyncError::NotFound(format!("File at '{}'", path.display())))
    }

    async fn write_text(&self, path: &Path, text: &str) -> Result<(), SyncError> {
        if self
            .write_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(SyncError::Storage("disk full".into()));
        }
        self.writes.lock().unwrap().push((path.to_path_buf(), text.to_string()));
        self.contents.lock().unwrap().insert(path.to_path_buf(), text.to_string());
        Ok(())
    }

    async fn is_text_file(&self, file_id: &str) -> Result<bool, SyncError> {
        Ok(self
            .files
            .lock()
            .unwrap()
            .get(file_id)
            .is_some_and(|f| f.mime_type.contains("text")))
    }

    async fn list_file_tree(&self, project_id: &str) -> Result<Vec<FileNode>, SyncError> {
        Ok(self.trees.lock().unwrap().get(project_id).cloned().unwrap_or_default())
    }
}

/// Edit a client-side replica and return the update bytes a client would send.
pub fn client_insert(doc: &loro::LoroDoc, field: &str, pos: usize, text: &str) -> Vec<u8> {
    let before = doc.oplog_vv();
    doc.get_text(field).insert(pos, text).unwrap();
    doc.commit();
    doc.export(loro::ExportMode::updates(&before)).unwrap()
}

/// A fresh client replica built from a full-state hand-off.
pub fn client_from_state(state: &[u8]) -> loro::LoroDoc {
    let doc = loro::LoroDoc::new();
    doc.import(state).unwrap();
    doc
}
