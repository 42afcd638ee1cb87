use loro::{ExportMode, LoroDoc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, OnceCell};
use tracing::{debug, info, warn};

use crate::clients::FileService;
use crate::models::SyncError;

/// The in-memory collaborative state of one open file.
pub struct LiveDocument {
    file_id: String,
    path: PathBuf,
    doc: LoroDoc,
    dirty: AtomicBool,
    save_lock: Mutex<()>,
}

impl LiveDocument {
    /// Build the CRDT from the file's current text. The text field is named after the file.
    fn hydrate(file_id: &str, path: PathBuf, content: &str) -> Result<Self, SyncError> {
        let doc = LoroDoc::new();
        if !content.is_empty() {
            doc.get_text(file_id)
                .insert(0, content)
                .map_err(|e| SyncError::Storage(format!("Failed to load '{}' into CRDT: {}", file_id, e)))?;
            doc.commit();
        }
        Ok(Self {
            file_id: file_id.to_string(),
            path,
            doc,
            dirty: AtomicBool::new(false),
            save_lock: Mutex::new(()),
        })
    }

    pub fn file_id(&self) -> &str {
        &self.file_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text(&self) -> String {
        self.doc.get_text(self.file_id.as_str()).to_string()
    }

    /// Merge a client update. Rejected bytes leave the document and its dirty flag untouched.
    ///
    /// An update that builds on history this document never saw is rejected
    /// too: loro would park it as pending and change nothing.
    pub fn apply_update(&self, update: &[u8]) -> Result<(), SyncError> {
        let corrupt = |reason: String| SyncError::CorruptUpdate { file_id: self.file_id.clone(), reason };

        let meta = LoroDoc::decode_import_blob_meta(update, false).map_err(|e| corrupt(e.to_string()))?;
        if !self.doc.oplog_vv().includes_vv(&meta.partial_start_vv) {
            return Err(corrupt("update depends on unknown history".to_string()));
        }

        let status = self.doc.import(update).map_err(|e| corrupt(e.to_string()))?;
        if status.pending.is_some() {
            // Whatever did apply still has to reach storage
            self.dirty.store(true, Ordering::SeqCst);
            return Err(corrupt("update has missing dependencies".to_string()));
        }
        self.dirty.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Snapshot a joining client can load without any prior history.
    pub fn encode_full_state(&self) -> Result<Vec<u8>, SyncError> {
        self.doc
            .export(ExportMode::Snapshot)
            .map_err(|e| SyncError::Storage(format!("Failed to export '{}': {}", self.file_id, e)))
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }

    /// Clear the dirty flag, returning whether it was set.
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::SeqCst)
    }

    /// Saves of one document are serialized so an older text never overwrites a newer one.
    pub async fn lock_saves(&self) -> MutexGuard<'_, ()> {
        self.save_lock.lock().await
    }
}

type Slot = Arc<OnceCell<Arc<LiveDocument>>>;

/// Owner of every live document, at most one per file id.
///
/// Each file gets a slot before hydration starts; concurrent opens of the
/// same file wait on that slot instead of creating a second document.
pub struct DocumentRegistry {
    docs: Mutex<HashMap<String, Slot>>,
    files: Arc<dyn FileService>,
}

impl DocumentRegistry {
    pub fn new(files: Arc<dyn FileService>) -> Self {
        info!("Document registry initialized");
        Self {
            docs: Mutex::new(HashMap::new()),
            files,
        }
    }

    pub async fn open(&self, file_id: &str) -> Result<Arc<LiveDocument>, SyncError> {
        let slot = {
            let mut docs = self.docs.lock().await;
            docs.entry(file_id.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let result = slot
            .get_or_try_init(|| self.hydrate(file_id))
            .await
            .map(Arc::clone);

        if result.is_err() {
            let mut docs = self.docs.lock().await;
            if docs.get(file_id).is_some_and(|current| Arc::ptr_eq(current, &slot) && !current.initialized()) {
                docs.remove(file_id);
            }
        }
        result
    }

    async fn hydrate(&self, file_id: &str) -> Result<Arc<LiveDocument>, SyncError> {
        if !self.files.is_text_file(file_id).await? {
            warn!("File {} is not a text file", file_id);
            return Err(SyncError::UnsupportedFile(file_id.to_string()));
        }
        // Metadata without content on disk counts as a file we cannot edit
        let unsupported = |e: SyncError| match e {
            SyncError::NotFound(_) => SyncError::UnsupportedFile(file_id.to_string()),
            other => other,
        };
        let path = self.files.resolve_path(file_id).await.map_err(unsupported)?;
        let content = self.files.read_text(&path).await.map_err(unsupported)?;
        let doc = LiveDocument::hydrate(file_id, path, &content)?;
        info!("Opened document {} ({} bytes)", file_id, content.len());
        Ok(Arc::new(doc))
    }

    /// The live document for `file_id`, if one is fully loaded.
    pub async fn get(&self, file_id: &str) -> Option<Arc<LiveDocument>> {
        let docs = self.docs.lock().await;
        docs.get(file_id).and_then(|slot| slot.get().cloned())
    }

    async fn require(&self, file_id: &str) -> Result<Arc<LiveDocument>, SyncError> {
        self.get(file_id)
            .await
            .ok_or_else(|| SyncError::NotFound(format!("Document for file '{}'", file_id)))
    }

    pub async fn apply_remote_update(&self, file_id: &str, update: &[u8]) -> Result<(), SyncError> {
        let doc = self.require(file_id).await?;
        doc.apply_update(update)?;
        debug!("Applied {} byte update to {}", update.len(), file_id);
        Ok(())
    }

    pub async fn encode_full_state(&self, file_id: &str) -> Result<Vec<u8>, SyncError> {
        self.require(file_id).await?.encode_full_state()
    }

    pub async fn text(&self, file_id: &str) -> Result<String, SyncError> {
        Ok(self.require(file_id).await?.text())
    }

    /// Drop the document. Slots still hydrating are left alone.
    pub async fn close(&self, file_id: &str) -> bool {
        let mut docs = self.docs.lock().await;
        if docs.get(file_id).is_some_and(|slot| slot.initialized()) {
            docs.remove(file_id);
            info!("Document {} removed from memory", file_id);
            return true;
        }
        false
    }

    pub async fn live_documents(&self) -> Vec<Arc<LiveDocument>> {
        let docs = self.docs.lock().await;
        docs.values().filter_map(|slot| slot.get().cloned()).collect()
    }

    pub async fn len(&self) -> usize {
        self.live_documents().await.len()
    }

    pub async fn dirty_count(&self) -> usize {
        self.live_documents().await.iter().filter(|doc| doc.is_dirty()).count()
    }

    /// Empty the registry, handing back what was live so the caller can flush it.
    pub async fn shutdown(&self) -> Vec<Arc<LiveDocument>> {
        let mut docs = self.docs.lock().await;
        let live = docs.drain().filter_map(|(_, slot)| slot.get().cloned()).collect::<Vec<_>>();
        info!("Document registry shut down ({} documents released)", live.len());
        live
    }
}
