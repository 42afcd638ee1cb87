use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::clients::FileService;
use crate::models::SyncError;
use crate::ws::registry::DocumentRegistry;

#[derive(Clone, Copy, Debug)]
enum TimerKind {
    Save,
    Idle,
}

/// Pending timers of one file. `epoch` grows on every touch so a fired
/// idle timer can tell whether anything happened after it was armed.
#[derive(Default)]
struct FileTimers {
    epoch: u64,
    save: Option<JoinHandle<()>>,
    idle: Option<JoinHandle<()>>,
}

impl FileTimers {
    fn cancel(&mut self) {
        if let Some(handle) = self.save.take() {
            handle.abort();
        }
        if let Some(handle) = self.idle.take() {
            handle.abort();
        }
    }
}

/// Debounced write-back of live documents and eviction of idle ones.
pub struct PersistenceScheduler {
    registry: Arc<DocumentRegistry>,
    files: Arc<dyn FileService>,
    save_delay: Duration,
    idle_delay: Duration,
    timers: Mutex<HashMap<String, FileTimers>>,
}

impl PersistenceScheduler {
    pub fn new(
        registry: Arc<DocumentRegistry>,
        files: Arc<dyn FileService>,
        save_delay: Duration,
        idle_delay: Duration,
    ) -> Arc<Self> {
        info!("Persistence scheduler initialized (save after {:?}, evict after {:?})", save_delay, idle_delay);
        Arc::new(Self {
            registry,
            files,
            save_delay,
            idle_delay,
            timers: Mutex::new(HashMap::new()),
        })
    }

    /// Record activity on a file: both timers restart from now and any
    /// eviction that has fired but not yet closed the document is called off.
    pub async fn touch(self: &Arc<Self>, file_id: &str) {
        let mut timers = self.timers.lock().await;
        let entry = timers.entry(file_id.to_string()).or_default();
        entry.cancel();
        entry.epoch += 1;
        entry.save = Some(self.arm(file_id, entry.epoch, TimerKind::Save));
        entry.idle = Some(self.arm(file_id, entry.epoch, TimerKind::Idle));
    }

    /// Forget a file whose document never came to life.
    pub async fn cancel(&self, file_id: &str) {
        if let Some(mut entry) = self.timers.lock().await.remove(file_id) {
            entry.cancel();
        }
    }

    fn arm(self: &Arc<Self>, file_id: &str, epoch: u64, kind: TimerKind) -> JoinHandle<()> {
        let this = Arc::clone(self);
        let file_id = file_id.to_string();
        let delay = match kind {
            TimerKind::Save => self.save_delay,
            TimerKind::Idle => self.idle_delay,
        };
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Once fired the work runs detached: a later touch aborts only sleeping timers.
            tokio::spawn(async move {
                match kind {
                    TimerKind::Save => this.on_save_timer(&file_id).await,
                    TimerKind::Idle => this.on_idle_timer(&file_id, epoch).await,
                }
            });
        })
    }

    async fn on_save_timer(&self, file_id: &str) {
        match self.save(file_id, false).await {
            Ok(true) => debug!("Debounced save of {} complete", file_id),
            Ok(false) => debug!("Nothing to save for {}", file_id),
            Err(SyncError::NotFound(_)) => debug!("Save timer fired for {} after it left memory", file_id),
            Err(e) => error!("Debounced save of {} failed: {}", file_id, e),
        }
    }

    async fn on_idle_timer(self: &Arc<Self>, file_id: &str, epoch: u64) {
        if let Err(e) = self.save(file_id, false).await {
            if !matches!(e, SyncError::NotFound(_)) {
                error!("Final save of {} failed, keeping it in memory: {}", file_id, e);
                let mut timers = self.timers.lock().await;
                if let Some(entry) = timers.get_mut(file_id).filter(|entry| entry.epoch == epoch) {
                    entry.idle = Some(self.arm(file_id, epoch, TimerKind::Idle));
                }
                return;
            }
        }

        let mut timers = self.timers.lock().await;
        match timers.get(file_id) {
            Some(entry) if entry.epoch == epoch => {}
            _ => {
                debug!("Eviction of {} cancelled by later activity", file_id);
                return;
            }
        }
        if let Some(mut entry) = timers.remove(file_id) {
            entry.cancel();
        }
        // The timer table stays locked until the document is gone, so no touch slips in between.
        self.registry.close(file_id).await;
        info!("File {} removed from memory due to inactivity", file_id);
    }

    /// Write the document's text to storage. Unless `force`d, clean documents are skipped.
    /// Returns whether anything was written.
    pub async fn save(&self, file_id: &str, force: bool) -> Result<bool, SyncError> {
        let doc = self
            .registry
            .get(file_id)
            .await
            .ok_or_else(|| SyncError::NotFound(format!("Document for file '{}'", file_id)))?;

        let _guard = doc.lock_saves().await;
        let was_dirty = doc.take_dirty();
        if !was_dirty && !force {
            return Ok(false);
        }

        let text = doc.text();
        match self.files.write_text(doc.path(), &text).await {
            Ok(()) => {
                info!("File {} saved successfully", file_id);
                Ok(true)
            }
            Err(e) => {
                doc.mark_dirty();
                error!("Error saving file {}: {}", file_id, e);
                Err(SyncError::PersistenceFailure {
                    file_id: file_id.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Client-requested save: written immediately, then both timers restart.
    pub async fn save_now(self: &Arc<Self>, file_id: &str) -> Result<(), SyncError> {
        let result = self.save(file_id, true).await.map(|_| ());
        self.touch(file_id).await;
        result
    }

    /// Stop every timer and write back every dirty document.
    pub async fn flush_all(&self) -> usize {
        for (_, mut entry) in self.timers.lock().await.drain() {
            entry.cancel();
        }

        let mut saved = 0;
        for doc in self.registry.live_documents().await {
            match self.save(doc.file_id(), false).await {
                Ok(true) => saved += 1,
                Ok(false) => {}
                Err(e) => error!("Flush of {} failed: {}", doc.file_id(), e),
            }
        }
        info!("Flushed {} dirty documents", saved);
        saved
    }

    pub async fn pending(&self) -> usize {
        self.timers.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{client_from_state, client_insert, MemoryFileService};

    const SAVE: Duration = Duration::from_secs(5);
    const IDLE: Duration = Duration::from_secs(300);

    async fn setup(content: &str) -> (Arc<MemoryFileService>, Arc<DocumentRegistry>, Arc<PersistenceScheduler>) {
        let files = Arc::new(MemoryFileService::new());
        files.add_file("f1", "text/plain", content);
        let registry = Arc::new(DocumentRegistry::new(files.clone()));
        let scheduler = PersistenceScheduler::new(registry.clone(), files.clone(), SAVE, IDLE);
        registry.open("f1").await.unwrap();
        (files, registry, scheduler)
    }

    async fn edit(registry: &DocumentRegistry, text: &str) {
        let client = client_from_state(&registry.encode_full_state("f1").await.unwrap());
        let len = client.get_text("f1").len_unicode();
        let update = client_insert(&client, "f1", len, text);
        registry.apply_remote_update("f1", &update).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_writes_once_after_quiet_period() {
        let (files, registry, scheduler) = setup("").await;

        for word in ["a", "b", "c"] {
            edit(&registry, word).await;
            scheduler.touch("f1").await;
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
        assert!(files.writes().is_empty());

        tokio::time::sleep(Duration::from_secs(4)).await;
        let writes = files.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].1, "abc");
        assert!(!registry.get("f1").await.unwrap().is_dirty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_write_keeps_dirty_and_retries_on_next_touch() {
        let (files, registry, scheduler) = setup("").await;
        files.fail_writes(1);

        edit(&registry, "draft").await;
        scheduler.touch("f1").await;
        tokio::time::sleep(SAVE + Duration::from_secs(1)).await;
        assert!(files.writes().is_empty());
        assert!(registry.get("f1").await.unwrap().is_dirty());

        scheduler.touch("f1").await;
        tokio::time::sleep(SAVE + Duration::from_secs(1)).await;
        assert_eq!(files.writes().len(), 1);
        assert_eq!(files.content_of("f1").unwrap(), "draft");
    }

    #[tokio::test(start_paused = true)]
    async fn idle_document_is_saved_once_then_evicted() {
        let (files, registry, scheduler) = setup("x").await;

        edit(&registry, "y").await;
        scheduler.touch("f1").await;
        tokio::time::sleep(IDLE + Duration::from_secs(1)).await;

        assert_eq!(files.writes().len(), 1);
        assert_eq!(files.content_of("f1").unwrap(), "xy");
        assert!(registry.get("f1").await.is_none());
        assert_eq!(scheduler.pending().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dirty_document_gets_its_final_save_on_eviction() {
        let files = Arc::new(MemoryFileService::new());
        files.add_file("f1", "text/plain", "");
        let registry = Arc::new(DocumentRegistry::new(files.clone()));
        // Save window longer than the idle window: only the eviction path can write
        let scheduler = PersistenceScheduler::new(registry.clone(), files.clone(), IDLE * 2, IDLE);
        registry.open("f1").await.unwrap();

        edit(&registry, "late").await;
        scheduler.touch("f1").await;
        tokio::time::sleep(IDLE + Duration::from_secs(1)).await;

        assert_eq!(files.writes(), vec![(std::path::PathBuf::from("/data/f1.tex"), "late".to_string())]);
        assert!(registry.get("f1").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn touches_keep_the_document_alive() {
        let (_files, registry, scheduler) = setup("").await;

        for _ in 0..3 {
            scheduler.touch("f1").await;
            tokio::time::sleep(IDLE - Duration::from_secs(10)).await;
        }
        assert!(registry.get("f1").await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn touch_during_final_save_cancels_the_eviction() {
        let (files, registry, scheduler) = setup("").await;
        edit(&registry, "z").await;
        scheduler.touch("f1").await;
        let epoch = scheduler.timers.lock().await.get("f1").unwrap().epoch;

        // A join lands after the idle timer fired but before the close runs
        scheduler.touch("f1").await;
        scheduler.on_idle_timer("f1", epoch).await;

        assert!(registry.get("f1").await.is_some());
        assert_eq!(files.content_of("f1").unwrap(), "z");
    }

    #[tokio::test(start_paused = true)]
    async fn failed_final_save_keeps_the_document() {
        let files = Arc::new(MemoryFileService::new());
        files.add_file("f1", "text/plain", "");
        let registry = Arc::new(DocumentRegistry::new(files.clone()));
        let scheduler = PersistenceScheduler::new(registry.clone(), files.clone(), IDLE * 2, IDLE);
        registry.open("f1").await.unwrap();
        files.fail_writes(1);

        edit(&registry, "keep").await;
        scheduler.touch("f1").await;
        tokio::time::sleep(IDLE + Duration::from_secs(1)).await;
        assert!(registry.get("f1").await.is_some());

        // The re-armed idle timer retries and succeeds
        tokio::time::sleep(IDLE).await;
        assert!(registry.get("f1").await.is_none());
        assert_eq!(files.content_of("f1").unwrap(), "keep");
    }

    #[tokio::test(start_paused = true)]
    async fn save_now_writes_clean_documents_too() {
        let (files, _registry, scheduler) = setup("same").await;

        scheduler.save_now("f1").await.unwrap();
        assert_eq!(files.writes().len(), 1);
        assert_eq!(scheduler.pending().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn save_now_reports_persistence_failure() {
        let (files, registry, scheduler) = setup("").await;
        files.fail_writes(1);
        edit(&registry, "q").await;

        let err = scheduler.save_now("f1").await.unwrap_err();
        assert!(matches!(err, SyncError::PersistenceFailure { .. }));
        assert!(registry.get("f1").await.unwrap().is_dirty());
    }

    #[tokio::test(start_paused = true)]
    async fn flush_all_writes_dirty_documents_and_stops_timers() {
        let (files, registry, scheduler) = setup("").await;
        edit(&registry, "unsaved").await;
        scheduler.touch("f1").await;

        assert_eq!(scheduler.flush_all().await, 1);
        assert_eq!(scheduler.pending().await, 0);
        assert_eq!(files.content_of("f1").unwrap(), "unsaved");

        tokio::time::sleep(IDLE * 2).await;
        assert_eq!(files.writes().len(), 1);
    }
}
