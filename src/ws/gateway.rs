//! Session gateway: authenticates connections and maps client messages onto
//! the access cache, the document registry and the persistence scheduler.
//!
//! ```text
//! client ──► authenticate ──► Session ──► dispatch ─┬─► AccessCache
//!                                                   ├─► DocumentRegistry ──► RoomHub fan-out
//!                                                   └─► PersistenceScheduler
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::clients::{AccessPolicy, Authenticator, FileService, UserIdentity};
use crate::config::Config;
use crate::models::{
    ClientMessage, FileListMessage, FileSavedMessage, FileUpdateMessage, JoinFileListMessage,
    JoinFileMessage, RelayMessage, SaveFileMessage, ServerMessage, SyncError, SyncMessage,
};
use crate::ws::access_cache::AccessCache;
use crate::ws::registry::DocumentRegistry;
use crate::ws::rooms::{file_list_room, file_room, RoomHub};
use crate::ws::scheduler::PersistenceScheduler;
use crate::ws::session::Session;

/// Result of the per-connection authentication step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated(UserIdentity),
    Rejected(String),
}

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub save_debounce: Duration,
    pub idle_eviction: Duration,
    pub access_cache_capacity: u64,
    pub access_cache_ttl: Duration,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        GatewaySettings::from(&Config::default())
    }
}

impl From<&Config> for GatewaySettings {
    fn from(config: &Config) -> Self {
        Self {
            save_debounce: config.save_debounce(),
            idle_eviction: config.idle_eviction(),
            access_cache_capacity: config.access_cache_capacity,
            access_cache_ttl: config.access_cache_ttl(),
        }
    }
}

pub struct Gateway {
    registry: Arc<DocumentRegistry>,
    scheduler: Arc<PersistenceScheduler>,
    access: AccessCache,
    rooms: RoomHub,
    authenticator: Arc<dyn Authenticator>,
    files: Arc<dyn FileService>,
    sessions: AtomicUsize,
}

impl Gateway {
    pub fn new(
        registry: Arc<DocumentRegistry>,
        scheduler: Arc<PersistenceScheduler>,
        access: AccessCache,
        authenticator: Arc<dyn Authenticator>,
        files: Arc<dyn FileService>,
    ) -> Self {
        Self {
            registry,
            scheduler,
            access,
            rooms: RoomHub::new(),
            authenticator,
            files,
            sessions: AtomicUsize::new(0),
        }
    }

    /// Wire a gateway with its own registry, scheduler and access cache.
    pub fn from_settings(
        authenticator: Arc<dyn Authenticator>,
        policy: Arc<dyn AccessPolicy>,
        files: Arc<dyn FileService>,
        settings: GatewaySettings,
    ) -> Self {
        let registry = Arc::new(DocumentRegistry::new(files.clone()));
        let scheduler = PersistenceScheduler::new(
            registry.clone(),
            files.clone(),
            settings.save_debounce,
            settings.idle_eviction,
        );
        let access = AccessCache::new(policy, settings.access_cache_capacity, settings.access_cache_ttl);
        Self::new(registry, scheduler, access, authenticator, files)
    }

    pub fn registry(&self) -> &Arc<DocumentRegistry> {
        &self.registry
    }

    pub fn scheduler(&self) -> &Arc<PersistenceScheduler> {
        &self.scheduler
    }

    pub fn access(&self) -> &AccessCache {
        &self.access
    }

    pub fn rooms(&self) -> &RoomHub {
        &self.rooms
    }

    pub fn session_count(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }

    /// Runs once per connection, before any message is read.
    pub async fn authenticate(&self, token: Option<&str>) -> AuthOutcome {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            warn!("Authentication error: No token provided");
            return AuthOutcome::Rejected("No token provided".to_string());
        };
        match self.authenticator.verify(token).await {
            Ok(user) => {
                info!("User authenticated: {}", user.id);
                AuthOutcome::Authenticated(user)
            }
            Err(e) => {
                warn!("Authentication failed: {}", e);
                AuthOutcome::Rejected(e.to_string())
            }
        }
    }

    pub fn open_session(&self, user: UserIdentity, outbox: UnboundedSender<ServerMessage>) -> Session {
        self.sessions.fetch_add(1, Ordering::SeqCst);
        let session = Session::new(user, outbox);
        info!("Session {} connected for user {}", session.id, session.user.id);
        session
    }

    /// Remove the session from every room. Documents stay in the registry.
    pub fn close_session(&self, session: Session) {
        for room in session.rooms() {
            self.rooms.leave(room, session.id);
        }
        self.sessions.fetch_sub(1, Ordering::SeqCst);
        info!("Session {} disconnected ({})", session.id, session.user.email.as_deref().unwrap_or("unknown email"));
    }

    /// Handle one client message; failures go back to this session only.
    pub async fn dispatch(&self, session: &mut Session, msg: ClientMessage) {
        let result = match msg {
            ClientMessage::JoinProjectFileList(msg) => self.join_file_list(session, msg).await,
            ClientMessage::JoinProjectFile(msg) => self.join_file(session, msg).await,
            ClientMessage::Update(msg) => self.apply_update(session, msg).await,
            ClientMessage::AwarenessUpdate(msg) => self.relay_awareness(session, msg).await,
            ClientMessage::SaveFile(msg) => self.save_file(session, msg).await,
        };
        if let Err(e) = result {
            warn!("Operation failed for session {}: {}", session.id, e);
            session.send(ServerMessage::error(e.client_message()));
        }
    }

    async fn ensure_access(&self, session: &Session, project_id: &str) -> Result<(), SyncError> {
        if self.access.check_access(&session.user.id, project_id).await? {
            return Ok(());
        }
        warn!("Unauthorized access attempt by user {} to project {}", session.user.id, project_id);
        Err(SyncError::Unauthorized)
    }

    async fn join_file_list(&self, session: &mut Session, msg: JoinFileListMessage) -> Result<(), SyncError> {
        self.ensure_access(session, &msg.project_id).await?;
        let files = self.files.list_file_tree(&msg.project_id).await?;

        let room = file_list_room(&msg.project_id);
        self.rooms.join(&room, session.id, session.outbox());
        info!("Session {} joined project file list room: {}", session.id, room);
        session.remember_room(room);
        session.send(ServerMessage::FileList(FileListMessage { project_id: msg.project_id, files }));
        Ok(())
    }

    async fn join_file(&self, session: &mut Session, msg: JoinFileMessage) -> Result<(), SyncError> {
        self.ensure_access(session, &msg.project_id).await?;

        // Touch first: an eviction that already fired must not close the document we are about to hand out
        self.scheduler.touch(&msg.file_id).await;
        let doc = match self.registry.open(&msg.file_id).await {
            Ok(doc) => doc,
            Err(e) => {
                if self.registry.get(&msg.file_id).await.is_none() {
                    self.scheduler.cancel(&msg.file_id).await;
                }
                return Err(e);
            }
        };

        // Snapshot and membership are taken together so no update falls between them
        let state = doc.encode_full_state()?;
        let room = file_room(&msg.project_id, &msg.file_id);
        self.rooms.join(&room, session.id, session.outbox());
        info!("Session {} joined file room: {}", session.id, room);
        session.remember_room(room);
        session.send(ServerMessage::Sync(SyncMessage { file_id: msg.file_id, state }));
        Ok(())
    }

    async fn apply_update(&self, session: &mut Session, msg: FileUpdateMessage) -> Result<(), SyncError> {
        self.ensure_access(session, &msg.project_id).await?;
        if self.registry.get(&msg.file_id).await.is_none() {
            return Err(SyncError::NotFound(format!("Document for file '{}'", msg.file_id)));
        }

        self.scheduler.touch(&msg.file_id).await;
        self.registry.apply_remote_update(&msg.file_id, &msg.update).await?;
        // Nothing may await between apply and fan-out: the room sees updates in apply order
        let room = file_room(&msg.project_id, &msg.file_id);
        let relay = ServerMessage::Update(RelayMessage { file_id: msg.file_id, update: msg.update });
        let delivered = self.rooms.broadcast(&room, &relay, Some(session.id));
        debug!("Update from session {} relayed to {} co-editors", session.id, delivered);
        Ok(())
    }

    async fn relay_awareness(&self, session: &mut Session, msg: FileUpdateMessage) -> Result<(), SyncError> {
        self.ensure_access(session, &msg.project_id).await?;
        let room = file_room(&msg.project_id, &msg.file_id);
        let relay = ServerMessage::AwarenessUpdate(RelayMessage { file_id: msg.file_id, update: msg.update });
        self.rooms.broadcast(&room, &relay, Some(session.id));
        Ok(())
    }

    async fn save_file(&self, session: &mut Session, msg: SaveFileMessage) -> Result<(), SyncError> {
        self.ensure_access(session, &msg.project_id).await?;
        self.scheduler.save_now(&msg.file_id).await?;
        session.send(ServerMessage::FileSaved(FileSavedMessage { file_id: msg.file_id }));
        Ok(())
    }

    /// Push a fresh file tree to everyone watching the project's file list.
    pub async fn publish_file_list(&self, project_id: &str) -> Result<usize, SyncError> {
        let files = self.files.list_file_tree(project_id).await?;
        let msg = ServerMessage::FileList(FileListMessage { project_id: project_id.to_string(), files });
        let delivered = self.rooms.broadcast(&file_list_room(project_id), &msg, None);
        info!("Pushed file list of project {} to {} sessions", project_id, delivered);
        Ok(delivered)
    }

    /// Flush dirty documents and release the registry.
    pub async fn shutdown(&self) {
        let saved = self.scheduler.flush_all().await;
        let released = self.registry.shutdown().await;
        info!("Gateway shut down: {} documents flushed, {} released", saved, released.len());
    }
}
