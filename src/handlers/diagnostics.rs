use crate::{AppState, auth::auth, models::{DiagnosticsResponse, ErrorResponse}};
use axum::{extract::{State, Extension}, http::StatusCode, Json};
use std::sync::Arc;
use std::sync::{Mutex, OnceLock};
use sysinfo::System;
use tracing::info;

static SYSTEM_MONITOR: OnceLock<Mutex<System>> = OnceLock::new();

/// Snapshot of the collaboration state and the host
pub async fn diagnostics(
    State(state): State<Arc<AppState>>,
    Extension(prpls): Extension<Vec<String>>,
) -> Result<(StatusCode, Json<DiagnosticsResponse>), (StatusCode, Json<ErrorResponse>)> {

    auth::ensure_cloud_admin(&prpls)?;

    let gateway = &state.gateway;
    let n_sessions = gateway.session_count() as u32;
    let n_rooms = gateway.rooms().room_count() as u32;
    let n_live_docs = gateway.registry().len().await as u32;
    let n_dirty_docs = gateway.registry().dirty_count().await as u32;
    let n_access_entries = gateway.access().entry_count() as u32;

    let host = host_stats();

    info!(
        "Diagnostics: CPU: {:.2}%, Mem: {}/{} MB (Free: {} MB), Sessions: {}, Rooms: {}, Docs: {} ({} dirty)",
        host.cpu_usage,
        host.memory_alloc / 1024 / 1024,
        host.memory_total / 1024 / 1024,
        host.memory_free / 1024 / 1024,
        n_sessions,
        n_rooms,
        n_live_docs,
        n_dirty_docs
    );

    Ok((
        StatusCode::OK,
        Json(DiagnosticsResponse {
            n_sessions,
            n_rooms,
            n_live_docs,
            n_dirty_docs,
            n_access_entries,
            cpu_usage: host.cpu_usage,
            memory_alloc: host.memory_alloc,
            memory_total: host.memory_total,
            memory_free: host.memory_free,
        }),
    ))
}

#[derive(Default)]
struct HostStats {
    cpu_usage: f32,
    memory_alloc: u64,
    memory_total: u64,
    memory_free: u64,
}

/// CPU and memory of the host; zeros if the monitor lock is poisoned.
fn host_stats() -> HostStats {
    let monitor = SYSTEM_MONITOR.get_or_init(|| Mutex::new(System::new_all()));
    let Ok(mut sys) = monitor.lock() else {
        return HostStats::default();
    };
    sys.refresh_cpu();
    sys.refresh_memory();
    HostStats {
        cpu_usage: sys.global_cpu_info().cpu_usage(),
        memory_alloc: sys.used_memory(),
        memory_total: sys.total_memory(),
        memory_free: sys.free_memory(),
    }
}
