//! Shared, threaded access to one persisted layer stack.
//!
//! The stack itself does no locking and assumes one writer at a time. This
//! module puts the whole stack behind a single mutex so several threads can
//! submit layer scripts; each script runs to completion while holding the
//! lock, on the caller's thread or on a background thread.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::datatype::Datum;
use crate::error::{LayersError, Result};
use crate::persisted::PersistedLayers;

/// Opaque script identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScriptId(u64);

/// Handle to a script running on a background thread.
#[derive(Debug)]
pub struct ScriptHandle {
    pub id: ScriptId,
    started: Instant,
    join: JoinHandle<Result<usize>>,
}
impl ScriptHandle {
    /// Wait for the script to finish; yields the number of statements run.
    pub fn join(self) -> Result<usize> {
        let id = self.id;
        self.join
            .join()
            .map_err(|_| LayersError::Execution(format!("script {:?} panicked", id)))?
    }
    /// Elapsed time since start.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

pub struct LayerInterface {
    layers: Arc<Mutex<PersistedLayers>>,
    next_id: Mutex<u64>,
}

impl LayerInterface {
    pub fn new(layers: PersistedLayers) -> Self {
        Self::from_shared(Arc::new(Mutex::new(layers)))
    }
    pub fn from_shared(layers: Arc<Mutex<PersistedLayers>>) -> Self {
        Self { layers, next_id: Mutex::new(0) }
    }
    pub fn shared(&self) -> Arc<Mutex<PersistedLayers>> {
        Arc::clone(&self.layers)
    }

    fn allocate_id(&self) -> Result<ScriptId> {
        let mut g = self.next_id.lock().map_err(|e| LayersError::Lock(e.to_string()))?;
        *g += 1;
        Ok(ScriptId(*g))
    }
    fn lock(&self) -> Result<MutexGuard<'_, PersistedLayers>> {
        self.layers.lock().map_err(|e| LayersError::Lock(e.to_string()))
    }

    /// Submit a layer script for execution on a background thread.
    pub fn start_script(&self, script: String) -> Result<ScriptHandle> {
        let id = self.allocate_id()?;
        let layers = Arc::clone(&self.layers);
        let join = std::thread::spawn(move || -> Result<usize> {
            let mut guard = layers.lock().map_err(|e| LayersError::Lock(e.to_string()))?;
            let executed = guard.execute(&script)?;
            debug!(?id, executed, "background script finished");
            Ok(executed)
        });
        Ok(ScriptHandle { id, started: Instant::now(), join })
    }
    /// Run a layer script on the current thread.
    pub fn run_sync(&self, script: &str) -> Result<usize> {
        self.lock()?.execute(script)
    }
    pub fn resolve_all(&self) -> Result<BTreeMap<String, Datum>> {
        self.lock()?.resolve_all()
    }
    /// Run `f` with exclusive access to the layers.
    pub fn with<R>(&self, f: impl FnOnce(&mut PersistedLayers) -> R) -> Result<R> {
        let mut guard = self.lock()?;
        Ok(f(&mut guard))
    }
}
