//! A layer stack whose committed layers live in a [`LayerStore`].
//!
//! Every commit stores the current layer's script under its slot before the
//! new layer is opened; opening a `PersistedLayers` replays all stored
//! scripts, in slot order, on top of the seed layer.

use std::collections::BTreeMap;
use std::fmt;

use tracing::info;

use crate::construct::{Layer, LayerEditor};
use crate::datatype::{DataType, Datum};
use crate::error::{LayersError, Result};
use crate::persist::{LayerStore, PersistenceMode, Persistor};
use crate::script::{Engine, Session};
use crate::stack::LayerStack;

pub struct PersistedLayers {
    stack: LayerStack,
    store: Box<dyn LayerStore + Send>,
    engine: Engine,
}

impl PersistedLayers {
    /// Empty seed, built-in rules, SQLite store.
    pub fn new(mode: PersistenceMode) -> Result<Self> {
        Self::open(Box::new(Persistor::new(mode)?), LayerStack::default(), Engine::default())
    }
    /// Rebuild `stack` from everything in `store`. The stack is expected to
    /// be freshly built: stored slots must follow on from its top layer.
    pub fn open(store: Box<dyn LayerStore + Send>, stack: LayerStack, engine: Engine) -> Result<Self> {
        let mut layers = Self { stack, store, engine };
        layers.restore()?;
        Ok(layers)
    }
    fn restore(&mut self) -> Result<()> {
        let stored = self.store.load_all()?;
        let restored = stored.len();
        for layer in stored {
            let top = self.stack.current().slot();
            if layer.slot != top {
                return Err(LayersError::DataCorruption {
                    message: format!("stored layer {} does not follow on from slot {}", layer.slot, top),
                });
            }
            let mut editor = self.stack.current_mut();
            self.engine.apply_script(&mut editor, &layer.script)?;
            editor.set_meta("description", layer.description.as_str());
            if let Some(notes) = &layer.notes {
                editor.set_meta("notes", notes.as_str());
            }
            editor.set_meta("commit-time", layer.committed_at.to_rfc3339());
            editor.set_meta("hash", layer.hash.as_str());
            self.stack.commit();
        }
        if restored > 0 {
            info!(restored, top = self.stack.current().slot(), "restored layers");
        }
        Ok(())
    }

    pub fn stack(&self) -> &LayerStack {
        &self.stack
    }
    pub fn engine(&self) -> &Engine {
        &self.engine
    }
    pub fn current(&self) -> &Layer {
        self.stack.current()
    }
    pub fn current_mut(&mut self) -> LayerEditor<'_> {
        self.stack.current_mut()
    }
    pub fn resolve<T: DataType>(&self, key: &str) -> Result<T> {
        self.stack.resolve(key)
    }
    pub fn resolve_all(&self) -> Result<BTreeMap<String, Datum>> {
        self.stack.resolve_all()
    }
    pub fn head(&mut self) -> Result<Option<String>> {
        self.store.head()
    }

    /// Apply `script` to the current layer and commit it. Returns the slot
    /// that was committed.
    pub fn create_layer(&mut self, description: &str, script: &str, notes: Option<&str>) -> Result<usize> {
        let mut editor = self.stack.current_mut();
        self.engine.apply_script(&mut editor, script)?;
        self.commit(description, notes)
    }
    /// Store the current layer, then open a new one above it. Returns the
    /// slot that was committed. A layer whose recorded script would not
    /// rebuild it on open is refused and stays uncommitted.
    pub fn commit(&mut self, description: &str, notes: Option<&str>) -> Result<usize> {
        let description = clean(description);
        let notes = notes.map(clean);
        let current = self.stack.current();
        self.engine.check_replay(current)?;
        let slot = current.slot();
        let stored = self.store.store(
            slot,
            &current.script(),
            &description,
            notes.as_deref(),
            &current.to_diff(),
        )?;
        let mut editor = self.stack.current_mut();
        editor.set_meta("description", description);
        if let Some(notes) = notes {
            editor.set_meta("notes", notes);
        }
        editor.set_meta("commit-time", stored.committed_at.to_rfc3339());
        editor.set_meta("hash", stored.hash);
        self.stack.commit();
        Ok(slot)
    }
    /// Discard the current layer, and its stored row if it had one.
    pub fn rollback(&mut self) -> Result<&Layer> {
        self.store.discard(self.stack.current().slot())?;
        Ok(self.stack.rollback())
    }
    /// Run a full layer script; `commit` statements are stored.
    pub fn execute(&mut self, script: &str) -> Result<usize> {
        let engine = self.engine.clone();
        engine.execute(self, script)
    }
}

impl Session for PersistedLayers {
    fn editor(&mut self) -> LayerEditor<'_> {
        self.stack.current_mut()
    }
    fn commit(&mut self, description: &str, notes: Option<&str>) -> Result<()> {
        PersistedLayers::commit(self, description, notes).map(|_| ())
    }
    fn rollback(&mut self) -> Result<()> {
        PersistedLayers::rollback(self).map(|_| ())
    }
}

impl fmt::Debug for PersistedLayers {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PersistedLayers")
            .field("stack", &self.stack)
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

/// Strip the common indentation and surrounding blank space.
pub(crate) fn clean(text: &str) -> String {
    let indent = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);
    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                ""
            } else {
                line.get(indent..).unwrap_or_else(|| line.trim_start())
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_owned()
}
