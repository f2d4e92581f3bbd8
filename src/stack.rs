//! The layer stack and its resolution algorithm.
//!
//! Resolving a key walks the layers newest to oldest. The topmost layer that
//! holds a *rule* for the key governs it (a newer literal does not shadow an
//! older rule), and that rule is handed every occurrence of the key across
//! the whole stack, newest first. Rules may resolve other keys through their
//! [`ResolutionContext`]; each nested lookup re-runs the full algorithm.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Deserialize;
use tracing::{debug, trace, warn};

use crate::construct::{Layer, LayerEditor, Value};
use crate::datatype::{DataType, Datum};
use crate::error::{LayersError, Result};

/// What the bottom layer becomes when a rollback would leave the stack empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReseedPolicy {
    /// Recreate the bottom layer with the values the stack was built with.
    #[default]
    Seed,
    /// Recreate the bottom layer empty.
    Empty,
}

// ------------- LayerStack -------------
#[derive(Debug, Clone)]
pub struct LayerStack {
    layers: Vec<Layer>, // bottom (slot 0) first, never empty
    seed: BTreeMap<String, Value>,
    policy: ReseedPolicy,
}

impl LayerStack {
    pub fn new<K, V>(seed: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Self::with_policy(seed, ReseedPolicy::default())
    }
    pub fn with_policy<K, V>(seed: impl IntoIterator<Item = (K, V)>, policy: ReseedPolicy) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let seed: BTreeMap<String, Value> = seed
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        Self {
            layers: vec![Layer::seeded(0, seed.clone())],
            seed,
            policy,
        }
    }
    pub fn policy(&self) -> ReseedPolicy {
        self.policy
    }
    pub fn current(&self) -> &Layer {
        &self.layers[self.layers.len() - 1]
    }
    pub fn current_mut(&mut self) -> LayerEditor<'_> {
        let top = self.layers.len() - 1;
        LayerEditor::new(&mut self.layers[top])
    }
    /// Editor for the layer at `slot`, which has to be the top layer.
    pub fn editor(&mut self, slot: usize) -> Result<LayerEditor<'_>> {
        let top = self.current().slot();
        if slot != top {
            return Err(LayersError::IllegalEdit { slot, top });
        }
        Ok(self.current_mut())
    }
    /// All layers, oldest first.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }
    pub fn layer(&self, slot: usize) -> Option<&Layer> {
        self.layers.iter().find(|layer| layer.slot() == slot)
    }
    pub fn len(&self) -> usize {
        self.layers.len()
    }
    /// Always false: rollback reseeds instead of removing the last layer.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Freeze the current layer and open an empty one above it.
    pub fn commit(&mut self) -> &Layer {
        let slot = self.current().slot() + 1;
        self.layers.push(Layer::new(slot));
        debug!(slot, "committed layer {}", slot - 1);
        self.current()
    }
    /// Discard the current layer. Rolling back the last remaining layer
    /// recreates it at the same slot according to the [`ReseedPolicy`].
    pub fn rollback(&mut self) -> &Layer {
        if let Some(discarded) = self.layers.pop() {
            debug!(slot = discarded.slot(), "rolled back layer");
            if self.layers.is_empty() {
                let contents = match self.policy {
                    ReseedPolicy::Seed => self.seed.clone(),
                    ReseedPolicy::Empty => BTreeMap::new(),
                };
                warn!(slot = discarded.slot(), policy = ?self.policy, "rolled back the last layer, reseeding");
                self.layers.push(Layer::seeded(discarded.slot(), contents));
            }
        }
        self.current()
    }

    /// Every entry for `key`, newest first.
    pub fn occurrences<'s>(&'s self, key: &'s str) -> impl Iterator<Item = &'s Value> + 's {
        self.layers.iter().rev().filter_map(move |layer| layer.get(key))
    }
    pub fn resolve<T: DataType>(&self, key: &str) -> Result<T> {
        let datum = self.resolve_datum(key)?;
        convert(key, &datum)
    }
    pub fn resolve_datum(&self, key: &str) -> Result<Datum> {
        Resolver::new(self).resolve(key)
    }
    /// Resolve every key governed by at least one rule. Keys that only ever
    /// hold literals cannot be resolved and are left out; read them raw
    /// through [`Layer::get`].
    pub fn resolve_all(&self) -> Result<BTreeMap<String, Datum>> {
        let resolver = Resolver::new(self);
        let keys: BTreeSet<&str> = self
            .layers
            .iter()
            .flat_map(|layer| layer.entries())
            .filter(|(_, value)| value.is_rule())
            .map(|(key, _)| key)
            .collect();
        let mut resolved = BTreeMap::new();
        for key in keys {
            resolved.insert(key.to_owned(), resolver.resolve(key)?);
        }
        Ok(resolved)
    }

    /// Raw, unresolved contents of every layer, oldest first.
    pub fn as_list(&self) -> Vec<BTreeMap<String, Value>> {
        self.layers
            .iter()
            .map(|layer| layer.contents().clone())
            .collect()
    }
    /// The pending change: the diff of the current layer.
    pub fn diff(&self) -> String {
        self.current().to_diff()
    }
}
impl Default for LayerStack {
    fn default() -> Self {
        Self::new(Vec::<(String, Value)>::new())
    }
}
impl fmt::Display for LayerStack {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let layers = self
            .layers
            .iter()
            .map(|layer| layer.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "LayerStack[{}]", layers)
    }
}

pub(crate) fn convert<T: DataType>(key: &str, datum: &Datum) -> Result<T> {
    T::from_datum(datum).ok_or_else(|| LayersError::TypeMismatch {
        key: key.to_owned(),
        expected: T::DATA_TYPE,
        found: datum.kind(),
    })
}

// ------------- Resolution -------------
// One resolver lives for one top-level resolve call. It tracks the chain of
// keys currently being resolved so a rule that (indirectly) asks for its own
// key fails instead of recursing forever.
struct Resolver<'s> {
    stack: &'s LayerStack,
    chain: RefCell<Vec<String>>,
}

impl<'s> Resolver<'s> {
    fn new(stack: &'s LayerStack) -> Self {
        Self {
            stack,
            chain: RefCell::new(Vec::new()),
        }
    }
    fn resolve(&self, key: &str) -> Result<Datum> {
        let occurrences: Vec<&Value> = self.stack.occurrences(key).collect();
        if occurrences.is_empty() {
            return Err(LayersError::UnknownKey(key.to_owned()));
        }
        let rule = occurrences
            .iter()
            .find_map(|value| value.as_rule())
            .ok_or_else(|| LayersError::NoRuleDefined(key.to_owned()))?;
        if self.chain.borrow().iter().any(|k| k == key) {
            let mut chain = self.chain.borrow().clone();
            chain.push(key.to_owned());
            return Err(LayersError::CyclicRuleReference { chain });
        }
        let context = ResolutionContext {
            key,
            values: occurrences.iter().map(|value| value.datum().clone()).collect(),
            resolver: self,
        };
        self.chain.borrow_mut().push(key.to_owned());
        let resolved = rule.apply(&context);
        self.chain.borrow_mut().pop();
        trace!(key, rule = rule.name(), ?resolved, "resolved");
        resolved
    }
}

/// What a rule sees while it computes the value of [`key`](Self::key).
///
/// Only valid for the duration of the rule call.
pub struct ResolutionContext<'r> {
    key: &'r str,
    values: Vec<Datum>, // newest first
    resolver: &'r Resolver<'r>,
}

impl<'r> ResolutionContext<'r> {
    pub fn key(&self) -> &str {
        self.key
    }
    /// Every occurrence of the key across the stack, newest first. Literal
    /// entries contribute their value and rule entries their default.
    pub fn datums(&self) -> &[Datum] {
        &self.values
    }
    pub fn values<T: DataType>(&self) -> Result<Vec<T>> {
        self.values
            .iter()
            .map(|datum| convert(self.key, datum))
            .collect()
    }
    pub fn resolve<U: DataType>(&self, key: &str) -> Result<U> {
        let datum = self.resolver.resolve(key)?;
        convert(key, &datum)
    }
    pub fn resolve_datum(&self, key: &str) -> Result<Datum> {
        self.resolver.resolve(key)
    }
}
impl fmt::Debug for ResolutionContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ResolutionContext")
            .field("key", &self.key)
            .field("values", &self.values)
            .finish_non_exhaustive()
    }
}
