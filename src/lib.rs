//! Layerstack – layered value resolution with scripted, persisted layers.
//!
//! A [`stack::LayerStack`] is an ordered pile of *layers*, oldest at the
//! bottom. Each layer maps keys to a [`construct::Value`], which is either:
//! * a literal [`datatype::Datum`] (bool, integer, decimal or text), or
//! * a [`construct::Rule`]: a named, defaulted, pure function that computes
//!   the governing value of its key.
//!
//! Resolving a key finds the topmost layer holding a *rule* for it and hands
//! that rule every occurrence of the key across the stack, newest first
//! (literals contribute their value, rules their default). Rules may resolve
//! other keys, which re-runs the algorithm; a key that ends up depending on
//! itself is reported instead of recursing forever.
//!
//! Committing freezes the top layer and opens an empty one above it; rolling
//! back discards the top layer, recreating the bottom layer when the stack
//! would otherwise become empty.
//!
//! ## Modules
//! * [`datatype`] – The [`datatype::Datum`] envelope and the
//!   [`datatype::DataType`] trait used to read it back as a Rust type.
//! * [`construct`] – Values, rules, layers and the layer editor.
//! * [`stack`] – The stack, its lifecycle and the resolution algorithm.
//! * [`rules`] – Built-in rules (`sum`, `last`, `bonus`, ...) and the
//!   [`rules::RuleRegistry`] scripts draw them from.
//! * [`script`] – The layer script language (parser + engine). Grammar
//!   details live in `layerscript.pest`.
//! * [`persist`] – The [`persist::LayerStore`] trait and its SQLite
//!   implementation, with a blake3 hash chain over the stored layers.
//! * [`persisted`] – A stack wired to a store: commits are stored, opening
//!   replays them.
//! * [`interface`] – Mutex-guarded access for multi-threaded callers.
//! * [`config`] – Settings for the `layerstack` binary.
//!
//! ## Quick Start
//! ```
//! use layerstack::rules::sum;
//! use layerstack::stack::LayerStack;
//! let mut stack = LayerStack::new([("hp", sum(10))]);
//! stack.commit();
//! stack.current_mut().set("hp", 5);
//! assert_eq!(stack.resolve::<i64>("hp").unwrap(), 15);
//! stack.rollback();
//! assert_eq!(stack.resolve::<i64>("hp").unwrap(), 10);
//! ```
//!
//! ## Threading
//! The core is synchronous and performs no locking: one writer at a time.
//! Callers sharing a stack between threads should go through
//! [`interface::LayerInterface`] or their own mutex around the whole stack.

pub mod construct;
pub mod datatype;
pub mod error;
pub mod stack;
pub mod rules;
pub mod script;
pub mod persist;
pub mod persisted;
pub mod interface;
pub mod config;

pub use error::{LayersError, Result};
