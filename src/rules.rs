//! Built-in rules and the registry that lets layer scripts name them.
//!
//! Every built-in reduces the occurrences of its own key (newest first, with
//! rule entries contributing their default), so a rule installed in the
//! bottom layer acts as the default and reducer for everything layered above.

use std::collections::HashMap;
use std::sync::Arc;
use std::fmt;

use core::hash::BuildHasherDefault;
use seahash::SeaHasher;

use crate::construct::Rule;
use crate::datatype::Datum;
use crate::error::{LayersError, Result};
use crate::stack::ResolutionContext;

pub type OtherHasher = BuildHasherDefault<SeaHasher>;

/// Builds a rule from the default and the textual arguments of a `rule`
/// statement.
pub type RuleConstructor = Arc<dyn Fn(Datum, &[String]) -> Result<Rule> + Send + Sync>;

fn checked_sum(context: &ResolutionContext<'_>) -> Result<i64> {
    context
        .values::<i64>()?
        .into_iter()
        .try_fold(0i64, |total, i| total.checked_add(i))
        .ok_or_else(|| LayersError::Execution(format!("integer overflow summing {}", context.key())))
}

/// Sum of all integer occurrences.
pub fn sum(default: impl Into<Datum>) -> Rule {
    Rule::new("sum", default, |context| Ok(Datum::Int(checked_sum(context)?)))
}

/// The newest occurrence.
pub fn last(default: impl Into<Datum>) -> Rule {
    let default = default.into();
    let fallback = default.clone();
    Rule::new("last", default, move |context| {
        Ok(context.datums().first().cloned().unwrap_or_else(|| fallback.clone()))
    })
}

/// The oldest occurrence.
pub fn first(default: impl Into<Datum>) -> Rule {
    let default = default.into();
    let fallback = default.clone();
    Rule::new("first", default, move |context| {
        Ok(context.datums().last().cloned().unwrap_or_else(|| fallback.clone()))
    })
}

pub fn max(default: impl Into<Datum>) -> Rule {
    let default = default.into();
    let fallback = default.clone();
    Rule::new("max", default, move |context| {
        Ok(context
            .values::<i64>()?
            .into_iter()
            .max()
            .map(Datum::Int)
            .unwrap_or_else(|| fallback.clone()))
    })
}

pub fn min(default: impl Into<Datum>) -> Rule {
    let default = default.into();
    let fallback = default.clone();
    Rule::new("min", default, move |context| {
        Ok(context
            .values::<i64>()?
            .into_iter()
            .min()
            .map(Datum::Int)
            .unwrap_or_else(|| fallback.clone()))
    })
}

/// True when any occurrence is true.
pub fn any(default: impl Into<Datum>) -> Rule {
    Rule::new("any", default, |context| {
        Ok(Datum::Bool(context.values::<bool>()?.into_iter().any(|b| b)))
    })
}

/// True when every occurrence is true.
pub fn all(default: impl Into<Datum>) -> Rule {
    Rule::new("all", default, |context| {
        Ok(Datum::Bool(context.values::<bool>()?.into_iter().all(|b| b)))
    })
}

/// Ability-style bonus: `floor(other / 2) - 5` plus every occurrence of the
/// bonus key itself.
pub fn bonus(other_key: impl Into<String>, default: impl Into<Datum>) -> Rule {
    let other_key = other_key.into();
    let arguments = vec![other_key.clone()];
    Rule::new("bonus", default, move |context| {
        let other: i64 = context.resolve(&other_key)?;
        let own = checked_sum(context)?;
        Ok(Datum::Int(to_bonus(other) + own))
    })
    .with_arguments(arguments)
}

pub fn to_bonus(score: i64) -> i64 {
    score.div_euclid(2) - 5
}

// ------------- RuleRegistry -------------
#[derive(Clone)]
pub struct RuleRegistry {
    constructors: HashMap<String, RuleConstructor, OtherHasher>,
}

impl RuleRegistry {
    /// A registry without the built-ins.
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::default(),
        }
    }
    /// Register a named rule. The constructor should build a rule carrying
    /// the same name, otherwise layers using it cannot be replayed.
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn(Datum, &[String]) -> Result<Rule> + Send + Sync + 'static,
    {
        self.constructors.insert(name.into(), Arc::new(constructor));
        self
    }
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
    pub fn build(&self, name: &str, default: Datum, arguments: &[String]) -> Result<Rule> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| LayersError::UnknownRule(name.to_owned()))?;
        constructor(default, arguments)
    }
}
impl Default for RuleRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry
            .register("sum", nullary("sum", |default| sum(default)))
            .register("last", nullary("last", |default| last(default)))
            .register("first", nullary("first", |default| first(default)))
            .register("max", nullary("max", |default| max(default)))
            .register("min", nullary("min", |default| min(default)))
            .register("any", nullary("any", |default| any(default)))
            .register("all", nullary("all", |default| all(default)))
            .register("bonus", |default, arguments: &[String]| {
                expect_arguments("bonus", arguments, 1)?;
                Ok(bonus(arguments[0].clone(), default))
            });
        registry
    }
}
impl fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("rules", &self.names())
            .finish()
    }
}

fn nullary(
    name: &'static str,
    build: fn(Datum) -> Rule,
) -> impl Fn(Datum, &[String]) -> Result<Rule> + Send + Sync + 'static {
    move |default: Datum, arguments: &[String]| {
        expect_arguments(name, arguments, 0)?;
        Ok(build(default))
    }
}

fn expect_arguments(name: &str, arguments: &[String], expected: usize) -> Result<()> {
    if arguments.len() != expected {
        return Err(LayersError::Execution(format!(
            "rule {} takes {} argument(s), got {}",
            name,
            expected,
            arguments.len()
        )));
    }
    Ok(())
}
