use std::sync::Arc;

// layer contents are kept sorted so dumps and scripts are deterministic
use std::collections::BTreeMap;

// used to print out readable forms of a construct
use std::fmt;

// our own stuff that we need
use crate::datatype::Datum;
use crate::error::Result;
use crate::stack::ResolutionContext;

/// The function behind a rule. It must be pure: it may only read the context
/// it is handed and must not try to reach the stack any other way.
pub type RuleFn = Arc<dyn Fn(&ResolutionContext<'_>) -> Result<Datum> + Send + Sync>;

// ------------- Rule -------------
#[derive(Clone)]
pub struct Rule {
    name: String,
    default: Datum,
    arguments: Vec<String>, // only used to render the rule back into a script
    function: RuleFn,
}

impl Rule {
    pub fn new<F>(name: impl Into<String>, default: impl Into<Datum>, function: F) -> Self
    where
        F: Fn(&ResolutionContext<'_>) -> Result<Datum> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            default: default.into(),
            arguments: Vec::new(),
            function: Arc::new(function),
        }
    }
    pub fn with_arguments(mut self, arguments: Vec<String>) -> Self {
        self.arguments = arguments;
        self
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn default(&self) -> &Datum {
        &self.default
    }
    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }
    pub fn apply(&self, context: &ResolutionContext<'_>) -> Result<Datum> {
        (self.function)(context)
    }
    /// Right-hand side of a `rule` statement, e.g. `bonus(str) default 0`.
    pub fn to_source(&self) -> String {
        if self.arguments.is_empty() {
            format!("{} default {}", self.name, self.default.to_source())
        } else {
            format!(
                "{}({}) default {}",
                self.name,
                self.arguments.join(", "),
                self.default.to_source()
            )
        }
    }
}
// Rules are not structurally comparable, so the function is compared by identity.
impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.default == other.default
            && self.arguments == other.arguments
            && Arc::ptr_eq(&self.function, &other.function)
    }
}
impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.arguments.is_empty() {
            write!(f, "<rule: {}[={}]>", self.name, self.default)
        } else {
            write!(
                f,
                "<rule: {}({})[={}]>",
                self.name,
                self.arguments.join(", "),
                self.default
            )
        }
    }
}
impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("default", &self.default)
            .field("arguments", &self.arguments)
            .finish_non_exhaustive()
    }
}

// ------------- Value -------------
#[derive(Clone, PartialEq, Debug)]
pub enum Value {
    Literal(Datum),
    Rule(Rule),
}

impl Value {
    pub fn literal(value: impl Into<Datum>) -> Self {
        Value::Literal(value.into())
    }
    pub fn rule<F>(name: impl Into<String>, default: impl Into<Datum>, function: F) -> Self
    where
        F: Fn(&ResolutionContext<'_>) -> Result<Datum> + Send + Sync + 'static,
    {
        Value::Rule(Rule::new(name, default, function))
    }
    pub fn is_rule(&self) -> bool {
        matches!(self, Value::Rule(_))
    }
    pub fn as_rule(&self) -> Option<&Rule> {
        match self {
            Value::Rule(rule) => Some(rule),
            Value::Literal(_) => None,
        }
    }
    /// What this entry contributes to the values a rule sees: the literal
    /// itself, or the default of a rule.
    pub fn datum(&self) -> &Datum {
        match self {
            Value::Literal(datum) => datum,
            Value::Rule(rule) => rule.default(),
        }
    }
    pub fn to_diff(&self) -> String {
        self.to_string()
    }
    /// The script statement that installs this value under `key`.
    pub fn to_statement(&self, key: &str) -> String {
        match self {
            Value::Literal(datum) => format!("set {} = {};", key, datum.to_source()),
            Value::Rule(rule) => format!("rule {} = {};", key, rule.to_source()),
        }
    }
}
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Literal(datum) => write!(f, "{}", datum),
            Value::Rule(rule) => write!(f, "{}", rule),
        }
    }
}
impl From<Rule> for Value {
    fn from(rule: Rule) -> Value {
        Value::Rule(rule)
    }
}
impl From<Datum> for Value {
    fn from(datum: Datum) -> Value {
        Value::Literal(datum)
    }
}
impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Literal(b.into())
    }
}
impl From<i64> for Value {
    fn from(i: i64) -> Value {
        Value::Literal(i.into())
    }
}
impl From<i32> for Value {
    fn from(i: i32) -> Value {
        Value::Literal(i.into())
    }
}
impl From<crate::datatype::Decimal> for Value {
    fn from(d: crate::datatype::Decimal) -> Value {
        Value::Literal(d.into())
    }
}
impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::Literal(s.into())
    }
}
impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Literal(s.into())
    }
}

// ------------- Layer -------------
#[derive(Clone, Debug)]
pub struct Layer {
    slot: usize,
    contents: BTreeMap<String, Value>,
    meta: BTreeMap<String, String>,
    script: Vec<String>, // statements recorded by the editor, in edit order
}

impl Layer {
    pub(crate) fn new(slot: usize) -> Self {
        Self::seeded(slot, BTreeMap::new())
    }
    pub(crate) fn seeded(slot: usize, contents: BTreeMap<String, Value>) -> Self {
        Self {
            slot,
            contents,
            meta: BTreeMap::new(),
            script: Vec::new(),
        }
    }
    pub fn slot(&self) -> usize {
        self.slot
    }
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.contents.get(key)
    }
    pub fn contains_key(&self, key: &str) -> bool {
        self.contents.contains_key(key)
    }
    /// Entries of this layer only, sorted by key.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.contents.iter().map(|(key, value)| (key.as_str(), value))
    }
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.contents.keys().map(String::as_str)
    }
    pub fn contents(&self) -> &BTreeMap<String, Value> {
        &self.contents
    }
    pub fn len(&self) -> usize {
        self.contents.len()
    }
    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }
    pub fn meta(&self) -> &BTreeMap<String, String> {
        &self.meta
    }
    /// The edits made to this layer as a replayable layer script.
    pub fn script(&self) -> String {
        self.script.join("\n")
    }
    /// One `key: value` line per entry.
    pub fn to_diff(&self) -> String {
        self.contents
            .iter()
            .map(|(key, value)| format!("{}: {}", key, value.to_diff()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
impl PartialEq for Layer {
    fn eq(&self, other: &Self) -> bool {
        self.slot == other.slot && self.contents == other.contents
    }
}
impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let entries = self
            .contents
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "Layer#{}:{{{}}}", self.slot, entries)
    }
}

// ------------- LayerEditor -------------
/// The only mutable view of a layer. The stack hands one out for its top
/// layer alone, so committed layers cannot be edited.
#[derive(Debug)]
pub struct LayerEditor<'l> {
    layer: &'l mut Layer,
}

impl<'l> LayerEditor<'l> {
    pub(crate) fn new(layer: &'l mut Layer) -> Self {
        Self { layer }
    }
    pub fn slot(&self) -> usize {
        self.layer.slot
    }
    pub fn layer(&self) -> &Layer {
        self.layer
    }
    /// Install `value` under `key`, replacing whatever this layer held there.
    /// Raw literals are wrapped as [`Value::Literal`].
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        self.layer.script.push(value.to_statement(&key));
        self.layer.contents.insert(key, value);
        self
    }
    pub fn set_meta(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.layer.meta.insert(key.into(), value.into());
        self
    }
}
