//! Layer scripts: parsing and execution.
//!
//! A layer script is a `;`-separated list of statements (see
//! `layerscript.pest` for the grammar):
//!
//! * `set <key> = <literal>` installs a literal in the current layer,
//! * `rule <key> = <name>[(<arg>, ...)] default <literal>` installs a rule
//!   built from the [`RuleRegistry`],
//! * `commit "<description>" [notes "<notes>"]` freezes the current layer,
//! * `rollback` discards it.
//!
//! Strings use `""` to embed a quote and `#` starts a line comment. Every
//! edit made through a [`LayerEditor`] is recorded as one of these
//! statements, which is what gets persisted and replayed.

use pest::Parser;
use pest::iterators::Pair;
use tracing::debug;

use crate::construct::{Layer, LayerEditor, Value};
use crate::datatype::{Datum, Decimal};
use crate::error::{LayersError, Result};
use crate::rules::RuleRegistry;
use crate::stack::LayerStack;

mod grammar {
    use pest_derive::Parser;

    #[derive(Parser)]
    #[grammar = "layerscript.pest"]
    pub struct LayerScriptParser;
}
use grammar::{LayerScriptParser, Rule as Syntax};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Set { key: String, value: Datum },
    Rule { key: String, name: String, arguments: Vec<String>, default: Datum },
    Commit { description: String, notes: Option<String> },
    Rollback,
}

impl Command {
    pub fn is_edit(&self) -> bool {
        matches!(self, Command::Set { .. } | Command::Rule { .. })
    }
    /// Canonical statement text, without the trailing `;`.
    pub fn to_source(&self) -> String {
        match self {
            Command::Set { key, value } => format!("set {} = {}", key, value.to_source()),
            Command::Rule { key, name, arguments, default } if arguments.is_empty() => {
                format!("rule {} = {} default {}", key, name, default.to_source())
            }
            Command::Rule { key, name, arguments, default } => format!(
                "rule {} = {}({}) default {}",
                key,
                name,
                arguments.join(", "),
                default.to_source()
            ),
            Command::Commit { description, notes: None } => {
                format!("commit {}", Datum::from(description.as_str()).to_source())
            }
            Command::Commit { description, notes: Some(notes) } => format!(
                "commit {} notes {}",
                Datum::from(description.as_str()).to_source(),
                Datum::from(notes.as_str()).to_source()
            ),
            Command::Rollback => "rollback".to_owned(),
        }
    }
}

// ------------- Parsing -------------
pub fn parse(script: &str) -> Result<Vec<Command>> {
    let mut pairs = LayerScriptParser::parse(Syntax::script, script).map_err(|e| {
        let (line, col) = match e.line_col {
            pest::error::LineColLocation::Pos((l, c)) => (l, c),
            pest::error::LineColLocation::Span((l, c), _) => (l, c),
        };
        LayersError::Parse {
            message: e.variant.message().to_string(),
            line: Some(line),
            col: Some(col),
        }
    })?;
    let script = next(&mut pairs, "script")?;
    let mut commands = Vec::new();
    for statement in script.into_inner() {
        match statement.as_rule() {
            Syntax::set => commands.push(parse_set(statement)?),
            Syntax::rule => commands.push(parse_rule(statement)?),
            Syntax::commit => commands.push(parse_commit(statement)?),
            Syntax::rollback => commands.push(Command::Rollback),
            Syntax::EOI => (),
            other => return Err(error_at(&statement, format!("unexpected {:?}", other))),
        }
    }
    Ok(commands)
}

// The parts of a statement, keywords left out.
fn parts(statement: Pair<'_, Syntax>) -> impl Iterator<Item = Pair<'_, Syntax>> {
    statement.into_inner().filter(|pair| {
        !matches!(
            pair.as_rule(),
            Syntax::kw_set | Syntax::kw_rule | Syntax::kw_default | Syntax::kw_commit | Syntax::kw_notes
        )
    })
}

fn parse_set(statement: Pair<Syntax>) -> Result<Command> {
    let mut inner = parts(statement);
    let key = next(&mut inner, "key")?.as_str().to_owned();
    let value = parse_literal(next(&mut inner, "literal")?)?;
    Ok(Command::Set { key, value })
}

fn parse_rule(statement: Pair<Syntax>) -> Result<Command> {
    let mut inner = parts(statement);
    let key = next(&mut inner, "key")?.as_str().to_owned();
    let name = next(&mut inner, "rule name")?.as_str().to_owned();
    let mut arguments = Vec::new();
    let mut pair = next(&mut inner, "default")?;
    if pair.as_rule() == Syntax::arguments {
        arguments = pair
            .into_inner()
            .map(|key| key.as_str().to_owned())
            .collect();
        pair = next(&mut inner, "default")?;
    }
    let default = parse_literal(pair)?;
    Ok(Command::Rule { key, name, arguments, default })
}

fn parse_commit(statement: Pair<Syntax>) -> Result<Command> {
    let mut inner = parts(statement);
    let description = unquote(next(&mut inner, "description")?);
    let notes = inner.next().map(unquote);
    Ok(Command::Commit { description, notes })
}

fn parse_literal(pair: Pair<Syntax>) -> Result<Datum> {
    match pair.as_rule() {
        Syntax::boolean => Ok(Datum::Bool(pair.as_str() == "true")),
        Syntax::integer => pair
            .as_str()
            .parse::<i64>()
            .map(Datum::Int)
            .map_err(|e| error_at(&pair, format!("invalid integer {}: {}", pair.as_str(), e))),
        Syntax::decimal => Decimal::from_str(pair.as_str())
            .map(Datum::Decimal)
            .ok_or_else(|| error_at(&pair, format!("invalid decimal {}", pair.as_str()))),
        Syntax::string => Ok(Datum::Text(unquote(pair))),
        other => Err(error_at(&pair, format!("expected a literal, found {:?}", other))),
    }
}

// A string pair wraps its text; doubled quotes collapse into one.
fn unquote(pair: Pair<Syntax>) -> String {
    pair.into_inner()
        .next()
        .map(|text| text.as_str().replace("\"\"", "\""))
        .unwrap_or_default()
}

fn next<'i>(pairs: &mut impl Iterator<Item = Pair<'i, Syntax>>, what: &str) -> Result<Pair<'i, Syntax>> {
    pairs.next().ok_or_else(|| LayersError::Parse {
        message: format!("missing {}", what),
        line: None,
        col: None,
    })
}

fn error_at(pair: &Pair<Syntax>, message: String) -> LayersError {
    let (line, col) = pair.as_span().start_pos().line_col();
    LayersError::Parse { message, line: Some(line), col: Some(col) }
}

// Rule functions cannot be compared, so a rebuilt rule matches when it
// renders the same.
fn same_entry(recorded: &Value, replayed: &Value) -> bool {
    match (recorded, replayed) {
        (Value::Literal(a), Value::Literal(b)) => a == b,
        (Value::Rule(a), Value::Rule(b)) => {
            a.name() == b.name() && a.default() == b.default() && a.arguments() == b.arguments()
        }
        _ => false,
    }
}

// ------------- Execution -------------
/// Something a full layer script can run against.
pub trait Session {
    fn editor(&mut self) -> LayerEditor<'_>;
    fn commit(&mut self, description: &str, notes: Option<&str>) -> Result<()>;
    fn rollback(&mut self) -> Result<()>;
}

impl Session for LayerStack {
    fn editor(&mut self) -> LayerEditor<'_> {
        self.current_mut()
    }
    fn commit(&mut self, description: &str, notes: Option<&str>) -> Result<()> {
        let mut editor = self.current_mut();
        editor.set_meta("description", description);
        if let Some(notes) = notes {
            editor.set_meta("notes", notes);
        }
        LayerStack::commit(self);
        Ok(())
    }
    fn rollback(&mut self) -> Result<()> {
        LayerStack::rollback(self);
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Engine {
    registry: RuleRegistry,
}

impl Engine {
    pub fn new(registry: RuleRegistry) -> Self {
        Self { registry }
    }
    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }
    /// The key and value an edit command installs.
    pub fn value_for(&self, command: &Command) -> Result<(String, Value)> {
        match command {
            Command::Set { key, value } => Ok((key.clone(), Value::Literal(value.clone()))),
            Command::Rule { key, name, arguments, default } => {
                let rule = self.registry.build(name, default.clone(), arguments)?;
                Ok((key.clone(), Value::Rule(rule)))
            }
            other => Err(LayersError::Execution(format!(
                "'{}' is not allowed in a layer script",
                other.to_source()
            ))),
        }
    }
    /// Apply edit commands to one layer. Nothing is applied unless every
    /// command is an edit whose rule can be built.
    pub fn apply(&self, editor: &mut LayerEditor<'_>, commands: &[Command]) -> Result<usize> {
        let values = commands
            .iter()
            .map(|command| self.value_for(command))
            .collect::<Result<Vec<_>>>()?;
        for (key, value) in values {
            editor.set(key, value);
        }
        debug!(slot = editor.slot(), edits = commands.len(), "applied layer script");
        Ok(commands.len())
    }
    pub fn apply_script(&self, editor: &mut LayerEditor<'_>, script: &str) -> Result<usize> {
        let commands = parse(script)?;
        self.apply(editor, &commands)
    }
    /// Replay the recorded script of `layer` into a scratch layer and check
    /// that it rebuilds the same entries. A layer that fails here could be
    /// stored but never restored.
    pub fn check_replay(&self, layer: &Layer) -> Result<()> {
        let mut scratch = Layer::new(layer.slot());
        self.apply_script(&mut LayerEditor::new(&mut scratch), &layer.script())?;
        for (key, replayed) in scratch.entries() {
            if !layer.get(key).is_some_and(|recorded| same_entry(recorded, replayed)) {
                return Err(LayersError::Execution(format!(
                    "layer {} does not replay: {} would become {}",
                    layer.slot(),
                    key,
                    replayed
                )));
            }
        }
        Ok(())
    }
    /// Run a full script, lifecycle statements included, and return the
    /// number of statements executed. Statements before a failing one stay
    /// applied.
    pub fn execute<S: Session + ?Sized>(&self, session: &mut S, script: &str) -> Result<usize> {
        let commands = parse(script)?;
        for command in &commands {
            match command {
                Command::Commit { description, notes } => {
                    session.commit(description, notes.as_deref())?
                }
                Command::Rollback => session.rollback()?,
                edit => {
                    let (key, value) = self.value_for(edit)?;
                    session.editor().set(key, value);
                }
            }
        }
        debug!(statements = commands.len(), "executed script");
        Ok(commands.len())
    }
}
