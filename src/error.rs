use thiserror::Error;

#[derive(Error, Debug)]
pub enum LayersError {
    #[error("Unknown key: {0}")]
    UnknownKey(String),
    #[error("No rule defined for key: {0}")]
    NoRuleDefined(String),
    #[error("Illegal edit of layer {slot}: only the top layer {top} may be edited")]
    IllegalEdit { slot: usize, top: usize },
    #[error("Cyclic rule reference: {}", chain.join(" -> "))]
    CyclicRuleReference { chain: Vec<String> },
    #[error("Type mismatch for {key}: expected {expected}, found {found}")]
    TypeMismatch { key: String, expected: &'static str, found: &'static str },
    #[error("Unknown rule: {0}")]
    UnknownRule(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Data corruption: {message}")]
    DataCorruption { message: String },
    #[error("Parse error: {message}")]
    Parse { message: String, line: Option<usize>, col: Option<usize> },
    #[error("Execution error: {0}")]
    Execution(String),
    #[error("Lock poisoned: {0}")]
    Lock(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LayersError>;

// Helper conversions
impl From<rusqlite::Error> for LayersError {
    fn from(e: rusqlite::Error) -> Self { Self::Persistence(e.to_string()) }
}

impl From<config::ConfigError> for LayersError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
