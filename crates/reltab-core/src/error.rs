use thiserror::Error;

/// Canonical result for the engine.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Arithmetic error: {0}")]
    Arithmetic(String),

    #[error("Empty group: {0}")]
    EmptyGroup(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Iterator state error: {0}")]
    IteratorState(String),

    #[error("Invalid row: physical index {0} is out of range or already removed")]
    InvalidRow(usize),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Internal invariant failed: {0}")]
    Invariant(String),
}

impl Error {
    pub fn unknown_column(name: &str) -> Self {
        Error::Schema(format!("{name}: no such column"))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}
