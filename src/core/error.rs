use thiserror::Error;

#[derive(Error, Debug)]
pub enum DateShiftError {
    #[error("Query failed: {source} (statement: {statement})")]
    Query {
        statement: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Connection is closed")]
    ConnectionClosed,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("Anchor date unavailable for {table}.{column}: {reason}")]
    AnchorUnavailable {
        table: String,
        column: String,
        reason: String,
    },

    #[error("No temporal columns provided for table '{0}'")]
    EmptyColumnSet(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Unsupported column type '{0}'")]
    UnsupportedType(String),
}

impl DateShiftError {
    pub fn query(
        statement: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> Self {
        Self::Query {
            statement: statement.into(),
            source: source.into(),
        }
    }

    /// The SQL text that failed, if this error came from the executor.
    pub fn statement(&self) -> Option<&str> {
        match self {
            Self::Query { statement, .. } => Some(statement),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, DateShiftError>;
