use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialization failed: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

impl ImportError {
    /// True for failures raised by the storage collaborator rather than by the input.
    pub fn is_persistence(&self) -> bool {
        matches!(self, ImportError::Persistence(_) | ImportError::Sqlite(_))
    }

    /// The bare reason, without the variant prefix, for per-record messages.
    pub fn reason(&self) -> String {
        match self {
            ImportError::Parse(msg)
            | ImportError::Validation(msg)
            | ImportError::Persistence(msg)
            | ImportError::Config(msg) => msg.clone(),
            ImportError::MissingField(field) => format!("missing required field '{}'", field),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ImportError>;
