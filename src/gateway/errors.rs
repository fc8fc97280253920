//! Error handling for the gateway

use std::error::Error;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Gateway error types
///
/// A command that runs and exits non-zero is not an error: it is reported
/// through [`ExecutionResult`](crate::gateway::ExecutionResult) as data.
#[derive(Debug)]
pub enum GatewayError {
    /// Resolved path falls outside the repository root
    PathEscape(String),

    /// Command is not listed under `allow.commands`
    NotAllowlisted(String),

    /// Path is outside every `allow.read_paths` entry
    NotAllowed(String),

    /// Command is allowlisted but the catalog has no entry for it
    UnknownCommand(String),

    /// A command the gateway depends on (e.g. `health`) is missing from the catalog
    MissingCommand(String),

    /// Required argument absent or empty
    MissingField(&'static str),

    /// File exceeds the read cap
    TooLarge {
        size: u64,
        limit: u64,
    },

    /// Subprocess exceeded the wall-clock limit and was killed
    Timeout {
        command: String,
        duration: Duration,
    },

    /// Subprocess could not be started
    Spawn {
        command: String,
        source: std::io::Error,
    },

    /// Declarative document could not be read or parsed
    Config {
        path: PathBuf,
        message: String,
    },

    /// Tool name not served by this gateway
    UnknownTool(String),

    /// Serialization/deserialization error
    SerializationError(serde_json::Error),

    /// IO error
    IoError(std::io::Error),
}

impl GatewayError {
    /// Create a config error for a document
    pub fn config(path: impl Into<PathBuf>, message: impl fmt::Display) -> Self {
        Self::Config {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Create a timeout error
    pub fn timeout(command: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            command: command.into(),
            duration,
        }
    }

    /// Whether the error was caused by the caller's arguments rather than policy or execution
    pub fn is_invalid_params(&self) -> bool {
        matches!(self, Self::MissingField(_) | Self::UnknownTool(_))
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PathEscape(rel) => write!(f, "Path escapes repo root: {}", rel),
            Self::NotAllowlisted(name) => {
                write!(f, "Command not allowlisted by policy: {}", name)
            }
            Self::NotAllowed(rel) => write!(f, "Path not allowed by policy: {}", rel),
            Self::UnknownCommand(name) => write!(f, "Unknown command in catalog: {}", name),
            Self::MissingCommand(name) => write!(f, "Missing commands.{} in catalog", name),
            Self::MissingField(field) => write!(f, "Missing {}", field),
            Self::TooLarge { size, limit } => {
                write!(f, "File too large to read ({} bytes > {} bytes)", size, limit)
            }
            Self::Timeout { command, duration } => {
                write!(f, "Command '{}' timed out after {}ms", command, duration.as_millis())
            }
            Self::Spawn { command, source } => {
                write!(f, "Failed to spawn command '{}': {}", command, source)
            }
            Self::Config { path, message } => {
                write!(f, "Invalid configuration in {}: {}", path.display(), message)
            }
            Self::UnknownTool(name) => write!(f, "Unknown tool: {}", name),
            Self::SerializationError(e) => write!(f, "Serialization error: {}", e),
            Self::IoError(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl Error for GatewayError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Spawn { source, .. } => Some(source),
            Self::SerializationError(e) => Some(e),
            Self::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(error: serde_json::Error) -> Self {
        Self::SerializationError(error)
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(error: std::io::Error) -> Self {
        Self::IoError(error)
    }
}
