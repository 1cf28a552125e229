//! Error types for the tabular agents crate.

/// A specialized `Result` type for agent and environment operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The primary error enum for all operations within the `tabular_agents` crate.
#[derive(Debug)]
pub enum Error {
    /// A hyperparameter is missing or out of range.
    Config(String),
    /// An action index outside the environment's action space was used.
    InvalidAction {
        /// The rejected action index.
        action: usize,
        /// The size of the action space.
        n_actions: usize,
    },
    /// The environment lacks a capability the agent needs (e.g. a transition model).
    UnsupportedEnvironment(String),
    /// An error raised by the environment while resetting or stepping.
    Environment(String),
    /// A saved agent could not be restored.
    Persistence(String),
    /// An error from the underlying I/O system.
    Io(std::io::Error),
    /// An error while encoding or decoding agent state.
    Serialization(String),
    /// An unexpected internal error, which may indicate a bug.
    Internal(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Config(s) => write!(f, "Configuration error: {}", s),
            Error::InvalidAction { action, n_actions } => write!(
                f,
                "Invalid action: {} (action space has {} actions)",
                action, n_actions
            ),
            Error::UnsupportedEnvironment(s) => write!(f, "Unsupported environment: {}", s),
            Error::Environment(s) => write!(f, "Environment error: {}", s),
            Error::Persistence(s) => write!(f, "Persistence error: {}", s),
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Serialization(s) => write!(f, "Serialization error: {}", s),
            Error::Internal(s) => write!(f, "Internal error: {}", s),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
