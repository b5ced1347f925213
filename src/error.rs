use thiserror::Error;

/// Reasons a dispatched command line is rejected.
///
/// The `Display` text of every variant is the single message shown to the
/// operator for the failed dispatch.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Command/Module not found: {0}")]
    NotFound(String),

    #[error("Sub command not found in \"{command}\": {sub}")]
    SubCommandNotFound { command: String, sub: String },

    #[error("Specify a sub command for the given module.")]
    MissingSubCommand,

    #[error("Not enough arguments")]
    NotEnoughArguments,

    #[error("Too many arguments")]
    TooManyArguments,

    /// A value failed a shape check (numeric, enumerated or boolean literal).
    #[error("{0}")]
    InvalidArgument(String),

    #[error("Required parameter not given: {0}")]
    MissingParameter(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Not implemented")]
    NotImplemented,

    #[error("{0}")]
    Extension(#[from] ExtensionError),

    #[error("Failed to submit task: {0}")]
    Transport(#[from] TransportError),
}

impl DispatchError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

/// Failures raised while calling into an extension command.
#[derive(Debug, Error)]
pub enum ExtensionError {
    #[error("A callable is required for {0}")]
    NotCallable(String),

    #[error("Failed to execute {command}. Script module failed: {reason}")]
    Raised { command: String, reason: String },

    #[error("Failed to execute {0}. Script return is None")]
    ReturnedNone(String),

    #[error("Failed to execute {0}. Script return is invalid")]
    InvalidReturn(String),

    #[error("Failed to change working directory to {path}: {source}")]
    WorkingDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failures reported by a task transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport is not connected")]
    NotConnected,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("publish failed: {0}")]
    Publish(String),
}

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}
