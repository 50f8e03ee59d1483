//! Unified error types for palaver.
//!
//! Each layer of the crate has its own error family. All of them convert into
//! the top-level `BotError` so application code can use a single result type.

use thiserror::Error;

// ============================================================================
// Main Error Type
// ============================================================================

/// The main error type for palaver operations.
///
/// This enum consolidates the error families from the individual modules into
/// a single type that dialog handlers and commands can return.
#[derive(Debug, Error)]
pub enum BotError {
    /// Dialog engine error.
    #[error("engine: {0}")]
    Engine(#[from] EngineError),

    /// Session store error.
    #[error("store: {0}")]
    Store(#[from] StoreError),

    /// Transport error.
    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    /// Command dispatch error.
    #[error("command: {0}")]
    Command(#[from] CommandError),

    /// Response validation error.
    #[error("validation: {0}")]
    Validation(#[from] ValidationError),

    /// IO error.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic internal error.
    #[error("{0}")]
    Internal(String),
}

impl BotError {
    /// Create an internal error.
    #[inline]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type alias for palaver operations.
pub type Result<T> = std::result::Result<T, BotError>;

// ============================================================================
// Store Errors
// ============================================================================

/// Error type for session store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// Stored value could not be decoded.
    #[error("decode: {0}")]
    Decode(String),

    /// Backend failure.
    #[error("backend: {0}")]
    Backend(String),
}

impl StoreError {
    /// Create a decode error.
    #[inline]
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a backend error.
    #[inline]
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

/// Result type for session store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

// ============================================================================
// Transport Errors
// ============================================================================

/// Error type for transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Failed to send a message.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Failed to edit a previously sent message.
    #[error("edit failed: {0}")]
    EditFailed(String),

    /// Failed to download a file.
    #[error("download failed: {0}")]
    DownloadFailed(String),

    /// IO error while streaming.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Create a send failed error.
    #[inline]
    pub fn send(msg: impl Into<String>) -> Self {
        Self::SendFailed(msg.into())
    }

    /// Create an edit failed error.
    #[inline]
    pub fn edit(msg: impl Into<String>) -> Self {
        Self::EditFailed(msg.into())
    }

    /// Create a download failed error.
    #[inline]
    pub fn download(msg: impl Into<String>) -> Self {
        Self::DownloadFailed(msg.into())
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

// ============================================================================
// Engine Errors
// ============================================================================

/// Error type for dialog engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No dialog is registered under the given name.
    #[error("unknown dialog: {0}")]
    UnknownDialog(String),

    /// A handler broke the engine contract.
    #[error("handler contract violation: {0}")]
    Contract(String),

    /// A handler returned an error while starting a dialog.
    #[error("handler failed: {0}")]
    Handler(String),

    /// Session store error.
    #[error("store: {0}")]
    Store(#[from] StoreError),

    /// Transport error.
    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    /// Session serialization error.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// Create an unknown dialog error.
    #[inline]
    pub fn unknown_dialog(name: impl Into<String>) -> Self {
        Self::UnknownDialog(name.into())
    }

    /// Create a contract violation error.
    #[inline]
    pub fn contract(msg: impl Into<String>) -> Self {
        Self::Contract(msg.into())
    }
}

/// Result type for dialog engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

// ============================================================================
// Command Errors
// ============================================================================

/// Error type for command dispatch.
#[derive(Debug, Error)]
pub enum CommandError {
    /// No command is registered under the given name.
    #[error("unknown command: {0}")]
    Unknown(String),

    /// The command was called with the wrong arguments.
    #[error("usage: {0}")]
    Usage(String),

    /// An argument failed to parse.
    #[error("error converting argument {index}: {message}")]
    BadArgument {
        /// Zero-based position of the offending argument.
        index: usize,
        /// Parse failure message.
        message: String,
    },

    /// The command ran but failed.
    #[error("{0}")]
    Failed(String),
}

impl CommandError {
    /// Create a usage error.
    #[inline]
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    /// Create a failed error.
    #[inline]
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

impl From<BotError> for CommandError {
    fn from(err: BotError) -> Self {
        Self::Failed(err.to_string())
    }
}

/// Result type for command dispatch.
pub type CommandResult<T> = std::result::Result<T, CommandError>;

// ============================================================================
// Validation Errors
// ============================================================================

/// A response rejected by a step validator.
///
/// The message is shown to the user verbatim, so keep it human-readable.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    /// Create a validation error with the given user-facing message.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

// ============================================================================
// Error Context Extension
// ============================================================================

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Add context to an error.
    fn context(self, msg: impl Into<String>) -> Result<T>;

    /// Add context using a closure (lazy evaluation).
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<BotError>> ErrorContext<T> for std::result::Result<T, E> {
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            BotError::Internal(format!("{}: {}", msg.into(), err))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            BotError::Internal(format!("{}: {}", f(), err))
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversions() {
        let store_err = StoreError::decode("bad base64");
        let bot_err: BotError = store_err.into();
        assert!(matches!(bot_err, BotError::Store(_)));

        let engine_err = EngineError::unknown_dialog("survey");
        let bot_err: BotError = engine_err.into();
        assert!(matches!(bot_err, BotError::Engine(_)));
    }

    #[test]
    fn test_error_helpers() {
        let err = TransportError::send("network down");
        assert!(matches!(err, TransportError::SendFailed(_)));

        let err = EngineError::contract("retry without a pending query");
        assert!(matches!(err, EngineError::Contract(_)));
    }

    #[test]
    fn test_command_error_display() {
        let err = CommandError::BadArgument {
            index: 1,
            message: "invalid digit found in string".into(),
        };
        assert_eq!(
            err.to_string(),
            "error converting argument 1: invalid digit found in string"
        );
    }

    #[test]
    fn test_validation_error_is_verbatim() {
        let err = ValidationError::new("pick at least one");
        assert_eq!(err.to_string(), "pick at least one");
    }

    #[test]
    fn test_error_context() {
        let result: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::other("boom"));
        let err = result.context("reading upload").unwrap_err();
        assert!(err.to_string().starts_with("reading upload:"));
    }
}
