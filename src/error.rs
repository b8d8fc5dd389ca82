//! Error handling for the scriptable node
//!
//! This module defines the error taxonomy shared by the script context, the
//! validation harness and the node façade, plus a Result alias.

use thiserror::Error;

/// Main error type for scriptable node operations
#[derive(Error, Debug)]
pub enum NodeError {
    /// No code was supplied
    #[error("script contains no code")]
    EmptyScript,

    /// Parse/compile-time fault, or a required entry point is missing
    #[error("Couldn't load script: {0}")]
    LoadFailed(String),

    /// Fault raised by the script while it was running
    #[error("Script runtime fault: {0}")]
    RuntimeFault(String),

    /// A context was asked to load a second script
    #[error("Script already loaded")]
    AlreadyLoaded,

    /// Persisted node state could not be decoded or encoded
    #[error("State error: {0}")]
    State(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// A lock was poisoned by a panicking thread
    #[error("Lock error: {0}")]
    Lock(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<NodeError>,
    },
}

impl NodeError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        NodeError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create a runtime fault from a Rhai evaluation error
    pub fn from_rhai_error(err: Box<rhai::EvalAltResult>) -> Self {
        NodeError::RuntimeFault(err.to_string())
    }

    /// The innermost error, skipping any context wrappers.
    pub fn root(&self) -> &NodeError {
        match self {
            NodeError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Result type alias for scriptable node operations
pub type Result<T> = std::result::Result<T, NodeError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
