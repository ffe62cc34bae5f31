//! Error types for the adapter.
//!
//! Failures coming from collaborators (the ODBC driver manager, the token
//! provider) are passed through without local recovery. Messages never carry
//! passwords, client secrets or access tokens.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    /// Credentials are malformed or incomplete
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Access token could not be acquired
    #[error("Access token acquisition failed: {context}")]
    Authentication {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The ODBC driver manager or driver refused the connection
    #[error(transparent)]
    Odbc(#[from] odbc_api::Error),

    /// Connect failure without ODBC diagnostics attached
    #[error("Database connection failed: {context}")]
    Connection { context: String },

    #[error("I/O operation failed: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, AdapterError>;

impl AdapterError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn authentication(context: impl Into<String>) -> Self {
        Self::Authentication {
            context: context.into(),
            source: None,
        }
    }

    /// Creates an authentication error that keeps the underlying cause
    pub fn authentication_failed<E>(context: impl Into<String>, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Authentication {
            context: context.into(),
            source: Some(Box::new(error)),
        }
    }

    pub fn connection_failed(context: impl Into<String>) -> Self {
        Self::Connection {
            context: context.into(),
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}
