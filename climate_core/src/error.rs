//! Error taxonomy for the read-report cycle.
//!
//! Read and send failures are recovered inside a cycle; configuration errors
//! are fatal at startup.

use std::error::Error as StdError;
use std::time::Duration;
use thiserror::Error;

/// Boxed cause carried by the wrapping variants
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Result alias used across the crate
pub type ClimateResult<T> = Result<T, ClimateError>;

#[derive(Debug, Error)]
pub enum ClimateError {
    /// The timeout timer won the race against the sensor
    #[error("sensor read timed out after {}ms", .0.as_millis())]
    ReadTimeout(Duration),

    /// Hardware or driver fault while reading the sensor
    #[error("sensor read failed: {source}")]
    Read {
        #[source]
        source: BoxError,
    },

    /// Network failure or non-2xx response from the API
    #[error("failed to send report: {source}")]
    Send {
        #[source]
        source: BoxError,
    },

    #[error("configuration error: {0}")]
    Config(String),

    /// GPIO line could not be acquired or driven
    #[error("GPIO error: {0}")]
    Gpio(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ClimateError {
    pub fn read(cause: impl Into<BoxError>) -> Self {
        Self::Read {
            source: cause.into(),
        }
    }

    pub fn send(cause: impl Into<BoxError>) -> Self {
        Self::Send {
            source: cause.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn gpio(msg: impl Into<String>) -> Self {
        Self::Gpio(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
