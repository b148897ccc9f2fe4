// src/error.rs
//
// Error taxonomy for the gate core. Only configuration errors are fatal;
// everything else is absorbed inside a processing cycle.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GateError {
    /// Malformed detection rejected before it reaches the tracker
    #[error("Invalid detection: {0}")]
    Input(String),

    /// Authorization store could not be read; retried next cycle
    #[error("Authorization lookup failed: {0}")]
    Lookup(String),

    /// Violation could not be persisted; the decision still stands
    #[error("Audit write failed: {0}")]
    AuditWrite(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl GateError {
    pub fn input(msg: impl Into<String>) -> Self {
        GateError::Input(msg.into())
    }

    pub fn lookup(msg: impl Into<String>) -> Self {
        GateError::Lookup(msg.into())
    }

    pub fn audit_write(msg: impl Into<String>) -> Self {
        GateError::AuditWrite(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        GateError::Config(msg.into())
    }
}
