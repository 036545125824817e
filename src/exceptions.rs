//! Error types for xlaunch

use crate::crypto::CryptoError;
use crate::license::LicenseError;
use crate::stage::StageError;
use crate::supervisor::SupervisorError;
use std::fmt;

/// Main error type for xlaunch operations
#[derive(Debug)]
pub enum StubError {
    /// License file could not be decrypted
    Crypto(CryptoError),

    /// License rejected
    License(LicenseError),

    /// Run directory could not be prepared
    Stage(StageError),

    /// Child process could not be supervised
    Supervisor(SupervisorError),

    /// Build-time configuration is malformed
    Config(String),

    /// JSON parsing error
    JsonError(serde_json::Error),
}

impl fmt::Display for StubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StubError::Crypto(err) => write!(f, "Crypto error: {err}"),
            StubError::License(err) => write!(f, "License error: {err}"),
            StubError::Stage(err) => write!(f, "Stage error: {err}"),
            StubError::Supervisor(err) => write!(f, "Supervisor error: {err}"),
            StubError::Config(msg) => write!(f, "Config error: {msg}"),
            StubError::JsonError(err) => write!(f, "JSON error: {err}"),
        }
    }
}

impl std::error::Error for StubError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StubError::Crypto(err) => Some(err),
            StubError::License(err) => Some(err),
            StubError::Stage(err) => Some(err),
            StubError::Supervisor(err) => Some(err),
            StubError::JsonError(err) => Some(err),
            StubError::Config(_) => None,
        }
    }
}

impl From<CryptoError> for StubError {
    fn from(err: CryptoError) -> Self {
        StubError::Crypto(err)
    }
}

impl From<LicenseError> for StubError {
    fn from(err: LicenseError) -> Self {
        StubError::License(err)
    }
}

impl From<StageError> for StubError {
    fn from(err: StageError) -> Self {
        StubError::Stage(err)
    }
}

impl From<SupervisorError> for StubError {
    fn from(err: SupervisorError) -> Self {
        StubError::Supervisor(err)
    }
}

impl From<serde_json::Error> for StubError {
    fn from(err: serde_json::Error) -> Self {
        StubError::JsonError(err)
    }
}

/// Result type for xlaunch operations
pub type Result<T> = std::result::Result<T, StubError>;
