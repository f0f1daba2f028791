//! Crate-level error types.
//!
//! Stage-specific errors live next to their stage
//! ([`crate::manifest::ManifestError`], [`crate::engine::EngineError`],
//! [`crate::pipeline::PipelineError`], [`crate::batch::BatchError`]); this
//! module holds the ones shared by the configuration layer and the binary.

use std::fmt;

/// Errors produced while reading or validating [`crate::options::Options`].
#[derive(Debug)]
pub enum OptionsError {
    /// Generic I/O failure.
    Io(std::io::Error),
    /// TOML parsing/serialization failure.
    Parse(String),
    /// Values parsed but cannot drive a run.
    Invalid(String),
}

impl fmt::Display for OptionsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Parse(msg) => write!(f, "options parse error: {msg}"),
            Self::Invalid(msg) => write!(f, "invalid options: {msg}"),
        }
    }
}

impl std::error::Error for OptionsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for OptionsError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
