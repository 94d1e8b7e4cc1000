//! Error taxonomy for the prescription pipeline.
//!
//! Missing image assets and unknown product names never appear here:
//! both degrade to fallbacks instead of failing the call.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Where inside composition a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Writing the per-call scratch copy of the resolved source.
    Scratch,
    /// Bringing the layout engine up.
    Start,
    /// Loading the resolved source and its embedded resources.
    Load,
    /// Laying out and capturing the PDF bytes.
    Capture,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Scratch => "scratch",
            Stage::Start => "start",
            Stage::Load => "load",
            Stage::Capture => "capture",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum ForgeError {
    #[error("Template unavailable at {}: {source}", path.display())]
    TemplateUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Composition failed during {stage}: {reason}")]
    CompositionFailed { stage: Stage, reason: String },

    #[error("Template left {count} placeholder(s) unresolved, first: {token}")]
    UnresolvedPlaceholder { token: String, count: usize },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl ForgeError {
    pub(crate) fn composition(stage: Stage, reason: impl Into<String>) -> Self {
        ForgeError::CompositionFailed {
            stage,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ForgeError>;
