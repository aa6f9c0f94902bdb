//! Error taxonomy for the CRT stage.

use crate::types::{Param, Type};

pub type CrtResult<T> = Result<T, CrtError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CrtError {
    /// A shader or image resource was missing or couldn't be decoded.  Fatal to the instance
    /// which requested it.
    #[error("failed to load resource {name:?}: {reason}")]
    ResourceLoad { name: String, reason: String },

    /// The GPU surface refused to create, upload or draw something
    #[error("GPU surface error: {0}")]
    Surface(String),

    /// A footprint mapping was called with the wrong number of rectangles.  The effect has
    /// exactly one input and one output, so this is always a wiring bug in the host.
    #[error("expected exactly {expected} rect(s), found {found}")]
    Topology { expected: usize, found: usize },

    #[error("{param:?} sampled to a non-finite value")]
    NonFinite { param: Param },

    #[error("{param:?} expects a {expected:?} value, found {found:?}")]
    TypeMismatch {
        param: Param,
        expected: Type,
        found: Type,
    },

    /// The parameter source failed to produce values for a frame
    #[error("failed to sample parameters: {0}")]
    Sample(String),
}

impl CrtError {
    pub fn resource_load(name: impl Into<String>, reason: impl ToString) -> Self {
        Self::ResourceLoad {
            name: name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn surface(msg: impl ToString) -> Self {
        Self::Surface(msg.to_string())
    }

    pub fn sample(msg: impl ToString) -> Self {
        Self::Sample(msg.to_string())
    }

    /// Returns `true` if this error only affects the frame during which it happened.  These are
    /// recovered by rendering that frame as a pass-through.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::NonFinite { .. }
            | Self::TypeMismatch { .. }
            | Self::Sample(_)
            | Self::Surface(_) => true,
            Self::ResourceLoad { .. } | Self::Topology { .. } => false,
        }
    }
}
