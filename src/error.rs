//! Engine error types
//!
//! One enum covers every failure the pipeline can report. Fatal kinds stop
//! the run; the rest mark the offending feature FAILED and become warnings
//! on the final result.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComposeError {
    /// A feature references another feature that does not exist.
    #[error("feature '{feature}' references unknown feature '{reference}'")]
    InvalidReference { feature: String, reference: String },

    /// A size range is negative or inverted.
    #[error("feature '{feature}' has invalid size range {from}..{to}")]
    InvalidSize { feature: String, from: i64, to: i64 },

    /// The composition has no world id.
    #[error("composition has no worldId")]
    MissingWorldId,

    /// No free cells satisfied a feature's positions after all retries.
    #[error("feature '{feature}' could not be placed after {attempts} attempts")]
    PlacementExhausted { feature: String, attempts: u32 },

    /// A snap target or flow endpoint was never placed.
    #[error("feature '{feature}' targets '{target}', which is not placed")]
    UnknownTarget { feature: String, target: String },

    /// No route exists under the flow's constraints.
    #[error("flow '{feature}' found no route from {from} to {to}")]
    Unreachable {
        feature: String,
        from: String,
        to: String,
    },

    /// A structure names a template the provider does not know.
    #[error("unknown structure template '{template}'")]
    TemplateNotFound { template: String },

    /// Invariant violation; never expected with well-formed input.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ComposeError {
    /// Fatal errors abort the run instead of degrading to a warning.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ComposeError::InvalidReference { .. }
                | ComposeError::InvalidSize { .. }
                | ComposeError::MissingWorldId
                | ComposeError::TemplateNotFound { .. }
                | ComposeError::Internal(_)
        )
    }
}
