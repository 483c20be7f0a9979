/// Failure reported by a synthesis engine: model load errors, unknown voices,
/// inference failures. The dispatcher surfaces it as-is and never retries.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Synthesis failed: {detail}")]
pub struct SynthesisError {
    detail: String,
}

impl SynthesisError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }
}

#[derive(thiserror::Error, Debug)]
pub enum DispatchError {
    #[error("Unknown endpoint '{0}'")]
    UnknownRoute(String),
    #[error("Invalid parameter '{field}': {reason}")]
    InvalidParameter { field: &'static str, reason: String },
    #[error(transparent)]
    SynthesisFailure(#[from] SynthesisError),
    #[error("Internal error: {0}")]
    InternalFault(String),
}

impl DispatchError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        DispatchError::InvalidParameter {
            field,
            reason: reason.into(),
        }
    }

    /// Short name of the error category, used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::UnknownRoute(_) => "unknown_route",
            DispatchError::InvalidParameter { .. } => "invalid_parameter",
            DispatchError::SynthesisFailure(_) => "synthesis_failure",
            DispatchError::InternalFault(_) => "internal_fault",
        }
    }
}

pub type Result<T, E = DispatchError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::{DispatchError, SynthesisError};

    #[test]
    fn invalid_parameter_message_names_the_field() {
        let err = DispatchError::invalid("speed", "must be between 0.5 and 2.0, got 3");
        assert_eq!(
            err.to_string(),
            "Invalid parameter 'speed': must be between 0.5 and 2.0, got 3"
        );
        assert_eq!(err.kind(), "invalid_parameter");
    }

    #[test]
    fn synthesis_failure_passes_detail_through() {
        let err: DispatchError = SynthesisError::new("Voice 'xx' not found").into();
        assert_eq!(err.to_string(), "Synthesis failed: Voice 'xx' not found");
        assert_eq!(err.kind(), "synthesis_failure");
    }
}
