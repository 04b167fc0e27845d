//! Transport level failure reporting

use fe2o3_amqp_types::definitions::{ConnectionError, ErrorCondition};

/// Fatal failure recorded by the SASL layer.
///
/// Carries the AMQP error condition the enclosing transport attaches to its
/// close frame, together with a human readable description.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{condition:?}: {description}")]
pub struct Error {
    condition: ErrorCondition,
    description: String,
}

impl Error {
    pub(crate) fn framing_error(description: impl Into<String>) -> Self {
        Self {
            condition: ErrorCondition::ConnectionError(ConnectionError::FramingError),
            description: description.into(),
        }
    }

    /// The AMQP error condition
    pub fn condition(&self) -> &ErrorCondition {
        &self.condition
    }

    /// Human readable description of the failure
    pub fn description(&self) -> &str {
        &self.description
    }
}

#[cfg(test)]
mod tests {
    use fe2o3_amqp_types::definitions::{ConnectionError, ErrorCondition};

    use super::Error;

    #[test]
    fn test_framing_error_condition() {
        let error = Error::framing_error("header mismatch");
        assert_eq!(
            error.condition(),
            &ErrorCondition::ConnectionError(ConnectionError::FramingError)
        );
        assert_eq!(error.description(), "header mismatch");
    }
}
