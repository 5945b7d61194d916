#![forbid(unsafe_code)]

use tessera_columnar::ColumnarError;

pub type AggrResult<T> = Result<T, AggrError>;

/// Failures of an aggregation or indexing call.
///
/// Precondition variants are raised while the result's shape is planned, before
/// any data is read. Numeric edge cases (division by a zero count, negative
/// round-off in a variance) are never errors; they produce undefined values.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AggrError {
    #[error(transparent)]
    Columnar(#[from] ColumnarError),

    #[error("unknown operator: {0}")]
    UnknownOperator(String),

    #[error("{operator}: expected {expected} arguments, got {actual}")]
    Arity {
        operator: String,
        expected: String,
        actual: usize,
    },

    #[error("{operator}: argument {argument} is {actual}, expected {expected}")]
    TypeMismatch {
        operator: String,
        argument: usize,
        expected: String,
        actual: String,
    },

    #[error("{operator}: argument {argument} is not defined on the domain of the values")]
    DomainMismatch { operator: String, argument: usize },

    #[error("{operator}: value range is unbounded, a table algorithm needs a finite range")]
    UnboundedValues { operator: String },

    #[error("{operator}: partition values must be positions in a countable domain")]
    PartitionNotCountable { operator: String },

    #[error("{operator}: {message}")]
    Precondition { operator: String, message: String },

    #[error("{operator}: {what} exceeds the limit of {limit}")]
    Capacity {
        operator: String,
        what: String,
        limit: u64,
    },

    #[error("{operator}: result was created without being calculated")]
    NotCalculated { operator: String },
}

impl AggrError {
    pub(crate) fn capacity(operator: &str, what: impl Into<String>, limit: u64) -> Self {
        AggrError::Capacity {
            operator: operator.to_string(),
            what: what.into(),
            limit,
        }
    }

    pub(crate) fn precondition(operator: &str, message: impl Into<String>) -> Self {
        AggrError::Precondition {
            operator: operator.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn type_mismatch(
        operator: &str,
        argument: usize,
        expected: impl Into<String>,
        actual: impl ToString,
    ) -> Self {
        AggrError::TypeMismatch {
            operator: operator.to_string(),
            argument,
            expected: expected.into(),
            actual: actual.to_string(),
        }
    }

    pub(crate) fn domain_mismatch(operator: &str, argument: usize) -> Self {
        AggrError::DomainMismatch {
            operator: operator.to_string(),
            argument,
        }
    }

    /// Whether the error was raised by argument checking rather than by the
    /// calculation itself.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            AggrError::UnknownOperator(_)
                | AggrError::Arity { .. }
                | AggrError::TypeMismatch { .. }
                | AggrError::DomainMismatch { .. }
                | AggrError::UnboundedValues { .. }
                | AggrError::PartitionNotCountable { .. }
                | AggrError::Precondition { .. }
        )
    }
}
