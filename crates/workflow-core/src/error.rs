use thiserror::Error;

/// Boxed error carried as the source of a step failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("unknown transition: {0}")]
    UnknownTransition(String),

    #[error("unknown processor: {0}")]
    UnknownProcessor(String),

    #[error("unknown criterion: {0}")]
    UnknownCriterion(String),

    #[error("processor '{processor}' failed: {source}")]
    ProcessorExecution {
        processor: String,
        #[source]
        source: ProcessorError,
    },

    #[error("criterion '{criterion}' failed: {source}")]
    CriterionEvaluation {
        criterion: String,
        #[source]
        source: CriterionError,
    },

    #[error("unknown entity workflow: {0}")]
    UnknownEntity(String),

    #[error("invalid name '{0}': must be non-empty letters, digits, '_', '.' or '-'")]
    InvalidName(String),

    #[error("invalid definition: {0}")]
    InvalidDefinition(String),

    #[error("config not found: {0}")]
    ConfigNotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, WorkflowError>;

// ---------------------------------------------------------------------------
// Step errors raised by registered handlers
// ---------------------------------------------------------------------------

/// Failure reported by a processor's `execute`.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ProcessorError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl ProcessorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Failure reported by a criterion's `evaluate`.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct CriterionError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl CriterionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn processor_error_keeps_source_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err = WorkflowError::ProcessorExecution {
            processor: "DataIngestionProcessor".to_string(),
            source: ProcessorError::with_source("write failed", io),
        };
        assert_eq!(
            err.to_string(),
            "processor 'DataIngestionProcessor' failed: write failed"
        );
        let step = err.source().unwrap();
        assert_eq!(step.to_string(), "write failed");
        assert_eq!(step.source().unwrap().to_string(), "disk full");
    }

    #[test]
    fn criterion_error_without_source() {
        let err = CriterionError::new("no data");
        assert_eq!(err.message(), "no data");
        assert!(err.source().is_none());
    }
}
