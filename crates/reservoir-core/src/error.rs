use reservoir_model::Value;
use thiserror::Error;

/// A required label or key was absent from an object expected to carry it.
///
/// Always a bug or data-corruption signal, never expected in normal
/// operation. The available keys are diagnostic-only and not secret.
#[derive(Error, Debug)]
#[error("{source_name} is missing {kind} '{key}'; current {kind}s: {available:?}")]
pub struct MissingFieldError {
    /// Name of the object the lookup ran against.
    pub source_name: String,
    /// What the map holds, e.g. "label" or "envvar".
    pub kind: &'static str,
    pub key: String,
    pub available: Vec<String>,
}

/// A nested payload embedded in a flat label could not be encoded or
/// decoded.
#[derive(Error, Debug)]
#[error("failed to decode label '{key}': {reason}")]
pub struct DecodeError {
    pub key: String,
    pub reason: String,
}

impl DecodeError {
    pub fn new(key: &str, err: serde_json::Error) -> Self {
        Self {
            key: key.to_string(),
            reason: err.to_string(),
        }
    }
}

/// A requirement tree was empty or internally inconsistent.
///
/// Fatal for the evaluation call: the pod instance's round is abandoned and
/// retried on a future offer with corrected input, never automatically.
#[derive(Error, Debug)]
pub enum InvalidRequirementError {
    #[error("no task requirements were generated")]
    Empty,
    #[error("task requirements disagree on pod type: expected '{expected}', found '{found}'")]
    MixedPodTypes { expected: String, found: String },
    #[error(transparent)]
    MissingField(#[from] MissingFieldError),
    #[error(transparent)]
    Codec(#[from] DecodeError),
}

/// An offer could not cover a requested quantity.
///
/// This is the one expected "error": it only ever becomes a failing
/// [`crate::EvaluationOutcome`], never an `Err` escaping evaluation.
#[derive(Error, Debug)]
#[error("insufficient '{name}': desired {desired:?}, available {available:?}")]
pub struct InsufficientResourceError {
    pub name: String,
    pub desired: Value,
    pub available: Option<Value>,
}

impl InsufficientResourceError {
    pub fn new(name: &str, desired: Value, available: Option<Value>) -> Self {
        Self {
            name: name.to_string(),
            desired,
            available,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_field_message_names_source_and_keys() {
        let err = MissingFieldError {
            source_name: "pod-0-server".to_string(),
            kind: "label",
            key: "task_type".to_string(),
            available: vec!["index".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("pod-0-server"));
        assert!(msg.contains("task_type"));
        assert!(msg.contains("index"));
    }

    #[test]
    fn insufficient_resource_names_shortfall() {
        let err = InsufficientResourceError::new(
            "cpus",
            Value::Scalar(2.0),
            Some(Value::Scalar(1.0)),
        );
        assert!(err.to_string().contains("cpus"));
    }
}
