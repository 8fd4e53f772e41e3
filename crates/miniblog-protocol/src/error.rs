use thiserror::Error;

/// A domain event was built without a value the wire format requires.
///
/// This is a caller contract violation, never a delivery problem: the event
/// is rejected before anything is published.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventError {
    #[error("{event} is missing required field `{field}`")]
    MissingField {
        event: &'static str,
        field: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, EventError>;
