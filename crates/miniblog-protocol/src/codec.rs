use std::sync::Arc;

use crate::events::DomainEvent;

/// One encoded outbound message. Cheap to clone, so a single encoding is
/// shared by every subscriber of a publish.
pub type Frame = Arc<str>;

/// Encode a domain event as a JSON text frame.
///
/// Deterministic: the same event always yields byte-identical output.
pub fn encode(event: &DomainEvent) -> Frame {
    // Every field is a string, integer or formatted timestamp.
    let json = serde_json::to_string(event).expect("domain event serialization is infallible");
    Arc::from(json)
}
