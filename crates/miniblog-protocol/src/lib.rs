pub mod codec;
pub mod error;
pub mod events;
pub mod timestamp;

pub use codec::{encode, Frame};
pub use error::EventError;
pub use events::{CommentPayload, DomainEvent, PostPayload};
