//! Live-update fan-out: group membership, per-connection sessions and the
//! dispatcher content operations call after a committed mutation.

pub mod backend;
pub mod dispatcher;
pub mod error;
pub mod hub;
pub mod memory;
pub mod session;
pub mod subscriber;

pub use backend::{GroupBackend, PublishReport};
pub use dispatcher::{DispatchStats, Dispatcher};
pub use error::LiveError;
pub use hub::LiveHub;
pub use memory::MemoryBackend;
pub use session::{CloseReason, FrameSink, Outbound, Session, SessionState};
pub use subscriber::{Offer, SubscriberHandle, SubscriberId};
