pub mod db;
pub mod error;
pub mod store;
pub mod types;

pub use error::ContentError;
pub use store::ContentStore;
pub use types::{Comment, NewPost, Post};
