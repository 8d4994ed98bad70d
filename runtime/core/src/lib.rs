pub mod error;
pub mod events;
pub mod types;

pub use error::ModkitError;
pub use types::{merge_defaults, EventData, MessageLevel, UserMessage};
