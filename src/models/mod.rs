pub mod backend;
pub mod conversation;
pub mod message;

pub use backend::*;
pub use conversation::Conversation;
pub use message::{Message, Role, RoleError};
