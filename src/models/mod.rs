pub mod identity;
pub mod token;

pub use identity::{Identity, Role, UserId};
pub use token::{RefreshEntry, TokenPair};
