// auth module - token issuance, rotation and the role catalog

pub mod catalog;
pub mod refresh_store;
pub mod token_service;
pub mod users;

pub use catalog::{modules_for, modules_for_role};
pub use refresh_store::{MemoryRefreshStore, RefreshStore};
pub use token_service::{TokenService, TokenSettings};
pub use users::{DemoUserDirectory, UserRecord, UserSource};
