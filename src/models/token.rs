use serde::{Deserialize, Serialize};

use super::UserId;

/// Access/refresh pair returned by login and refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Server-side record of an outstanding refresh token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshEntry {
    pub user_id: UserId,
    /// Unix timestamp (seconds)
    pub issued_at: i64,
}
