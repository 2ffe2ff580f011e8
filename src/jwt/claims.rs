use serde::{Deserialize, Serialize};

/// Custom claims carried in a user's bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub user_id: String,
}
