use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mt5Account {
    pub id: String,
    pub user_id: String,
    pub account_number: String,
    pub server: String,
    /// AES-GCM sealed trading password
    #[serde(skip)]
    pub password_encrypted: Vec<u8>,
    pub connected: bool,
    pub created_at: i64,
}

impl Mt5Account {
    /// Context string the password is sealed under.
    pub fn encryption_context(user_id: &str, account_number: &str) -> String {
        format!("mt5-password:{}:{}", user_id, account_number)
    }
}

#[derive(Debug, Deserialize)]
pub struct ConnectMt5Account {
    pub account_number: String,
    pub server: String,
    pub password: String,
}

impl ConnectMt5Account {
    pub fn validate(&self) -> Result<()> {
        if self.account_number.trim().is_empty() || self.server.trim().is_empty() {
            return Err(AppError::BadRequest(
                "Account number and server are required".into(),
            ));
        }
        Ok(())
    }
}
