use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotStatus {
    pub ea_id: String,
    pub is_active: bool,
    pub last_updated: i64,
}

#[derive(Debug, Deserialize)]
pub struct ToggleBot {
    pub ea_id: String,
    pub is_active: bool,
}
