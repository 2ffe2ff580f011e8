use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EmailStatus {
    /// Delivered to the provider
    Sent,
    /// Demo mode, only logged
    Demo,
    Failed,
}

/// Record of one notification attempt, whatever its outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailLog {
    pub id: String,
    pub recipient: String,
    pub subject: String,
    pub template: String,
    pub status: EmailStatus,
    pub error: Option<String>,
    pub created_at: i64,
}
