use serde::{Deserialize, Serialize};

/// The sale of an artifact's license key to one customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseAssignment {
    pub id: String,
    pub artifact_id: String,
    pub license_key: String,
    pub customer_name: String,
    pub customer_email: String,
    pub assigned_at: i64,
    /// None = never expires
    pub expiration_date: Option<i64>,
    pub purchase_amount: f64,
    /// Stored flag. Expiry is always decided from `expiration_date` at read time.
    pub is_active: bool,
    pub last_used: Option<i64>,
    pub usage_count: i64,
}

impl LicenseAssignment {
    /// Expired means the expiration date is strictly before `now`.
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expiration_date.is_some_and(|exp| exp < now)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignLicense {
    pub license_key: String,
    pub customer_name: String,
    pub customer_email: String,
    #[serde(default)]
    pub expiration_date: Option<i64>,
    #[serde(default)]
    pub purchase_amount: Option<f64>,
}

/// One validation call recorded against a license key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageLogEntry {
    pub id: String,
    pub license_key: String,
    pub account_number: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<i64>,
}

impl ValidationResult {
    pub fn invalid(reason: &str) -> Self {
        Self {
            valid: false,
            reason: Some(reason.to_string()),
            customer_name: None,
            expiration_date: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LicenseAnalytics {
    pub total_licenses: i64,
    pub active_licenses: i64,
    pub expired_licenses: i64,
    pub total_revenue: f64,
    pub licenses: Vec<LicenseAssignment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageHistory {
    pub license_key: String,
    pub usage_count: i64,
    pub last_used: Option<i64>,
    pub recent_entries: Vec<UsageLogEntry>,
}
