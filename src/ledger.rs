//! License ledger: issuing an artifact's key, assigning it to a customer,
//! validating it from deployed scripts, and reporting on its use.
//!
//! Expiry is never stored. An assignment is expired exactly when it has an
//! expiration date strictly before the ledger clock's "now", and every read
//! recomputes it.

use std::sync::Arc;

use rusqlite::Connection;

use crate::clock::Clock;
use crate::crypto::RandomSource;
use crate::db::queries;
use crate::error::AppError;
use crate::models::{
    AssignLicense, LicenseAnalytics, LicenseAssignment, UsageHistory, ValidationResult,
};

pub const LICENSE_KEY_PREFIX: &str = "EA-";

/// 128 bits of key material.
const KEY_BYTES: usize = 16;

pub const USAGE_HISTORY_LIMIT: i64 = 100;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("artifact or license not found")]
    NotFound,

    #[error("license key does not match this artifact")]
    Mismatch,

    #[error("license key is already assigned")]
    AlreadyAssigned,

    #[error("you do not own this license")]
    Forbidden,

    #[error(transparent)]
    Storage(#[from] AppError),
}

impl From<rusqlite::Error> for LedgerError {
    fn from(e: rusqlite::Error) -> Self {
        LedgerError::Storage(AppError::Database(e))
    }
}

impl From<LedgerError> for AppError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::NotFound => AppError::NotFound("License or EA not found".into()),
            LedgerError::Mismatch => AppError::BadRequest(e.to_string()),
            LedgerError::AlreadyAssigned => AppError::Conflict(e.to_string()),
            LedgerError::Forbidden => AppError::Forbidden(e.to_string()),
            LedgerError::Storage(inner) => inner,
        }
    }
}

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// Keys are compared and stored without surrounding whitespace.
pub fn normalize_key(license_key: &str) -> &str {
    license_key.trim()
}

#[derive(Clone)]
pub struct LicenseLedger {
    clock: Arc<dyn Clock>,
    random: Arc<dyn RandomSource>,
}

impl LicenseLedger {
    pub fn new(clock: Arc<dyn Clock>, random: Arc<dyn RandomSource>) -> Self {
        Self { clock, random }
    }

    /// Fresh key: `EA-` followed by 32 uppercase hex digits.
    fn generate_key(&self) -> String {
        let mut bytes = [0u8; KEY_BYTES];
        self.random.fill_bytes(&mut bytes);
        format!("{}{}", LICENSE_KEY_PREFIX, hex::encode_upper(bytes))
    }

    /// Bind a new license key to an artifact. An artifact that already has a
    /// key keeps it, and that key is returned.
    pub fn issue(&self, conn: &Connection, artifact_id: &str) -> LedgerResult<String> {
        match queries::get_artifact_license_key(conn, artifact_id)? {
            None => Err(LedgerError::NotFound),
            Some(Some(existing)) => Ok(existing),
            Some(None) => {
                let key = self.generate_key();
                if queries::set_artifact_license_key(conn, artifact_id, &key)? {
                    tracing::debug!(artifact_id = %artifact_id, "Issued license key");
                    return Ok(key);
                }
                // Lost a race with another issuer; theirs wins.
                queries::get_artifact_license_key(conn, artifact_id)?
                    .flatten()
                    .ok_or(LedgerError::NotFound)
            }
        }
    }

    /// Hand the artifact's key to a customer. Uniqueness is enforced by the
    /// UNIQUE constraint on `license_assignments.license_key`, so two racing
    /// calls produce one row and one `AlreadyAssigned`.
    pub fn assign(
        &self,
        conn: &Connection,
        owner_id: &str,
        artifact_id: &str,
        input: &AssignLicense,
    ) -> LedgerResult<LicenseAssignment> {
        let license_key = normalize_key(&input.license_key);
        let artifact = queries::get_artifact_for_user(conn, artifact_id, owner_id)?
            .ok_or(LedgerError::NotFound)?;

        if artifact.license_key != license_key {
            return Err(LedgerError::Mismatch);
        }

        let assignment = LicenseAssignment {
            id: queries::gen_id(),
            artifact_id: artifact.id,
            license_key: license_key.to_string(),
            customer_name: input.customer_name.clone(),
            customer_email: input.customer_email.clone(),
            assigned_at: self.clock.now(),
            expiration_date: input.expiration_date,
            purchase_amount: input.purchase_amount.unwrap_or(0.0),
            is_active: true,
            last_used: None,
            usage_count: 0,
        };

        match queries::create_license_assignment(conn, &assignment) {
            Ok(()) => {}
            Err(e) if queries::is_unique_violation(&e) => return Err(LedgerError::AlreadyAssigned),
            // Artifact deleted after the ownership lookup
            Err(e) if queries::is_foreign_key_violation(&e) => return Err(LedgerError::NotFound),
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            artifact_id = %assignment.artifact_id,
            assignment_id = %assignment.id,
            "License assigned"
        );
        Ok(assignment)
    }

    /// Public check called by deployed trading scripts. A missing or expired
    /// key is a negative result, not an error.
    pub fn validate(
        &self,
        conn: &Connection,
        license_key: &str,
        account_number: Option<&str>,
    ) -> LedgerResult<ValidationResult> {
        let license_key = normalize_key(license_key);
        let now = self.clock.now();

        let Some(assignment) = queries::get_assignment_by_key(conn, license_key)? else {
            return Ok(ValidationResult::invalid("not found"));
        };

        if assignment.is_expired_at(now) {
            return Ok(ValidationResult::invalid("expired"));
        }

        // Write first so the deferred transaction takes the write lock up front.
        let tx = conn.unchecked_transaction()?;
        if !queries::record_license_use(&tx, license_key, now)? {
            // Artifact deleted between lookup and update.
            return Ok(ValidationResult::invalid("not found"));
        }
        queries::create_usage_log(&tx, license_key, account_number, now)?;
        tx.commit()?;

        Ok(ValidationResult {
            valid: true,
            reason: None,
            customer_name: Some(assignment.customer_name),
            expiration_date: assignment.expiration_date,
        })
    }

    /// Counts and revenue for one artifact, recomputed on every call. The
    /// returned assignments carry the computed `is_active`; nothing is written.
    pub fn analytics(
        &self,
        conn: &Connection,
        owner_id: &str,
        artifact_id: &str,
    ) -> LedgerResult<LicenseAnalytics> {
        queries::get_artifact_for_user(conn, artifact_id, owner_id)?
            .ok_or(LedgerError::NotFound)?;

        let now = self.clock.now();
        let mut licenses = queries::list_assignments_for_artifact(conn, artifact_id)?;

        let mut expired = 0;
        let mut revenue = 0.0;
        for license in &mut licenses {
            license.is_active = !license.is_expired_at(now);
            if !license.is_active {
                expired += 1;
            }
            revenue += license.purchase_amount;
        }

        let total = licenses.len() as i64;
        Ok(LicenseAnalytics {
            total_licenses: total,
            active_licenses: total - expired,
            expired_licenses: expired,
            total_revenue: revenue,
            licenses,
        })
    }

    pub fn usage_history(
        &self,
        conn: &Connection,
        license_key: &str,
        caller_id: &str,
    ) -> LedgerResult<UsageHistory> {
        let license_key = normalize_key(license_key);
        let assignment =
            queries::get_assignment_by_key(conn, license_key)?.ok_or(LedgerError::NotFound)?;

        let artifact = queries::get_artifact_by_id(conn, &assignment.artifact_id)?
            .ok_or(LedgerError::NotFound)?;
        if artifact.user_id != caller_id {
            return Err(LedgerError::Forbidden);
        }

        let recent_entries = queries::list_usage_logs(conn, license_key, USAGE_HISTORY_LIMIT)?;

        Ok(UsageHistory {
            license_key: assignment.license_key,
            usage_count: assignment.usage_count,
            last_used: assignment.last_used,
            recent_entries,
        })
    }
}
