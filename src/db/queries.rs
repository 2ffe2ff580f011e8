use chrono::Utc;
use rusqlite::{Connection, ErrorCode, ffi, params};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::*;

use super::from_row::{
    ARTIFACT_COLS, ASSIGNMENT_COLS, BOT_STATUS_COLS, EMAIL_LOG_COLS, MT5_ACCOUNT_COLS,
    USAGE_LOG_COLS, USER_COLS, query_all, query_one,
};

fn now() -> i64 {
    Utc::now().timestamp()
}

pub fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

/// True when the error is a UNIQUE / PRIMARY KEY constraint failure.
/// Foreign key, NOT NULL and CHECK failures are not.
pub fn is_unique_violation(err: &AppError) -> bool {
    matches!(
        err,
        AppError::Database(rusqlite::Error::SqliteFailure(e, _))
            if e.code == ErrorCode::ConstraintViolation
                && matches!(
                    e.extended_code,
                    ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                )
    )
}

/// True when a referenced row (e.g. the artifact) no longer exists.
pub fn is_foreign_key_violation(err: &AppError) -> bool {
    matches!(
        err,
        AppError::Database(rusqlite::Error::SqliteFailure(e, _))
            if e.extended_code == ffi::SQLITE_CONSTRAINT_FOREIGNKEY
    )
}

// ============ Users ============

/// Row data for a new user; the password is already hashed.
pub struct NewUser<'a> {
    pub email: &'a str,
    pub name: &'a str,
    pub password_hash: &'a str,
    pub role: UserRole,
    pub status: UserStatus,
}

pub fn create_user(conn: &Connection, input: &NewUser<'_>) -> Result<User> {
    let id = gen_id();
    let now = now();
    let email = input.email.trim();

    conn.execute(
        "INSERT INTO users (id, email, name, password_hash, role, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            &id,
            email,
            input.name,
            input.password_hash,
            input.role.as_ref(),
            input.status.as_ref(),
            now,
            now
        ],
    )?;

    Ok(User {
        id,
        email: email.to_string(),
        name: input.name.to_string(),
        password_hash: input.password_hash.to_string(),
        role: input.role,
        status: input.status,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_user_by_id(conn: &Connection, id: &str) -> Result<Option<User>> {
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLS),
        params![id],
    )
}

/// Email lookup is case-insensitive (column collation).
pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE email = ?1", USER_COLS),
        params![email.trim()],
    )
}

pub fn list_users_paginated(
    conn: &Connection,
    status: Option<UserStatus>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<User>, i64)> {
    let status = status.map(|s| s.as_ref().to_string());

    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE ?1 IS NULL OR status = ?1",
        params![status],
        |row| row.get(0),
    )?;

    let items = query_all(
        conn,
        &format!(
            "SELECT {} FROM users WHERE ?1 IS NULL OR status = ?1
             ORDER BY created_at DESC, rowid DESC LIMIT ?2 OFFSET ?3",
            USER_COLS
        ),
        params![status, limit, offset],
    )?;

    Ok((items, total))
}

pub fn update_user_status(conn: &Connection, id: &str, status: UserStatus) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE users SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_ref(), now(), id],
    )?;
    Ok(updated > 0)
}

pub fn update_user_role(conn: &Connection, id: &str, role: UserRole) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE users SET role = ?1, updated_at = ?2 WHERE id = ?3",
        params![role.as_ref(), now(), id],
    )?;
    Ok(updated > 0)
}

// ============ Artifacts ============

/// Insert an artifact without a license key and return its id.
/// Must be followed by `LicenseLedger::issue` in the same transaction.
pub fn create_artifact(conn: &Connection, input: &NewArtifact<'_>) -> Result<String> {
    let id = gen_id();

    conn.execute(
        "INSERT INTO artifacts (id, user_id, kind, name, description, strategy_details, code, license_key, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, ?8)",
        params![
            &id,
            input.user_id,
            input.kind.as_ref(),
            input.name,
            input.description,
            input.strategy_details,
            input.code,
            now()
        ],
    )?;

    Ok(id)
}

/// Bind a license key to an artifact that has none yet.
/// Returns false if the artifact is missing or already keyed.
pub fn set_artifact_license_key(conn: &Connection, id: &str, license_key: &str) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE artifacts SET license_key = ?1 WHERE id = ?2 AND license_key IS NULL",
        params![license_key, id],
    )?;
    Ok(updated > 0)
}

/// Current key of an artifact: `None` if the artifact does not exist,
/// `Some(None)` if it exists but has not been keyed.
pub fn get_artifact_license_key(conn: &Connection, id: &str) -> Result<Option<Option<String>>> {
    use rusqlite::OptionalExtension;
    let key = conn
        .query_row(
            "SELECT license_key FROM artifacts WHERE id = ?1",
            params![id],
            |row| row.get::<_, Option<String>>(0),
        )
        .optional()?;
    Ok(key)
}

pub fn get_artifact_by_id(conn: &Connection, id: &str) -> Result<Option<Artifact>> {
    query_one(
        conn,
        &format!("SELECT {} FROM artifacts WHERE id = ?1", ARTIFACT_COLS),
        params![id],
    )
}

pub fn get_artifact_for_user(conn: &Connection, id: &str, user_id: &str) -> Result<Option<Artifact>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM artifacts WHERE id = ?1 AND user_id = ?2",
            ARTIFACT_COLS
        ),
        params![id, user_id],
    )
}

pub fn list_artifacts_for_user(conn: &Connection, user_id: &str) -> Result<Vec<Artifact>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM artifacts WHERE user_id = ?1 AND license_key IS NOT NULL
             ORDER BY created_at DESC, rowid DESC",
            ARTIFACT_COLS
        ),
        params![user_id],
    )
}

/// Delete an artifact owned by `user_id`. Assignments and bot status cascade;
/// usage logs are kept.
pub fn delete_artifact(conn: &Connection, id: &str, user_id: &str) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM artifacts WHERE id = ?1 AND user_id = ?2",
        params![id, user_id],
    )?;
    Ok(deleted > 0)
}

// ============ License Assignments ============

pub fn create_license_assignment(conn: &Connection, a: &LicenseAssignment) -> Result<()> {
    conn.execute(
        "INSERT INTO license_assignments (id, artifact_id, license_key, customer_name, customer_email,
             assigned_at, expiration_date, purchase_amount, is_active, last_used, usage_count)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            &a.id,
            &a.artifact_id,
            &a.license_key,
            &a.customer_name,
            &a.customer_email,
            a.assigned_at,
            a.expiration_date,
            a.purchase_amount,
            a.is_active as i32,
            a.last_used,
            a.usage_count
        ],
    )?;
    Ok(())
}

pub fn get_assignment_by_key(conn: &Connection, license_key: &str) -> Result<Option<LicenseAssignment>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM license_assignments WHERE license_key = ?1",
            ASSIGNMENT_COLS
        ),
        params![license_key],
    )
}

pub fn list_assignments_for_artifact(
    conn: &Connection,
    artifact_id: &str,
) -> Result<Vec<LicenseAssignment>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM license_assignments WHERE artifact_id = ?1
             ORDER BY assigned_at DESC, rowid DESC",
            ASSIGNMENT_COLS
        ),
        params![artifact_id],
    )
}

/// Count one use of a license. The increment happens inside SQLite so
/// concurrent validations never lose an update.
pub fn record_license_use(conn: &Connection, license_key: &str, used_at: i64) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE license_assignments
         SET usage_count = usage_count + 1, last_used = ?1
         WHERE license_key = ?2",
        params![used_at, license_key],
    )?;
    Ok(updated > 0)
}

// ============ Usage Logs ============

pub fn create_usage_log(
    conn: &Connection,
    license_key: &str,
    account_number: Option<&str>,
    created_at: i64,
) -> Result<UsageLogEntry> {
    let id = gen_id();

    conn.execute(
        "INSERT INTO usage_logs (id, license_key, account_number, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![&id, license_key, account_number, created_at],
    )?;

    Ok(UsageLogEntry {
        id,
        license_key: license_key.to_string(),
        account_number: account_number.map(String::from),
        created_at,
    })
}

/// Most recent usage entries first. Insertion order breaks timestamp ties.
pub fn list_usage_logs(conn: &Connection, license_key: &str, limit: i64) -> Result<Vec<UsageLogEntry>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM usage_logs WHERE license_key = ?1
             ORDER BY created_at DESC, rowid DESC LIMIT ?2",
            USAGE_LOG_COLS
        ),
        params![license_key, limit],
    )
}

// ============ MT5 Accounts ============

pub fn create_mt5_account(
    conn: &Connection,
    user_id: &str,
    account_number: &str,
    server: &str,
    password_encrypted: &[u8],
) -> Result<Mt5Account> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO mt5_accounts (id, user_id, account_number, server, password_encrypted, connected, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)",
        params![&id, user_id, account_number, server, password_encrypted, now],
    )?;

    Ok(Mt5Account {
        id,
        user_id: user_id.to_string(),
        account_number: account_number.to_string(),
        server: server.to_string(),
        password_encrypted: password_encrypted.to_vec(),
        connected: true,
        created_at: now,
    })
}

pub fn get_mt5_account(conn: &Connection, user_id: &str, account_number: &str) -> Result<Option<Mt5Account>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM mt5_accounts WHERE user_id = ?1 AND account_number = ?2",
            MT5_ACCOUNT_COLS
        ),
        params![user_id, account_number],
    )
}

pub fn list_mt5_accounts_for_user(conn: &Connection, user_id: &str) -> Result<Vec<Mt5Account>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM mt5_accounts WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC",
            MT5_ACCOUNT_COLS
        ),
        params![user_id],
    )
}

// ============ Bot Status ============

/// Create an inactive status row if the artifact has none.
pub fn init_bot_status(conn: &Connection, artifact_id: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO bot_status (artifact_id, is_active, last_updated) VALUES (?1, 0, ?2)",
        params![artifact_id, now()],
    )?;
    Ok(())
}

pub fn set_bot_status(conn: &Connection, artifact_id: &str, is_active: bool) -> Result<BotStatus> {
    let now = now();
    conn.execute(
        "INSERT INTO bot_status (artifact_id, is_active, last_updated) VALUES (?1, ?2, ?3)
         ON CONFLICT(artifact_id) DO UPDATE SET is_active = excluded.is_active, last_updated = excluded.last_updated",
        params![artifact_id, is_active as i32, now],
    )?;
    Ok(BotStatus {
        ea_id: artifact_id.to_string(),
        is_active,
        last_updated: now,
    })
}

pub fn get_bot_status(conn: &Connection, artifact_id: &str) -> Result<Option<BotStatus>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM bot_status WHERE artifact_id = ?1",
            BOT_STATUS_COLS
        ),
        params![artifact_id],
    )
}

// ============ Email Logs ============

pub fn create_email_log(
    conn: &Connection,
    recipient: &str,
    subject: &str,
    template: &str,
    status: EmailStatus,
    error: Option<&str>,
) -> Result<EmailLog> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO email_logs (id, recipient, subject, template, status, error, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![&id, recipient, subject, template, status.as_ref(), error, now],
    )?;

    Ok(EmailLog {
        id,
        recipient: recipient.to_string(),
        subject: subject.to_string(),
        template: template.to_string(),
        status,
        error: error.map(String::from),
        created_at: now,
    })
}

pub fn list_email_logs_paginated(
    conn: &Connection,
    limit: i64,
    offset: i64,
) -> Result<(Vec<EmailLog>, i64)> {
    let total: i64 = conn.query_row("SELECT COUNT(*) FROM email_logs", [], |row| row.get(0))?;
    let items = query_all(
        conn,
        &format!(
            "SELECT {} FROM email_logs ORDER BY created_at DESC, rowid DESC LIMIT ?1 OFFSET ?2",
            EMAIL_LOG_COLS
        ),
        params![limit, offset],
    )?;
    Ok((items, total))
}
