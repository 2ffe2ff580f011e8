//! Row mapping for every table, plus the column lists the queries select.
//! Column order in each `*_COLS` constant must match the `from_row` impl.

use std::str::FromStr;

use rusqlite::{Connection, OptionalExtension, Params, Row, types::Type};

use crate::error::Result;
use crate::models::*;

pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

pub const USER_COLS: &str =
    "id, email, name, password_hash, role, status, created_at, updated_at";

pub const ARTIFACT_COLS: &str =
    "id, user_id, kind, name, description, strategy_details, code, license_key, created_at";

pub const ASSIGNMENT_COLS: &str = "id, artifact_id, license_key, customer_name, customer_email, assigned_at, expiration_date, purchase_amount, is_active, last_used, usage_count";

pub const USAGE_LOG_COLS: &str = "id, license_key, account_number, created_at";

pub const MT5_ACCOUNT_COLS: &str =
    "id, user_id, account_number, server, password_encrypted, connected, created_at";

pub const BOT_STATUS_COLS: &str = "artifact_id, is_active, last_updated";

pub const EMAIL_LOG_COLS: &str = "id, recipient, subject, template, status, error, created_at";

/// Parse a TEXT column into a strum enum.
fn parse_enum<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

impl FromRow for User {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get(0)?,
            email: row.get(1)?,
            name: row.get(2)?,
            password_hash: row.get(3)?,
            role: parse_enum(row, 4)?,
            status: parse_enum(row, 5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }
}

impl FromRow for Artifact {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Artifact {
            id: row.get(0)?,
            user_id: row.get(1)?,
            kind: parse_enum(row, 2)?,
            name: row.get(3)?,
            description: row.get(4)?,
            strategy_details: row.get(5)?,
            code: row.get(6)?,
            license_key: row.get(7)?,
            created_at: row.get(8)?,
        })
    }
}

impl FromRow for LicenseAssignment {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(LicenseAssignment {
            id: row.get(0)?,
            artifact_id: row.get(1)?,
            license_key: row.get(2)?,
            customer_name: row.get(3)?,
            customer_email: row.get(4)?,
            assigned_at: row.get(5)?,
            expiration_date: row.get(6)?,
            purchase_amount: row.get(7)?,
            is_active: row.get::<_, i32>(8)? != 0,
            last_used: row.get(9)?,
            usage_count: row.get(10)?,
        })
    }
}

impl FromRow for UsageLogEntry {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(UsageLogEntry {
            id: row.get(0)?,
            license_key: row.get(1)?,
            account_number: row.get(2)?,
            created_at: row.get(3)?,
        })
    }
}

impl FromRow for Mt5Account {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Mt5Account {
            id: row.get(0)?,
            user_id: row.get(1)?,
            account_number: row.get(2)?,
            server: row.get(3)?,
            password_encrypted: row.get(4)?,
            connected: row.get::<_, i32>(5)? != 0,
            created_at: row.get(6)?,
        })
    }
}

impl FromRow for BotStatus {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(BotStatus {
            ea_id: row.get(0)?,
            is_active: row.get::<_, i32>(1)? != 0,
            last_updated: row.get(2)?,
        })
    }
}

impl FromRow for EmailLog {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(EmailLog {
            id: row.get(0)?,
            recipient: row.get(1)?,
            subject: row.get(2)?,
            template: row.get(3)?,
            status: parse_enum(row, 4)?,
            error: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

pub fn query_one<T: FromRow>(conn: &Connection, sql: &str, params: impl Params) -> Result<Option<T>> {
    let row = conn.query_row(sql, params, T::from_row).optional()?;
    Ok(row)
}

pub fn query_all<T: FromRow>(conn: &Connection, sql: &str, params: impl Params) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}
