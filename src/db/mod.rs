mod from_row;
pub mod queries;

use std::path::Path;
use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::credentials::CredentialStore;
use crate::crypto::MasterKey;
use crate::email::EmailService;
use crate::error::Result;
use crate::generation::CodeGenerator;
use crate::jwt::TokenIssuer;
use crate::ledger::LicenseLedger;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Everything a handler needs, built once at startup from `Config`.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub ledger: LicenseLedger,
    pub tokens: TokenIssuer,
    pub credentials: CredentialStore,
    pub generator: Arc<dyn CodeGenerator>,
    pub email: EmailService,
    pub master_key: MasterKey,
}

/// Open a pooled SQLite database. Every connection gets foreign keys, WAL
/// and a busy timeout so concurrent writers queue instead of failing.
pub fn create_pool(path: impl AsRef<Path>, max_size: u32) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(path).with_init(|conn| {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
    });
    let pool = Pool::builder().max_size(max_size).build(manager)?;
    Ok(pool)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE COLLATE NOCASE,
            name TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'user',
            status TEXT NOT NULL DEFAULT 'approved',
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_users_status ON users(status);

        -- license_key is NULL only inside the transaction that creates the row
        CREATE TABLE IF NOT EXISTS artifacts (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            kind TEXT NOT NULL,
            name TEXT NOT NULL,
            description TEXT NOT NULL,
            strategy_details TEXT,
            code TEXT NOT NULL,
            license_key TEXT UNIQUE,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_artifacts_user ON artifacts(user_id);

        CREATE TABLE IF NOT EXISTS license_assignments (
            id TEXT PRIMARY KEY,
            artifact_id TEXT NOT NULL REFERENCES artifacts(id) ON DELETE CASCADE,
            license_key TEXT NOT NULL UNIQUE,
            customer_name TEXT NOT NULL,
            customer_email TEXT NOT NULL,
            assigned_at INTEGER NOT NULL,
            expiration_date INTEGER,
            purchase_amount REAL NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1,
            last_used INTEGER,
            usage_count INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_license_assignments_artifact ON license_assignments(artifact_id);

        -- Audit trail, deliberately without a foreign key: rows outlive their artifact
        CREATE TABLE IF NOT EXISTS usage_logs (
            id TEXT PRIMARY KEY,
            license_key TEXT NOT NULL,
            account_number TEXT,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_usage_logs_key ON usage_logs(license_key, created_at);

        CREATE TABLE IF NOT EXISTS mt5_accounts (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            account_number TEXT NOT NULL,
            server TEXT NOT NULL,
            password_encrypted BLOB NOT NULL,
            connected INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL,
            UNIQUE(user_id, account_number)
        );

        CREATE TABLE IF NOT EXISTS bot_status (
            artifact_id TEXT PRIMARY KEY REFERENCES artifacts(id) ON DELETE CASCADE,
            is_active INTEGER NOT NULL DEFAULT 0,
            last_updated INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS email_logs (
            id TEXT PRIMARY KEY,
            recipient TEXT NOT NULL,
            subject TEXT NOT NULL,
            template TEXT NOT NULL,
            status TEXT NOT NULL,
            error TEXT,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_email_logs_created ON email_logs(created_at);
        "#,
    )?;
    Ok(())
}
