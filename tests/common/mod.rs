//! Shared fixtures for integration tests.
//!
//! Every test gets its own file-backed SQLite database in a temp dir, a
//! fixed clock, a stub code generator and demo-mode email.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use rusqlite::Connection;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

pub use eaforge::clock::{Clock, FixedClock};
pub use eaforge::db::{AppState, queries};
pub use eaforge::ledger::LicenseLedger;
pub use eaforge::models::*;

use eaforge::config::EmailMode;
use eaforge::credentials::CredentialStore;
use eaforge::crypto::{self, HashParams, MasterKey, OsRandom};
use eaforge::email::EmailService;
use eaforge::error::{AppError, Result};
use eaforge::generation::{CodeGenerator, GenerationPrompt};
use eaforge::jwt::TokenIssuer;

/// 2024-01-01T00:00:00Z
pub const T0: i64 = 1_704_067_200;
pub const ONE_DAY: i64 = 86_400;
pub const TEST_PASSWORD: &str = "password123";
pub const STUB_CODE: &str = "//+------------------------------------------------------------------+\nint OnInit() { return(INIT_SUCCEEDED); }";

pub struct StubGenerator;

#[async_trait]
impl CodeGenerator for StubGenerator {
    async fn generate(&self, _prompt: &GenerationPrompt) -> Result<String> {
        Ok(STUB_CODE.to_string())
    }
}

pub struct FailingGenerator;

#[async_trait]
impl CodeGenerator for FailingGenerator {
    async fn generate(&self, _prompt: &GenerationPrompt) -> Result<String> {
        Err(AppError::ExternalService("Failed to generate EA".into()))
    }
}

pub struct TestApp {
    _dir: TempDir,
    pub state: AppState,
    pub clock: Arc<FixedClock>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_options(false, Arc::new(StubGenerator))
    }

    pub fn with_options(require_approval: bool, generator: Arc<dyn CodeGenerator>) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let pool = eaforge::db::create_pool(dir.path().join("test.db"), 8)
            .expect("Failed to create pool");
        eaforge::db::init_db(&pool.get().unwrap()).expect("Failed to init schema");

        let clock = Arc::new(FixedClock::new(T0));
        let state = AppState {
            ledger: LicenseLedger::new(clock.clone(), Arc::new(OsRandom)),
            tokens: TokenIssuer::new(b"test-secret-test-secret-test-sec", 60),
            credentials: CredentialStore::new(
                pool.clone(),
                HashParams::insecure_fast(),
                require_approval,
            ),
            generator,
            email: EmailService::new(
                EmailMode::Demo,
                None,
                "EA Forge <test@eaforge.local>".into(),
                pool.clone(),
            ),
            master_key: MasterKey::from_bytes([42u8; 32]),
            db: pool,
        };

        Self {
            _dir: dir,
            state,
            clock,
        }
    }

    pub fn conn(&self) -> r2d2::PooledConnection<r2d2_sqlite::SqliteConnectionManager> {
        self.state.db.get().unwrap()
    }

    pub fn router(&self) -> Router {
        eaforge::app(self.state.clone(), &["*".to_string()])
    }

    pub fn token(&self, user: &User) -> String {
        self.state.tokens.issue(&user.id).unwrap()
    }

    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("Content-Type", "application/json");
                Body::from(serde_json::to_vec(&json).unwrap())
            }
            None => Body::empty(),
        };

        let response = self
            .router()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request("GET", uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request("POST", uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request("DELETE", uri, token, None).await
    }
}

pub fn create_test_user(conn: &Connection, email: &str, role: UserRole, status: UserStatus) -> User {
    let password_hash = crypto::hash_password(TEST_PASSWORD, &HashParams::insecure_fast()).unwrap();
    queries::create_user(
        conn,
        &queries::NewUser {
            email,
            name: "Test User",
            password_hash: &password_hash,
            role,
            status,
        },
    )
    .unwrap()
}

pub fn create_approved_user(conn: &Connection, email: &str) -> User {
    create_test_user(conn, email, UserRole::User, UserStatus::Approved)
}

pub fn create_admin(conn: &Connection, email: &str) -> User {
    create_test_user(conn, email, UserRole::Admin, UserStatus::Approved)
}

/// Insert an artifact and bind `license_key` to it.
pub fn create_test_artifact_with_key(conn: &Connection, user_id: &str, license_key: &str) -> Artifact {
    let id = queries::create_artifact(
        conn,
        &NewArtifact {
            user_id,
            kind: ArtifactKind::Ea,
            name: "MA crossover",
            description: "MA crossover",
            strategy_details: None,
            code: STUB_CODE,
        },
    )
    .unwrap();
    assert!(queries::set_artifact_license_key(conn, &id, license_key).unwrap());
    queries::init_bot_status(conn, &id).unwrap();
    queries::get_artifact_by_id(conn, &id).unwrap().unwrap()
}

/// Insert an artifact with a key issued by the ledger.
pub fn create_test_artifact(conn: &Connection, ledger: &LicenseLedger, user_id: &str) -> Artifact {
    let id = queries::create_artifact(
        conn,
        &NewArtifact {
            user_id,
            kind: ArtifactKind::Indicator,
            name: "RSI divergence",
            description: "RSI divergence",
            strategy_details: Some("period 14"),
            code: STUB_CODE,
        },
    )
    .unwrap();
    ledger.issue(conn, &id).unwrap();
    queries::get_artifact_by_id(conn, &id).unwrap().unwrap()
}

pub fn assign_input(license_key: &str, expiration_date: Option<i64>, amount: Option<f64>) -> AssignLicense {
    AssignLicense {
        license_key: license_key.to_string(),
        customer_name: "Jane Doe".to_string(),
        customer_email: "jane@x.com".to_string(),
        expiration_date,
        purchase_amount: amount,
    }
}
