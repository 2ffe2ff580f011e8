use std::env;

use anyhow::{Context, bail};

/// How outgoing notifications are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailMode {
    /// Log only, nothing leaves the process
    Demo,
    /// Deliver through the Resend API
    Resend,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub dev_mode: bool,
    pub jwt_secret: String,
    pub token_ttl_minutes: u64,
    /// Base64-encoded 32-byte key for encrypting stored MT5 passwords
    pub master_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub generation_timeout_secs: u64,
    pub email_mode: EmailMode,
    pub resend_api_key: Option<String>,
    pub email_from: String,
    /// New accounts start as `pending` until an admin approves them
    pub require_approval: bool,
    pub bootstrap_admin_email: Option<String>,
    pub cors_origins: Vec<String>,
}

const DEV_JWT_SECRET: &str = "eaforge-dev-secret-do-not-use-in-production";

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("EAFORGE_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8001);

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ if dev_mode => DEV_JWT_SECRET.to_string(),
            _ => bail!("JWT_SECRET must be set outside dev mode"),
        };

        let master_key = env::var("MASTER_KEY").ok().filter(|k| !k.is_empty());
        if master_key.is_none() && !dev_mode {
            bail!("MASTER_KEY must be set outside dev mode");
        }

        let token_ttl_minutes: u64 = env::var("TOKEN_TTL_MINUTES")
            .ok()
            .map(|v| v.parse())
            .transpose()
            .context("TOKEN_TTL_MINUTES must be a positive integer")?
            .unwrap_or(60 * 24 * 7);

        let email_mode = match env::var("EMAIL_MODE").as_deref() {
            Ok("resend") => EmailMode::Resend,
            Ok("demo") | Err(_) => EmailMode::Demo,
            Ok(other) => bail!("Unknown EMAIL_MODE '{}' (expected demo or resend)", other),
        };

        let require_approval = env::var("REQUIRE_APPROVAL")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "eaforge.db".to_string()),
            dev_mode,
            jwt_secret,
            token_ttl_minutes,
            master_key,
            openai_api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            openai_base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            openai_model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
            generation_timeout_secs: env::var("GENERATION_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(120),
            email_mode,
            resend_api_key: env::var("RESEND_API_KEY").ok().filter(|k| !k.is_empty()),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "EA Forge <noreply@eaforge.local>".to_string()),
            require_approval,
            bootstrap_admin_email: env::var("BOOTSTRAP_ADMIN_EMAIL").ok(),
            cors_origins,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
