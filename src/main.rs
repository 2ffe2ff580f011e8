use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use eaforge::clock::SystemClock;
use eaforge::config::Config;
use eaforge::credentials::CredentialStore;
use eaforge::crypto::{HashParams, MasterKey, OsRandom};
use eaforge::db::{self, AppState};
use eaforge::email::EmailService;
use eaforge::generation::OpenAiGenerator;
use eaforge::jwt::TokenIssuer;
use eaforge::ledger::LicenseLedger;

#[derive(Parser)]
#[command(name = "eaforge", version, about = "MetaTrader 5 EA generator and license server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Give an existing account the admin role
    PromoteAdmin {
        #[arg(long)]
        email: String,
    },
}

fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let pool = db::create_pool(&config.database_path, 16)
        .with_context(|| format!("Failed to open database at {}", config.database_path))?;
    db::init_db(&*pool.get()?).context("Failed to initialize schema")?;

    let master_key = match &config.master_key {
        Some(encoded) => MasterKey::from_base64(encoded)?,
        None => {
            tracing::warn!(
                "MASTER_KEY not set, using an ephemeral key; stored MT5 passwords will be unreadable after restart"
            );
            MasterKey::ephemeral(&OsRandom)
        }
    };

    if config.openai_api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY not set, code generation requests will fail");
    }
    let generator = OpenAiGenerator::new(
        config.openai_api_key.clone(),
        config.openai_base_url.clone(),
        config.openai_model.clone(),
        config.generation_timeout_secs,
    )?;

    Ok(AppState {
        ledger: LicenseLedger::new(Arc::new(SystemClock), Arc::new(OsRandom)),
        tokens: TokenIssuer::new(config.jwt_secret.as_bytes(), config.token_ttl_minutes),
        credentials: CredentialStore::new(
            pool.clone(),
            HashParams::default(),
            config.require_approval,
        ),
        generator: Arc::new(generator),
        email: EmailService::new(
            config.email_mode,
            config.resend_api_key.clone(),
            config.email_from.clone(),
            pool.clone(),
        ),
        master_key,
        db: pool,
    })
}

async fn serve(config: Config, state: AppState) -> anyhow::Result<()> {
    if let Some(email) = &config.bootstrap_admin_email {
        match state.credentials.promote_admin(email) {
            Ok(user) => tracing::info!(user_id = %user.id, "Bootstrap admin promoted"),
            Err(e) => tracing::warn!(email = %email, error = %e, "Bootstrap admin not promoted"),
        }
    }

    let app = eaforge::app(state, &config.cors_origins);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(
        "EA Forge listening on {} ({} mode)",
        addr,
        if config.dev_mode { "dev" } else { "production" }
    );

    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eaforge=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let state = build_state(&config)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, state).await,
        Command::PromoteAdmin { email } => {
            let user = state.credentials.promote_admin(&email)?;
            println!("{} is now an admin", user.email);
            Ok(())
        }
    }
}
