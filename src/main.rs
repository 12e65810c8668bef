use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use epicrm::auth::{ensure_admin_user, Authenticator, SessionStore, TokenCodec};
use epicrm::cli::{run_command, Cli};
use epicrm::config::Config;
use epicrm::CrmError;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<CrmError>() {
            Some(crm) => {
                eprintln!("Error {}", crm);
                ExitCode::from(crm.code().exit_code() as u8)
            }
            None => {
                eprintln!("Error: {:#}", err);
                ExitCode::FAILURE
            }
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Load configuration
    let config = Config::load(&cli.config)?.with_overrides(
        cli.database_url.clone(),
        cli.jwt_secret.clone(),
        cli.log_level.clone(),
    );

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("Starting epicrm v{}", env!("CARGO_PKG_VERSION"));

    config.validate().context("Invalid configuration")?;
    let database_url = config.database_url().context("No database configured")?;
    let jwt_secret = config.jwt_secret().context("No signing secret configured")?;

    // Initialize database
    let db = epicrm::db::connect(database_url).await?;

    // Ensure bootstrap management user exists
    if let (Some(email), Some(password)) = (&config.auth.admin_email, &config.auth.admin_password) {
        ensure_admin_user(&db, email, password, &config.auth.admin_name).await?;
    }

    let auth = Authenticator::new(
        db.clone(),
        TokenCodec::new(jwt_secret),
        SessionStore::new(config.auth.session_file.clone()),
        config.token_ttl(),
    );

    run_command(&cli, &db, &auth).await?;
    Ok(())
}
