use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use mastodon_e2e::{ChromeDriver, Config, DriverTrait, LoginPage, ResilientSession};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mastodon-e2e", version, about = "Resilient Mastodon browser checks")]
struct Cli {
    /// JSON configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open the instance and report the page title
    Smoke,
    /// Sign in with the configured credentials and verify the home timeline
    Login,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    if cli.headed {
        config.browser.headless = false;
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling in-flight waits");
            on_interrupt.cancel();
        }
    });

    let driver = Arc::new(ChromeDriver::launch(&config.browser).await?);
    let session = ResilientSession::new(driver, config)?.with_cancellation(cancel);
    info!(session_id = session.session_id(), "Session started");

    match cli.command {
        Command::Smoke => smoke(&session).await,
        Command::Login => login(&session).await,
    }
}

async fn smoke(session: &ResilientSession<ChromeDriver>) -> anyhow::Result<()> {
    session.open("/").await?;
    if let Err(e) = session.wait_for_page_load().await {
        session.log_failure("Smoke page load", &e).await;
        return Err(e.into());
    }
    let title = session.driver().title().await.unwrap_or_default();
    info!(%title, "Instance reachable");
    Ok(())
}

async fn login(session: &ResilientSession<ChromeDriver>) -> anyhow::Result<()> {
    let mastodon = &session.config().mastodon;
    let (Some(email), Some(password)) = (mastodon.email.clone(), mastodon.password.clone()) else {
        bail!("login needs MASTODON_EMAIL and MASTODON_PASSWORD");
    };

    let page = LoginPage::new(session);
    page.open().await?;
    let home = page.login(&email, &password).await?;

    if !session.wait_for_login_complete(Duration::from_secs(15)).await? {
        let message = page.error_message().await;
        error!(%message, "Login did not reach the home timeline");
        bail!("login failed: {}", message);
    }
    if !session.wait_for_timeline_load(Duration::from_secs(15)).await? {
        bail!("home timeline did not load");
    }

    info!(display_name = %home.display_name().await, "Logged in");
    Ok(())
}
