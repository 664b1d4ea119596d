use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use farmgate::{
    AccountContext, Client, ConfigError, ConnectError, DisconnectReason, EventName, GatewayConfig, Platform, PushEvent, Reporter,
    WsConnector,
};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// How often the account manager gets a liveness report.
const REPORT_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
enum MainError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("login failed: {0}")]
    Connect(#[from] ConnectError),
    #[error("session ended: {0}")]
    Disconnected(DisconnectReason),
}

/// Exit status for a finished session: `None` means the owner asked to stop.
fn session_outcome(ended: Option<DisconnectReason>) -> Result<(), MainError> {
    ended.map_or(Ok(()), |reason| Err(MainError::Disconnected(reason)))
}

#[derive(Parser, Debug)]
#[command(name = "farmgate", about = "Run one farm account session against the game gateway")]
struct Cli {
    /// Login code captured from the official client.
    #[arg(long, env = "FARM_CODE")]
    code: String,

    #[arg(long, env = "FARM_ACCOUNT_ID", default_value = "single_account")]
    account_id: String,

    /// `qq` or `wx`.
    #[arg(long, env = "FARM_PLATFORM", default_value = "qq")]
    platform: String,

    /// Account manager base URL; reports are skipped when unset.
    #[arg(long, env = "FARM_MANAGER_URL")]
    manager_url: Option<String>,

    /// Overrides `FARM_GATEWAY_URL`.
    #[arg(long)]
    gateway_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), MainError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let platform = Platform::parse(&cli.platform)?;
    let mut config = GatewayConfig::from_env()?;
    if let Some(url) = cli.gateway_url {
        config.server_url = url;
    }

    let reporter = Reporter::new(cli.manager_url, cli.account_id.clone());
    if reporter.is_enabled() {
        reporter.register().await;
    }

    let connector = Arc::new(WsConnector::new(&config));
    let client = Client::new(AccountContext::new(cli.account_id, platform), config, connector);

    let (lost_tx, mut lost_rx) = mpsc::unbounded_channel();
    client.on_disconnect(move |reason| {
        let _ = lost_tx.send(reason.clone());
    });
    let (basic_tx, mut basic_rx) = mpsc::unbounded_channel();
    client.on(
        EventName::Basic,
        Arc::new(move |_event: &PushEvent| {
            let _ = basic_tx.send(());
        }),
    );

    let state = match client.connect(&cli.code).await {
        Ok(state) => state,
        Err(e) => {
            error!(error = %e, "login failed");
            reporter.log("error", &e.to_string()).await;
            reporter.online(false).await;
            return Err(e.into());
        }
    };
    info!(gid = state.gid, name = %state.name, level = state.level, gold = state.gold, exp = state.exp, "farmgate online");
    reporter.online(true).await;
    reporter.status(&state).await;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut ticker = tokio::time::interval(REPORT_INTERVAL);
    let ended = loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutting down");
                client.disconnect().await;
                break None;
            }
            Some(reason) = lost_rx.recv() => {
                warn!(reason = %reason, "session ended");
                reporter.log("warn", &reason.to_string()).await;
                break Some(reason);
            }
            Some(()) = basic_rx.recv() => reporter.status(&client.session()).await,
            _ = ticker.tick() => reporter.heartbeat().await,
        }
    };

    reporter.online(false).await;
    session_outcome(ended)
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
