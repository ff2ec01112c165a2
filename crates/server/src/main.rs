use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crewstream_server::{build_router, startup};

/// Crew execution service with real-time event fan-out.
#[derive(Parser, Debug)]
#[command(name = "crewstream-server", version, about)]
struct Cli {
    /// Config profile; keys resolve as `{PROFILE}_{KEY}` before `{KEY}`.
    #[arg(long, env = "CREWSTREAM_PROFILE", default_value = "")]
    profile: String,

    /// Bind address, overriding HOST.
    #[arg(long)]
    host: Option<String>,

    /// Bind port, overriding PORT.
    #[arg(long)]
    port: Option<u16>,

    /// Seconds in-flight tasks get to finish on shutdown.
    #[arg(long, env = "SHUTDOWN_GRACE_SECS", default_value_t = 10)]
    shutdown_grace: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    crewstream_core::config::load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let mut config = crewstream_core::Config::for_profile(&cli.profile);
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    config.log_summary();

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = startup::build_app_state(config).await?;
    startup::start_background(&state);

    let app = build_router(state.clone());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);

    let signal_state = state.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            startup::shutdown_signal().await;
            // Open event streams would otherwise hold the server up.
            startup::close_connections(&signal_state);
        })
        .await?;

    startup::drain_queue(&state, Duration::from_secs(cli.shutdown_grace)).await;
    Ok(())
}
