//! Cascadia TCP ingest server, console host.
//!
//! Starts one server, prints every received chunk to stdout as ASCII, and
//! runs until Ctrl+C.
//!
//! # Usage
//!
//! ```text
//! cascadia-console [OPTIONS]
//!
//! Options:
//!   -c, --config <PATH>            TOML config file [default: cascadia.toml]
//!       --bind <ADDR>              Bind address (0.0.0.0, ::, localhost, or a local IP)
//!       --port <PORT>              Listen port
//!       --allow <ADDR,...>         Allowed remote addresses ("*" for everyone)
//!       --max-connections <N>      Concurrent client limit
//!       --echo <BOOL>              Echo received bytes back
//!       --keep-alive <BOOL>        TCP keep-alive on accepted sockets
//!       --log-level <LEVEL>        Log level when RUST_LOG is unset
//!       --print-default-config     Print the default config and exit
//! ```
//!
//! Every option except `--print-default-config` also reads a `CASCADIA_*`
//! environment variable; flags win over the environment, which wins over the
//! file.

use std::path::PathBuf;

use anyhow::Context;
use cascadia_console::config::render_default_config;
use cascadia_console::{ascii_lossy, load_config, ConfigOverrides};
use cascadia_net::TcpServer;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(
    name = "cascadia-console",
    about = "Connection-limited TCP ingest server",
    version
)]
struct Cli {
    /// Path of the TOML configuration file.  A missing file means defaults.
    #[arg(short, long, default_value = "cascadia.toml", env = "CASCADIA_CONFIG")]
    config: PathBuf,

    #[arg(long, env = "CASCADIA_BIND")]
    bind: Option<String>,

    #[arg(long, env = "CASCADIA_PORT")]
    port: Option<u16>,

    /// Comma-separated list of allowed remote addresses.
    #[arg(long, value_delimiter = ',', env = "CASCADIA_ALLOW")]
    allow: Vec<String>,

    #[arg(long, env = "CASCADIA_MAX_CONNECTIONS")]
    max_connections: Option<usize>,

    #[arg(long, env = "CASCADIA_ECHO")]
    echo: Option<bool>,

    #[arg(long, env = "CASCADIA_KEEP_ALIVE")]
    keep_alive: Option<bool>,

    #[arg(long, env = "CASCADIA_LOG_LEVEL")]
    log_level: Option<String>,

    #[arg(long)]
    print_default_config: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            log_level: self.log_level.clone(),
            bind_address: self.bind.clone(),
            port: self.port,
            allowed_remote_addresses: self.allow.clone(),
            max_connections: self.max_connections,
            echo: self.echo,
            keep_alive: self.keep_alive,
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.print_default_config {
        print!("{}", render_default_config()?);
        return Ok(());
    }

    let mut config = load_config(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;
    config.apply(cli.overrides());

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    let options = config
        .server_options()
        .context("invalid server configuration")?;
    let port = options.local_endpoint.port();
    info!(endpoint = %options.local_endpoint, limit = options.max_connections, "starting server");

    let server = TcpServer::new(options);
    let mut bytes = server.subscribe_bytes();
    tokio::spawn(async move {
        while let Some(chunk) = bytes.recv().await {
            println!("{}", ascii_lossy(&chunk));
        }
    });

    server.start();
    println!("Listening on TCP {port}");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;

    println!("Stopping");
    server.stop();
    server.stopped().await;
    server.dispose();

    info!("server stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
