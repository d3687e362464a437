//! Tandem server binary.
//!
//! Serves the reference five-dice game.
//!
//! # Usage
//!
//! ```bash
//! # Invitation-only matchmaking (default)
//! tandem-server --bind 0.0.0.0:8080
//!
//! # Pair clients automatically and abort sessions idle for two minutes
//! tandem-server --pairing auto-pair --turn-timeout-secs 120
//! ```

use std::time::Duration;

use clap::{Parser, ValueEnum};
use tandem_core::DiceRules;
use tandem_server::{DriverConfig, PairingPolicy, Server, ServerRuntimeConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Session formation policy
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Pairing {
    /// Sessions form only through invitations
    Invitation,
    /// Pair each newcomer with the earliest waiting participant
    AutoPair,
}

impl From<Pairing> for PairingPolicy {
    fn from(pairing: Pairing) -> Self {
        match pairing {
            Pairing::Invitation => Self::Invitation,
            Pairing::AutoPair => Self::AutoPair,
        }
    }
}

/// Tandem session coordinator
#[derive(Parser, Debug)]
#[command(name = "tandem-server")]
#[command(about = "Two-player turn-based session coordinator")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    bind: String,

    /// Maximum concurrent connections
    #[arg(long, default_value = "10000")]
    max_connections: usize,

    /// Maximum display name length in characters
    #[arg(long, default_value = "32")]
    max_name_len: usize,

    /// Maximum inbound message size in bytes
    #[arg(long, default_value = "16384")]
    max_message_bytes: usize,

    /// How sessions are formed
    #[arg(long, value_enum, default_value = "invitation")]
    pairing: Pairing,

    /// Abort sessions with no activity for this many seconds (disabled when
    /// omitted)
    #[arg(long)]
    turn_timeout_secs: Option<u64>,

    /// Interval between timeout checks in milliseconds
    #[arg(long, default_value = "1000")]
    tick_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Tandem server starting");
    tracing::info!("Binding to {}", args.bind);

    match args.turn_timeout_secs {
        Some(secs) => tracing::info!("Idle sessions abort after {}s", secs),
        None => tracing::info!("Turn timeout disabled"),
    }

    let config = ServerRuntimeConfig {
        bind_address: args.bind,
        tick_interval: Duration::from_millis(args.tick_ms),
        driver: DriverConfig {
            max_connections: args.max_connections,
            max_display_name_len: args.max_name_len,
            max_message_bytes: args.max_message_bytes,
            pairing: args.pairing.into(),
            turn_timeout: args.turn_timeout_secs.map(Duration::from_secs),
        },
    };

    let server = Server::bind(config, DiceRules::standard()).await?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}
