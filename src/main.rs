use std::net::IpAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use ar_relay::protocol::constants::{
    DEFAULT_CONSUMER_PORT, DEFAULT_MAX_PAYLOAD_SIZE, DEFAULT_PRODUCER_PORT,
    DEFAULT_SEND_QUEUE_CAPACITY,
};
use ar_relay::{ProducerPolicy, RelayServer, ServerConfig};

#[derive(Parser)]
#[command(name = "ar-relay")]
#[command(about = "Relay AR capture frames from one device to many WebSocket viewers", long_about = None)]
#[command(version)]
struct Cli {
    /// Address both listeners bind to
    #[arg(long, env = "AR_RELAY_BIND", default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Port the capture device connects to
    #[arg(long, env = "AR_RELAY_PRODUCER_PORT", default_value_t = DEFAULT_PRODUCER_PORT)]
    producer_port: u16,

    /// Port viewers open WebSocket connections on
    #[arg(long, env = "AR_RELAY_CONSUMER_PORT", default_value_t = DEFAULT_CONSUMER_PORT)]
    consumer_port: u16,

    /// Largest payload a producer may send, in bytes
    #[arg(long, env = "AR_RELAY_MAX_PAYLOAD", default_value_t = DEFAULT_MAX_PAYLOAD_SIZE)]
    max_payload_size: usize,

    /// Frames queued per viewer before it is dropped
    #[arg(long, env = "AR_RELAY_SEND_QUEUE", default_value_t = DEFAULT_SEND_QUEUE_CAPACITY)]
    send_queue: usize,

    /// Maximum concurrent viewers (0 = unlimited)
    #[arg(long, env = "AR_RELAY_MAX_CONSUMERS", default_value_t = 0)]
    max_consumers: usize,

    /// What happens when a second capture device connects
    #[arg(long, env = "AR_RELAY_PRODUCER_POLICY", value_enum, default_value_t = PolicyArg::Replace)]
    producer_policy: PolicyArg,

    /// Concurrent producers allowed with `--producer-policy interleave`
    #[arg(long, env = "AR_RELAY_MAX_PRODUCERS", default_value_t = 2)]
    max_producers: usize,

    /// Seconds a viewer has to complete the WebSocket handshake
    #[arg(long, default_value_t = 10)]
    handshake_timeout: u64,

    /// Seconds of producer silence before disconnecting it (0 disables)
    #[arg(long, default_value_t = 0)]
    idle_timeout: u64,

    /// Seconds between stats log lines (0 disables)
    #[arg(long, default_value_t = 30)]
    stats_interval: u64,

    /// Parse each frame for trace logging
    #[arg(long)]
    inspect: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    Replace,
    Reject,
    Interleave,
}

impl Cli {
    fn server_config(&self) -> ServerConfig {
        let policy = match self.producer_policy {
            PolicyArg::Replace => ProducerPolicy::Replace,
            PolicyArg::Reject => ProducerPolicy::Reject,
            PolicyArg::Interleave => ProducerPolicy::Interleave {
                max: self.max_producers.max(1),
            },
        };

        ServerConfig::default()
            .bind(self.bind)
            .producer_port(self.producer_port)
            .consumer_port(self.consumer_port)
            .max_payload_size(self.max_payload_size)
            .send_queue_capacity(self.send_queue)
            .max_consumers(self.max_consumers)
            .producer_policy(policy)
            .handshake_timeout(Duration::from_secs(self.handshake_timeout))
            .idle_timeout(Duration::from_secs(self.idle_timeout))
            .stats_interval(Duration::from_secs(self.stats_interval))
            .inspect_frames(self.inspect)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ar_relay=info")),
        )
        .init();

    let config = cli.server_config();
    let server = RelayServer::bind(config.clone())
        .await
        .with_context(|| {
            format!(
                "failed to bind producer port {} / consumer port {}",
                config.producer_addr(),
                config.consumer_addr()
            )
        })?;

    server.run_until(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
