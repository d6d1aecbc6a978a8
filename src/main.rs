use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use isenguard::cleanup::spawn_block_list_cleanup;
use isenguard::config::IsenguardConfig;
use isenguard::events::{AuditLog, EventRecorder, IpBlockedEvent, RateLimitTriggeredEvent};
use isenguard::limiter::build_limiter;
use isenguard::realm::RealmLimitCache;
use isenguard::service::Isenguard;

/// Rate limiting and IP block-list service.
#[derive(Parser)]
#[command(name = "isenguard", version, about)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "isenguard.yml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the service and keep the block list tidy until shut down
    Run,
    /// Add an IP address to the block list
    Block {
        /// The address to block
        ip: String,
    },
    /// Remove an IP address from the block list
    Unblock {
        /// The address to unblock
        ip: String,
    },
    /// List the currently blocked IP addresses
    Blocked,
    /// Show the current usage of a scope within a realm
    Info {
        /// The scope to inspect, e.g. an IP address
        scope: String,
        /// The realm whose limit applies
        realm: String,
    },
}

/// Audit log that forwards negative entries to the process log.
struct LogAuditLog;

impl AuditLog for LogAuditLog {
    fn negative(&self, message: &str) {
        warn!(audit = message, "Negative audit entry");
    }
}

/// Event recorder that emits events as JSON log lines.
struct LogEventRecorder;

impl EventRecorder for LogEventRecorder {
    fn record_rate_limit_triggered(&self, event: RateLimitTriggeredEvent) {
        match serde_json::to_string(&event) {
            Ok(payload) => info!(event = %payload, "Rate limit triggered"),
            Err(error) => warn!(error = %error, "Failed to serialize rate limit event"),
        }
    }

    fn record_ip_blocked(&self, event: IpBlockedEvent) {
        match serde_json::to_string(&event) {
            Ok(payload) => info!(event = %payload, "IP blocked"),
            Err(error) => warn!(error = %error, "Failed to serialize IP block event"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let config = IsenguardConfig::from_file(&cli.config)?;
    let limiter = build_limiter(&config).await?;
    let service = Isenguard::new(Arc::clone(&limiter), RealmLimitCache::new(config.realms))
        .with_audit_log(Arc::new(LogAuditLog))
        .with_event_recorder(Arc::new(LogEventRecorder));

    match cli.command {
        Command::Run => {
            info!("Starting Isenguard");
            info!("Version: {}", env!("CARGO_PKG_VERSION"));

            let cleanup = spawn_block_list_cleanup(limiter);

            shutdown_signal().await;
            cleanup.abort();

            info!("Isenguard stopped");
        }
        Command::Block { ip } => {
            service.block_ip(&ip).await?;
            println!("Blocked {}", ip);
        }
        Command::Unblock { ip } => {
            service.unblock_ip(&ip).await?;
            println!("Unblocked {}", ip);
        }
        Command::Blocked => {
            let mut ips: Vec<String> = service.blocked_ips().await?.into_iter().collect();
            ips.sort();
            if ips.is_empty() {
                println!("No blocked IPs");
            }
            for ip in ips {
                println!("{}", ip);
            }
        }
        Command::Info { scope, realm } => match service.rate_limit_info(&scope, &realm, None).await? {
            Some(info) => println!("{}", info),
            None => println!("Realm '{}' is not limited", realm),
        },
    }

    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
