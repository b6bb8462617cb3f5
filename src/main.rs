use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use throttler::config::ThrottlerConfig;
use throttler::ratelimit::FixedWindowProvider;
use throttler::{Admission, Throttler};

/// Admission control for namespaces read from stdin, one per line.
#[derive(Parser, Debug)]
#[command(name = "throttler", version, about)]
struct Args {
    /// YAML configuration file (THROTTLER__* environment variables override it)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Wait for capacity instead of denying immediately
    #[arg(long)]
    sleep: bool,

    /// Units consumed per admitted line
    #[arg(short, long, default_value_t = 1)]
    increment: u64,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

/// One line of output per namespace checked.
#[derive(Debug, Serialize)]
struct Decision<'a> {
    namespace: &'a str,
    outcome: &'static str,
    usage: u64,
    limit: u64,
    remaining: u64,
    estimate_ms: u64,
    reset_ms: u64,
}

#[derive(Debug, Serialize)]
struct Failure<'a> {
    namespace: &'a str,
    error: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs);

    info!("Starting throttler");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = ThrottlerConfig::load(args.config.as_deref())?;
    let throttler = config.build_throttler()?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = &mut shutdown => break,
        };
        let Some(line) = line else { break };

        let namespace = line.trim();
        if namespace.is_empty() {
            continue;
        }

        match evaluate(&throttler, namespace, &args).await {
            Ok(decision) => {
                println!("{}", serde_json::to_string(&decision)?);
                if decision.outcome == "cancelled" {
                    break;
                }
            }
            Err(e) => {
                warn!(namespace, error = %e, "Throttle check failed");
                let failure = Failure {
                    namespace,
                    error: e.to_string(),
                };
                println!("{}", serde_json::to_string(&failure)?);
            }
        }
    }

    info!("Throttler stopped");
    Ok(())
}

fn init_tracing(json: bool) {
    // stdout carries decisions; logs go to stderr.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn evaluate<'a>(
    throttler: &Throttler<FixedWindowProvider>,
    namespace: &'a str,
    args: &Args,
) -> throttler::Result<Decision<'a>> {
    let admission = if args.sleep {
        throttler
            .throttle_with_shutdown(namespace, args.increment, shutdown_signal())
            .await?
    } else if throttler.throttle(namespace, false, args.increment).await? {
        Admission::Denied
    } else {
        Admission::Admitted
    };

    let outcome = match admission {
        Admission::Admitted => "admitted",
        Admission::Denied => "denied",
        Admission::Cancelled => "cancelled",
    };

    Ok(Decision {
        namespace,
        outcome,
        usage: throttler.get_usage(namespace).await?,
        limit: throttler.get_limit(namespace)?,
        remaining: throttler.get_remaining(namespace).await?,
        estimate_ms: throttler.get_estimate(namespace).await?,
        reset_ms: throttler.get_reset(namespace).await?,
    })
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down");
        }
    }
}
