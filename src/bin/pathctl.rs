//! pathctl binary
//!
//! Inspect and produce routing control messages, and run an in-process
//! loopback path to watch latency probing end to end.

use clap::{Parser, Subcommand};
use pathctl::{
    inbound_channel, outbound_channel, Config, InboundFrame, InboundTx, OutboundRx, PathId,
    PathLatency, PathRole, PathSession, RoutingMessage, Value,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, EnvFilter};

/// Routing control message tool
#[derive(Parser, Debug)]
#[command(name = "pathctl", version, about)]
struct Args {
    /// Path to configuration file (overrides default search paths)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a hex-encoded control message and print it
    Decode {
        /// Message bytes as hex
        hex: String,
    },
    /// Encode a latency probe and print it as hex
    Probe {
        /// Correlation token
        #[arg(long)]
        token: u64,
        /// Reported latency in ms (0 for an outbound probe)
        #[arg(long, default_value_t = 0)]
        latency: u64,
    },
    /// Print the effective configuration as YAML
    Config,
    /// Probe a two-hop in-process path and log round trips
    Loopback {
        /// Stop after this many completed probes
        #[arg(long, default_value_t = 5)]
        count: u64,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize logging
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(&args);

    match args.command {
        Command::Decode { hex } => decode(&hex),
        Command::Probe { token, latency } => {
            let msg: RoutingMessage = PathLatency {
                token,
                latency_ms: latency,
            }
            .into();
            println!("{}", hex::encode(msg.encode()));
        }
        Command::Config => match config.to_yaml() {
            Ok(yaml) => print!("{}", yaml),
            Err(e) => {
                error!("Failed to serialize configuration: {}", e);
                std::process::exit(1);
            }
        },
        Command::Loopback { count } => loopback(&config, count).await,
    }
}

fn load_config(args: &Args) -> Config {
    let (config, loaded_paths) = if let Some(config_path) = &args.config {
        // Explicit config file specified - load only that file
        match Config::load_file(config_path) {
            Ok(config) => (config, vec![config_path.clone()]),
            Err(e) => {
                error!("Failed to load configuration from {}: {}", config_path.display(), e);
                std::process::exit(1);
            }
        }
    } else {
        match Config::load() {
            Ok(result) => result,
            Err(e) => {
                error!("Failed to load configuration: {}", e);
                std::process::exit(1);
            }
        }
    };

    if loaded_paths.is_empty() {
        info!("No config files found, using defaults");
    } else {
        for path in &loaded_paths {
            info!(path = %path.display(), "Loaded config file");
        }
    }
    config
}

fn decode(input: &str) {
    let bytes = match hex::decode(input.trim()) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Invalid hex input: {}", e);
            std::process::exit(1);
        }
    };

    match RoutingMessage::decode(&bytes) {
        Ok(msg) => println!("{}", msg),
        Err(e) => {
            // Still useful to see the structure of a non-message value
            match Value::decode(&bytes) {
                Ok(value) => warn!(value = ?value, "Well-formed bencode but not a routing message"),
                Err(inner) => warn!(error = %inner, "Not canonical bencode"),
            }
            error!("Failed to decode message: {}", e);
            std::process::exit(1);
        }
    }
}

/// Forward every outbound message of one session into the other's inbox.
fn pump(mut rx: OutboundRx, tx: InboundTx) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if tx.send(InboundFrame::new(msg.path, msg.payload)).await.is_err() {
                break;
            }
        }
    })
}

async fn loopback(config: &Config, count: u64) {
    let node = &config.node;
    let path = PathId::random();

    let (a_out_tx, a_out_rx) = outbound_channel(node.buffers.outbound_channel());
    let (b_out_tx, b_out_rx) = outbound_channel(node.buffers.outbound_channel());
    let (a_in_tx, a_in_rx) = inbound_channel(node.buffers.inbound_channel());
    let (b_in_tx, b_in_rx) = inbound_channel(node.buffers.inbound_channel());

    let origin = Arc::new(PathSession::new(node.latency.clone(), a_out_tx));
    let terminus = Arc::new(PathSession::new(node.latency.clone(), b_out_tx));
    origin.add_path(path, PathRole::Originator);
    terminus.add_path(path, PathRole::Terminus);

    let pumps = [pump(a_out_rx, b_in_tx), pump(b_out_rx, a_in_tx)];
    let tasks = [
        tokio::spawn(Arc::clone(&origin).run(a_in_rx, config.tick_interval())),
        tokio::spawn(Arc::clone(&terminus).run(b_in_rx, config.tick_interval())),
    ];

    info!(
        node = config.node_name(),
        path = %path,
        probe_interval_ms = node.latency.probe_interval_ms(),
        "Loopback path running, press Ctrl+C to exit"
    );

    let mut poll = tokio::time::interval(Duration::from_millis(100));
    let mut completed = 0;
    while completed < count {
        tokio::select! {
            _ = poll.tick() => {
                let done = origin.completed_probes(&path).unwrap_or(completed);
                if done > completed {
                    completed = done;
                    if let Some(sample) = origin.last_sample(&path) {
                        info!(
                            completed = completed,
                            token = sample.token,
                            rtt_us = sample.rtt.as_micros() as u64,
                            reported_ms = sample.reported_ms,
                            srtt_us = origin.srtt(&path).map(|d| d.as_micros() as u64),
                            "Probe completed"
                        );
                    }
                }
            }
            result = tokio::signal::ctrl_c() => {
                match result {
                    Ok(()) => info!("Shutdown signal received"),
                    Err(e) => error!("Failed to listen for shutdown signal: {}", e),
                }
                break;
            }
        }
    }

    origin.remove_path(&path);
    terminus.remove_path(&path);
    for task in tasks.iter().chain(pumps.iter()) {
        task.abort();
    }
    info!(completed = completed, "Loopback finished");
}
