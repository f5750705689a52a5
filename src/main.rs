//! signer-relay CLI - drive the relay protocol from a terminal.
//!
//! Connects to the relay, runs one request (or listens for host events),
//! and reports the outcome. See the `signer_relay` library for the core.

use std::collections::HashMap;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use signer_relay::{Config, RelayClient, RelayError, WsTransport};

#[derive(Parser)]
#[command(name = "signer-relay")]
#[command(about = "Correlated request client for a signer relay", long_about = None)]
struct Cli {
    /// Relay WebSocket URL (overrides config and SIGNER_RELAY_URL)
    #[arg(long, global = true)]
    url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Join a session
    Join {
        /// Session id
        #[arg(long)]
        session: String,
        /// Session key
        #[arg(long)]
        key: String,
    },
    /// Set one metadata entry on a session
    SetMetadata {
        /// Session id
        #[arg(long)]
        session: String,
        /// Metadata key
        #[arg(long)]
        key: String,
        /// Metadata value
        #[arg(long)]
        value: String,
    },
    /// Configure a session's webhook
    SetConfig {
        /// Session id
        #[arg(long)]
        session: String,
        /// Webhook id
        #[arg(long)]
        webhook_id: String,
        /// Webhook URL
        #[arg(long)]
        webhook_url: String,
        /// Metadata entries as KEY=VALUE
        #[arg(long = "meta", value_parser = parse_key_value)]
        metadata: Vec<(String, String)>,
    },
    /// Publish an event to the host
    Publish {
        /// Session id
        #[arg(long)]
        session: String,
        /// Event name
        #[arg(long)]
        event: String,
        /// Event data as KEY=VALUE
        #[arg(long = "data", value_parser = parse_key_value)]
        data: Vec<(String, String)>,
    },
    /// Join a session and print host events until interrupted
    Listen {
        /// Session id
        #[arg(long)]
        session: String,
        /// Session key
        #[arg(long)]
        key: String,
    },
    /// Print the effective configuration
    Config,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))
}

fn init_logging() -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    builder.format_timestamp_secs();

    if let Ok(path) = std::env::var("SIGNER_RELAY_LOG_FILE") {
        let log_file = std::fs::File::create(&path)
            .with_context(|| format!("Failed to create log file at {path}"))?;
        builder.target(env_logger::Target::Pipe(Box::new(log_file)));
    }

    builder.init();
    Ok(())
}

fn report(outcome: Result<bool, RelayError>) -> Result<()> {
    match outcome {
        Ok(true) => {
            println!("ok");
            Ok(())
        }
        Ok(false) => {
            println!("rejected");
            Ok(())
        }
        Err(e) => Err(e).context("Request failed"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    let cli = Cli::parse();
    let mut config = Config::load()?;
    if let Some(url) = cli.url {
        config.relay_url = url;
    }

    if let Commands::Config = cli.command {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let transport = WsTransport::new(&config.relay_url, config.auth_headers());
    let client = RelayClient::builder(transport).config(&config).build();
    client
        .connect()
        .await
        .with_context(|| format!("Could not connect to {}", config.relay_url))?;

    let result = match cli.command {
        Commands::Join { session, key } => report(client.join_session(&session, &key).await),
        Commands::SetMetadata {
            session,
            key,
            value,
        } => report(client.set_metadata(&session, &key, &value).await),
        Commands::SetConfig {
            session,
            webhook_id,
            webhook_url,
            metadata,
        } => report(
            client
                .set_session_config(
                    &session,
                    &webhook_id,
                    &webhook_url,
                    metadata.into_iter().collect::<HashMap<_, _>>(),
                )
                .await,
        ),
        Commands::Publish {
            session,
            event,
            data,
        } => report(
            client
                .publish_event(&session, &event, data.into_iter().collect::<HashMap<_, _>>())
                .await,
        ),
        Commands::Listen { session, key } => listen(&client, &session, &key).await,
        Commands::Config => Ok(()),
    };

    if let Err(e) = client.disconnect().await {
        log::warn!("Disconnect failed: {}", e);
    }
    result
}

async fn listen(client: &RelayClient<WsTransport>, session: &str, key: &str) -> Result<()> {
    let mut events = client.subscribe_events();
    let mut states = client.connection_states();

    if !client.join_session(session, key).await? {
        anyhow::bail!("Relay rejected join for session {session}");
    }
    log::info!("Joined session {}, waiting for host events", session);

    loop {
        tokio::select! {
            Some(event) = events.recv() => {
                println!(
                    "{}",
                    serde_json::json!({
                        "sessionId": event.session_id,
                        "eventId": event.event_id,
                        "event": event.event_name,
                        "data": event.payload,
                    })
                );
            }
            changed = states.changed() => {
                if changed.is_err() || states.borrow_and_update().is_down() {
                    anyhow::bail!("Connection to relay lost");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted, leaving session {}", session);
                return Ok(());
            }
        }
    }
}
