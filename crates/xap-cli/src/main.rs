//! xAP CLI - Command-line tools for xAP networks
//!
//! Monitor traffic, run BSC devices from a config file, and send queries
//! and commands from the command line.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use xap_core::{Address, BlockId, BlockState, BscCommand, BscQuery, Message, Uid, XAP_PORT};
use xap_device::BaseDevice;
use xap_transport::{ServerHandle, XapServer, XapServerConfig};

mod device;

/// xAP - home automation protocol tools
#[derive(Parser)]
#[command(name = "xap")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Local address to bind
    #[arg(short, long, global = true, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// UDP port
    #[arg(short = 'P', long, global = true, default_value_t = XAP_PORT)]
    port: u16,

    /// Broadcast address for outgoing messages
    #[arg(long, global = true, default_value = "255.255.255.255")]
    broadcast: IpAddr,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every message whose source matches a pattern
    Monitor {
        /// Address pattern
        #[arg(default_value = "*.*.>")]
        pattern: String,
    },

    /// Run a BSC device described by a TOML file
    Device {
        /// Device configuration file
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Send a BSC query and print the answers
    Query {
        /// Target address (wildcards allowed)
        target: String,

        /// Source address of the query
        #[arg(short, long, default_value = "xap-rs.cli.console")]
        source: String,

        /// Seconds to wait for answers
        #[arg(short, long, default_value = "2")]
        wait: u64,
    },

    /// Send a BSC command and print the answers
    Cmd {
        /// Target address (wildcards allowed)
        target: String,

        /// on, off or toggle
        #[arg(long)]
        state: Option<String>,

        /// n/d, n% or n
        #[arg(long)]
        level: Option<String>,

        #[arg(long)]
        text: Option<String>,

        #[arg(long)]
        display_text: Option<String>,

        /// Endpoint sub-uid (two hex digits) or *
        #[arg(long)]
        id: Option<String>,

        /// Source address of the command
        #[arg(short, long, default_value = "xap-rs.cli.console")]
        source: String,

        /// Seconds to wait for answers
        #[arg(short, long, default_value = "2")]
        wait: u64,
    },

    /// Broadcast heartbeats for an address
    Heartbeat {
        /// Device address
        address: String,

        /// Seconds between heartbeats
        #[arg(short, long, default_value = "60")]
        interval: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(&cli.log_level, cli.json_logs)?;

    // Handle Ctrl+C
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            let _ = shutdown_tx.send(()).await;
        }
    });

    let config = XapServerConfig {
        bind_addr: SocketAddr::new(cli.bind, cli.port),
        broadcast_addr: SocketAddr::new(cli.broadcast, cli.port),
        ..Default::default()
    };
    let server = XapServer::new(config)
        .start()
        .await
        .context("Failed to start xAP server")?;

    let result = match cli.command {
        Commands::Monitor { pattern } => {
            println!(
                "{} Monitoring {} on {}",
                "xAP".cyan().bold(),
                pattern.yellow(),
                server.local_addr()
            );
            monitor(&server, &pattern, &mut shutdown_rx).await
        }

        Commands::Device { config } => {
            device::run_device(&server, &config, &mut shutdown_rx).await
        }

        Commands::Query {
            target,
            source,
            wait,
        } => {
            let target = parse_address(&target)?;
            let query = BscQuery::new(parse_address(&source)?, Uid::random().as_str(), target.clone());
            println!("{} Querying {}", "xAP".cyan().bold(), target.to_string().yellow());
            send_and_collect(&server, query, &target, wait, &mut shutdown_rx).await
        }

        Commands::Cmd {
            target,
            state,
            level,
            text,
            display_text,
            id,
            source,
            wait,
        } => {
            let target = parse_address(&target)?;
            let mut command =
                BscCommand::new(parse_address(&source)?, Uid::random().as_str(), target.clone());
            let block = command.block_mut(0);
            if let Some(state) = state {
                block.state = Some(
                    BlockState::parse(&state)
                        .ok_or_else(|| anyhow!("State must be on, off or toggle, not {}", state))?,
                );
            }
            if let Some(level) = level {
                block.level = Some(level.parse()?);
            }
            if let Some(text) = text {
                block.set_text(text)?;
            }
            if let Some(display_text) = display_text {
                block.set_display_text(display_text)?;
            }
            block.id = Some(match id {
                Some(id) => id.to_ascii_uppercase().parse()?,
                None => BlockId::All,
            });

            println!(
                "{} Sending command to {}",
                "xAP".cyan().bold(),
                target.to_string().yellow()
            );
            send_and_collect(&server, command, &target, wait, &mut shutdown_rx).await
        }

        Commands::Heartbeat { address, interval } => {
            let address = parse_address(&address)?;
            let device = BaseDevice::new(address.clone(), Uid::random(), interval)?;
            server.add_device(device).await?;
            println!(
                "{} Heartbeat for {} every {}s",
                "xAP".cyan().bold(),
                address.to_string().yellow(),
                interval
            );
            shutdown_rx.recv().await;
            Ok(())
        }
    };

    server.shutdown().await?;
    result
}

fn setup_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Failed to parse log level")?;

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).compact())
            .init();
    }

    Ok(())
}

fn parse_address(s: &str) -> Result<Address> {
    Address::parse(s).with_context(|| format!("Invalid xAP address {:?}", s))
}

async fn monitor(
    server: &ServerHandle,
    pattern: &str,
    shutdown_rx: &mut mpsc::Receiver<()>,
) -> Result<()> {
    let mut messages = server.add_receiver(parse_address(pattern)?).await?;

    loop {
        tokio::select! {
            message = messages.recv() => match message {
                Some(message) => print_message(&message),
                None => break,
            },
            _ = shutdown_rx.recv() => break,
        }
    }

    Ok(())
}

/// Broadcast one message, then print answers from the target until `wait`
/// seconds pass
async fn send_and_collect(
    server: &ServerHandle,
    message: impl Into<Message>,
    target: &Address,
    wait: u64,
    shutdown_rx: &mut mpsc::Receiver<()>,
) -> Result<()> {
    let mut answers = server.add_receiver(target.clone()).await?;
    server.send(message)?;

    let deadline = tokio::time::sleep(Duration::from_secs(wait));
    tokio::pin!(deadline);
    let mut count = 0;

    loop {
        tokio::select! {
            answer = answers.recv() => match answer {
                Some(message @ (Message::BscInfo(_) | Message::BscEvent(_))) => {
                    count += 1;
                    print_message(&message);
                }
                Some(_) => {}
                None => break,
            },
            _ = &mut deadline => break,
            _ = shutdown_rx.recv() => break,
        }
    }

    println!("{} {} answer(s)", "OK".green().bold(), count);
    Ok(())
}

fn print_message(message: &Message) {
    let kind = match message {
        Message::Heartbeat(_) => message.kind().blue(),
        Message::BscEvent(_) => message.kind().green(),
        Message::BscCommand(_) => message.kind().magenta(),
        Message::Unsupported(_) => message.kind().dimmed(),
        _ => message.kind().cyan(),
    };
    let target = message
        .target()
        .map(|t| format!(" -> {}", t.to_string().yellow()))
        .unwrap_or_default();
    println!("{} {}{}", kind, message.source(), target);

    for line in message.encode().lines() {
        println!("    {}", line.dimmed());
    }
}
