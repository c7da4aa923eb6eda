mod commands;
mod config;
mod terminal;

use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::Parser;
use client_core::{
    EngineCommand, EngineHandle, EngineOptions, ServerConfig, ServerEngine, ServerRegistry,
};
use commands::{Action, Focus};
use terminal::TerminalSurfaces;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const COMMAND_QUEUE: usize = 64;

#[derive(Parser, Debug)]
#[command(about = "Terminal chat client")]
struct Args {
    /// TOML file with `[options]` and `[servers.<name>]` tables.
    #[arg(long, default_value = "chat.toml")]
    config: PathBuf,
    /// Server to focus first; defaults to the first configured one.
    #[arg(long)]
    server: Option<String>,
    /// Tracing filter, overriding RUST_LOG.
    #[arg(long)]
    log_filter: Option<String>,
    /// Connect every configured server, not just the autoconnect ones.
    #[arg(long)]
    connect: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let filter = match &args.log_filter {
        Some(filter) => EnvFilter::try_new(filter).context("invalid --log-filter")?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let settings = config::load_settings(&args.config)?;
    let options = Arc::new(settings.options.clone());

    let mut registry: ServerRegistry<EngineHandle> = ServerRegistry::new();
    let mut autoconnect = Vec::new();
    for server in settings.servers {
        if server.autoconnect || args.connect {
            autoconnect.push(server.name.clone());
        }
        registry.insert(spawn_server(server, &options)?)?;
    }

    let mut focus = match args.server {
        Some(name) if registry.contains(&name) => Focus::new(name),
        Some(name) => bail!("server {name} is not configured"),
        None => match registry.names().next() {
            Some(name) => Focus::new(name),
            None => bail!("no servers configured"),
        },
    };
    info!(target: "chat::network", "cli: started servers={}", registry.len());

    for name in &autoconnect {
        forward(&registry, name, EngineCommand::Connect).await;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        match commands::parse(&line, &focus) {
            Ok(Action::Engine { server, command }) => forward(&registry, &server, command).await,
            Ok(Action::Reconnect { server }) => {
                forward(&registry, &server, EngineCommand::Disconnect).await;
                forward(&registry, &server, EngineCommand::Connect).await;
            }
            Ok(Action::FocusServer(name)) if registry.contains(&name) => {
                focus = Focus::new(name);
            }
            Ok(Action::FocusServer(name)) => println!("unknown server {name}"),
            Ok(Action::AddServer {
                name,
                address,
                port,
            }) => {
                if registry.contains(&name) {
                    println!("server {name} already exists");
                    continue;
                }
                let added = spawn_server(ServerConfig::new(&name, address, port), &options)
                    .and_then(|handle| Ok(registry.insert(handle)?));
                match added {
                    Ok(()) => println!("added server {name}"),
                    Err(err) => println!("cannot add server {name}: {err:#}"),
                }
            }
            Ok(Action::DeleteServer(name)) => match registry.remove(&name) {
                Ok(handle) => {
                    if let Err(err) = handle.shutdown().await {
                        warn!(target: "chat::network", "cli: engine task failed server={name} error={err}");
                    }
                    if focus.server == name {
                        if let Some(next) = registry.names().next() {
                            focus = Focus::new(next);
                        }
                    }
                    println!("deleted server {name}");
                }
                Err(err) => println!("{err}"),
            },
            Ok(Action::FocusRoom(room)) => focus.room = Some(room),
            Ok(Action::ListServers) => {
                for handle in registry.iter() {
                    let marker = if handle.name() == focus.server { "*" } else { " " };
                    println!("{marker} {} {:?}", handle.name(), handle.state());
                }
            }
            Ok(Action::Help) => println!("{}", commands::HELP),
            Ok(Action::Quit) => break,
            Ok(Action::Nothing) => {}
            Err(err) => println!("{err}"),
        }
    }

    for handle in registry.into_entries() {
        let name = handle.name().to_string();
        if let Err(err) = handle.shutdown().await {
            warn!(target: "chat::network", "cli: engine task failed server={name} error={err}");
        }
    }
    Ok(())
}

fn spawn_server(config: ServerConfig, options: &Arc<EngineOptions>) -> Result<EngineHandle> {
    let engine =
        ServerEngine::with_tls(config, options.clone()).context("failed to set up TLS client")?;
    Ok(EngineHandle::spawn(
        engine,
        TerminalSurfaces::stdout(),
        COMMAND_QUEUE,
    ))
}

async fn forward(registry: &ServerRegistry<EngineHandle>, server: &str, command: EngineCommand) {
    match registry.get(server) {
        Ok(handle) => {
            if handle.send(command).await.is_err() {
                warn!(target: "chat::network", "cli: engine stopped server={server}");
            }
        }
        Err(err) => println!("{err}"),
    }
}
