use clap::Parser;
use mooon::application::config::{Config, ConfigLoader};
use mooon::application::config::validator::validate_config;
use mooon::application::server::HeaderServer;
use mooon::common::logger;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;
use tracing::{error, info};

/// Parses HTTP request heads on an epoll reactor and echoes what it found.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides server.listen
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Overrides log.level
    #[arg(long)]
    log_level: Option<String>,
}

fn load(args: &Args) -> mooon::Result<Config> {
    let mut config = match &args.config {
        Some(path) => ConfigLoader::load(path)?,
        None => Config::default(),
    };
    if let Some(listen) = args.listen {
        config.server.listen = listen;
    }
    if let Some(level) = &args.log_level {
        config.log.level = level.clone();
    }
    validate_config(&config)?;
    Ok(config)
}

fn main() {
    let args = Args::parse();

    let config = match load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            process::exit(1);
        }
    };
    logger::init(&config.log.level);

    let mut server = match HeaderServer::bind(&config) {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "failed to start");
            process::exit(1);
        }
    };
    info!(addr = %server.local_addr(), "mooon-headerd started");

    if let Err(e) = server.run() {
        error!(error = %e, "server error");
        process::exit(1);
    }
}
