//! CLI for PollPack
//!
//! Subcommands:
//! - `cycle`: run one request/response cycle against the configured store
//! - `commit`: queue an outbound payload for a scope

use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use pollpack::config::load_config;
use pollpack::{CycleDriver, Qos, Session, SledStore};
use serde::Serialize;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "pollpack")]
enum Command {
    /// Process one inbound body and write the outbound body
    Cycle {
        /// Scope (session namespace) the body belongs to
        #[arg(long)]
        scope: String,
        /// Inbound body file; stdin when omitted
        #[arg(long)]
        input: Option<PathBuf>,
        /// Outbound body file; stdout when omitted
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Queue a payload for delivery to the peer of a scope
    Commit {
        #[arg(long)]
        scope: String,
        /// Delivery guarantee: 0, 1 or 2
        #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=2))]
        qos: u8,
        payload: String,
    },
}

#[derive(Serialize)]
struct Delivery<'a> {
    scope: &'a str,
    payload: String,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cmd = Command::parse();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            pollpack::utils::logging::init("info");
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    pollpack::utils::logging::init(&config.log.level);

    let store = match SledStore::open(&config.store.path, &config.store.namespace) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Failed to open store at {}: {}", config.store.path, e);
            std::process::exit(1);
        }
    };
    let session = Session::new(store.clone(), print_delivery).with_settings(config.session);
    let driver = CycleDriver::new(session);

    let result = match cmd {
        Command::Cycle {
            scope,
            input,
            output,
        } => run_cycle(&driver, &scope, input, output).await,
        Command::Commit {
            scope,
            qos,
            payload,
        } => run_commit(&driver, &scope, qos, payload).await,
    };

    if let Err(e) = result.and(store.flush().await.map_err(Into::into)) {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }
}

fn print_delivery(scope: &str, payload: &[u8]) {
    let delivery = Delivery {
        scope,
        payload: String::from_utf8_lossy(payload).into_owned(),
    };
    match serde_json::to_string(&delivery) {
        Ok(line) => eprintln!("{line}"),
        Err(e) => error!("Failed to serialize delivery: {}", e),
    }
}

async fn run_cycle(
    driver: &CycleDriver<SledStore>,
    scope: &str,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
) -> pollpack::Result<()> {
    let inbound = match input {
        Some(path) => tokio::fs::read(path).await?,
        None => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf)?;
            buf
        }
    };

    let outbound = driver.process_cycle(scope, &inbound).await?;
    info!(
        scope,
        inbound = inbound.len(),
        outbound = outbound.len(),
        "cycle complete"
    );

    match output {
        Some(path) => tokio::fs::write(path, &outbound).await?,
        None => {
            let mut stdout = std::io::stdout();
            stdout.write_all(&outbound)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

async fn run_commit(
    driver: &CycleDriver<SledStore>,
    scope: &str,
    qos: u8,
    payload: String,
) -> pollpack::Result<()> {
    let qos = Qos::try_from(qos)?;
    let identifier = driver.commit(scope, payload, qos).await?;
    println!("{identifier}");
    Ok(())
}
