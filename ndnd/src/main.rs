use std::process;

use clap::{Arg, Command};
use log::{error, info};
use tokio::signal;

mod config;
mod daemon;
mod service;

use config::Config;
use daemon::Daemon;

#[tokio::main]
async fn main() {
    env_logger::init();

    let matches = Command::new("ndnd")
        .version("0.1.0")
        .about("ndnd - NDN forwarding daemon")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("/etc/ndnd/ndnd.conf"),
        )
        .arg(
            Arg::new("workers")
                .short('w')
                .long("workers")
                .value_name("N")
                .help("Override the number of forwarding workers")
                .value_parser(clap::value_parser!(usize)),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").unwrap();

    info!("Starting ndnd");
    info!("Config file: {}", config_path);

    let mut config = match Config::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    if let Some(workers) = matches.get_one::<usize>("workers") {
        config.forwarding.workers = *workers;
    }

    let mut daemon = Daemon::new(config);

    if let Err(e) = daemon.start().await {
        error!("Failed to start daemon: {}", e);
        process::exit(1);
    }

    info!("ndnd started successfully");

    signal::ctrl_c().await.expect("Failed to listen for ctrl+c");

    info!("Shutting down ndnd");
    daemon.stop().await;
}
