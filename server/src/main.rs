use clap::Parser;
use log::{error, info};
use server::config::ServerConfig;
use server::network::Server;
use shared::{Catalog, DEFAULT_PORT};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Authoritative survival game server")]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Server port to listen on
    #[clap(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Maximum number of concurrent clients
    #[clap(short, long, default_value = "64")]
    max_clients: usize,

    /// JSON file replacing the built-in item and recipe catalog
    #[clap(long)]
    catalog: Option<PathBuf>,

    /// Seed for the resource node layout
    #[clap(long, default_value = "12345")]
    world_seed: u64,

    /// Seconds a destroyed resource node stays dead
    #[clap(long, default_value = "120")]
    respawn_secs: u64,

    /// Stream the join snapshot without pacing delays
    #[clap(long)]
    no_sync_delays: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let catalog = match &args.catalog {
        Some(path) => {
            let catalog = Catalog::load(path)?;
            info!("Loaded catalog from {}", path.display());
            catalog
        }
        None => Catalog::builtin(),
    };
    info!(
        "Catalog: {} items, {} recipes",
        catalog.item_count(),
        catalog.recipe_count()
    );

    let mut config = ServerConfig {
        max_clients: args.max_clients,
        world_seed: args.world_seed,
        resource_respawn_delay: Duration::from_secs(args.respawn_secs),
        ..ServerConfig::default()
    };
    if args.no_sync_delays {
        config = config.without_sync_delays();
    }

    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(&address, config, catalog).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
