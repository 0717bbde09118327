use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use flight_to_heal::{
    config::AppConfig,
    rng::RngManager,
    scenario::WorldLoader,
    session::SessionFacade,
    store::{FileSessionStore, InMemorySessionStore, SessionStore},
    web::{self, WebServerConfig},
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Flight to Heal game server")]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the world file named in the configuration
    #[arg(long, global = true)]
    world: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the game over HTTP
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        /// Fix the master seed for reproducible sessions
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Validate a world file and print a summary
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    if let Some(world) = cli.world {
        config.world.path = world;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Command::Serve { host, port, seed } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if seed.is_some() {
                config.seed = seed;
            }
            serve(config).await
        }
        Command::Check => check(&config),
    }
}

async fn serve(config: AppConfig) -> Result<()> {
    let world = Arc::new(WorldLoader::new(".").load_or_fallback(&config.world.path));
    let store: Box<dyn SessionStore> = match &config.session.snapshot_dir {
        Some(dir) => Box::new(
            FileSessionStore::new(dir)
                .with_context(|| format!("Failed to open snapshot dir {}", dir.display()))?,
        ),
        None => Box::new(InMemorySessionStore::new()),
    };
    let ttl = config.session.ttl()?;
    let rng = match config.seed {
        Some(seed) => RngManager::new(seed),
        None => RngManager::from_entropy(),
    };
    info!(
        airports = world.airport_count(),
        seed = ?config.seed,
        ttl_minutes = config.session.ttl_minutes,
        "starting server"
    );

    let facade = SessionFacade::new(
        world,
        config.rules.clone(),
        store,
        rng,
        ttl,
    );
    web::run(WebServerConfig {
        facade,
        host: config.server.host,
        port: config.server.port,
    })
    .await
}

fn check(config: &AppConfig) -> Result<()> {
    let path = &config.world.path;
    let world = WorldLoader::new(".")
        .load(path)
        .with_context(|| format!("World file {} is not usable", path.display()))?;
    let clinics = world.airports().iter().filter(|a| a.has_clinic()).count();
    println!(
        "World '{}' is valid: {} airports ({} with clinics), {} connections, {} departure risks, {} possible starts.",
        path.display(),
        world.airport_count(),
        clinics,
        world.connections().len(),
        world.all_departure_risks().len(),
        world.departure_airports().len()
    );
    Ok(())
}
