//! Server binary: parse arguments, load the map, seed the game, serve.

use clap::Parser;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use server::game::Game;
use server::gold::GoldConfig;
use server::grid::Grid;
use server::network::Server;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Authoritative dungeon gold-hunt server")]
struct Args {
    /// Path to the map file
    map: PathBuf,

    /// Seed for gold placement and spawn points (random when omitted)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let grid = Grid::from_file(&args.map)?;
    info!(
        "loaded map {} ({} x {})",
        args.map.display(),
        grid.height(),
        grid.width()
    );

    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let game = Game::new(grid, GoldConfig::default(), rng)?;
    let mut server = Server::bind(&format!("{}:{}", args.host, args.port), game).await?;
    server.run().await?;

    info!("game complete, shutting down");
    Ok(())
}
