//! Replay Status Server
//!
//! Serves a recorded simulation (JSONL, one status document per line) on
//! the dashboard's status endpoint.
//! Run with: REPLAY_FILE=run.jsonl cargo run --bin status_replay

use anyhow::{Context, Result};
use std::net::TcpListener;
use std::path::Path;

use strategy_dashboard::config::DashboardConfig;
use strategy_dashboard::replay::{load_recording, ReplayServer};

fn main() -> Result<()> {
    let cfg = DashboardConfig::from_env();
    let snapshots = load_recording(Path::new(&cfg.replay_file))?;
    let listener = TcpListener::bind(&cfg.replay_addr)
        .with_context(|| format!("failed to bind {}", cfg.replay_addr))?;

    println!("Replay server running at http://{}", cfg.replay_addr);
    println!();
    println!("Endpoints:");
    println!("  GET {}  - next recorded snapshot ({} loaded)", cfg.status_path, snapshots.len());
    println!("  GET /api/health - Health check");
    println!();

    ReplayServer::new(snapshots, &cfg.status_path).serve(listener, None);
    Ok(())
}
