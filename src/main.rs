use std::io;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use seed_sweep::input::prompt_area;
use seed_sweep::{
    MavlinkVehicle, MissionArea, MissionConfig, MissionController, MissionReport, SimulatedVehicle, Vehicle,
};

/// Fly a boustrophedon seed-dropping survey over a rectangular area
#[derive(Debug, Parser)]
#[command(name = "seed-sweep", version, about)]
struct Args {
    /// JSON mission config; defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Rows to scan, in cells (prompted when absent)
    #[arg(long)]
    width: Option<u32>,

    /// Cells per row (prompted when absent)
    #[arg(long)]
    height: Option<u32>,

    /// MAVLink address, e.g. udpin:0.0.0.0:14540
    #[arg(long)]
    address: Option<String>,

    /// Fly the built-in simulated vehicle
    #[arg(long)]
    simulate: bool,

    /// Write the per-waypoint flight log to this CSV file
    #[arg(long)]
    report: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => MissionConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => MissionConfig::default(),
    };
    if let Some(address) = args.address {
        config.connection_address = address;
    }

    let area = match (args.width, args.height) {
        (Some(width), Some(height)) => MissionArea::new(width, height)?,
        _ => {
            let stdin = io::stdin();
            let mut input = stdin.lock();
            let mut output = io::stdout();
            prompt_area(&mut input, &mut output, config.max_input_attempts)?
        }
    };

    println!("seed-sweep - {} x {} cells, {} m step", area.width, area.height, config.step_size_m);

    let report = if args.simulate {
        fly(SimulatedVehicle::from_config(&config), area, config).await?
    } else {
        fly(MavlinkVehicle::new(), area, config).await?
    };

    println!();
    println!("Mission result: {}", report.outcome);
    println!("  Waypoints: {} / {}", report.waypoints_visited(), report.waypoints_planned);
    println!("  Coverage: {:.1}%", report.coverage() * 100.0);
    println!("  Distance flown: {:.2} m", report.total_distance_m);
    if let Some(remaining) = report.final_remaining_percent {
        println!("  Estimated battery left: {:.2}%", remaining);
    }

    if let Some(path) = args.report {
        report
            .save_csv(&path)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        println!("  Flight log: {}", path.display());
    }

    Ok(())
}

/// Runs one mission; Ctrl-C requests an operator abort
async fn fly<V: Vehicle>(vehicle: V, area: MissionArea, config: MissionConfig) -> seed_sweep::Result<MissionReport> {
    let mut mission = MissionController::new(vehicle, area, config);
    let abort = mission.abort_handle();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, returning home");
            abort.abort();
        }
    });

    mission.run().await
}
