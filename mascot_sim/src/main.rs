// mascot_sim/src/main.rs

use std::error::Error;

use clap::Parser;
use mascot_sim::prelude::*;
use tracing::info;

fn main() -> Result<(), Box<dyn Error>> {
    // --- 1. Parse CLI and install logging ---
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    // --- 2. Load the scenario ---
    let mut config = MissionConfig::load(&cli.scenario)?;
    cli.apply_overrides(&mut config);
    config.validate()?;
    if cli.print_config {
        println!("{}", config.to_toml()?);
        return Ok(());
    }

    // --- 3. Run the mission ---
    let rng = SimulationRng::new(config.simulation.seed);
    let mut runner = MissionRunner::from_config(&config, rng)?;
    let status = runner.run()?;

    let metrics = runner.metrics();
    info!(
        ?status,
        waypoints = metrics.trajectory.len(),
        distance = metrics.distance_travelled,
        initial_variance = metrics.total_variance.first().copied(),
        final_variance = metrics.total_variance.last().copied(),
        final_ibv = metrics.ibv.last().copied(),
        final_rmse = metrics.rmse.last().copied(),
        "Summary"
    );
    Ok(())
}
