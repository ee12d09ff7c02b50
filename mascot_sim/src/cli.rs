// mascot_sim/src/cli.rs

use clap::Parser;
use std::path::PathBuf;

use crate::config::MissionConfig;

/// MASCOT: adaptive sampling of a salinity front with an autonomous vehicle.
///
/// Runs one simulated mission: the vehicle plans informative paths through
/// a Gaussian belief, samples a synthetic truth, and heads home before its
/// travel budget runs out.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The path to the scenario TOML file to run.
    #[arg(short, long, default_value = "assets/scenarios/square.toml")]
    pub scenario: PathBuf,

    /// Overrides `simulation.seed` from the scenario.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Overrides `simulation.max_steps` from the scenario.
    #[arg(long)]
    pub max_steps: Option<usize>,

    /// Log filter, e.g. `debug` or `mascot_core=debug,mascot_sim=info`.
    /// Falls back to `RUST_LOG`.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Print the resolved scenario as TOML and exit.
    #[arg(long, default_value_t = false)]
    pub print_config: bool,
}

impl Cli {
    /// Command-line values take precedence over the scenario file and the
    /// environment.
    pub fn apply_overrides(&self, config: &mut MissionConfig) {
        if let Some(seed) = self.seed {
            config.simulation.seed = Some(seed);
        }
        if let Some(max_steps) = self.max_steps {
            config.simulation.max_steps = max_steps;
        }
    }
}
