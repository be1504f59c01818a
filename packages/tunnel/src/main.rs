#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Command-line runner for the metro tunnel simulation.
//!
//! # Usage
//!
//! ```text
//! metro_tunnel <PROBABILITY> -s <SECONDS> [--output-dir DIR] [--format text|json]
//!              [--complement-bc] [--max-trains N] [--hold-arrivals]
//! ```
//!
//! Writes `trains.log` and `tunnel.log` to the output directory and prints a
//! summary once the run finishes. Set `METRO_LOG` (or `RUST_LOG`) to control
//! console logging.

use std::{path::PathBuf, process, time::Duration};

use clap::{CommandFactory as _, Parser, error::ErrorKind};
use metro_tunnel::{
    ArrivalProfile, EventSink, LogFormat, Simulation, SimulationConfig, SimulationError,
    SimulationReport, TunnelEventKind,
};

/// Simulate trains contending for a single-lane metro tunnel
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Per-tick arrival probability for each section, within [0, 1]
    #[arg(value_name = "PROBABILITY")]
    probability: f64,

    /// How long to generate trains for, in seconds
    #[arg(short, long)]
    seconds: u64,

    /// Directory to write trains.log and tunnel.log to
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Log file format (text or json)
    #[arg(long, default_value = "text")]
    format: LogFormat,

    /// Use 1 - PROBABILITY for section BC
    #[arg(long)]
    complement_bc: bool,

    /// Maximum number of trains allowed in the system at once
    #[arg(long)]
    max_trains: Option<usize>,

    /// Stop generating arrivals while the tunnel is overloaded
    #[arg(long)]
    hold_arrivals: bool,
}

impl Args {
    fn config(&self) -> SimulationConfig {
        let profile = if self.complement_bc {
            ArrivalProfile::ComplementBc
        } else {
            ArrivalProfile::Uniform
        };

        let mut config = SimulationConfig::with_profile(
            self.probability,
            Duration::from_secs(self.seconds),
            profile,
        );
        if let Some(max) = self.max_trains {
            config.max_trains_in_system(max);
        }
        config.hold_arrivals_while_overloaded(self.hold_arrivals);
        config
    }
}

async fn run(args: &Args, config: SimulationConfig) -> Result<SimulationReport, SimulationError> {
    let sink = EventSink::to_dir(&args.output_dir, args.format)?;

    Simulation::new(config)?.with_sink(sink).run().await
}

fn main() {
    let args = Args::parse();
    let config = args.config();

    if let Err(e) = config.validate() {
        Args::command().error(ErrorKind::ValueValidation, e).exit();
    }

    if let Err(e) = metro_logging::init() {
        eprintln!("Warning: failed to initialize logging: {e}");
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start the runtime: {e}");
            process::exit(1);
        }
    };

    match runtime.block_on(run(&args, config)) {
        Ok(report) => {
            println!("Simulation complete");
            println!("Trains generated: {}", report.generated);
            println!("Trains completed: {}", report.completed);
            println!("Trains abandoned: {}", report.abandoned);
            println!(
                "Overloads: {} (cleared {})",
                report.overloads,
                report.events_of(TunnelEventKind::Cleared)
            );
            println!("Logs written to {}", args.output_dir.display());
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
