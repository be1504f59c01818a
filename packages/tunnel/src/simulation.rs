//! Runs the generator, the arbiter and every train for one configured span
//! of time.
//!
//! At the deadline the generator and the arbiter stop. Trains the arbiter
//! already released finish their crossing. The gates are then closed so
//! trains still queued give up, and the run waits for every worker before
//! reporting.

use std::sync::Arc;

use metro_random::Rng;
use serde::Serialize;

use crate::{
    SimulationConfig,
    arbiter::TunnelArbiter,
    clock::SimClock,
    error::{ConfigError, SimulationError},
    events::{EventSink, TrainRecord, TunnelEvent, TunnelEventKind},
    generator::Generator,
    tunnel::Tunnel,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationReport {
    pub generated: usize,
    pub completed: usize,
    pub abandoned: usize,
    pub overloads: usize,
    pub peak_occupancy: usize,
    pub trains: Vec<TrainRecord>,
    pub events: Vec<TunnelEvent>,
}

impl SimulationReport {
    #[must_use]
    pub fn events_of(&self, kind: TunnelEventKind) -> usize {
        self.events.iter().filter(|event| event.kind == kind).count()
    }
}

#[derive(Debug)]
pub struct Simulation {
    config: SimulationConfig,
    rng: Rng,
    sink: EventSink,
}

impl Simulation {
    /// # Errors
    ///
    /// * If the config is invalid
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            config,
            rng: metro_random::rng(),
            sink: EventSink::in_memory(),
        })
    }

    #[must_use]
    pub fn with_rng(mut self, rng: Rng) -> Self {
        self.rng = rng;
        self
    }

    #[must_use]
    pub fn with_sink(mut self, sink: EventSink) -> Self {
        self.sink = sink;
        self
    }

    /// # Errors
    ///
    /// * If the system exceeds its train capacity
    /// * If a record cannot be written
    /// * If a train task panicked
    pub async fn run(self) -> Result<SimulationReport, SimulationError> {
        let Self { config, rng, sink } = self;

        let clock = SimClock::start();
        let deadline = clock.started() + config.duration;

        log::info!(
            "Starting simulation for {}s with arrival probabilities {:?}",
            config.duration.as_secs(),
            config.arrival_probabilities,
        );

        let tunnel = Arc::new(Tunnel::new(config, clock, rng.clone(), sink));
        let arbiter = tokio::spawn(TunnelArbiter::new(tunnel.clone()).run(deadline));

        let pool = match Generator::new(tunnel.clone(), rng).run(deadline).await {
            Ok(pool) => pool,
            Err(e) => {
                log::error!("Simulation halted: {e}");
                arbiter.abort();
                tunnel.close_gates();
                tunnel.sink().flush()?;
                return Err(e);
            }
        };

        let ticks = arbiter.await??;
        log::debug!("run: deadline reached after {ticks} arbiter ticks, draining");

        tunnel.close_gates();
        let tally = pool.drain().await?;
        tunnel.sink().flush()?;

        let report = SimulationReport {
            generated: tally.spawned,
            completed: tally.completed,
            abandoned: tally.abandoned,
            overloads: tunnel.overloads(),
            peak_occupancy: tunnel.peak_occupancy(),
            trains: tunnel.sink().trains(),
            events: tunnel.sink().events(),
        };

        log::info!(
            "Simulation complete: {} generated, {} completed, {} abandoned",
            report.generated,
            report.completed,
            report.abandoned,
        );

        Ok(report)
    }
}
