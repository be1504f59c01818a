use std::sync::Arc;

use metro_random::Rng;
use tokio::time::{Instant, MissedTickBehavior};

use crate::{
    Section,
    error::SimulationError,
    train::{TrainFactory, TrainId},
    tunnel::Tunnel,
    worker::{TrainPool, TrainWorker},
};

/// Per-tick Bernoulli arrival process feeding the tunnel.
#[derive(Debug)]
pub struct Generator {
    tunnel: Arc<Tunnel>,
    factory: TrainFactory,
    rng: Rng,
    pool: TrainPool,
}

impl Generator {
    #[must_use]
    pub fn new(tunnel: Arc<Tunnel>, rng: Rng) -> Self {
        let factory = TrainFactory::new(tunnel.config(), rng.clone());

        Self {
            tunnel,
            factory,
            rng,
            pool: TrainPool::new(),
        }
    }

    #[must_use]
    pub const fn pool(&self) -> &TrainPool {
        &self.pool
    }

    /// Samples one arrival trial per section and spawns a worker for every
    /// hit. Arrivals are held while the system is overloaded, if configured.
    ///
    /// Returns the ids of the spawned trains.
    ///
    /// # Errors
    ///
    /// * If a spawn would put more trains in the system than allowed
    /// * If a finished train failed
    pub fn tick(&mut self) -> Result<Vec<TrainId>, SimulationError> {
        let config = self.tunnel.config();

        if config.hold_arrivals_while_overloaded && self.tunnel.is_overloaded() {
            log::trace!("tick: holding arrivals while overloaded");
            return Ok(vec![]);
        }

        self.pool.reap()?;

        let mut spawned = vec![];

        for section in Section::ALL {
            if !self.rng.gen_bool(config.probability_for(section)) {
                continue;
            }

            if self.pool.live() >= config.max_trains_in_system {
                log::error!(
                    "tick: {} trains in the system, refusing to add more",
                    self.pool.live()
                );
                return Err(SimulationError::CapacityExceeded {
                    limit: config.max_trains_in_system,
                });
            }

            let train = self.factory.build(section, self.tunnel.clock().now());
            log::debug!(
                "tick: train {} arrives at {section} ({:?}, bound for {:?})",
                train.id,
                train.class,
                train.destination,
            );
            spawned.push(train.id);
            self.pool.spawn(TrainWorker::new(self.tunnel.clone(), train));
        }

        Ok(spawned)
    }

    /// Generates arrivals once per tick until `deadline`, then hands back the
    /// still running trains.
    ///
    /// # Errors
    ///
    /// * If a [`Self::tick`] fails. Every spawned train is aborted.
    pub async fn run(mut self, deadline: Instant) -> Result<TrainPool, SimulationError> {
        let mut interval = tokio::time::interval(self.tunnel.config().tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = tokio::time::sleep_until(deadline) => break,
                _ = interval.tick() => {}
            }

            self.tick()?;
        }

        log::debug!(
            "run: generator stopped after {} trains, {} still in the system",
            self.factory.built(),
            self.pool.live()
        );

        Ok(self.pool)
    }
}
