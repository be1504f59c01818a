use std::sync::Arc;

use tokio::task::{JoinError, JoinSet};

use crate::{
    error::SimulationError,
    events::{TrainRecord, TunnelEvent},
    train::{Train, TrainId, TrainStatus},
    tunnel::Tunnel,
};

type WorkerResult = Result<TrainOutcome, SimulationError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrainOutcome {
    Completed(TrainRecord),
    /// The train was still queued when the gates closed.
    Abandoned(TrainId),
}

/// Drives one train from arrival to departure.
#[derive(Debug)]
pub struct TrainWorker {
    tunnel: Arc<Tunnel>,
    train: Train,
}

impl TrainWorker {
    #[must_use]
    pub const fn new(tunnel: Arc<Tunnel>, train: Train) -> Self {
        Self { tunnel, train }
    }

    #[must_use]
    pub const fn train(&self) -> &Train {
        &self.train
    }

    /// # Errors
    ///
    /// * If an event or the final train record cannot be written
    pub async fn run(self) -> Result<TrainOutcome, SimulationError> {
        let Self { tunnel, mut train } = self;
        let config = tunnel.config();
        let id = train.id;
        let section = train.section;

        tunnel.arrive(&train);
        tokio::time::sleep(config.approach_delay).await;

        if let Err(e) = tunnel.await_release(section).await {
            log::debug!("run: train {id} not released: {e}");
            tunnel.abandon(&train);
            return Ok(TrainOutcome::Abandoned(id));
        }
        train.advance(TrainStatus::Admitted);

        let passage = tunnel.enter(section).await;
        train.advance(TrainStatus::Occupying);

        log::info!("Train {id} entered the tunnel from {section}");
        tunnel.record_event(TunnelEvent::passage_entry(
            id,
            tunnel.clock().now(),
            tunnel.snapshot(),
        ))?;

        if train.roll_breakdown(
            tunnel.rng(),
            config.breakdown_probability,
            config.breakdown_penalty,
        ) {
            log::info!("Train {id} broke down in the tunnel");
            tunnel.record_event(TunnelEvent::breakdown(
                id,
                tunnel.clock().now(),
                tunnel.snapshot(),
            ))?;
        }

        tokio::time::sleep(train.occupancy()).await;
        drop(passage);

        log::info!("Train {id} passed through the tunnel");

        if !config.exit_delay.is_zero() {
            tokio::time::sleep(config.exit_delay).await;
        }
        tunnel.registry().deregister(id);
        train.depart(tunnel.clock().now());

        let record = TrainRecord::from_train(&train);
        tunnel.sink().record_train(record.clone())?;

        Ok(TrainOutcome::Completed(record))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolTally {
    pub spawned: usize,
    pub completed: usize,
    pub abandoned: usize,
}

/// Set of live train tasks. Dropping the pool aborts every task still
/// running.
#[derive(Debug, Default)]
pub struct TrainPool {
    tasks: JoinSet<WorkerResult>,
    tally: PoolTally,
}

impl TrainPool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, worker: TrainWorker) {
        log::trace!("spawn: train {}", worker.train().id);
        self.tasks.spawn(worker.run());
        self.tally.spawned += 1;
    }

    /// Number of trains not yet reaped.
    #[must_use]
    pub fn live(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub const fn tally(&self) -> PoolTally {
        self.tally
    }

    fn settle(&mut self, result: Result<WorkerResult, JoinError>) -> Result<(), SimulationError> {
        match result?? {
            TrainOutcome::Completed(_) => self.tally.completed += 1,
            TrainOutcome::Abandoned(_) => self.tally.abandoned += 1,
        }
        Ok(())
    }

    /// Collects every task that already finished without waiting.
    ///
    /// # Errors
    ///
    /// * If a finished train failed or its task panicked
    pub fn reap(&mut self) -> Result<(), SimulationError> {
        while let Some(result) = self.tasks.try_join_next() {
            self.settle(result)?;
        }
        Ok(())
    }

    /// Waits for every remaining train.
    ///
    /// # Errors
    ///
    /// * If a train failed or its task panicked
    pub async fn drain(mut self) -> Result<PoolTally, SimulationError> {
        while let Some(result) = self.tasks.join_next().await {
            self.settle(result)?;
        }

        log::debug!("drain: {:?}", self.tally);

        Ok(self.tally)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use metro_random::Rng;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        Section, SimulationConfig,
        clock::SimClock,
        events::{EventSink, TunnelEventKind},
        train::TravelClass,
    };

    fn tunnel(breakdown_probability: f64) -> Arc<Tunnel> {
        let mut config = SimulationConfig::new(1.0, Duration::from_secs(30));
        config.breakdown(breakdown_probability, Duration::from_secs(4));

        Arc::new(Tunnel::new(
            config,
            SimClock::start(),
            Rng::from_seed(5),
            EventSink::in_memory(),
        ))
    }

    fn worker(tunnel: &Arc<Tunnel>, id: TrainId, section: Section) -> TrainWorker {
        let train = Train::new(
            id,
            section,
            TravelClass::Short,
            Duration::from_secs(2),
            tunnel.clock().now(),
        )
        .with_destination(section.far_side()[0]);

        TrainWorker::new(tunnel.clone(), train)
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn released_train_crosses_and_departs() {
        let tunnel = tunnel(0.0);
        let started = tokio::time::Instant::now();
        tunnel.gate(Section::AC).release();

        let worker = worker(&tunnel, 0, Section::AC);
        assert_eq!(worker.train().status, TrainStatus::Waiting);
        let outcome = worker.run().await.unwrap();

        let TrainOutcome::Completed(record) = outcome else {
            panic!("expected a completed train, got {outcome:?}");
        };
        assert_eq!(record.origin, Section::AC);
        assert_eq!(record.length, 100);
        assert!(!record.breakdown);
        // approach + travel + exit
        assert_eq!(started.elapsed(), Duration::from_secs(4));
        assert!(tunnel.registry().is_empty());
        assert!(tunnel.contention().is_clear());
        assert_eq!(tunnel.sink().trains(), vec![record]);
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn breakdown_extends_occupancy_and_is_logged() {
        let tunnel = tunnel(1.0);
        let started = tokio::time::Instant::now();
        tunnel.gate(Section::DF).release();

        worker(&tunnel, 3, Section::DF).run().await.unwrap();

        assert_eq!(started.elapsed(), Duration::from_secs(8));
        let events = tunnel.sink().events();
        assert_eq!(
            events.iter().map(|event| event.kind).collect::<Vec<_>>(),
            vec![TunnelEventKind::PassageEntry, TunnelEventKind::Breakdown]
        );
        assert_eq!(events[0].train, Some(3));
        assert_eq!(events[0].waiting, vec![3]);
        assert!(tunnel.sink().trains()[0].breakdown);
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn queued_train_is_abandoned_when_gates_close() {
        let tunnel = tunnel(0.0);
        let mut pool = TrainPool::new();
        pool.spawn(worker(&tunnel, 0, Section::BC));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(tunnel.gate(Section::BC).waiting(), 1);
        tunnel.close_gates();

        let tally = pool.drain().await.unwrap();

        assert_eq!(
            tally,
            PoolTally {
                spawned: 1,
                completed: 0,
                abandoned: 1
            }
        );
        assert!(tunnel.registry().is_empty());
        assert!(tunnel.contention().is_clear());
        assert!(tunnel.sink().trains().is_empty());
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn passage_is_never_shared() {
        let tunnel = tunnel(0.5);
        let mut pool = TrainPool::new();

        for (id, section) in Section::ALL.iter().cycle().take(12).enumerate() {
            pool.spawn(worker(&tunnel, id as TrainId, *section));
            tunnel.gate(*section).release();
        }

        let tally = pool.drain().await.unwrap();

        assert_eq!(tally.completed, 12);
        assert_eq!(tunnel.peak_occupancy(), 1);
        assert!(tunnel.contention().is_clear());

        let entries = tunnel
            .sink()
            .events()
            .iter()
            .filter(|event| event.kind == TunnelEventKind::PassageEntry)
            .count();
        assert_eq!(entries, 12);
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn reap_collects_finished_trains_only() {
        let tunnel = tunnel(0.0);
        let mut pool = TrainPool::new();

        tunnel.gate(Section::DE).release();
        pool.spawn(worker(&tunnel, 0, Section::DE));
        pool.spawn(worker(&tunnel, 1, Section::DE));

        tokio::time::sleep(Duration::from_secs(10)).await;
        pool.reap().unwrap();

        assert_eq!(pool.live(), 1);
        assert_eq!(pool.tally().completed, 1);

        tunnel.close_gates();
        let tally = pool.drain().await.unwrap();
        assert_eq!(tally.abandoned, 1);
    }
}
