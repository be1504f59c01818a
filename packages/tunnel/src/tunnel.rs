//! Shared state of one simulation run.
//!
//! Lock order: the counter lock is only ever held for a read or an update and
//! never across an await. Gates are released after the counter lock is
//! dropped. The passage mutex is the only lock held across an await.

use std::{
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use chrono::{DateTime, Local};
use metro_random::Rng;

use crate::{
    Section, SimulationConfig,
    clock::{SimClock, elapsed_between},
    contention::{ContentionBoard, ContentionSnapshot},
    error::SimulationError,
    events::{EventSink, TunnelEvent},
    registry::TrainRegistry,
    semaphore::{AcquireError, FairSemaphore},
    train::{Train, TrainId},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TunnelState {
    pub occupied: bool,
    pub overloaded: bool,
    pub overload_since: Option<DateTime<Local>>,
}

#[derive(Debug, Default)]
struct OverloadState {
    since: Option<DateTime<Local>>,
    raised: usize,
}

#[derive(Debug)]
pub struct Tunnel {
    config: SimulationConfig,
    clock: SimClock,
    rng: Rng,
    gates: [FairSemaphore; Section::COUNT],
    board: ContentionBoard,
    registry: TrainRegistry,
    passage: tokio::sync::Mutex<()>,
    overload: Mutex<OverloadState>,
    sink: EventSink,
    occupancy: AtomicUsize,
    peak_occupancy: AtomicUsize,
}

impl Tunnel {
    #[must_use]
    pub fn new(config: SimulationConfig, clock: SimClock, rng: Rng, sink: EventSink) -> Self {
        Self {
            config,
            clock,
            rng,
            gates: std::array::from_fn(|_| FairSemaphore::new(0)),
            board: ContentionBoard::new(),
            registry: TrainRegistry::new(),
            passage: tokio::sync::Mutex::new(()),
            overload: Mutex::new(OverloadState::default()),
            sink,
            occupancy: AtomicUsize::new(0),
            peak_occupancy: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &SimulationConfig {
        &self.config
    }

    #[must_use]
    pub const fn clock(&self) -> &SimClock {
        &self.clock
    }

    #[must_use]
    pub const fn rng(&self) -> &Rng {
        &self.rng
    }

    #[must_use]
    pub const fn board(&self) -> &ContentionBoard {
        &self.board
    }

    #[must_use]
    pub const fn registry(&self) -> &TrainRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn sink(&self) -> &EventSink {
        &self.sink
    }

    #[must_use]
    pub const fn gate(&self, section: Section) -> &FairSemaphore {
        &self.gates[section.index()]
    }

    /// Counts the train against its section and adds it to the roster.
    pub fn arrive(&self, train: &Train) {
        self.board.arrive(train.section);
        self.registry.register(train.id, train.section);

        log::info!(
            "Train {} waiting to enter the tunnel from {}",
            train.id,
            train.section
        );
    }

    /// Waits until the arbiter releases the train's section gate.
    ///
    /// # Errors
    ///
    /// * If the gate was closed before the train was released
    pub async fn await_release(&self, section: Section) -> Result<(), AcquireError> {
        self.gate(section).acquire().await
    }

    /// Takes the passage for a released train of `section`. The train stops
    /// counting as waiting and starts counting as admitted.
    pub async fn enter(&self, section: Section) -> PassageGuard<'_> {
        let lock = self.passage.lock().await;

        self.board.admit(section);
        let occupancy = self.occupancy.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_occupancy.fetch_max(occupancy, Ordering::SeqCst);

        PassageGuard {
            tunnel: self,
            section,
            lock: Some(lock),
        }
    }

    /// Removes a train that gave up while queued.
    pub fn abandon(&self, train: &Train) {
        self.board.abandon(train.section);
        self.registry.deregister(train.id);

        log::debug!("abandon: train {} left the {} queue", train.id, train.section);
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<TrainId> {
        self.registry.snapshot()
    }

    #[must_use]
    pub fn contention(&self) -> ContentionSnapshot {
        self.board.snapshot()
    }

    /// # Errors
    ///
    /// * If the event cannot be written
    pub fn record_event(&self, event: TunnelEvent) -> Result<(), SimulationError> {
        self.sink.record_event(event)
    }

    /// Flags the system overloaded. Returns `false` if it already was.
    ///
    /// # Errors
    ///
    /// * If the overload event cannot be written
    ///
    /// # Panics
    ///
    /// * If the `overload` `Mutex` is poisoned
    pub fn raise_overload(&self) -> Result<bool, SimulationError> {
        let now = self.clock.now();
        {
            let mut overload = self.overload.lock().unwrap();
            if overload.since.is_some() {
                return Ok(false);
            }
            overload.since = Some(now);
            overload.raised += 1;
        }

        let waiting = self.snapshot();
        log::info!("System overload: {} trains in the system", waiting.len());
        self.record_event(TunnelEvent::overload(now, waiting))?;

        Ok(true)
    }

    /// Clears the overload flag, returning how long it was raised, or `None`
    /// if the system was not overloaded.
    ///
    /// # Errors
    ///
    /// * If the cleared event cannot be written
    ///
    /// # Panics
    ///
    /// * If the `overload` `Mutex` is poisoned
    pub fn clear_overload(&self) -> Result<Option<Duration>, SimulationError> {
        let now = self.clock.now();
        let Some(since) = self.overload.lock().unwrap().since.take() else {
            return Ok(None);
        };

        let after = elapsed_between(&since, &now);
        log::info!("Tunnel cleared after {}s", after.as_secs());
        self.record_event(TunnelEvent::cleared(now, after.as_secs()))?;

        Ok(Some(after))
    }

    /// # Panics
    ///
    /// * If the `overload` `Mutex` is poisoned
    #[must_use]
    pub fn is_overloaded(&self) -> bool {
        self.overload.lock().unwrap().since.is_some()
    }

    /// Number of times the system entered overload.
    ///
    /// # Panics
    ///
    /// * If the `overload` `Mutex` is poisoned
    #[must_use]
    pub fn overloads(&self) -> usize {
        self.overload.lock().unwrap().raised
    }

    /// # Panics
    ///
    /// * If the `overload` `Mutex` is poisoned
    #[must_use]
    pub fn state(&self) -> TunnelState {
        let overload_since = self.overload.lock().unwrap().since;

        TunnelState {
            occupied: self.occupancy.load(Ordering::SeqCst) > 0,
            overloaded: overload_since.is_some(),
            overload_since,
        }
    }

    #[must_use]
    pub fn peak_occupancy(&self) -> usize {
        self.peak_occupancy.load(Ordering::SeqCst)
    }

    /// Closes every gate. Trains still queued without a permit are turned
    /// away.
    pub fn close_gates(&self) {
        for gate in &self.gates {
            gate.close();
        }
    }
}

/// Exclusive hold on the passage. Dropping it vacates the passage and then
/// stops counting the train against its section.
pub struct PassageGuard<'a> {
    tunnel: &'a Tunnel,
    section: Section,
    lock: Option<tokio::sync::MutexGuard<'a, ()>>,
}

impl Drop for PassageGuard<'_> {
    fn drop(&mut self) {
        self.tunnel.occupancy.fetch_sub(1, Ordering::SeqCst);
        drop(self.lock.take());
        self.tunnel.board.depart(self.section);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::train::TravelClass;

    fn tunnel() -> Tunnel {
        Tunnel::new(
            SimulationConfig::new(0.5, Duration::from_secs(10)),
            SimClock::start(),
            Rng::from_seed(7),
            EventSink::in_memory(),
        )
    }

    fn train(tunnel: &Tunnel, id: TrainId, section: Section) -> Train {
        Train::new(
            id,
            section,
            TravelClass::Short,
            Duration::from_secs(2),
            tunnel.clock().now(),
        )
    }

    #[test_log::test(tokio::test)]
    async fn passage_guard_tracks_occupancy_and_counters() {
        let tunnel = tunnel();
        let train = train(&tunnel, 0, Section::DE);
        tunnel.arrive(&train);

        let guard = tunnel.enter(Section::DE).await;
        assert!(tunnel.state().occupied);
        assert_eq!(tunnel.contention().get(Section::DE).admitted, 1);

        drop(guard);
        assert!(!tunnel.state().occupied);
        assert!(tunnel.contention().is_clear());
        assert_eq!(tunnel.peak_occupancy(), 1);
    }

    #[test_log::test(tokio::test)]
    async fn overload_is_raised_and_cleared_once() {
        let tunnel = tunnel();
        tunnel.registry().register(1, Section::AC);

        assert!(tunnel.raise_overload().unwrap());
        assert!(!tunnel.raise_overload().unwrap());
        assert!(tunnel.state().overload_since.is_some());

        assert!(tunnel.clear_overload().unwrap().is_some());
        assert_eq!(tunnel.clear_overload().unwrap(), None);
        assert_eq!(tunnel.overloads(), 1);

        let events = tunnel.sink().events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].waiting, vec![1]);
    }

    #[test_log::test(tokio::test)]
    async fn abandon_undoes_arrival() {
        let tunnel = tunnel();
        let train = train(&tunnel, 4, Section::BC);

        tunnel.arrive(&train);
        tunnel.close_gates();
        assert!(Section::ALL.iter().all(|section| tunnel.gate(*section).is_closed()));
        assert_eq!(
            tunnel.await_release(Section::BC).await,
            Err(AcquireError::Closed)
        );
        tunnel.abandon(&train);

        assert!(tunnel.registry().is_empty());
        assert!(tunnel.contention().is_clear());
    }
}
