use std::{sync::Arc, time::Duration};

use tokio::time::{Instant, MissedTickBehavior};

use crate::{Section, contention::ContentionSnapshot, error::SimulationError, tunnel::Tunnel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverloadTransition {
    Raised,
    Cleared { after: Duration },
}

/// What the arbiter observed and did during one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    /// Counters as read at the start of the tick.
    pub contention: ContentionSnapshot,
    pub released: Option<Section>,
    pub transition: Option<OverloadTransition>,
}

impl TickOutcome {
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.contention.total() == 0
    }
}

/// Single control loop deciding which section may send the next train.
#[derive(Debug, Clone)]
pub struct TunnelArbiter {
    tunnel: Arc<Tunnel>,
}

impl TunnelArbiter {
    #[must_use]
    pub const fn new(tunnel: Arc<Tunnel>) -> Self {
        Self { tunnel }
    }

    /// Reads the counters, updates the overload flag and releases the gate
    /// of the busiest section, if any.
    ///
    /// # Errors
    ///
    /// * If an overload event cannot be written
    pub fn tick(&self) -> Result<TickOutcome, SimulationError> {
        let (contention, granted) = self.tunnel.board().grant_busiest();
        let total = contention.total();

        log::trace!("tick: {contention} total={total}");

        let threshold = self.tunnel.config().overload_threshold;
        let transition = if total > threshold {
            self.tunnel
                .raise_overload()?
                .then_some(OverloadTransition::Raised)
        } else if contention.is_clear() {
            self.tunnel
                .clear_overload()?
                .map(|after| OverloadTransition::Cleared { after })
        } else {
            None
        };

        if let Some(section) = granted {
            self.tunnel.gate(section).release();
            metro_logging::debug_or_trace!(
                ("tick: released {section}"),
                ("tick: released {section} from {contention}")
            );
        }

        Ok(TickOutcome {
            contention,
            released: granted,
            transition,
        })
    }

    /// Ticks once per configured interval until `deadline`. While nothing is
    /// contending the loop sleeps until a counter changes instead of ticking.
    ///
    /// Returns the number of ticks taken.
    ///
    /// # Errors
    ///
    /// * If an overload event cannot be written
    pub async fn run(self, deadline: Instant) -> Result<u64, SimulationError> {
        let mut interval = tokio::time::interval(self.tunnel.config().tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = 0;

        loop {
            let changed = self.tunnel.board().changed();
            tokio::pin!(changed);
            changed.as_mut().enable();

            tokio::select! {
                biased;
                () = tokio::time::sleep_until(deadline) => break,
                _ = interval.tick() => {}
            }

            let outcome = self.tick()?;
            ticks += 1;

            if outcome.is_idle() {
                log::trace!("run: idle, waiting for arrivals");
                tokio::select! {
                    biased;
                    () = tokio::time::sleep_until(deadline) => break,
                    () = &mut changed => {}
                }
            }
        }

        log::debug!("run: arbiter stopped after {ticks} ticks");

        Ok(ticks)
    }
}
