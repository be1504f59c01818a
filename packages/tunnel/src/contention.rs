//! Per-section contention counters.
//!
//! Each section tracks three numbers under one shared lock:
//!
//! * `waiting`: trains queued on the section's gate, including those the
//!   arbiter already released a permit for but that have not been admitted
//! * `released`: permits handed to the section that no train consumed yet
//! * `admitted`: trains past the gate that have not left the tunnel
//!
//! A section's contention is `waiting + admitted`: every train that is
//! waiting for or holding the passage. The arbiter selects on
//! `waiting - released` so a permit is never granted twice for one train.

use std::sync::{Mutex, MutexGuard};

use tokio::sync::{Notify, futures::Notified};

use crate::Section;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SectionCounts {
    pub waiting: usize,
    pub released: usize,
    pub admitted: usize,
}

impl SectionCounts {
    #[must_use]
    pub const fn contention(&self) -> usize {
        self.waiting + self.admitted
    }

    /// Queued trains no permit has been granted for yet.
    #[must_use]
    pub const fn pending(&self) -> usize {
        self.waiting.saturating_sub(self.released)
    }

    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.waiting == 0 && self.released == 0 && self.admitted == 0
    }
}

/// Copy of all four sections' counters taken under the counter lock.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ContentionSnapshot {
    counts: [SectionCounts; Section::COUNT],
}

impl ContentionSnapshot {
    #[must_use]
    pub const fn get(&self, section: Section) -> SectionCounts {
        self.counts[section.index()]
    }

    #[must_use]
    pub const fn contention(&self, section: Section) -> usize {
        self.get(section).contention()
    }

    /// Sum of the contention of every section.
    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.iter().map(SectionCounts::contention).sum()
    }

    #[must_use]
    pub fn is_clear(&self) -> bool {
        self.counts.iter().all(SectionCounts::is_zero)
    }

    /// Section with the most ungranted waiters. Ties go to the section that
    /// comes first in [`Section::ALL`].
    #[must_use]
    pub fn busiest(&self) -> Option<(Section, usize)> {
        let mut busiest: Option<(Section, usize)> = None;

        for section in Section::ALL {
            let pending = self.get(section).pending();
            if pending > busiest.map_or(0, |(_, max)| max) {
                busiest = Some((section, pending));
            }
        }

        busiest
    }
}

impl std::fmt::Display for ContentionSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, section) in Section::ALL.into_iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{section}={}", self.contention(section))?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct ContentionBoard {
    counts: Mutex<[SectionCounts; Section::COUNT]>,
    changed: Notify,
}

impl ContentionBoard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, section: Section, f: impl FnOnce(&mut SectionCounts)) {
        let counts = {
            let mut counts = self.lock();
            f(&mut counts[section.index()]);
            counts[section.index()]
        };
        log::trace!("contention: {section} {counts:?}");
        self.changed.notify_waiters();
    }

    fn lock(&self) -> MutexGuard<'_, [SectionCounts; Section::COUNT]> {
        self.counts.lock().unwrap()
    }

    /// A train joined the queue of `section`.
    ///
    /// # Panics
    ///
    /// * If the counter lock is poisoned
    pub fn arrive(&self, section: Section) {
        self.update(section, |counts| counts.waiting += 1);
    }

    /// A train of `section` consumed a granted permit.
    ///
    /// # Panics
    ///
    /// * If the counter lock is poisoned
    pub fn admit(&self, section: Section) {
        self.update(section, |counts| {
            debug_assert!(counts.waiting > 0, "admitted a train that was not waiting");
            counts.waiting = counts.waiting.saturating_sub(1);
            counts.released = counts.released.saturating_sub(1);
            counts.admitted += 1;
        });
    }

    /// An admitted train of `section` left the tunnel.
    ///
    /// # Panics
    ///
    /// * If the counter lock is poisoned
    pub fn depart(&self, section: Section) {
        self.update(section, |counts| {
            debug_assert!(counts.admitted > 0, "departed a train that was not admitted");
            counts.admitted = counts.admitted.saturating_sub(1);
        });
    }

    /// A queued train of `section` gave up without being admitted.
    ///
    /// # Panics
    ///
    /// * If the counter lock is poisoned
    pub fn abandon(&self, section: Section) {
        self.update(section, |counts| {
            counts.waiting = counts.waiting.saturating_sub(1);
            counts.released = counts.released.min(counts.waiting);
        });
    }

    /// Reads the counters and, in the same critical section, reserves one
    /// permit for the busiest section.
    ///
    /// Returns the counters as they were before the grant, and the section
    /// whose gate the caller must release once the lock is dropped.
    ///
    /// # Panics
    ///
    /// * If the counter lock is poisoned
    pub fn grant_busiest(&self) -> (ContentionSnapshot, Option<Section>) {
        let mut counts = self.lock();
        let snapshot = ContentionSnapshot { counts: *counts };

        let granted = snapshot.busiest().map(|(section, _)| {
            counts[section.index()].released += 1;
            section
        });

        (snapshot, granted)
    }

    /// # Panics
    ///
    /// * If the counter lock is poisoned
    #[must_use]
    pub fn snapshot(&self) -> ContentionSnapshot {
        ContentionSnapshot {
            counts: *self.lock(),
        }
    }

    /// Resolves on the next counter change after it is created (or enabled).
    pub fn changed(&self) -> Notified<'_> {
        self.changed.notified()
    }
}
