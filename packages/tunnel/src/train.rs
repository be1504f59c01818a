use std::time::Duration;

use chrono::{DateTime, Local};
use metro_random::Rng;
use serde::{Deserialize, Serialize};

use crate::{Section, SimulationConfig};

pub type TrainId = u64;

/// Physical length class of a train. Longer trains take longer to cross.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TravelClass {
    Short,
    Long,
}

impl TravelClass {
    /// Reported train length in metres.
    #[must_use]
    pub const fn length(self) -> u16 {
        match self {
            Self::Short => 100,
            Self::Long => 200,
        }
    }
}

/// Lifecycle stage of a train, in the order they are passed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrainStatus {
    Waiting,
    Admitted,
    Occupying,
    Departed,
}

#[derive(Debug, Clone)]
pub struct Train {
    pub id: TrainId,
    pub section: Section,
    pub destination: Option<Section>,
    pub class: TravelClass,
    pub travel_duration: Duration,
    pub arrival_time: DateTime<Local>,
    pub departure_time: Option<DateTime<Local>>,
    pub breakdown_applied: bool,
    pub status: TrainStatus,
    delay: Duration,
}

impl Train {
    #[must_use]
    pub const fn new(
        id: TrainId,
        section: Section,
        class: TravelClass,
        travel_duration: Duration,
        arrival_time: DateTime<Local>,
    ) -> Self {
        Self {
            id,
            section,
            destination: None,
            class,
            travel_duration,
            arrival_time,
            departure_time: None,
            breakdown_applied: false,
            status: TrainStatus::Waiting,
            delay: Duration::ZERO,
        }
    }

    #[must_use]
    pub const fn with_destination(mut self, destination: Section) -> Self {
        self.destination = Some(destination);
        self
    }

    /// How long the train holds the tunnel, including any breakdown delay.
    #[must_use]
    pub fn occupancy(&self) -> Duration {
        self.travel_duration + self.delay
    }

    /// Extends the occupancy by `penalty`. Returns `false` if a breakdown
    /// was already applied.
    pub fn apply_breakdown(&mut self, penalty: Duration) -> bool {
        if self.breakdown_applied {
            return false;
        }
        self.breakdown_applied = true;
        self.delay += penalty;
        true
    }

    /// Samples the in-tunnel breakdown risk and applies the penalty on a hit.
    pub fn roll_breakdown(&mut self, rng: &Rng, probability: f64, penalty: Duration) -> bool {
        rng.gen_bool(probability) && self.apply_breakdown(penalty)
    }

    /// Moves the train forward to `status`. Returns `false` and leaves the
    /// train untouched if `status` is not later than the current one.
    pub fn advance(&mut self, status: TrainStatus) -> bool {
        if status <= self.status {
            return false;
        }
        self.status = status;
        true
    }

    pub fn depart(&mut self, at: DateTime<Local>) {
        if self.advance(TrainStatus::Departed) {
            self.departure_time = Some(at);
        }
    }
}

/// Builds trains with monotonically increasing ids.
#[derive(Debug)]
pub struct TrainFactory {
    next_id: TrainId,
    rng: Rng,
    short_travel: Duration,
    long_travel: Duration,
    long_train_probability: f64,
}

impl TrainFactory {
    #[must_use]
    pub const fn new(config: &SimulationConfig, rng: Rng) -> Self {
        Self {
            next_id: 0,
            rng,
            short_travel: config.short_travel,
            long_travel: config.long_travel,
            long_train_probability: config.long_train_probability,
        }
    }

    #[must_use]
    pub const fn built(&self) -> u64 {
        self.next_id
    }

    pub fn build(&mut self, section: Section, now: DateTime<Local>) -> Train {
        let id = self.next_id;
        self.next_id += 1;

        let (class, travel) = if self.rng.gen_bool(self.long_train_probability) {
            (TravelClass::Long, self.long_travel)
        } else {
            (TravelClass::Short, self.short_travel)
        };

        let train = Train::new(id, section, class, travel, now);

        match self.rng.choose(&section.far_side()) {
            Some(destination) => train.with_destination(*destination),
            None => train,
        }
    }
}
