use std::time::Duration;

use crate::{Section, error::ConfigError};

pub const DEFAULT_TICK: Duration = Duration::from_secs(1);
pub const DEFAULT_SHORT_TRAVEL: Duration = Duration::from_secs(2);
pub const DEFAULT_LONG_TRAVEL: Duration = Duration::from_secs(3);
pub const DEFAULT_LONG_TRAIN_PROBABILITY: f64 = 0.3;
pub const DEFAULT_BREAKDOWN_PROBABILITY: f64 = 0.1;
pub const DEFAULT_BREAKDOWN_PENALTY: Duration = Duration::from_secs(4);
pub const DEFAULT_APPROACH_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_EXIT_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_OVERLOAD_THRESHOLD: usize = 10;
pub const DEFAULT_MAX_TRAINS: usize = 100;

/// How the single arrival probability `p` maps onto the four sections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArrivalProfile {
    /// Every section uses `p`.
    #[default]
    Uniform,
    /// Section `BC` uses `1 - p`, the others use `p`.
    ComplementBc,
}

impl ArrivalProfile {
    #[must_use]
    pub fn probabilities(self, p: f64) -> [f64; Section::COUNT] {
        match self {
            Self::Uniform => [p; Section::COUNT],
            Self::ComplementBc => {
                let mut probabilities = [p; Section::COUNT];
                probabilities[Section::BC.index()] = 1.0 - p;
                probabilities
            }
        }
    }
}

/// Tunables for one simulation run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Per-section Bernoulli arrival probability, indexed by [`Section::index`].
    pub arrival_probabilities: [f64; Section::COUNT],
    /// How long the generator and arbiter run.
    pub duration: Duration,
    /// Cadence of the generator and the arbiter.
    pub tick: Duration,
    /// Tunnel transit time of a 100 unit train.
    pub short_travel: Duration,
    /// Tunnel transit time of a 200 unit train.
    pub long_travel: Duration,
    pub long_train_probability: f64,
    pub breakdown_probability: f64,
    /// Extra occupancy added when a train breaks down in the tunnel.
    pub breakdown_penalty: Duration,
    /// Time between a train's arrival and it queueing at its section gate.
    pub approach_delay: Duration,
    /// Time between a train leaving the tunnel and its departure stamp.
    pub exit_delay: Duration,
    /// Total contention strictly above this flags the system overloaded.
    pub overload_threshold: usize,
    /// Spawning a train beyond this many live trains halts the simulation.
    pub max_trains_in_system: usize,
    /// Pause the generator while the system is overloaded. Off by default:
    /// arrivals keep coming until the end of the run.
    pub hold_arrivals_while_overloaded: bool,
}

impl SimulationConfig {
    #[must_use]
    pub fn new(probability: f64, duration: Duration) -> Self {
        Self::with_profile(probability, duration, ArrivalProfile::default())
    }

    #[must_use]
    pub fn with_profile(probability: f64, duration: Duration, profile: ArrivalProfile) -> Self {
        Self {
            arrival_probabilities: profile.probabilities(probability),
            duration,
            tick: DEFAULT_TICK,
            short_travel: DEFAULT_SHORT_TRAVEL,
            long_travel: DEFAULT_LONG_TRAVEL,
            long_train_probability: DEFAULT_LONG_TRAIN_PROBABILITY,
            breakdown_probability: DEFAULT_BREAKDOWN_PROBABILITY,
            breakdown_penalty: DEFAULT_BREAKDOWN_PENALTY,
            approach_delay: DEFAULT_APPROACH_DELAY,
            exit_delay: DEFAULT_EXIT_DELAY,
            overload_threshold: DEFAULT_OVERLOAD_THRESHOLD,
            max_trains_in_system: DEFAULT_MAX_TRAINS,
            hold_arrivals_while_overloaded: false,
        }
    }

    #[must_use]
    pub const fn probability_for(&self, section: Section) -> f64 {
        self.arrival_probabilities[section.index()]
    }

    /// Sets the arrival probability of a single section.
    pub const fn arrival_probability(&mut self, section: Section, probability: f64) -> &mut Self {
        self.arrival_probabilities[section.index()] = probability;
        self
    }

    pub const fn tick(&mut self, tick: Duration) -> &mut Self {
        self.tick = tick;
        self
    }

    pub const fn travel(&mut self, short: Duration, long: Duration) -> &mut Self {
        self.short_travel = short;
        self.long_travel = long;
        self
    }

    pub const fn long_train_probability(&mut self, probability: f64) -> &mut Self {
        self.long_train_probability = probability;
        self
    }

    pub const fn breakdown(&mut self, probability: f64, penalty: Duration) -> &mut Self {
        self.breakdown_probability = probability;
        self.breakdown_penalty = penalty;
        self
    }

    pub const fn approach_delay(&mut self, delay: Duration) -> &mut Self {
        self.approach_delay = delay;
        self
    }

    pub const fn exit_delay(&mut self, delay: Duration) -> &mut Self {
        self.exit_delay = delay;
        self
    }

    pub const fn overload_threshold(&mut self, threshold: usize) -> &mut Self {
        self.overload_threshold = threshold;
        self
    }

    pub const fn max_trains_in_system(&mut self, max: usize) -> &mut Self {
        self.max_trains_in_system = max;
        self
    }

    pub const fn hold_arrivals_while_overloaded(&mut self, hold: bool) -> &mut Self {
        self.hold_arrivals_while_overloaded = hold;
        self
    }

    /// # Errors
    ///
    /// * If any probability lies outside `[0, 1]` (or is NaN)
    /// * If the duration or the tick is zero
    /// * If the train capacity is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        for section in Section::ALL {
            let value = self.probability_for(section);
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidArrivalProbability { section, value });
            }
        }

        for (name, value) in [
            ("Long train probability", self.long_train_probability),
            ("Breakdown probability", self.breakdown_probability),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidProbability { name, value });
            }
        }

        if self.duration.is_zero() {
            return Err(ConfigError::ZeroDuration);
        }
        if self.tick.is_zero() {
            return Err(ConfigError::ZeroTick);
        }
        if self.max_trains_in_system == 0 {
            return Err(ConfigError::ZeroCapacity);
        }

        Ok(())
    }
}
