#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Simulation of a single-lane metro tunnel fed from four sections.
//!
//! Trains arrive at random on sections `AC`, `BC`, `DE` and `DF` and queue at
//! their section's [`FairSemaphore`]. Once per tick the [`TunnelArbiter`]
//! releases one train from the section with the most waiting trains. A
//! released train takes the tunnel exclusively, may break down inside it,
//! and is logged to the [`EventSink`] once it departs.
//!
//! ```rust,no_run
//! # async fn run() -> Result<(), metro_tunnel::SimulationError> {
//! use std::time::Duration;
//!
//! use metro_tunnel::{Simulation, SimulationConfig};
//!
//! let report = Simulation::new(SimulationConfig::new(0.5, Duration::from_secs(60)))?
//!     .run()
//!     .await?;
//!
//! println!("{} trains crossed", report.completed);
//! # Ok(())
//! # }
//! ```

pub mod arbiter;
pub mod clock;
pub mod config;
pub mod contention;
pub mod error;
pub mod events;
pub mod generator;
pub mod registry;
pub mod section;
pub mod semaphore;
pub mod simulation;
pub mod train;
pub mod tunnel;
pub mod worker;

pub use arbiter::{OverloadTransition, TickOutcome, TunnelArbiter};
pub use config::{ArrivalProfile, SimulationConfig};
pub use error::{ConfigError, SimulationError};
pub use events::{EventSink, LogFormat, TrainRecord, TunnelEvent, TunnelEventKind};
pub use generator::Generator;
pub use registry::TrainRegistry;
pub use section::Section;
pub use semaphore::{AcquireError, FairSemaphore};
pub use simulation::{Simulation, SimulationReport};
pub use train::{Train, TrainId};
pub use tunnel::{Tunnel, TunnelState};
pub use worker::{TrainOutcome, TrainPool, TrainWorker};
