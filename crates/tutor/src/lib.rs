pub mod clock;
pub mod error;
pub mod grid;
pub mod matcher;
pub mod metronome;
pub mod rolling;
pub mod scoring;
pub mod session;
pub mod store;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use error::TutorError;
pub use grid::{Grid, GridBuilder};
pub use matcher::{nearest_slot, SlotMatch};
pub use metronome::{MetronomeClock, SharedEngine};
pub use rolling::RollingAggregator;
pub use scoring::{dynamics_score, timing_score, DynamicsScore};
pub use session::{HitRecord, SessionEngine, SessionOptions};
pub use store::{NewSession, PracticeSession, SessionStore};
