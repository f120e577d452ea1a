pub mod catalog;
pub mod config;
pub mod drill;
pub mod error;
pub mod events;
pub mod feedback;
pub mod io;
pub mod messages;
pub mod session_id;
pub mod tempo;

pub use crate::catalog::DrillCatalog;
pub use crate::config::EngineConfig;
pub use crate::drill::{Drill, DrillSummary, TimingThresholds, VelocityTargets, MAX_VELOCITY};
pub use crate::error::DomainError;
pub use crate::events::{HitEvent, HitKind};
pub use crate::feedback::{
    HitFeedback, MetronomeStatus, MetronomeTick, RollingFigures, Take, TakeMetrics,
};
pub use crate::io::DocumentFormat;
pub use crate::messages::{ClientMessage, ServerMessage};
pub use crate::session_id::SessionId;
pub use crate::tempo::Tempo;
