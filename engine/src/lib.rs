pub mod admin;
pub mod admission;
pub mod engine;
pub mod outcome;
pub mod plan;

pub use admin::{AdminOps, ViewPrize};
pub use admission::{AdmissionGate, Limits};
pub use engine::{EngineConfig, Entrant, LotteryEngine};
pub use outcome::{DenyReason, EngineError, Outcome, WonPrize};
