pub mod controller;
pub mod tracker;
pub mod worker;

pub use controller::{SessionController, SessionPhase};
pub use tracker::{PresenceRecord, PresenceTracker};
pub use worker::{sampling_loop, SamplerConfig, SamplerReport};
