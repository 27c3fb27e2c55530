pub mod engine;

pub use engine::{FusionEngine, FusionSummary};
