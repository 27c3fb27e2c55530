pub mod matcher;
pub mod provider;
pub mod registry;

pub use matcher::IdentityMatcher;
pub use provider::{BoundingBox, CaptureError, CommandAnalyzer, Detection, FrameAnalyzer};
pub use registry::{IdentityProfile, IdentityRegistry};
