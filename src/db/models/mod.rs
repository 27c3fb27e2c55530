pub mod attendance;
pub mod badge;
pub mod live;
pub mod session;
pub mod slot;

pub use attendance::{AttendanceRecord, AttendanceStatus};
pub use badge::BadgeEvent;
pub use live::LiveSnapshot;
pub use session::{CaptureSession, SessionOutcome};
pub use slot::TimetableSlot;
