pub mod watcher;

pub use watcher::SlotWatcher;
