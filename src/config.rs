use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Engine tuning knobs, loaded once at startup from a JSON file.
///
/// Missing file or missing fields fall back to the reference defaults, so a
/// fresh deployment runs without any configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Timetable poll cadence for the slot watcher, in seconds.
    pub poll_interval_secs: u64,
    /// Presence sampling cadence, in seconds.
    pub sample_interval_secs: u64,
    /// Upper bound on a single detector call before the tick is dropped.
    pub detect_timeout_secs: u64,
    /// How long stop() waits for the sampling worker before forcing it down.
    pub stop_timeout_secs: u64,
    /// Backstop on session length; the worker exits on its own past this.
    pub class_duration_minutes: u64,
    /// Minutes of visual presence required for the live "Present" indicator.
    pub required_present_minutes: u64,
    /// Fusion-level gate: minimum wall-clock minutes between first and last
    /// sighting for a badge-confirmed student to be marked Present.
    ///
    /// Independent of `required_present_minutes`; the two gates are computed
    /// differently (wall-clock span vs. tick ratio) and tuned separately.
    pub min_duration_minutes: u64,
    /// Cosine-distance cutoff for identity matching.
    pub match_threshold: f32,
    /// Consecutive acquisition failures tolerated before the session aborts.
    pub max_acquisition_failures: u32,
    /// External detector command invoked once per sampling tick.
    pub detector_command: String,
    pub detector_args: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            sample_interval_secs: 1,
            detect_timeout_secs: 10,
            stop_timeout_secs: 10,
            class_duration_minutes: 60,
            required_present_minutes: 50,
            min_duration_minutes: 30,
            match_threshold: 0.50,
            max_acquisition_failures: 10,
            detector_command: "rollcall-detector".into(),
            detector_args: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse config at {}", path.display()))
    }

    /// Tick-ratio threshold for the live presence indicator.
    ///
    /// Zero when the class duration is zero, so a misconfigured timetable
    /// cannot divide by zero.
    pub fn required_presence_ratio(&self) -> f64 {
        if self.class_duration_minutes == 0 {
            return 0.0;
        }
        self.required_present_minutes as f64 / self.class_duration_minutes as f64
    }
}
