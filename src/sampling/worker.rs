use std::{collections::HashSet, sync::Arc, time::Duration};

use chrono::Utc;
use log::{error, info, warn};
use tokio::{
    sync::watch,
    time::{interval, timeout, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    config::EngineConfig,
    db::{
        models::{AttendanceStatus, LiveSnapshot, SessionOutcome},
        Database,
    },
    recognition::{CaptureError, Detection, FrameAnalyzer, IdentityMatcher, IdentityRegistry},
};

use super::tracker::{PresenceRecord, PresenceTracker};

/// The slice of engine configuration the worker needs per session.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    pub sample_interval: Duration,
    pub detect_timeout: Duration,
    pub class_duration: Duration,
    pub max_acquisition_failures: u32,
    pub required_presence_ratio: f64,
}

impl SamplerConfig {
    pub fn from_engine(config: &EngineConfig) -> Self {
        Self {
            sample_interval: Duration::from_secs(config.sample_interval_secs),
            detect_timeout: Duration::from_secs(config.detect_timeout_secs),
            class_duration: Duration::from_secs(config.class_duration_minutes * 60),
            max_acquisition_failures: config.max_acquisition_failures,
            required_presence_ratio: config.required_presence_ratio(),
        }
    }
}

/// What the worker hands back when it ends, by whichever path.
#[derive(Debug, Clone)]
pub struct SamplerReport {
    pub records: Vec<PresenceRecord>,
    pub outcome: SessionOutcome,
}

/// One session's sampling loop. Owns the capture resource for the whole
/// `Active` interval; cancellation takes effect at the next tick boundary,
/// never mid-frame.
///
/// Exits on its own when the class duration elapses or the capture source
/// stays down for `max_acquisition_failures` consecutive ticks. The latest
/// record set is republished on `progress` after every counted tick, so the
/// controller still has data if it ever has to force the task down.
pub async fn sampling_loop(
    subject_id: i64,
    config: SamplerConfig,
    analyzer: Arc<dyn FrameAnalyzer>,
    matcher: IdentityMatcher,
    registry: Arc<IdentityRegistry>,
    db: Database,
    cancel_token: CancellationToken,
    progress: watch::Sender<Vec<PresenceRecord>>,
) -> SamplerReport {
    let mut ticker = interval(config.sample_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let started = Instant::now();
    let mut tracker = PresenceTracker::new();
    let mut consecutive_acquisition_failures: u32 = 0;
    let mut outcome = SessionOutcome::Completed;

    info!("sampling started for subject {subject_id}");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if started.elapsed() >= config.class_duration {
                    info!("class duration elapsed for subject {subject_id}; ending capture");
                    break;
                }

                match sample_once(&config, &analyzer).await {
                    Ok(detections) => {
                        consecutive_acquisition_failures = 0;
                        let seen = resolve_matches(&matcher, &detections);
                        tracker.record_tick(&seen, Utc::now());
                        let _ = progress.send(tracker.records());
                        publish_live(&db, &registry, &tracker, &seen, config.required_presence_ratio).await;
                    }
                    Err(CaptureError::Detection(reason)) => {
                        // Skipped entirely: neither denominator nor counters move.
                        warn!("detection failed for subject {subject_id}, tick skipped: {reason}");
                    }
                    Err(CaptureError::Acquisition(reason)) => {
                        consecutive_acquisition_failures += 1;
                        warn!(
                            "capture source failure {consecutive_acquisition_failures}/{} for subject {subject_id}: {reason}",
                            config.max_acquisition_failures
                        );
                        if consecutive_acquisition_failures >= config.max_acquisition_failures {
                            error!("capture source unrecoverable for subject {subject_id}; aborting session early");
                            outcome = SessionOutcome::Aborted;
                            break;
                        }
                    }
                }
            }
            _ = cancel_token.cancelled() => {
                info!("sampling for subject {subject_id} shutting down");
                break;
            }
        }
    }

    let records = tracker.records();
    let _ = progress.send(records.clone());
    SamplerReport { records, outcome }
}

async fn sample_once(
    config: &SamplerConfig,
    analyzer: &Arc<dyn FrameAnalyzer>,
) -> Result<Vec<Detection>, CaptureError> {
    let analyzer = Arc::clone(analyzer);
    let detect = tokio::task::spawn_blocking(move || analyzer.detect());

    match timeout(config.detect_timeout, detect).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(CaptureError::Acquisition(format!(
            "detector worker died: {join_err}"
        ))),
        Err(_) => Err(CaptureError::Acquisition(format!(
            "detector timed out after {:?}",
            config.detect_timeout
        ))),
    }
}

/// Identities matched at least once in this tick's detections, deduplicated.
/// Unknown faces resolve to nothing and never reach the tracker.
fn resolve_matches(matcher: &IdentityMatcher, detections: &[Detection]) -> HashSet<i64> {
    let mut seen = HashSet::new();
    for detection in detections {
        if let Some(identity_id) = matcher.resolve(&detection.descriptor) {
            seen.insert(identity_id);
        }
    }
    seen
}

/// Push this tick's sightings to the dashboard view. Failures are logged and
/// dropped — the live sink is eventually consistent and must never stall the
/// sampling cadence.
async fn publish_live(
    db: &Database,
    registry: &Arc<IdentityRegistry>,
    tracker: &PresenceTracker,
    seen: &HashSet<i64>,
    required_presence_ratio: f64,
) {
    for &identity_id in seen {
        let Some(record) = tracker.record_for(identity_id) else {
            continue;
        };
        let (Some(entry), Some(exit)) = (record.first_seen, record.last_seen) else {
            continue;
        };

        let status = if record.ratio() >= required_presence_ratio {
            AttendanceStatus::Present
        } else {
            AttendanceStatus::Absent
        };

        let snapshot = LiveSnapshot {
            identity_id,
            name: registry
                .name_of(identity_id)
                .unwrap_or("unknown")
                .to_string(),
            entry,
            exit,
            duration_minutes: record.duration_minutes(),
            status,
        };

        if let Err(err) = db.upsert_live_snapshot(&snapshot).await {
            error!("failed to publish live snapshot for identity {identity_id}: {err:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::{BoundingBox, IdentityProfile};
    use std::sync::Mutex;

    fn test_registry() -> Arc<IdentityRegistry> {
        Arc::new(
            IdentityRegistry::from_profiles(vec![IdentityProfile {
                id: 7,
                name: "Sana".into(),
                descriptor: vec![1.0, 0.0],
            }])
            .unwrap(),
        )
    }

    fn detection(descriptor: Vec<f32>) -> Detection {
        Detection {
            descriptor,
            bounding_box: BoundingBox {
                x: 0,
                y: 0,
                width: 64,
                height: 64,
            },
        }
    }

    /// Replays a scripted sequence of tick results; once the script runs
    /// out it cancels the session, so tests never depend on wall-clock
    /// sleeps lining up with the sampling cadence.
    struct ScriptedAnalyzer {
        script: Mutex<Vec<Result<Vec<Detection>, CaptureError>>>,
        done: CancellationToken,
    }

    impl ScriptedAnalyzer {
        fn new(mut script: Vec<Result<Vec<Detection>, CaptureError>>, done: CancellationToken) -> Self {
            script.reverse();
            Self {
                script: Mutex::new(script),
                done,
            }
        }
    }

    impl FrameAnalyzer for ScriptedAnalyzer {
        fn detect(&self) -> Result<Vec<Detection>, CaptureError> {
            match self.script.lock().unwrap().pop() {
                Some(result) => result,
                None => {
                    self.done.cancel();
                    Ok(Vec::new())
                }
            }
        }
    }

    fn sampler_config() -> SamplerConfig {
        SamplerConfig {
            sample_interval: Duration::from_millis(5),
            detect_timeout: Duration::from_secs(5),
            class_duration: Duration::from_secs(3600),
            max_acquisition_failures: 3,
            required_presence_ratio: 0.8,
        }
    }

    async fn run_loop(script: Vec<Result<Vec<Detection>, CaptureError>>) -> SamplerReport {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("rollcall.sqlite3")).unwrap();
        let registry = test_registry();
        let matcher = IdentityMatcher::new(Arc::clone(&registry), 0.5);
        let cancel_token = CancellationToken::new();
        let (progress_tx, _progress_rx) = watch::channel(Vec::new());
        let analyzer = ScriptedAnalyzer::new(script, cancel_token.clone());

        sampling_loop(
            1,
            sampler_config(),
            Arc::new(analyzer),
            matcher,
            registry,
            db,
            cancel_token,
            progress_tx,
        )
        .await
    }

    #[tokio::test]
    async fn detection_failures_skip_both_counters() {
        // Two good ticks around five failed detections.
        let mut script = vec![Ok(vec![detection(vec![1.0, 0.0])])];
        for _ in 0..5 {
            script.push(Err(CaptureError::Detection("blur".into())));
        }
        script.push(Ok(vec![detection(vec![1.0, 0.0])]));

        let report = run_loop(script).await;

        let record = report
            .records
            .iter()
            .find(|r| r.identity_id == 7)
            .expect("identity tracked");
        // The five failed ticks count toward neither numerator nor
        // denominator; only counted ticks reach the tracker.
        assert_eq!(record.matched_ticks, 2);
        assert!(record.total_ticks >= record.matched_ticks);
        assert_eq!(report.outcome, SessionOutcome::Completed);
    }

    #[tokio::test]
    async fn persistent_acquisition_failure_aborts_early() {
        let script = (0..4)
            .map(|_| Err(CaptureError::Acquisition("camera gone".into())))
            .collect();

        let report = run_loop(script).await;
        assert_eq!(report.outcome, SessionOutcome::Aborted);
        assert!(report.records.is_empty());
    }

    #[tokio::test]
    async fn acquisition_failure_streak_resets_on_success() {
        let script = vec![
            Err(CaptureError::Acquisition("camera gone".into())),
            Err(CaptureError::Acquisition("camera gone".into())),
            Ok(vec![detection(vec![1.0, 0.0])]),
            Err(CaptureError::Acquisition("camera gone".into())),
            Err(CaptureError::Acquisition("camera gone".into())),
        ];

        let report = run_loop(script).await;
        assert_eq!(report.outcome, SessionOutcome::Completed);
    }

    #[tokio::test]
    async fn unknown_faces_never_touch_counters() {
        let script = vec![Ok(vec![detection(vec![0.0, 1.0])])];

        let report = run_loop(script).await;
        assert!(report.records.is_empty());
        assert!(report.records.iter().all(|r| r.matched_ticks == 0));
    }
}
