use std::{sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, Utc};
use log::{error, info, warn};
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
    time::timeout,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    config::EngineConfig,
    db::{
        models::{CaptureSession, SessionOutcome, TimetableSlot},
        Database,
    },
    fusion::FusionEngine,
    recognition::{FrameAnalyzer, IdentityMatcher, IdentityRegistry},
};

use super::{
    tracker::PresenceRecord,
    worker::{sampling_loop, SamplerConfig, SamplerReport},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Active,
    Closing,
}

struct ActiveSession {
    log_id: String,
    slot_id: i64,
    subject_id: i64,
    opened_at: DateTime<Utc>,
    cancel_token: CancellationToken,
    handle: JoinHandle<SamplerReport>,
    progress: watch::Receiver<Vec<PresenceRecord>>,
}

enum SessionState {
    Idle,
    Active(ActiveSession),
    Closing,
}

impl SessionState {
    fn phase(&self) -> SessionPhase {
        match self {
            SessionState::Idle => SessionPhase::Idle,
            SessionState::Active(_) => SessionPhase::Active,
            SessionState::Closing => SessionPhase::Closing,
        }
    }
}

/// Owner of the single capture session.
///
/// The camera is exclusive, so session lifecycle is strictly serialized:
/// the state lock is held across the whole stop-and-finalize sequence, and a
/// `start` for the next slot waits until the previous session has fully
/// closed. This is the one hard mutual-exclusion rule in the engine.
#[derive(Clone)]
pub struct SessionController {
    state: Arc<Mutex<SessionState>>,
    db: Database,
    config: EngineConfig,
    analyzer: Arc<dyn FrameAnalyzer>,
    registry: Arc<IdentityRegistry>,
    fusion: FusionEngine,
}

impl SessionController {
    pub fn new(
        db: Database,
        config: EngineConfig,
        analyzer: Arc<dyn FrameAnalyzer>,
        registry: Arc<IdentityRegistry>,
        fusion: FusionEngine,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState::Idle)),
            db,
            config,
            analyzer,
            registry,
            fusion,
        }
    }

    pub async fn phase(&self) -> SessionPhase {
        self.state.lock().await.phase()
    }

    /// Slot the current session is bound to, if one is running.
    pub async fn active_slot_id(&self) -> Option<i64> {
        match &*self.state.lock().await {
            SessionState::Active(session) => Some(session.slot_id),
            _ => None,
        }
    }

    /// Begin capture for a slot. Calling this while another session is
    /// active is a contract violation — the watcher always routes through
    /// `stop()` first.
    pub async fn start(&self, slot: &TimetableSlot) -> Result<()> {
        let mut state = self.state.lock().await;
        if !matches!(*state, SessionState::Idle) {
            bail!(
                "cannot start capture for slot {}: a session is already active",
                slot.slot_id
            );
        }

        info!(
            "class started: {} for {} with {} ({}-{}), slot {}",
            slot.subject_name,
            slot.class_name,
            slot.teacher_name,
            slot.start_time,
            slot.end_time,
            slot.slot_id
        );

        let opened_at = Utc::now();
        let log_id = Uuid::new_v4().to_string();

        self.db
            .clear_live_state()
            .await
            .context("failed to reset live attendance view")?;
        self.db
            .insert_capture_session(&CaptureSession {
                id: log_id.clone(),
                slot_id: slot.slot_id,
                subject_id: slot.subject_id,
                opened_at,
                closed_at: None,
                outcome: None,
            })
            .await
            .context("failed to record capture session")?;

        let cancel_token = CancellationToken::new();
        let (progress_tx, progress_rx) = watch::channel(Vec::new());
        let matcher =
            IdentityMatcher::new(Arc::clone(&self.registry), self.config.match_threshold);

        let handle = tokio::spawn(sampling_loop(
            slot.subject_id,
            SamplerConfig::from_engine(&self.config),
            Arc::clone(&self.analyzer),
            matcher,
            Arc::clone(&self.registry),
            self.db.clone(),
            cancel_token.clone(),
            progress_tx,
        ));

        *state = SessionState::Active(ActiveSession {
            log_id,
            slot_id: slot.slot_id,
            subject_id: slot.subject_id,
            opened_at,
            cancel_token,
            handle,
            progress: progress_rx,
        });

        Ok(())
    }

    /// End the current session: cancel the worker, wait for its final
    /// records under a bounded timeout, then finalize attendance. A no-op
    /// when no session is running.
    pub async fn stop(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let session = match std::mem::replace(&mut *state, SessionState::Closing) {
            SessionState::Active(session) => session,
            other => {
                *state = other;
                return Ok(());
            }
        };

        let result = self.shutdown_and_finalize(session).await;
        *state = SessionState::Idle;
        result
    }

    /// Close out a worker that ended on its own (class duration elapsed or
    /// the capture source gave up), so finalize does not wait for the slot
    /// boundary. Returns whether a session was reaped.
    pub async fn reap_finished(&self) -> Result<bool> {
        let mut state = self.state.lock().await;
        let session = match std::mem::replace(&mut *state, SessionState::Closing) {
            SessionState::Active(session) if session.handle.is_finished() => session,
            other => {
                *state = other;
                return Ok(false);
            }
        };

        info!(
            "sampling worker for slot {} ended on its own; closing session",
            session.slot_id
        );
        let result = self.shutdown_and_finalize(session).await;
        *state = SessionState::Idle;
        result.map(|()| true)
    }

    async fn shutdown_and_finalize(&self, session: ActiveSession) -> Result<()> {
        let ActiveSession {
            log_id,
            slot_id,
            subject_id,
            opened_at,
            cancel_token,
            mut handle,
            progress,
        } = session;

        cancel_token.cancel();

        let stop_timeout = Duration::from_secs(self.config.stop_timeout_secs);
        let (records, outcome) = match timeout(stop_timeout, &mut handle).await {
            Ok(Ok(report)) => (report.records, report.outcome),
            Ok(Err(join_err)) => {
                error!("sampling worker for slot {slot_id} died: {join_err}");
                (progress.borrow().clone(), SessionOutcome::Aborted)
            }
            Err(_) => {
                warn!(
                    "sampling worker for slot {slot_id} ignored stop for {}s; forcing termination",
                    self.config.stop_timeout_secs
                );
                handle.abort();
                (progress.borrow().clone(), SessionOutcome::Aborted)
            }
        };

        if let Err(err) = self
            .db
            .close_capture_session(&log_id, Utc::now(), outcome)
            .await
        {
            error!("failed to close capture session log {log_id}: {err:#}");
        }

        let date = opened_at.with_timezone(&Local).date_naive();
        let summary = self
            .fusion
            .finalize(subject_id, date, &records)
            .await
            .with_context(|| format!("finalize failed for slot {slot_id}"))?;

        info!(
            "class ended: slot {slot_id} closed ({}), {} present / {} absent",
            outcome.as_str(),
            summary.present,
            summary.absent
        );

        Ok(())
    }
}
