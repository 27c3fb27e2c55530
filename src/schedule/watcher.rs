use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Local};
use log::{error, info, warn};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    config::EngineConfig,
    db::{models::TimetableSlot, Database},
    sampling::SessionController,
};

/// Deterministic choice among overlapping slots: lowest id wins. More than
/// one covering slot is a timetable curation problem, reported but tolerated.
fn select_slot(mut slots: Vec<TimetableSlot>) -> Option<TimetableSlot> {
    if slots.len() > 1 {
        let ids: Vec<i64> = slots.iter().map(|slot| slot.slot_id).collect();
        warn!("overlapping timetable slots {ids:?} cover the same instant; picking the lowest id");
    }
    slots.sort_by_key(|slot| slot.slot_id);
    slots.into_iter().next()
}

/// Watches the timetable and drives the session controller.
///
/// Pure polling: every tick it asks "which slot covers now?" and reconciles
/// the controller against the answer. A failed tick changes nothing and is
/// retried on the next one.
pub struct SlotWatcher {
    db: Database,
    controller: SessionController,
    poll_interval: Duration,
}

impl SlotWatcher {
    pub fn new(db: Database, controller: SessionController, config: &EngineConfig) -> Self {
        Self {
            db,
            controller,
            poll_interval: Duration::from_secs(config.poll_interval_secs),
        }
    }

    pub async fn run(self, cancel_token: CancellationToken) {
        info!(
            "slot watcher started, polling every {}s",
            self.poll_interval.as_secs()
        );

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.tick().await {
                        error!("schedule poll failed, retrying next tick: {err:#}");
                    }
                }
                _ = cancel_token.cancelled() => {
                    info!("slot watcher shutting down");
                    break;
                }
            }
        }
    }

    pub async fn tick(&self) -> Result<()> {
        // A worker that ended on its own (duration elapsed, capture gave
        // up) is closed out before looking at the timetable, so its records
        // are finalized within one poll cadence.
        if let Err(err) = self.controller.reap_finished().await {
            error!("failed to close self-ended session: {err:#}");
        }

        self.tick_at(Local::now()).await
    }

    /// One reconciliation pass against the timetable at the given instant.
    /// Separated from `tick()` so tests can drive any wall-clock moment.
    pub async fn tick_at(&self, now: DateTime<Local>) -> Result<()> {
        let day = now.format("%A").to_string();
        let time = now.format("%H:%M").to_string();

        let slots = self.db.find_slots_at(&day, &time).await?;
        let next = select_slot(slots);
        let current = self.controller.active_slot_id().await;

        match (current, next) {
            (Some(current_id), Some(slot)) if current_id == slot.slot_id => Ok(()),
            (Some(_), Some(slot)) => {
                // Slot change: the outgoing session must finalize before the
                // camera can be handed to the next class.
                if let Err(err) = self.controller.stop().await {
                    error!("failed to close outgoing session: {err:#}");
                }
                self.controller.start(&slot).await
            }
            (Some(_), None) => self.controller.stop().await,
            (None, Some(slot)) => self.controller.start(&slot).await,
            (None, None) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(slot_id: i64) -> TimetableSlot {
        TimetableSlot {
            slot_id,
            subject_id: 1,
            class_id: 1,
            teacher_id: 1,
            day: "Monday".into(),
            start_time: "09:00".into(),
            end_time: "10:00".into(),
            subject_name: "Math".into(),
            class_name: "CS-A".into(),
            teacher_name: "R. Iyer".into(),
        }
    }

    #[test]
    fn overlap_resolves_to_the_lowest_id() {
        let picked = select_slot(vec![slot(4), slot(2), slot(9)]).unwrap();
        assert_eq!(picked.slot_id, 2);
    }

    #[test]
    fn overlap_choice_is_stable_across_calls() {
        for _ in 0..10 {
            let picked = select_slot(vec![slot(7), slot(3)]).unwrap();
            assert_eq!(picked.slot_id, 3);
        }
    }

    #[test]
    fn empty_result_selects_nothing() {
        assert!(select_slot(Vec::new()).is_none());
    }
}
