use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use heater_common::{safety, DeviceRecord, SafetyDecision};

use crate::thermostat::ThermostatController;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Controller was stopped; nothing was touched.
    Stopped,
    /// Reconnect failed; retried on the next tick.
    Offline,
    Synced(SafetyDecision),
    ForcedOff,
    /// The heater did not accept the forced off; the episode stays tracked.
    ForceOffFailed,
}

/// Periodic sync of one device record against its controller, driving the
/// safety shutoff.
pub struct Reconciler {
    controller: Arc<ThermostatController>,
    record: Arc<Mutex<DeviceRecord>>,
}

impl Reconciler {
    pub fn new(controller: Arc<ThermostatController>, record: Arc<Mutex<DeviceRecord>>) -> Self {
        Self { controller, record }
    }

    pub async fn tick(&self, now_ms: u64) -> TickOutcome {
        let device_id = self.controller.device_id();
        if self.controller.is_stopped() {
            return TickOutcome::Stopped;
        }

        if let Err(err) = self.controller.refresh().await {
            warn!("error in device reconnect attempt for {device_id}: {err}");
            return TickOutcome::Offline;
        }

        let decision = {
            let mut record = self.record.lock().await;
            record.state = self.controller.is_on();
            debug!("device synced: {record:?}");

            let decision = safety::evaluate(&record, now_ms);
            record.apply_safety(decision);
            decision
        };

        match decision {
            SafetyDecision::ForceOff { elapsed_secs } => {
                info!("device {device_id}: heating for {elapsed_secs}s, forcing off");
                match self.controller.turn_off().await {
                    Ok(()) => {
                        self.record.lock().await.clear_heating();
                        TickOutcome::ForcedOff
                    }
                    Err(err) => {
                        warn!("device {device_id}: safety shutoff failed: {err}");
                        TickOutcome::ForceOffFailed
                    }
                }
            }
            SafetyDecision::StartTracking { .. } => {
                debug!("device {device_id}: heating episode started");
                TickOutcome::Synced(decision)
            }
            _ => TickOutcome::Synced(decision),
        }
    }

    /// Runs ticks every `period` until the controller is stopped. The first
    /// tick fires one period after spawning.
    pub fn spawn(self, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = self.controller.stopped() => break,
                    _ = interval.tick() => {}
                }
                self.tick(now_ms()).await;
            }
            debug!(
                "reconciliation for device {} stopped",
                self.controller.device_id()
            );
        })
    }
}

pub fn now_ms() -> u64 {
    Utc::now().timestamp_millis().try_into().unwrap_or(0)
}
