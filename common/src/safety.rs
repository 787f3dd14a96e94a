//! Duration-bounded auto shutoff.
//!
//! Heating is only observed at reconciliation ticks, so an off period shorter
//! than one tick is invisible and the effective runtime can exceed the limit
//! by up to one tick period.

use crate::types::DeviceRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyDecision {
    /// No limit configured for this device.
    Disabled,
    /// Off and not tracked.
    Idle,
    /// Heating observed for the first time this episode.
    StartTracking { since_ms: u64 },
    /// Tracked episode ended because the device was observed off.
    Reset,
    Heating { remaining_secs: u64 },
    /// Limit reached; the heater must be turned off.
    ForceOff { elapsed_secs: u64 },
}

pub fn evaluate(record: &DeviceRecord, now_ms: u64) -> SafetyDecision {
    let Some(limit_secs) = record.disable_after_seconds else {
        return SafetyDecision::Disabled;
    };

    let Some(since_ms) = record.heating_since_ms else {
        return if record.state {
            SafetyDecision::StartTracking { since_ms: now_ms }
        } else {
            SafetyDecision::Idle
        };
    };

    if !record.state {
        return SafetyDecision::Reset;
    }

    let elapsed_secs = now_ms.saturating_sub(since_ms) / 1_000;
    if elapsed_secs < limit_secs {
        SafetyDecision::Heating {
            remaining_secs: limit_secs - elapsed_secs,
        }
    } else {
        SafetyDecision::ForceOff { elapsed_secs }
    }
}

impl DeviceRecord {
    /// Applies the record-side effect of a decision.
    ///
    /// `ForceOff` is left untouched: the episode is only cleared through
    /// [`DeviceRecord::clear_heating`] once the heater accepted the command.
    pub fn apply_safety(&mut self, decision: SafetyDecision) {
        match decision {
            SafetyDecision::StartTracking { since_ms } => self.heating_since_ms = Some(since_ms),
            SafetyDecision::Reset => self.heating_since_ms = None,
            SafetyDecision::Disabled
            | SafetyDecision::Idle
            | SafetyDecision::Heating { .. }
            | SafetyDecision::ForceOff { .. } => {}
        }
    }

    pub fn clear_heating(&mut self) {
        self.heating_since_ms = None;
    }

    pub fn heating_for_secs(&self, now_ms: u64) -> u64 {
        self.heating_since_ms
            .map(|since| now_ms.saturating_sub(since) / 1_000)
            .unwrap_or(0)
    }
}
