use std::time::SystemTime;

use serde::Serialize;

use crate::shared::constants::UNHEALTHY_FAILURE_THRESHOLD;

use super::control_command::ControlCommand;
use super::tracking_settings::TrackingSettings;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum DetectorHealth {
    #[default]
    Healthy,
    /// Several consecutive ticks failed to produce detections.
    DetectorUnhealthy,
}

/// Status record exposed to reporting layers.
///
/// Written only by the tracking loop (and by start/stop for `is_active`).
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TrackingState {
    pub is_active: bool,
    pub last_evaluation: Option<SystemTime>,
    pub face_detected: bool,
    pub last_command: Option<ControlCommand>,
    pub ticks: u64,
    pub commands_sent: u64,
    pub consecutive_detector_failures: u32,
    pub detector_health: DetectorHealth,
    pub settings: TrackingSettings,
    pub settings_version: u64,
}

impl TrackingState {
    /// Counts one failed detection; returns true on the transition to unhealthy.
    pub fn record_detector_failure(&mut self) -> bool {
        self.consecutive_detector_failures = self.consecutive_detector_failures.saturating_add(1);
        self.face_detected = false;
        let was_healthy = self.detector_health == DetectorHealth::Healthy;
        if self.consecutive_detector_failures >= UNHEALTHY_FAILURE_THRESHOLD {
            self.detector_health = DetectorHealth::DetectorUnhealthy;
        }
        was_healthy && self.detector_health == DetectorHealth::DetectorUnhealthy
    }

    /// Clears the failure streak; returns true when this ends an unhealthy period.
    pub fn record_detector_success(&mut self, face_detected: bool) -> bool {
        let recovered = self.detector_health == DetectorHealth::DetectorUnhealthy;
        self.consecutive_detector_failures = 0;
        self.detector_health = DetectorHealth::Healthy;
        self.face_detected = face_detected;
        recovered
    }

    pub fn record_command(&mut self, command: ControlCommand) {
        self.last_command = Some(command);
        self.commands_sent += 1;
    }

    /// Resets per-run counters at the start of a run.
    pub fn begin_run(&mut self, settings: TrackingSettings, settings_version: u64) {
        *self = TrackingState {
            is_active: true,
            settings,
            settings_version,
            ..TrackingState::default()
        };
    }
}
