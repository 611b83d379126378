use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use serde::Serialize;

use crate::control::domain::actuator_sink::{ActuatorError, ActuatorSink};
use crate::control::domain::control_command::ControlCommand;

/// Yaw rate at 100 % stick, in degrees per second.
pub const DEFAULT_MAX_YAW_RATE_DPS: f64 = 100.0;
/// Climb rate at 100 % stick, in centimetres per second.
pub const DEFAULT_MAX_VERTICAL_RATE_CMS: f64 = 100.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct SimulatedPose {
    /// Heading in `[0, 360)` degrees, clockwise.
    pub heading_deg: f64,
    /// Height above the take-off point, never below ground.
    pub altitude_cm: f64,
}

/// In-memory drone that integrates rc commands into a heading/altitude pose.
///
/// Each command stays in effect until the next one, as with the real rc
/// channel. Clones share the same simulated airframe so a caller can keep
/// one to inspect after handing another to the controller.
#[derive(Clone)]
pub struct SimulatedDrone {
    inner: Arc<Mutex<SimState>>,
}

struct SimState {
    connected: bool,
    pose: SimulatedPose,
    current: ControlCommand,
    last_update: Option<Instant>,
    history: Vec<ControlCommand>,
    max_yaw_rate_dps: f64,
    max_vertical_rate_cms: f64,
}

impl SimulatedDrone {
    pub fn new() -> Self {
        Self::with_rates(DEFAULT_MAX_YAW_RATE_DPS, DEFAULT_MAX_VERTICAL_RATE_CMS)
    }

    pub fn with_rates(max_yaw_rate_dps: f64, max_vertical_rate_cms: f64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SimState {
                connected: true,
                pose: SimulatedPose::default(),
                current: ControlCommand::HOVER,
                last_update: None,
                history: Vec::new(),
                max_yaw_rate_dps,
                max_vertical_rate_cms,
            })),
        }
    }

    /// Simulates a lost link: later sends fail with `Disconnected`.
    pub fn disconnect(&self) {
        self.lock().connected = false;
    }

    /// Pose integrated up to now.
    pub fn pose(&self) -> SimulatedPose {
        let mut state = self.lock();
        state.advance(Instant::now());
        state.pose
    }

    pub fn history(&self) -> Vec<ControlCommand> {
        self.lock().history.clone()
    }

    pub fn last_command(&self) -> Option<ControlCommand> {
        self.lock().history.last().copied()
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for SimulatedDrone {
    fn default() -> Self {
        Self::new()
    }
}

impl SimState {
    fn apply(&mut self, command: ControlCommand, now: Instant) {
        self.advance(now);
        self.current = command;
        self.history.push(command);
    }

    fn advance(&mut self, now: Instant) {
        if let Some(last) = self.last_update {
            let dt = now.saturating_duration_since(last).as_secs_f64();
            let yaw_rate = self.current.yaw as f64 / 100.0 * self.max_yaw_rate_dps;
            let climb_rate = self.current.vertical as f64 / 100.0 * self.max_vertical_rate_cms;
            self.pose.heading_deg = (self.pose.heading_deg + yaw_rate * dt).rem_euclid(360.0);
            self.pose.altitude_cm = (self.pose.altitude_cm + climb_rate * dt).max(0.0);
        }
        self.last_update = Some(now);
    }
}

impl ActuatorSink for SimulatedDrone {
    fn send_command(&mut self, command: ControlCommand) -> Result<(), ActuatorError> {
        let mut state = self.lock();
        if !state.connected {
            return Err(ActuatorError::Disconnected);
        }
        log::debug!("Simulated drone received rc {command}");
        state.apply(command, Instant::now());
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.lock().connected
    }
}
