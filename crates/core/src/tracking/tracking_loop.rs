use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use crate::control::domain::actuator_sink::ActuatorSink;
use crate::control::domain::centering_policy;
use crate::control::domain::control_command::ControlCommand;
use crate::control::domain::settings_store::SettingsStore;
use crate::control::domain::tracking_settings::TrackingSettings;
use crate::control::domain::tracking_state::TrackingState;
use crate::detection::infrastructure::detection_worker::{
    DetectionWorker, Observation, ObservationError,
};
use crate::shared::constants::{NO_FRAME_BACKOFF, POLL_INTERVAL};

use super::tracking_logger::TrackingLogger;

/// Everything the loop thread owns for one run.
pub(crate) struct LoopContext {
    pub worker: DetectionWorker,
    pub sink: Box<dyn ActuatorSink>,
    pub settings: SettingsStore,
    pub state: Arc<Mutex<TrackingState>>,
    pub cancelled: Arc<AtomicBool>,
    pub logger: Box<dyn TrackingLogger>,
}

/// What a tick decided.
#[derive(Debug, PartialEq)]
pub(crate) enum TickOutcome {
    /// No frame yet: leave the actuator alone.
    Skip,
    Send(ControlCommand),
}

/// Runs ticks until cancelled, then issues the final hover.
///
/// The sink lives on this thread and the hover is sent after the last tick,
/// so nothing can reach the drone after it. Returns the sink for reuse.
pub(crate) fn run(mut ctx: LoopContext) -> Box<dyn ActuatorSink> {
    log::info!("Face tracking loop started");
    let mut last_evaluation: Option<Instant> = None;
    let mut frame_size_warned: Option<(u32, u32, u64)> = None;

    while !ctx.is_cancelled() {
        let (settings, version) = ctx.settings.versioned_snapshot();

        if let Some(last) = last_evaluation {
            let elapsed = last.elapsed();
            // A zero interval still yields for one poll slice per tick.
            let interval = settings.detection_interval().max(POLL_INTERVAL);
            if elapsed < interval {
                thread::sleep(POLL_INTERVAL.min(interval - elapsed));
                continue;
            }
        }

        let tick_start = Instant::now();
        let observation = ctx.worker.observe(settings.detection_timeout());
        ctx.logger.timing("observe", elapsed_ms(tick_start));

        if ctx.is_cancelled() {
            break;
        }

        if let Ok(Observation::Detected {
            frame_width,
            frame_height,
            ..
        }) = &observation
        {
            let key = (*frame_width, *frame_height, version);
            if frame_size_warned != Some(key) {
                if let Err(e) = settings.validate_for_frame(*frame_width, *frame_height) {
                    log::warn!("Tracking cannot engage on {frame_width}x{frame_height} frames: {e}");
                }
                frame_size_warned = Some(key);
            }
        }

        let outcome = {
            let mut state = lock(&ctx.state);
            decide(observation, &settings, &mut state, &mut *ctx.logger)
        };

        let command = match outcome {
            TickOutcome::Skip => {
                log::debug!("No frame available, skipping tick");
                ctx.sleep_cancellable(NO_FRAME_BACKOFF);
                continue;
            }
            TickOutcome::Send(command) => command,
        };

        // A stop that arrived mid-tick wins over the command just computed.
        if ctx.is_cancelled() {
            break;
        }

        let delivered = ctx.send(command);
        {
            let mut state = lock(&ctx.state);
            state.ticks += 1;
            state.last_evaluation = Some(SystemTime::now());
            if delivered {
                state.record_command(command);
            }
        }
        last_evaluation = Some(tick_start);
    }

    let delivered = ctx.send(ControlCommand::HOVER);
    {
        let mut state = lock(&ctx.state);
        if delivered {
            state.record_command(ControlCommand::HOVER);
        }
        state.is_active = false;
        state.face_detected = false;
    }
    ctx.logger.summary();
    log::info!("Face tracking loop finished");
    ctx.sink
}

/// Turns one observation into a command, updating detector health.
///
/// Failures of any kind fall through to hover, as does a frame with no
/// qualifying face.
pub(crate) fn decide(
    observation: Result<Observation, ObservationError>,
    settings: &TrackingSettings,
    state: &mut TrackingState,
    logger: &mut dyn TrackingLogger,
) -> TickOutcome {
    match observation {
        Ok(Observation::NoFrame) => TickOutcome::Skip,
        Ok(Observation::Detected {
            frame_width,
            frame_height,
            faces,
            ..
        }) => {
            let target = centering_policy::select_target(&faces, settings.face_size_min);
            if state.record_detector_success(target.is_some()) {
                log::info!("Face detector recovered");
            }
            let command = match target {
                Some(face) => {
                    centering_policy::centering_command(face, frame_width, frame_height, settings)
                }
                None => ControlCommand::HOVER,
            };
            TickOutcome::Send(command)
        }
        Err(e) => {
            log::warn!("Detection failed, holding position: {e}");
            logger.failure(&e.to_string());
            if state.record_detector_failure() {
                log::warn!(
                    "Face detector unhealthy after {} consecutive failures",
                    state.consecutive_detector_failures
                );
            }
            TickOutcome::Send(ControlCommand::HOVER)
        }
    }
}

impl LoopContext {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Sends one command; actuator errors are logged and otherwise ignored.
    fn send(&mut self, command: ControlCommand) -> bool {
        let start = Instant::now();
        let result = self.sink.send_command(command);
        self.logger.timing("send", elapsed_ms(start));
        match result {
            Ok(()) => {
                self.logger.command(&command);
                true
            }
            Err(e) => {
                log::warn!("Failed to send rc {command}: {e}");
                false
            }
        }
    }

    fn sleep_cancellable(&self, total: Duration) {
        let deadline = Instant::now() + total;
        while !self.is_cancelled() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            thread::sleep(POLL_INTERVAL.min(remaining));
        }
    }
}

pub(crate) fn lock(state: &Mutex<TrackingState>) -> MutexGuard<'_, TrackingState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::domain::tracking_state::DetectorHealth;
    use crate::shared::face_detection::FaceDetection;
    use crate::tracking::tracking_logger::NullTrackingLogger;

    fn detected(faces: Vec<FaceDetection>) -> Result<Observation, ObservationError> {
        Ok(Observation::Detected {
            frame_width: 640,
            frame_height: 480,
            frame_index: 0,
            faces,
        })
    }

    fn run_decide(
        observation: Result<Observation, ObservationError>,
        settings: &TrackingSettings,
        state: &mut TrackingState,
    ) -> TickOutcome {
        decide(observation, settings, state, &mut NullTrackingLogger)
    }

    #[test]
    fn test_no_frame_skips() {
        let mut state = TrackingState::default();
        let outcome = run_decide(Ok(Observation::NoFrame), &TrackingSettings::default(), &mut state);
        assert_eq!(outcome, TickOutcome::Skip);
        assert_eq!(state.consecutive_detector_failures, 0);
    }

    #[test]
    fn test_repeated_empty_detections_hover_every_tick() {
        let settings = TrackingSettings::default();
        let mut state = TrackingState::default();
        let small = FaceDetection::from_xywh(0, 0, 10, 10);
        let outcomes: Vec<_> = (0..5)
            .map(|i| {
                let faces = if i % 2 == 0 { vec![] } else { vec![small.clone()] };
                run_decide(detected(faces), &settings, &mut state)
            })
            .collect();
        assert_eq!(
            outcomes,
            (0..5)
                .map(|_| TickOutcome::Send(ControlCommand::HOVER))
                .collect::<Vec<_>>()
        );
        assert!(!state.face_detected);
    }

    #[test]
    fn test_face_produces_centering_command() {
        let settings = TrackingSettings {
            rotation_speed: 30,
            ..TrackingSettings::default()
        };
        let mut state = TrackingState::default();
        let outcome = run_decide(
            detected(vec![FaceDetection::new(450, 240, 550, 340)]),
            &settings,
            &mut state,
        );
        assert_eq!(outcome, TickOutcome::Send(ControlCommand::centering(-7, 28)));
        assert!(state.face_detected);
    }

    #[test]
    fn test_failures_hover_and_escalate() {
        let settings = TrackingSettings::default();
        let mut state = TrackingState::default();
        for _ in 0..3 {
            let outcome = run_decide(
                Err(ObservationError::TimedOut(Duration::from_millis(5))),
                &settings,
                &mut state,
            );
            assert_eq!(outcome, TickOutcome::Send(ControlCommand::HOVER));
        }
        assert_eq!(state.detector_health, DetectorHealth::DetectorUnhealthy);

        run_decide(detected(vec![]), &settings, &mut state);
        assert_eq!(state.detector_health, DetectorHealth::Healthy);
        assert_eq!(state.consecutive_detector_failures, 0);
    }

    #[test]
    fn test_no_frame_does_not_reset_failure_streak() {
        let settings = TrackingSettings::default();
        let mut state = TrackingState::default();
        run_decide(Err(ObservationError::Busy), &settings, &mut state);
        run_decide(Ok(Observation::NoFrame), &settings, &mut state);
        assert_eq!(state.consecutive_detector_failures, 1);
    }
}
