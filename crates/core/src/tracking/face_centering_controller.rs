use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use serde_json::{Map, Value};
use thiserror::Error;

use crate::control::domain::actuator_sink::ActuatorSink;
use crate::control::domain::settings_store::SettingsStore;
use crate::control::domain::tracking_settings::{SettingsError, SettingsUpdate, TrackingSettings};
use crate::control::domain::tracking_state::TrackingState;
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::infrastructure::detection_worker::DetectionWorker;
use crate::video::domain::frame_source::FrameSource;

use super::tracking_logger::{LogTrackingLogger, TrackingLogger};
use super::tracking_loop::{self, LoopContext};

#[derive(Error, Debug)]
pub enum TrackingError {
    #[error("cannot start face tracking: {0}")]
    NotReady(String),
    #[error("face tracking is already running")]
    AlreadyRunning,
    #[error("invalid tracking settings: {0}")]
    InvalidSettings(#[from] SettingsError),
    #[error("failed to spawn tracking thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("tracking loop panicked")]
    LoopPanicked,
}

/// Result of a successful [`FaceCenteringController::stop`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    /// Nothing was running for that handle; no-op.
    AlreadyStopped,
}

/// Identifies one run started by [`FaceCenteringController::start`].
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a run can only be stopped through its handle or stop_active"]
pub struct TrackingHandle {
    run_id: u64,
}

impl TrackingHandle {
    pub fn run_id(&self) -> u64 {
        self.run_id
    }
}

pub type LoggerFactory = Box<dyn Fn() -> Box<dyn TrackingLogger> + Send + Sync>;

struct ActiveRun {
    id: u64,
    cancelled: Arc<AtomicBool>,
    thread: JoinHandle<Box<dyn ActuatorSink>>,
}

/// Keeps a detected face centred in the drone camera by issuing yaw and
/// vertical rc commands from a background loop.
///
/// The detector is injected once; the frame source and actuator are handed
/// over per run. All methods take `&self` and may be called from any thread.
pub struct FaceCenteringController {
    detector: Arc<dyn FaceDetector>,
    settings: SettingsStore,
    state: Arc<Mutex<TrackingState>>,
    active: Mutex<Option<ActiveRun>>,
    next_run_id: AtomicU64,
    logger_factory: LoggerFactory,
}

impl FaceCenteringController {
    pub fn new(detector: Arc<dyn FaceDetector>) -> Self {
        Self {
            detector,
            settings: SettingsStore::default(),
            state: Arc::new(Mutex::new(TrackingState::default())),
            active: Mutex::new(None),
            next_run_id: AtomicU64::new(1),
            logger_factory: Box::new(|| Box::new(LogTrackingLogger::new())),
        }
    }

    /// Replaces the per-run logger; each run gets a fresh instance.
    pub fn with_logger_factory(mut self, factory: LoggerFactory) -> Self {
        self.logger_factory = factory;
        self
    }

    /// Starts the tracking loop with `settings` as the live settings.
    pub fn start(
        &self,
        frame_source: Box<dyn FrameSource>,
        actuator: Box<dyn ActuatorSink>,
        settings: TrackingSettings,
    ) -> Result<TrackingHandle, TrackingError> {
        let mut active = self.lock_active();
        if let Some(run) = active.take() {
            if !run.thread.is_finished() {
                *active = Some(run);
                return Err(TrackingError::AlreadyRunning);
            }
            // The previous loop ended on its own (it only does so by panicking).
            if run.thread.join().is_err() {
                log::warn!("Previous tracking run {} had panicked", run.id);
            }
        }

        if !frame_source.is_available() {
            return Err(TrackingError::NotReady("no video stream available".into()));
        }
        if !actuator.is_connected() {
            return Err(TrackingError::NotReady("drone not connected".into()));
        }
        settings.validate()?;

        let worker =
            DetectionWorker::spawn(frame_source, self.detector.clone()).map_err(TrackingError::Spawn)?;

        let version = self.settings.replace(settings.clone());
        self.lock_state().begin_run(settings, version);

        let id = self.next_run_id.fetch_add(1, Ordering::SeqCst);
        let cancelled = Arc::new(AtomicBool::new(false));
        let ctx = LoopContext {
            worker,
            sink: actuator,
            settings: self.settings.clone(),
            state: self.state.clone(),
            cancelled: cancelled.clone(),
            logger: (self.logger_factory)(),
        };

        let thread = thread::Builder::new()
            .name(format!("facetrack-loop-{id}"))
            .spawn(move || tracking_loop::run(ctx))
            .map_err(|e| {
                self.lock_state().is_active = false;
                TrackingError::Spawn(e)
            })?;

        *active = Some(ActiveRun {
            id,
            cancelled,
            thread,
        });
        log::info!("Face tracking started (run {id})");
        Ok(TrackingHandle { run_id: id })
    }

    /// Stops the run behind `handle` and waits for its final hover command.
    ///
    /// Stale handles and repeated calls return `AlreadyStopped`.
    pub fn stop(&self, handle: &TrackingHandle) -> Result<StopOutcome, TrackingError> {
        self.stop_matching(|run| run.id == handle.run_id)
    }

    /// Stops whatever run is active, if any.
    pub fn stop_active(&self) -> Result<StopOutcome, TrackingError> {
        self.stop_matching(|_| true)
    }

    /// Lenient merge into the live settings; never fails.
    ///
    /// A running loop picks the change up on its next tick.
    pub fn update_settings(&self, partial: &Map<String, Value>) -> SettingsUpdate {
        let update = self.settings.merge(partial);
        if update.changed() {
            log::info!(
                "Tracking settings updated: {} (version {})",
                update.applied.join(", "),
                update.version
            );
        }
        update
    }

    pub fn settings(&self) -> Arc<TrackingSettings> {
        self.settings.snapshot()
    }

    /// Current state, with the live settings filled in.
    pub fn status(&self) -> TrackingState {
        let mut state = self.lock_state().clone();
        let (settings, version) = self.settings.versioned_snapshot();
        state.settings = (*settings).clone();
        state.settings_version = version;
        state
    }

    pub fn is_running(&self) -> bool {
        self.lock_active()
            .as_ref()
            .is_some_and(|run| !run.thread.is_finished())
    }

    fn stop_matching(
        &self,
        matches: impl FnOnce(&ActiveRun) -> bool,
    ) -> Result<StopOutcome, TrackingError> {
        let mut active = self.lock_active();
        let run = match active.take() {
            Some(run) if matches(&run) => run,
            other => {
                *active = other;
                return Ok(StopOutcome::AlreadyStopped);
            }
        };

        run.cancelled.store(true, Ordering::SeqCst);
        match run.thread.join() {
            Ok(_sink) => {
                log::info!("Face tracking stopped (run {})", run.id);
                Ok(StopOutcome::Stopped)
            }
            Err(_) => {
                self.lock_state().is_active = false;
                Err(TrackingError::LoopPanicked)
            }
        }
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<ActiveRun>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_state(&self) -> MutexGuard<'_, TrackingState> {
        tracking_loop::lock(&self.state)
    }
}

impl Drop for FaceCenteringController {
    fn drop(&mut self) {
        if let Err(e) = self.stop_active() {
            log::warn!("Error while stopping face tracking on drop: {e}");
        }
    }
}
