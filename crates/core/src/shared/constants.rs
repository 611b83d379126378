use std::time::Duration;

/// Offset, as a fraction of the frame dimension, at which a command reaches full gain.
pub const SATURATION_FRACTION: f64 = 0.3;

/// Largest magnitude accepted by the drone's rc channels.
pub const MAX_RC_SPEED: i8 = 100;

pub const DEFAULT_DETECTION_FREQUENCY_SECS: f64 = 0.2;
pub const DEFAULT_ROTATION_SPEED: i32 = 20;
pub const DEFAULT_VERTICAL_SPEED: i32 = 20;
pub const DEFAULT_DEADZONE_X: i32 = 50;
pub const DEFAULT_DEADZONE_Y: i32 = 40;
pub const DEFAULT_FACE_SIZE_MIN: i32 = 50;
pub const DEFAULT_DETECTION_TIMEOUT_SECS: f64 = 1.0;

/// Sleep slice while waiting out the detection interval.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Back-off after a tick that found no frame.
pub const NO_FRAME_BACKOFF: Duration = Duration::from_millis(100);

/// Consecutive detector failures before the detector is reported unhealthy.
pub const UNHEALTHY_FAILURE_THRESHOLD: u32 = 3;
