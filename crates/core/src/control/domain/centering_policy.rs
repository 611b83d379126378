use crate::shared::constants::SATURATION_FRACTION;
use crate::shared::face_detection::FaceDetection;

use super::control_command::ControlCommand;
use super::tracking_settings::TrackingSettings;

/// Picks the face to follow: the largest qualifying box.
///
/// Boxes under `face_size_min` on either side are dropped as noise or too
/// distant. Equal areas resolve to the earliest box in detector order.
pub fn select_target(faces: &[FaceDetection], face_size_min: i32) -> Option<&FaceDetection> {
    let mut best: Option<&FaceDetection> = None;
    for face in faces.iter().filter(|f| f.meets_min_size(face_size_min)) {
        if best.map_or(true, |b| face.area() > b.area()) {
            best = Some(face);
        }
    }
    best
}

/// Proportional yaw/vertical correction that moves `target` toward the
/// frame center.
pub fn centering_command(
    target: &FaceDetection,
    frame_width: u32,
    frame_height: u32,
    settings: &TrackingSettings,
) -> ControlCommand {
    let (face_x, face_y) = target.center();
    let delta_x = face_x - frame_width as f64 / 2.0;
    let delta_y = face_y - frame_height as f64 / 2.0;

    let yaw = axis_speed(
        delta_x,
        settings.deadzone_x,
        settings.rotation_speed,
        frame_width,
    );
    // Pixel rows grow downward; a positive vertical command climbs.
    let vertical = -axis_speed(
        delta_y,
        settings.deadzone_y,
        settings.vertical_speed,
        frame_height,
    );

    ControlCommand::centering(vertical, yaw)
}

/// Full tick policy: no qualifying face means hover.
pub fn evaluate(
    faces: &[FaceDetection],
    frame_width: u32,
    frame_height: u32,
    settings: &TrackingSettings,
) -> ControlCommand {
    match select_target(faces, settings.face_size_min) {
        Some(target) => centering_command(target, frame_width, frame_height, settings),
        None => ControlCommand::HOVER,
    }
}

/// Signed speed for one axis.
///
/// Zero inside the deadzone; otherwise `gain * min(|delta| / (0.3 * extent), 1)`
/// with the magnitude rounded half away from zero, so left and right
/// offsets of equal size give equal and opposite speeds.
fn axis_speed(delta: f64, deadzone: i32, gain: i32, extent: u32) -> i32 {
    let magnitude = delta.abs();
    if magnitude <= deadzone as f64 {
        return 0;
    }
    let saturation = SATURATION_FRACTION * extent as f64;
    let ratio = if saturation > 0.0 {
        (magnitude / saturation).min(1.0)
    } else {
        1.0
    };
    let speed = (gain as f64 * ratio).round() as i32;
    if delta < 0.0 {
        -speed
    } else {
        speed
    }
}
