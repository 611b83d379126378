use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use serde_json::{json, Map, Value};

use facetrack_core::control::domain::tracking_settings::TrackingSettings;
use facetrack_core::control::infrastructure::simulated_drone::SimulatedDrone;
use facetrack_core::detection::infrastructure::scripted_face_detector::{
    DetectionScript, ScriptedFaceDetector,
};
use facetrack_core::shared::frame::Frame;
use facetrack_core::tracking::face_centering_controller::FaceCenteringController;
use facetrack_core::video::domain::frame_source::FrameSource;
use facetrack_core::video::infrastructure::latest_frame_slot::LatestFrameSlot;
use facetrack_core::video::infrastructure::synthetic_frame_source::SyntheticFrameSource;

/// Replays recorded face detections through the face-centering controller
/// against a simulated drone, then prints the resulting flight report.
#[derive(Parser)]
#[command(name = "facetrack")]
struct Cli {
    /// Detection script (JSON: width, height, per-frame face boxes).
    script: PathBuf,

    /// Settings file. Defaults to <config dir>/facetrack/settings.json if it exists.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Override a setting, e.g. --set rotation_speed=30 (repeatable).
    #[arg(long = "set", value_name = "KEY=VALUE")]
    overrides: Vec<String>,

    /// Rate at which script frames are published to the controller.
    #[arg(long, default_value = "30")]
    fps: f64,

    /// Evaluate every script frame once instead of pacing frames at --fps.
    #[arg(long)]
    unpaced: bool,

    /// Write the effective settings back to the settings file.
    #[arg(long)]
    save_settings: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let script = DetectionScript::load(&cli.script)?;
    let settings_path = cli.settings.clone().or_else(default_settings_path);
    let settings = build_settings(settings_path.as_deref(), &cli.overrides)?;
    if let Err(e) = settings.validate_for_frame(script.width, script.height) {
        log::warn!(
            "Settings cannot engage on {}x{} frames: {e}",
            script.width,
            script.height
        );
    }

    if cli.save_settings {
        let path = settings_path.ok_or("No settings path: pass --settings")?;
        settings.save(&path)?;
        log::info!("Settings written to {}", path.display());
    }

    let report = replay(&script, settings, &cli)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn replay(
    script: &DetectionScript,
    settings: TrackingSettings,
    cli: &Cli,
) -> Result<Value, Box<dyn std::error::Error>> {
    let controller =
        FaceCenteringController::new(Arc::new(ScriptedFaceDetector::from_script(script)));
    let drone = SimulatedDrone::new();
    let frame_count = script.frames.len();
    let interval = settings.detection_interval();

    log::info!(
        "Replaying {frame_count} frames ({}x{}) from {}",
        script.width,
        script.height,
        cli.script.display()
    );

    let handle = if cli.unpaced {
        let source: Box<dyn FrameSource> =
            Box::new(SyntheticFrameSource::new(script.width, script.height));
        let handle = controller.start(source, Box::new(drone.clone()), settings)?;
        while controller.is_running() && controller.status().ticks < frame_count as u64 {
            thread::sleep(Duration::from_millis(5));
        }
        handle
    } else {
        let slot = LatestFrameSlot::new();
        let handle = controller.start(Box::new(slot.clone()), Box::new(drone.clone()), settings)?;
        publish_frames(&slot, script, cli.fps);
        // Let the last published frame be evaluated.
        thread::sleep(interval);
        handle
    };

    controller.stop(&handle)?;

    let history = drone.history();
    Ok(json!({
        "script": cli.script.display().to_string(),
        "frames": frame_count,
        "commands": history.len(),
        "last_command": history.last(),
        "pose": drone.pose(),
        "status": controller.status(),
    }))
}

/// Publishes one blank frame per script entry, paced at `fps`.
fn publish_frames(slot: &LatestFrameSlot, script: &DetectionScript, fps: f64) {
    let period = Duration::from_secs_f64(1.0 / fps);
    for index in 0..script.frames.len() {
        slot.publish(Frame::blank(script.width, script.height, index));
        thread::sleep(period);
    }
}

fn build_settings(
    path: Option<&Path>,
    overrides: &[String],
) -> Result<TrackingSettings, Box<dyn std::error::Error>> {
    let mut settings = match path {
        Some(path) if path.exists() => {
            log::info!("Loading settings from {}", path.display());
            TrackingSettings::load(path)?
        }
        Some(path) => {
            log::debug!("No settings file at {}, using defaults", path.display());
            TrackingSettings::default()
        }
        None => TrackingSettings::default(),
    };

    let partial = parse_overrides(overrides)?;
    let update = settings.merge(&partial);
    if let Some(key) = update.ignored.first() {
        return Err(format!("Unknown setting '{key}'").into());
    }
    if let Some((key, reason)) = update.rejected.first() {
        return Err(format!("Invalid value for '{key}': {reason}").into());
    }
    settings.validate()?;
    Ok(settings)
}

fn parse_overrides(overrides: &[String]) -> Result<Map<String, Value>, String> {
    overrides.iter().map(|raw| parse_override(raw)).collect()
}

/// Splits `key=value`; the value is read as JSON, falling back to a string.
fn parse_override(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("Override must look like key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("Override has an empty key: '{raw}'"));
    }
    let value = value.trim();
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("facetrack").join("settings.json"))
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.script.exists() {
        return Err(format!("Script file not found: {}", cli.script.display()).into());
    }
    if !cli.fps.is_finite() || cli.fps <= 0.0 || cli.fps > 1000.0 {
        return Err(format!("FPS must be between 0 and 1000, got {}", cli.fps).into());
    }
    if cli.save_settings && cli.settings.is_none() && default_settings_path().is_none() {
        return Err("--save-settings needs --settings on this platform".into());
    }
    Ok(())
}
