use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::shared::constants::{
    DEFAULT_DEADZONE_X, DEFAULT_DEADZONE_Y, DEFAULT_DETECTION_FREQUENCY_SECS,
    DEFAULT_DETECTION_TIMEOUT_SECS, DEFAULT_FACE_SIZE_MIN, DEFAULT_ROTATION_SPEED,
    DEFAULT_VERTICAL_SPEED, MAX_RC_SPEED,
};

/// Upper bound for pixel-valued settings. Nothing the drone streams is this large.
const MAX_PIXELS: i64 = 10_000;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("failed to read settings from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write settings to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode settings: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("malformed settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Tuning knobs for the face-centering loop.
///
/// Field names double as the keys accepted by
/// [`TrackingSettings::merge`] and by the JSON settings file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingSettings {
    /// Minimum seconds between two evaluations.
    pub detection_frequency: f64,
    /// Yaw gain: yaw magnitude reached at the saturation distance.
    pub rotation_speed: i32,
    /// Vertical gain.
    pub vertical_speed: i32,
    pub deadzone_x: i32,
    pub deadzone_y: i32,
    /// Boxes narrower or shorter than this are treated as noise.
    pub face_size_min: i32,
    /// Bound on one frame fetch plus detection, in seconds.
    pub detection_timeout: f64,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            detection_frequency: DEFAULT_DETECTION_FREQUENCY_SECS,
            rotation_speed: DEFAULT_ROTATION_SPEED,
            vertical_speed: DEFAULT_VERTICAL_SPEED,
            deadzone_x: DEFAULT_DEADZONE_X,
            deadzone_y: DEFAULT_DEADZONE_Y,
            face_size_min: DEFAULT_FACE_SIZE_MIN,
            detection_timeout: DEFAULT_DETECTION_TIMEOUT_SECS,
        }
    }
}

/// Outcome of a lenient [`TrackingSettings::merge`].
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SettingsUpdate {
    pub applied: Vec<String>,
    /// Recognised keys whose value was dropped, with the reason.
    pub rejected: Vec<(String, String)>,
    /// Keys that are not settings at all.
    pub ignored: Vec<String>,
    /// Store version after the update. Filled in by the settings store.
    pub version: u64,
}

impl SettingsUpdate {
    pub fn changed(&self) -> bool {
        !self.applied.is_empty()
    }
}

impl TrackingSettings {
    pub fn detection_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.detection_frequency).unwrap_or(Duration::ZERO)
    }

    pub fn detection_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.detection_timeout).unwrap_or(Duration::ZERO)
    }

    /// Checks every invariant that does not depend on the frame size.
    pub fn validate(&self) -> Result<(), SettingsError> {
        check_seconds("detection_frequency", self.detection_frequency, false)?;
        check_seconds("detection_timeout", self.detection_timeout, true)?;
        check_int("rotation_speed", self.rotation_speed as i64, MAX_RC_SPEED as i64)?;
        check_int("vertical_speed", self.vertical_speed as i64, MAX_RC_SPEED as i64)?;
        check_int("deadzone_x", self.deadzone_x as i64, MAX_PIXELS)?;
        check_int("deadzone_y", self.deadzone_y as i64, MAX_PIXELS)?;
        check_int("face_size_min", self.face_size_min as i64, MAX_PIXELS)?;
        Ok(())
    }

    /// Deadzones at or past half the frame dimension mean tracking never engages.
    pub fn validate_for_frame(&self, width: u32, height: u32) -> Result<(), SettingsError> {
        if self.deadzone_x as f64 >= width as f64 / 2.0 {
            return Err(SettingsError::Invalid {
                key: "deadzone_x",
                reason: format!(
                    "{} px is not below half the frame width ({width} px)",
                    self.deadzone_x
                ),
            });
        }
        if self.deadzone_y as f64 >= height as f64 / 2.0 {
            return Err(SettingsError::Invalid {
                key: "deadzone_y",
                reason: format!(
                    "{} px is not below half the frame height ({height} px)",
                    self.deadzone_y
                ),
            });
        }
        Ok(())
    }

    /// Merges recognised keys from a remote update.
    ///
    /// Never fails: unknown keys are ignored, and values of the wrong type or
    /// outside the valid range are dropped and logged. Integer settings accept
    /// any JSON number and truncate the fractional part.
    pub fn merge(&mut self, partial: &Map<String, Value>) -> SettingsUpdate {
        let mut update = SettingsUpdate::default();

        for (key, value) in partial {
            let result = match key.as_str() {
                "detection_frequency" => {
                    seconds_value("detection_frequency", value, false)
                        .map(|v| self.detection_frequency = v)
                }
                "detection_timeout" => seconds_value("detection_timeout", value, true)
                    .map(|v| self.detection_timeout = v),
                "rotation_speed" => int_value("rotation_speed", value, MAX_RC_SPEED as i64)
                    .map(|v| self.rotation_speed = v),
                "vertical_speed" => int_value("vertical_speed", value, MAX_RC_SPEED as i64)
                    .map(|v| self.vertical_speed = v),
                "deadzone_x" => {
                    int_value("deadzone_x", value, MAX_PIXELS).map(|v| self.deadzone_x = v)
                }
                "deadzone_y" => {
                    int_value("deadzone_y", value, MAX_PIXELS).map(|v| self.deadzone_y = v)
                }
                "face_size_min" => {
                    int_value("face_size_min", value, MAX_PIXELS).map(|v| self.face_size_min = v)
                }
                _ => {
                    log::debug!("Ignoring unknown tracking setting '{key}'");
                    update.ignored.push(key.clone());
                    continue;
                }
            };

            match result {
                Ok(()) => update.applied.push(key.clone()),
                Err(e) => {
                    log::debug!("Could not apply tracking setting {key}={value}: {e}");
                    update.rejected.push((key.clone(), e.to_string()));
                }
            }
        }

        update
    }

    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let json = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self =
            serde_json::from_str(&json).map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let write_err = |source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(SettingsError::Encode)?;
        fs::write(path, json).map_err(write_err)
    }
}

fn check_seconds(
    key: &'static str,
    value: f64,
    strictly_positive: bool,
) -> Result<(), SettingsError> {
    let ok = value.is_finite() && if strictly_positive { value > 0.0 } else { value >= 0.0 };
    if ok && Duration::try_from_secs_f64(value).is_ok() {
        Ok(())
    } else {
        let bound = if strictly_positive { "positive" } else { "non-negative" };
        Err(SettingsError::Invalid {
            key,
            reason: format!("{value} is not a {bound} number of seconds"),
        })
    }
}

fn check_int(key: &'static str, value: i64, max: i64) -> Result<(), SettingsError> {
    if (0..=max).contains(&value) {
        Ok(())
    } else {
        Err(SettingsError::Invalid {
            key,
            reason: format!("{value} is outside 0..={max}"),
        })
    }
}

fn seconds_value(
    key: &'static str,
    value: &Value,
    strictly_positive: bool,
) -> Result<f64, SettingsError> {
    let secs = number(key, value)?;
    check_seconds(key, secs, strictly_positive)?;
    Ok(secs)
}

fn int_value(key: &'static str, value: &Value, max: i64) -> Result<i32, SettingsError> {
    let raw = number(key, value)?;
    if !raw.is_finite() {
        return Err(SettingsError::Invalid {
            key,
            reason: format!("{raw} is not finite"),
        });
    }
    let truncated = raw.trunc();
    if truncated < 0.0 || truncated > max as f64 {
        return Err(SettingsError::Invalid {
            key,
            reason: format!("{truncated} is outside 0..={max}"),
        });
    }
    Ok(truncated as i32)
}

fn number(key: &'static str, value: &Value) -> Result<f64, SettingsError> {
    value.as_f64().ok_or_else(|| SettingsError::Invalid {
        key,
        reason: format!("expected a number, got {}", json_type(value)),
    })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
