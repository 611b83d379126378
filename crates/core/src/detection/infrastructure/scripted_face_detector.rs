use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::face_detection::FaceDetection;
use crate::shared::frame::Frame;
use crate::shared::port_error::PortError;

#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("failed to read detection script {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed detection script {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("detection script has an empty frame size ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },
}

/// Recorded detections for a flight: the frame size plus one list of boxes
/// per frame index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionScript {
    pub width: u32,
    pub height: u32,
    pub frames: Vec<Vec<FaceDetection>>,
}

impl DetectionScript {
    pub fn load(path: &Path) -> Result<Self, ScriptError> {
        let json = fs::read_to_string(path).map_err(|source| ScriptError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let script: Self = serde_json::from_str(&json).map_err(|source| ScriptError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if script.width == 0 || script.height == 0 {
            return Err(ScriptError::EmptyFrame {
                width: script.width,
                height: script.height,
            });
        }
        Ok(script)
    }
}

/// Replays recorded detections by frame index.
///
/// Stands in for a real detector when replaying a flight or testing the
/// controller. Frames past the end of the script have no faces.
pub struct ScriptedFaceDetector {
    frames: Vec<Vec<FaceDetection>>,
}

impl ScriptedFaceDetector {
    pub fn new(frames: Vec<Vec<FaceDetection>>) -> Self {
        Self { frames }
    }

    pub fn from_script(script: &DetectionScript) -> Self {
        Self::new(script.frames.clone())
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FaceDetector for ScriptedFaceDetector {
    fn detect(&self, frame: &Frame) -> Result<Vec<FaceDetection>, PortError> {
        Ok(self.frames.get(frame.index()).cloned().unwrap_or_default())
    }
}
