use crate::shared::face_detection::FaceDetection;
use crate::shared::frame::Frame;
use crate::shared::port_error::PortError;

/// Domain interface for face detection.
///
/// Detection is a pure function of the frame: no identity is carried from
/// one call to the next. Implementations are shared with the detection
/// worker thread, hence `Sync` and `&self`.
pub trait FaceDetector: Send + Sync {
    fn detect(&self, frame: &Frame) -> Result<Vec<FaceDetection>, PortError>;
}
