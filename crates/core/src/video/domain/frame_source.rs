use crate::shared::frame::Frame;
use crate::shared::port_error::PortError;

/// Supplies the most recent camera frame.
///
/// `latest_frame` must not block: it returns `Ok(None)` when no frame has
/// arrived yet or streaming is off.
pub trait FrameSource: Send {
    fn latest_frame(&mut self) -> Result<Option<Frame>, PortError>;

    /// Whether the source is connected at all. Checked before a run starts.
    fn is_available(&self) -> bool {
        true
    }
}
