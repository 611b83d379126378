use std::sync::{Arc, Mutex, MutexGuard};

use crate::shared::frame::Frame;
use crate::shared::port_error::PortError;
use crate::video::domain::frame_source::FrameSource;

/// Single-slot frame buffer between a video decoder and the tracking loop.
///
/// The producer overwrites the slot with every decoded frame; readers get a
/// copy of the newest one. Nothing older is kept. Clones share the slot, so
/// one clone can be handed to the controller while the decoder keeps another.
#[derive(Clone, Default)]
pub struct LatestFrameSlot {
    inner: Arc<Mutex<SlotState>>,
}

#[derive(Default)]
struct SlotState {
    frame: Option<Frame>,
    published: u64,
    closed: bool,
}

impl LatestFrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current frame. Ignored once the slot is closed.
    pub fn publish(&self, frame: Frame) {
        let mut state = self.lock();
        if state.closed {
            return;
        }
        state.frame = Some(frame);
        state.published += 1;
    }

    /// Marks the stream as ended; the slot reports itself unavailable.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        state.frame = None;
    }

    pub fn published_count(&self) -> u64 {
        self.lock().published
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl FrameSource for LatestFrameSlot {
    fn latest_frame(&mut self) -> Result<Option<Frame>, PortError> {
        Ok(self.lock().frame.clone())
    }

    fn is_available(&self) -> bool {
        !self.lock().closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_slot_has_no_frame() {
        let mut slot = LatestFrameSlot::new();
        assert!(slot.latest_frame().unwrap().is_none());
        assert!(slot.is_available());
    }

    #[test]
    fn test_latest_publish_wins() {
        let slot = LatestFrameSlot::new();
        let mut reader = slot.clone();
        slot.publish(Frame::blank(4, 4, 0));
        slot.publish(Frame::blank(4, 4, 1));

        assert_eq!(reader.latest_frame().unwrap().unwrap().index(), 1);
        assert_eq!(slot.published_count(), 2);
    }

    #[test]
    fn test_reading_does_not_consume() {
        let slot = LatestFrameSlot::new();
        let mut reader = slot.clone();
        slot.publish(Frame::blank(4, 4, 7));
        assert_eq!(reader.latest_frame().unwrap().unwrap().index(), 7);
        assert_eq!(reader.latest_frame().unwrap().unwrap().index(), 7);
    }

    #[test]
    fn test_closed_slot_is_unavailable_and_drops_publishes() {
        let slot = LatestFrameSlot::new();
        let mut reader = slot.clone();
        slot.publish(Frame::blank(4, 4, 0));
        slot.close();
        slot.publish(Frame::blank(4, 4, 1));

        assert!(!reader.is_available());
        assert!(reader.latest_frame().unwrap().is_none());
        assert_eq!(slot.published_count(), 1);
    }
}
