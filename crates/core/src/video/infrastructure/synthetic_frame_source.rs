use crate::shared::frame::Frame;
use crate::shared::port_error::PortError;
use crate::video::domain::frame_source::FrameSource;

/// Produces a fresh blank frame of fixed size on every fetch.
///
/// Frame indices advance by one per call, which lets index-keyed detectors
/// such as `ScriptedFaceDetector` step through a recording one tick at a time.
pub struct SyntheticFrameSource {
    width: u32,
    height: u32,
    next_index: usize,
}

impl SyntheticFrameSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            next_index: 0,
        }
    }
}

impl FrameSource for SyntheticFrameSource {
    fn latest_frame(&mut self) -> Result<Option<Frame>, PortError> {
        let frame = Frame::blank(self.width, self.height, self.next_index);
        self.next_index += 1;
        Ok(Some(frame))
    }

    fn is_available(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_advance_per_fetch() {
        let mut source = SyntheticFrameSource::new(32, 24);
        let first = source.latest_frame().unwrap().unwrap();
        let second = source.latest_frame().unwrap().unwrap();
        assert_eq!((first.index(), second.index()), (0, 1));
        assert_eq!((second.width(), second.height()), (32, 24));
    }

    #[test]
    fn test_zero_size_is_unavailable() {
        assert!(!SyntheticFrameSource::new(0, 24).is_available());
        assert!(SyntheticFrameSource::new(1, 1).is_available());
    }
}
