use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use thiserror::Error;

use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::face_detection::FaceDetection;
use crate::shared::port_error::PortError;
use crate::video::domain::frame_source::FrameSource;

/// What one observation of the camera produced.
#[derive(Clone, Debug, PartialEq)]
pub enum Observation {
    /// The source has no frame yet, or streaming is off.
    NoFrame,
    Detected {
        frame_width: u32,
        frame_height: u32,
        frame_index: usize,
        faces: Vec<FaceDetection>,
    },
}

#[derive(Error, Debug)]
pub enum ObservationError {
    #[error("frame source failed: {0}")]
    FrameSource(PortError),
    #[error("face detector failed: {0}")]
    Detector(PortError),
    #[error("face detector panicked")]
    DetectorPanicked,
    #[error("no detection result within {0:?}")]
    TimedOut(Duration),
    #[error("detection worker is still busy with an earlier frame")]
    Busy,
    #[error("detection worker has stopped")]
    WorkerGone,
}

type Response = (u64, Result<Observation, ObservationError>);

/// Runs frame retrieval and detection on a helper thread so every
/// observation can be bounded by a timeout.
///
/// Requests carry a sequence number. A response that arrives after its
/// request timed out is discarded when the next observation drains the
/// channel. Dropping the worker closes the request channel; the thread exits
/// once its current call returns.
pub struct DetectionWorker {
    request_tx: Sender<u64>,
    response_rx: Receiver<Response>,
    next_seq: u64,
}

impl DetectionWorker {
    pub fn spawn(
        source: Box<dyn FrameSource>,
        detector: Arc<dyn FaceDetector>,
    ) -> std::io::Result<Self> {
        let (request_tx, request_rx) = crossbeam_channel::bounded::<u64>(1);
        let (response_tx, response_rx) = crossbeam_channel::bounded::<Response>(2);

        thread::Builder::new()
            .name("facetrack-detect".into())
            .spawn(move || serve(source, detector, request_rx, response_tx))?;

        Ok(Self {
            request_tx,
            response_rx,
            next_seq: 0,
        })
    }

    /// Fetches the latest frame and detects faces in it, waiting at most `timeout`.
    pub fn observe(&mut self, timeout: Duration) -> Result<Observation, ObservationError> {
        while self.response_rx.try_recv().is_ok() {
            log::debug!("Discarding late detection result");
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        match self.request_tx.try_send(seq) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => return Err(ObservationError::Busy),
            Err(TrySendError::Disconnected(_)) => return Err(ObservationError::WorkerGone),
        }

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.response_rx.recv_timeout(remaining) {
                Ok((got, result)) if got == seq => return result,
                Ok(_) => log::debug!("Discarding late detection result"),
                Err(RecvTimeoutError::Timeout) => return Err(ObservationError::TimedOut(timeout)),
                Err(RecvTimeoutError::Disconnected) => return Err(ObservationError::WorkerGone),
            }
        }
    }
}

fn serve(
    mut source: Box<dyn FrameSource>,
    detector: Arc<dyn FaceDetector>,
    request_rx: Receiver<u64>,
    response_tx: Sender<Response>,
) {
    for seq in request_rx {
        let result = observe_once(&mut *source, &*detector);
        if response_tx.send((seq, result)).is_err() {
            break;
        }
    }
}

fn observe_once(
    source: &mut dyn FrameSource,
    detector: &dyn FaceDetector,
) -> Result<Observation, ObservationError> {
    let frame = match source.latest_frame() {
        Ok(Some(frame)) => frame,
        Ok(None) => return Ok(Observation::NoFrame),
        Err(e) => return Err(ObservationError::FrameSource(e)),
    };

    let faces = panic::catch_unwind(AssertUnwindSafe(|| detector.detect(&frame)))
        .map_err(|_| ObservationError::DetectorPanicked)?
        .map_err(ObservationError::Detector)?;

    Ok(Observation::Detected {
        frame_width: frame.width(),
        frame_height: frame.height(),
        frame_index: frame.index(),
        faces,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::frame::Frame;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TIMEOUT: Duration = Duration::from_secs(2);

    struct StubSource {
        frames: Vec<Option<Frame>>,
        calls: usize,
    }

    impl FrameSource for StubSource {
        fn latest_frame(&mut self) -> Result<Option<Frame>, PortError> {
            let frame = self.frames.get(self.calls).cloned().flatten();
            self.calls += 1;
            Ok(frame)
        }
    }

    struct FailingSource;

    impl FrameSource for FailingSource {
        fn latest_frame(&mut self) -> Result<Option<Frame>, PortError> {
            Err("stream dropped".into())
        }
    }

    struct FixedDetector(Vec<FaceDetection>);

    impl FaceDetector for FixedDetector {
        fn detect(&self, _frame: &Frame) -> Result<Vec<FaceDetection>, PortError> {
            Ok(self.0.clone())
        }
    }

    struct FailingDetector;

    impl FaceDetector for FailingDetector {
        fn detect(&self, _frame: &Frame) -> Result<Vec<FaceDetection>, PortError> {
            Err("cascade not loaded".into())
        }
    }

    struct PanickingDetector;

    impl FaceDetector for PanickingDetector {
        fn detect(&self, _frame: &Frame) -> Result<Vec<FaceDetection>, PortError> {
            panic!("bad frame");
        }
    }

    /// Sleeps on the first call only.
    struct SlowFirstDetector {
        delay: Duration,
        calls: AtomicUsize,
    }

    impl FaceDetector for SlowFirstDetector {
        fn detect(&self, frame: &Frame) -> Result<Vec<FaceDetection>, PortError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                thread::sleep(self.delay);
            }
            Ok(vec![FaceDetection::from_xywh(frame.index() as i32, 0, 60, 60)])
        }
    }

    fn always(frame: Frame) -> Box<dyn FrameSource> {
        Box::new(StubSource {
            frames: vec![Some(frame); 16],
            calls: 0,
        })
    }

    #[test]
    fn test_returns_detections_with_frame_size() {
        let face = FaceDetection::new(1, 2, 3, 4);
        let mut worker = DetectionWorker::spawn(
            always(Frame::blank(64, 48, 3)),
            Arc::new(FixedDetector(vec![face.clone()])),
        )
        .unwrap();

        let obs = worker.observe(TIMEOUT).unwrap();
        assert_eq!(
            obs,
            Observation::Detected {
                frame_width: 64,
                frame_height: 48,
                frame_index: 3,
                faces: vec![face],
            }
        );
    }

    #[test]
    fn test_missing_frame_is_not_an_error() {
        let source = Box::new(StubSource {
            frames: vec![None, Some(Frame::blank(8, 8, 0))],
            calls: 0,
        });
        let mut worker =
            DetectionWorker::spawn(source, Arc::new(FixedDetector(vec![]))).unwrap();

        assert_eq!(worker.observe(TIMEOUT).unwrap(), Observation::NoFrame);
        assert!(matches!(
            worker.observe(TIMEOUT).unwrap(),
            Observation::Detected { .. }
        ));
    }

    #[test]
    fn test_source_and_detector_failures_are_reported() {
        let mut worker =
            DetectionWorker::spawn(Box::new(FailingSource), Arc::new(FixedDetector(vec![])))
                .unwrap();
        assert!(matches!(
            worker.observe(TIMEOUT),
            Err(ObservationError::FrameSource(_))
        ));

        let mut worker =
            DetectionWorker::spawn(always(Frame::blank(8, 8, 0)), Arc::new(FailingDetector))
                .unwrap();
        assert!(matches!(
            worker.observe(TIMEOUT),
            Err(ObservationError::Detector(_))
        ));
    }

    #[test]
    fn test_detector_panic_does_not_kill_worker() {
        let mut worker =
            DetectionWorker::spawn(always(Frame::blank(8, 8, 0)), Arc::new(PanickingDetector))
                .unwrap();
        assert!(matches!(
            worker.observe(TIMEOUT),
            Err(ObservationError::DetectorPanicked)
        ));
        assert!(matches!(
            worker.observe(TIMEOUT),
            Err(ObservationError::DetectorPanicked)
        ));
    }

    #[test]
    fn test_slow_detection_times_out_and_late_result_is_discarded() {
        let source = Box::new(StubSource {
            frames: (0..4).map(|i| Some(Frame::blank(8, 8, i))).collect(),
            calls: 0,
        });
        let detector = Arc::new(SlowFirstDetector {
            delay: Duration::from_millis(300),
            calls: AtomicUsize::new(0),
        });
        let mut worker = DetectionWorker::spawn(source, detector).unwrap();

        assert!(matches!(
            worker.observe(Duration::from_millis(50)),
            Err(ObservationError::TimedOut(_))
        ));

        // The next answer must belong to the second frame, not the stale first one.
        match worker.observe(TIMEOUT).unwrap() {
            Observation::Detected { frame_index, .. } => assert_eq!(frame_index, 1),
            other => panic!("unexpected observation: {other:?}"),
        }
    }
}
