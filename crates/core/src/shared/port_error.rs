/// Error type returned by external collaborators (frame sources, detectors).
///
/// `Send + Sync` so failures can cross from the detection worker thread
/// back to the tracking loop.
pub type PortError = Box<dyn std::error::Error + Send + Sync>;
