pub mod latest_frame_slot;
pub mod synthetic_frame_source;
