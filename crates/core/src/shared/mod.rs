pub mod constants;
pub mod face_detection;
pub mod frame;
pub mod port_error;
