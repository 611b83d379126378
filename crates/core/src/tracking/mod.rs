pub mod face_centering_controller;
pub mod tracking_logger;
mod tracking_loop;
