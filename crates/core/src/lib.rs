pub mod control;
pub mod detection;
pub mod shared;
pub mod tracking;
pub mod video;
