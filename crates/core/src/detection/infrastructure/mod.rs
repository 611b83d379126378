pub mod detection_worker;
pub mod scripted_face_detector;
