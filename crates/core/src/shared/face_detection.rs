use serde::{Deserialize, Serialize};

/// An axis-aligned face bounding box in frame pixel coordinates.
///
/// `right` and `bottom` are exclusive edges, so `width = right - left`.
/// Identity and confidence are carried through for display but play no part
/// in control.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FaceDetection {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl FaceDetection {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
            confidence: None,
            label: None,
        }
    }

    /// Builds a box from the `(x, y, w, h)` form most cascade detectors emit.
    pub fn from_xywh(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self::new(x, y, x.saturating_add(w), y.saturating_add(h))
    }

    /// Computed in `i64`: detector output is untrusted and may span the
    /// whole `i32` range.
    pub fn width(&self) -> i64 {
        self.right as i64 - self.left as i64
    }

    pub fn height(&self) -> i64 {
        self.bottom as i64 - self.top as i64
    }

    /// Area in square pixels; zero for degenerate boxes.
    pub fn area(&self) -> i64 {
        if self.is_degenerate() {
            return 0;
        }
        self.width().saturating_mul(self.height())
    }

    pub fn is_degenerate(&self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }

    /// True when both sides are at least `min_size` pixels.
    pub fn meets_min_size(&self, min_size: i32) -> bool {
        let min_size = i64::from(min_size);
        !self.is_degenerate() && self.width() >= min_size && self.height() >= min_size
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.left as f64 + self.right as f64) / 2.0,
            (self.top as f64 + self.bottom as f64) / 2.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_geometry() {
        let face = FaceDetection::new(450, 240, 550, 340);
        assert_eq!(face.width(), 100);
        assert_eq!(face.height(), 100);
        assert_eq!(face.area(), 10_000);
        assert_eq!(face.center(), (500.0, 290.0));
    }

    #[test]
    fn test_from_xywh_matches_edges() {
        let face = FaceDetection::from_xywh(10, 20, 30, 40);
        assert_eq!(face, FaceDetection::new(10, 20, 40, 60));
    }

    #[test]
    fn test_center_keeps_half_pixels() {
        let face = FaceDetection::new(0, 0, 5, 3);
        assert_eq!(face.center(), (2.5, 1.5));
    }

    #[rstest]
    #[case::zero_width(FaceDetection::new(10, 10, 10, 60))]
    #[case::zero_height(FaceDetection::new(10, 10, 60, 10))]
    #[case::inverted(FaceDetection::new(60, 60, 10, 10))]
    fn test_degenerate_boxes_have_no_area(#[case] face: FaceDetection) {
        assert!(face.is_degenerate());
        assert_eq!(face.area(), 0);
        assert!(!face.meets_min_size(0));
    }

    #[rstest]
    #[case::both_large(60, 60, true)]
    #[case::exactly_min(50, 50, true)]
    #[case::narrow(49, 80, false)]
    #[case::short(80, 49, false)]
    fn test_meets_min_size(#[case] w: i32, #[case] h: i32, #[case] expected: bool) {
        let face = FaceDetection::from_xywh(0, 0, w, h);
        assert_eq!(face.meets_min_size(50), expected);
    }

    #[test]
    fn test_extreme_boxes_do_not_overflow() {
        let wide = FaceDetection::new(-2_000_000_000, 0, 2_000_000_000, 100);
        assert_eq!(wide.width(), 4_000_000_000);
        assert_eq!(wide.area(), 400_000_000_000);
        assert!(wide.meets_min_size(50));

        let huge = FaceDetection::new(i32::MIN, i32::MIN, i32::MAX, i32::MAX);
        assert_eq!(huge.area(), i64::MAX);
        assert_eq!(huge.center(), (-0.5, -0.5));

        let clamped = FaceDetection::from_xywh(i32::MAX - 5, 0, 100, 100);
        assert_eq!(clamped.right, i32::MAX);
    }

    #[test]
    fn test_deserializes_without_optional_fields() {
        let face: FaceDetection =
            serde_json::from_str(r#"{"left":1,"top":2,"right":3,"bottom":4}"#).unwrap();
        assert_eq!(face, FaceDetection::new(1, 2, 3, 4));
    }
}
