use serde::{Deserialize, Serialize};

use crate::shared::constants::MAX_RC_SPEED;

/// Four-channel rc command, each channel a percentage of the maximum
/// actuator rate in `[-100, 100]`.
///
/// Channel order follows the drone's `rc` message: left/right,
/// forward/backward, up/down, yaw.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ControlCommand {
    pub lateral: i8,
    pub longitudinal: i8,
    pub vertical: i8,
    pub yaw: i8,
}

impl ControlCommand {
    /// Hold position.
    pub const HOVER: ControlCommand = ControlCommand {
        lateral: 0,
        longitudinal: 0,
        vertical: 0,
        yaw: 0,
    };

    /// Builds a command, clamping every channel into the valid range.
    pub fn new(lateral: i32, longitudinal: i32, vertical: i32, yaw: i32) -> Self {
        Self {
            lateral: clamp_channel(lateral),
            longitudinal: clamp_channel(longitudinal),
            vertical: clamp_channel(vertical),
            yaw: clamp_channel(yaw),
        }
    }

    /// Command that only rotates and climbs/descends.
    pub fn centering(vertical: i32, yaw: i32) -> Self {
        Self::new(0, 0, vertical, yaw)
    }

    pub fn is_hover(&self) -> bool {
        *self == Self::HOVER
    }

    pub fn as_tuple(&self) -> (i8, i8, i8, i8) {
        (self.lateral, self.longitudinal, self.vertical, self.yaw)
    }
}

impl std::fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.lateral, self.longitudinal, self.vertical, self.yaw
        )
    }
}

fn clamp_channel(value: i32) -> i8 {
    let max = MAX_RC_SPEED as i32;
    value.clamp(-max, max) as i8
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_hover_is_all_zero() {
        assert_eq!(ControlCommand::HOVER.as_tuple(), (0, 0, 0, 0));
        assert!(ControlCommand::default().is_hover());
    }

    #[rstest]
    #[case::in_range(42, 42)]
    #[case::upper(250, 100)]
    #[case::lower(-250, -100)]
    #[case::i32_extreme(i32::MIN, -100)]
    fn test_channels_are_clamped(#[case] input: i32, #[case] expected: i8) {
        let cmd = ControlCommand::new(input, input, input, input);
        assert_eq!(cmd.as_tuple(), (expected, expected, expected, expected));
    }

    #[test]
    fn test_centering_leaves_translation_at_zero() {
        let cmd = ControlCommand::centering(-7, 28);
        assert_eq!(cmd.as_tuple(), (0, 0, -7, 28));
        assert!(!cmd.is_hover());
    }

    #[test]
    fn test_display_uses_rc_order() {
        assert_eq!(ControlCommand::new(1, 2, 3, 4).to_string(), "(1, 2, 3, 4)");
    }
}
