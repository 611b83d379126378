use thiserror::Error;

use super::control_command::ControlCommand;

#[derive(Error, Debug)]
pub enum ActuatorError {
    #[error("drone is not connected")]
    Disconnected,
    #[error("command rejected: {0}")]
    Rejected(String),
}

/// Drone actuation port: accepts rc commands.
///
/// Sends are fire-and-forget. A failed send is transient from the
/// controller's point of view; the next tick overwrites it anyway.
pub trait ActuatorSink: Send {
    fn send_command(&mut self, command: ControlCommand) -> Result<(), ActuatorError>;

    /// Whether the sink can accept commands at all. Checked before a run starts.
    fn is_connected(&self) -> bool {
        true
    }
}
