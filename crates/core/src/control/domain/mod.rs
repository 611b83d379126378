pub mod actuator_sink;
pub mod centering_policy;
pub mod control_command;
pub mod settings_store;
pub mod tracking_settings;
pub mod tracking_state;
