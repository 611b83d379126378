use std::collections::HashMap;
use std::time::Instant;

use crate::control::domain::control_command::ControlCommand;

/// Observer for tracking-loop events.
///
/// Keeps the loop free of any particular output mechanism: the CLI reports
/// through the `log` crate, tests discard everything.
pub trait TrackingLogger: Send {
    /// How long a named stage of one tick took.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// A command was handed to the actuator.
    fn command(&mut self, command: &ControlCommand);

    /// A tick ended without a usable detection.
    fn failure(&mut self, reason: &str);

    /// End-of-run report. Default: no-op.
    fn summary(&self) {}
}

pub struct NullTrackingLogger;

impl TrackingLogger for NullTrackingLogger {
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn command(&mut self, _command: &ControlCommand) {}
    fn failure(&mut self, _reason: &str) {}
}

/// Aggregates per-run statistics and logs a summary when the run ends.
pub struct LogTrackingLogger {
    timings: HashMap<String, Vec<f64>>,
    commands: usize,
    hover_commands: usize,
    peak_yaw: i8,
    peak_vertical: i8,
    failures: usize,
    start_time: Instant,
}

impl LogTrackingLogger {
    pub fn new() -> Self {
        Self {
            timings: HashMap::new(),
            commands: 0,
            hover_commands: 0,
            peak_yaw: 0,
            peak_vertical: 0,
            failures: 0,
            start_time: Instant::now(),
        }
    }

    /// Returns the formatted summary, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.commands == 0 && self.failures == 0 && self.timings.is_empty() {
            return None;
        }

        let elapsed_s = self.start_time.elapsed().as_secs_f64();
        let mut lines = vec![format!(
            "Tracking summary ({} commands, {:.1}s):",
            self.commands, elapsed_s
        )];

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let durations = &self.timings[stage];
            let total_ms: f64 = durations.iter().sum();
            let avg_ms = total_ms / durations.len().max(1) as f64;
            let max_ms = durations.iter().copied().fold(0.0, f64::max);
            lines.push(format!(
                "  {stage:10}: avg {avg_ms:6.1}ms  max {max_ms:6.1}ms  ({} samples)",
                durations.len()
            ));
        }

        lines.push(format!(
            "  hover: {}  peak yaw: {}  peak vertical: {}",
            self.hover_commands, self.peak_yaw, self.peak_vertical
        ));
        if self.failures > 0 {
            lines.push(format!("  detection failures: {}", self.failures));
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(|v| v.as_slice())
    }
}

impl Default for LogTrackingLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackingLogger for LogTrackingLogger {
    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn command(&mut self, command: &ControlCommand) {
        self.commands += 1;
        if command.is_hover() {
            self.hover_commands += 1;
        }
        self.peak_yaw = self.peak_yaw.max(command.yaw.saturating_abs());
        self.peak_vertical = self.peak_vertical.max(command.vertical.saturating_abs());
        log::debug!("rc {command}");
    }

    fn failure(&mut self, reason: &str) {
        self.failures += 1;
        log::debug!("No detection this tick: {reason}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n{text}");
        }
    }
}
