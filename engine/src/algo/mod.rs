//! Building blocks for fast routing algorithms.

use crate::report::benchmark::Timer;

pub mod contraction_hierarchy;
pub mod customizable_contraction_hierarchy;
pub mod dijkstra;

/// Callback receiving human readable progress lines during long preprocessing steps.
pub type LogCallback<'a> = Option<&'a mut dyn FnMut(&str)>;

/// Wraps the optional progress callback of the build functions.
/// Frequent messages are throttled to at most one per second.
pub(crate) struct ProgressLog<'a> {
    callback: LogCallback<'a>,
    timer: Timer,
    last_message_ms: f64,
}

impl<'a> ProgressLog<'a> {
    pub(crate) fn new(callback: LogCallback<'a>) -> ProgressLog<'a> {
        ProgressLog {
            callback,
            timer: Timer::new(),
            last_message_ms: 0.0,
        }
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.callback.is_some()
    }

    pub(crate) fn message(&mut self, message: &str) {
        if let Some(callback) = &mut self.callback {
            callback(message);
            self.last_message_ms = self.timer.get_passed_ms();
        }
    }

    pub(crate) fn throttled(&mut self, message: impl FnOnce() -> String) {
        if self.callback.is_none() {
            return;
        }
        let now = self.timer.get_passed_ms();
        if now - self.last_message_ms > 1000.0 {
            let message = format!("{} Running for {:.0}ms.", message(), now);
            self.message(&message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_log_forwards_messages() {
        let mut lines = Vec::new();
        {
            let mut collect = |line: &str| lines.push(line.to_string());
            let mut log = ProgressLog::new(Some(&mut collect));
            assert!(log.is_enabled());
            log.message("Start.");
            log.throttled(|| "skipped".to_string());
            log.message("Done.");
        }
        assert_eq!(lines, vec!["Start.".to_string(), "Done.".to_string()]);
    }
}
