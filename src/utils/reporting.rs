use std::fmt;
use serde::Serialize;

/// How many individual errors a summary spells out before collapsing the rest.
pub const MAX_REPORTED_ERRORS: usize = 5;

/// Outcome of a batch operation that keeps going past individual failures.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub succeeded: usize,
    pub errors: Vec<String>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self) {
        self.succeeded += 1;
    }

    pub fn record_error(&mut self, item: impl fmt::Display, error: impl fmt::Display) {
        self.errors.push(format!("{}: {}", item, error));
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Human-readable summary, e.g. `Deleted 3 files.` followed by at most
    /// five error lines and a count of the ones left out.
    pub fn summary(&self, verb: &str, noun: &str) -> String {
        let mut msg = format!("{} {} {}.", verb, self.succeeded, noun);
        if !self.errors.is_empty() {
            msg.push_str("\n\nErrors:");
            for error in self.errors.iter().take(MAX_REPORTED_ERRORS) {
                msg.push('\n');
                msg.push_str(error);
            }
            if self.errors.len() > MAX_REPORTED_ERRORS {
                msg.push_str(&format!(
                    "\n... and {} more errors",
                    self.errors.len() - MAX_REPORTED_ERRORS
                ));
            }
        }
        msg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn clean_summary_has_no_error_section() {
        let mut report = BatchReport::new();
        report.record_success();
        report.record_success();
        assert!(report.is_clean());
        assert_eq!(report.summary("Deleted", "files"), "Deleted 2 files.");
    }

    #[test]
    fn summary_caps_error_list() {
        let mut report = BatchReport::new();
        report.record_success();
        for i in 0..8 {
            report.record_error(format!("song{}.mp3", i), "permission denied");
        }

        let summary = report.summary("Updated", "songs");
        assert!(summary.starts_with("Updated 1 songs."));
        assert!(summary.contains("song4.mp3: permission denied"));
        assert!(!summary.contains("song5.mp3"));
        assert!(summary.ends_with("... and 3 more errors"));
    }
}
