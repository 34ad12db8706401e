//! Status output on stderr
//!
//! Reports go to stdout; everything the user reads while a command works
//! (spinners, status lines, the run summary) goes through [`ProgressReporter`].

use console::{style, Style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Status line printer and spinner
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    spinner: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    /// Create a new reporter writing to stderr
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            spinner: None,
            use_color,
            quiet,
        }
    }

    /// Show a spinner until [`finish_spinner`](Self::finish_spinner)
    pub fn start_spinner(&mut self, message: &str) {
        if self.quiet || !self.term.is_term() {
            return;
        }
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg} ({elapsed})")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(120));
        spinner.set_message(message.to_string());
        self.spinner = Some(spinner);
    }

    /// Update the spinner message
    pub fn set_message(&self, message: &str) {
        if let Some(spinner) = &self.spinner {
            spinner.set_message(message.to_string());
        }
    }

    /// Remove the spinner
    pub fn finish_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }

    fn line(&self, symbol: &str, plain: &str, paint: fn(&str) -> String, message: &str) {
        let prefix = if self.use_color {
            paint(symbol)
        } else {
            plain.to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if !self.quiet {
            self.line("✓", "OK", |s| style(s).green().bold().to_string(), message);
        }
    }

    /// Print a failure message (shown even when quiet)
    pub fn failure(&self, message: &str) {
        self.line("✗", "FAIL", |s| style(s).red().bold().to_string(), message);
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if !self.quiet {
            self.line("⚠", "WARN", |s| style(s).yellow().bold().to_string(), message);
        }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if !self.quiet {
            self.line("ℹ", "INFO", |s| style(s).blue().bold().to_string(), message);
        }
    }

    /// Print the closing line of a run
    pub fn run_summary(&self, tests_passed: bool, sessions: usize, units: usize, duration: Duration) {
        if self.quiet && tests_passed {
            return;
        }
        let status = if tests_passed { "MEASURED" } else { "TESTS FAILED" };
        let status = if self.use_color {
            let paint = if tests_passed {
                Style::new().green().bold()
            } else {
                Style::new().red().bold()
            };
            paint.apply_to(status).to_string()
        } else {
            status.to_string()
        };
        let _ = self.term.write_line(&format!(
            "{status} {sessions} session(s) over {units} unit(s) in {:.2}s",
            duration.as_secs_f64()
        ));
    }
}
