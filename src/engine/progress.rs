//! Progress reporting for long-running tool invocations.
//!
//! Each step gets its own sink for as long as the step runs. By default the latest line of tool
//! output is shown next to a spinner; in verbose mode every line is passed through as-is.

use std::time::Duration;

use anyhow::Error;
use indicatif::{ProgressBar, ProgressStyle};

use osutils::dependencies::OutputLine;

/// Longest tool output fragment shown next to the spinner.
const SPINNER_MESSAGE_WIDTH: usize = 72;

pub trait ProgressSink {
    fn update(&mut self, line: OutputLine);

    fn finish(&mut self, success: bool);
}

/// Shows a spinner with the step title and the most recent output fragment.
pub struct Spinner {
    bar: ProgressBar,
    title: String,
}

impl Spinner {
    pub fn new(title: impl Into<String>) -> Self {
        let title = title.into();
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner} {msg}") {
            bar.set_style(style);
        }
        bar.set_message(title.clone());
        bar.enable_steady_tick(Duration::from_millis(100));
        Spinner { bar, title }
    }
}

impl ProgressSink for Spinner {
    fn update(&mut self, line: OutputLine) {
        let text = line.text.trim();
        if text.is_empty() {
            return;
        }
        self.bar
            .set_message(format!("{}: {}", self.title, truncate(text)));
    }

    fn finish(&mut self, success: bool) {
        self.bar.finish_and_clear();
        let mark = if success { '✓' } else { '✗' };
        eprintln!("{mark} {}", self.title);
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

/// Prints every output line of the tool.
pub struct Passthrough {
    title: String,
}

impl Passthrough {
    pub fn new(title: impl Into<String>) -> Self {
        let title = title.into();
        eprintln!("==> {title}");
        Passthrough { title }
    }
}

impl ProgressSink for Passthrough {
    fn update(&mut self, line: OutputLine) {
        if !line.text.trim().is_empty() {
            eprintln!("    {}", line.text.trim_end());
        }
    }

    fn finish(&mut self, success: bool) {
        if !success {
            eprintln!("==> {} failed", self.title);
        }
    }
}

pub fn sink(verbose: bool, title: &str) -> Box<dyn ProgressSink> {
    if verbose {
        Box::new(Passthrough::new(title))
    } else {
        Box::new(Spinner::new(title))
    }
}

/// Runs a step with a fresh progress sink that receives its output.
pub fn run_step<T>(
    verbose: bool,
    title: &str,
    step: impl FnOnce(&mut dyn FnMut(OutputLine)) -> Result<T, Error>,
) -> Result<T, Error> {
    let mut sink = sink(verbose, title);
    let result = step(&mut |line| sink.update(line));
    sink.finish(result.is_ok());
    result
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= SPINNER_MESSAGE_WIDTH {
        return text.to_string();
    }
    let mut truncated = text
        .chars()
        .take(SPINNER_MESSAGE_WIDTH - 3)
        .collect::<String>();
    truncated.push_str("...");
    truncated
}
