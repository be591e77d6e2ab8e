use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use lifeline_core::progress::{ProgressEmitter, ProgressEvent};
use std::time::Duration;

fn default_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
}

fn finished_style() -> ProgressStyle {
    ProgressStyle::with_template("{msg}").unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// A spinner that maps the run's progress events to one status line on stderr.
#[derive(Debug)]
pub struct SpinnerEmitter {
    pb: ProgressBar,
    total_stages: usize,
    current_stage: Option<String>,
}

impl SpinnerEmitter {
    pub fn new() -> Self {
        let pb = ProgressBar::new_spinner();
        pb.enable_steady_tick(Duration::from_millis(80));
        pb.set_style(default_style());
        Self {
            pb,
            total_stages: 0,
            current_stage: None,
        }
    }

    fn set_msg(&self, msg: impl Into<String>) {
        self.pb.set_message(msg.into());
    }

    fn finish_with(&self, msg: impl Into<String>) {
        self.pb.set_style(finished_style());
        self.pb.finish_with_message(msg.into());
    }
}

impl Drop for SpinnerEmitter {
    fn drop(&mut self) {
        if !self.pb.is_finished() {
            self.pb.finish_and_clear();
        }
    }
}

impl ProgressEmitter for SpinnerEmitter {
    fn emit(&mut self, event: &ProgressEvent) -> Result<()> {
        use ProgressEvent::*;
        match event {
            RunBegin { stages, steps, .. } => {
                self.total_stages = *stages;
                self.set_msg(
                    style(format!("Starting lifecycle run ({} stages, {} steps)…", stages, steps))
                        .yellow()
                        .to_string(),
                );
            }
            StageBegin { index, name, .. } => {
                self.current_stage = Some(name.clone());
                self.set_msg(
                    style(format!("[{}/{}] {}…", index, self.total_stages, name))
                        .yellow()
                        .to_string(),
                );
            }
            StepEnd {
                step,
                success: true,
                ..
            } => {
                let stage = self.current_stage.as_deref().unwrap_or_default();
                self.set_msg(style(format!("{}: {}", stage, step)).yellow().to_string());
            }
            StepEnd {
                step,
                success: false,
                ..
            } => {
                let stage = self.current_stage.as_deref().unwrap_or_default();
                self.set_msg(
                    style(format!("{}: '{}' failed", stage, step))
                        .red()
                        .to_string(),
                );
            }
            StageEnd {
                name,
                success,
                duration_ms,
                ..
            } => {
                let status = if *success { "passed" } else { "failed" };
                let msg = format!("{} {} in {} ms", name, status, duration_ms);
                if *success {
                    self.set_msg(style(msg).green().to_string());
                } else {
                    self.set_msg(style(msg).red().to_string());
                }
            }
            RunEnd {
                success,
                duration_ms,
                ..
            } => {
                if *success {
                    self.finish_with(
                        style(format!("Lifecycle run passed in {} ms", duration_ms))
                            .green()
                            .to_string(),
                    );
                } else {
                    self.finish_with(style("Lifecycle run failed").red().to_string());
                }
            }
        }
        Ok(())
    }
}
