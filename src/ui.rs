use clap::ValueEnum;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

/// Stage and frame progress on stderr.
#[derive(Clone, Debug)]
pub struct Ui {
    pretty: bool,
}

impl Ui {
    /// `Auto` goes pretty only when stderr is a terminal and stdout is not
    /// carrying machine output (e.g. `--json` piped elsewhere).
    pub fn new(mode: UiMode, stderr_is_tty: bool, stdout_is_tty: bool) -> Self {
        let pretty = stderr_is_tty
            && match mode {
                UiMode::Pretty => true,
                UiMode::Auto => stdout_is_tty,
                UiMode::Plain => false,
            };
        Self { pretty }
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        if self.pretty {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }

    /// Per-frame counter for video runs. `limit` is the frame cap, if any.
    pub fn frames(&self, limit: Option<u64>) -> FrameProgress {
        if !self.pretty {
            return FrameProgress { bar: None };
        }
        let (bar, template) = match limit {
            Some(limit) => (
                ProgressBar::new(limit),
                "{spinner} frames {pos}/{len} [{elapsed_precise}] {msg}",
            ),
            None => (
                ProgressBar::new_spinner(),
                "{spinner} frames {pos} [{elapsed_precise}] {msg}",
            ),
        };
        bar.set_draw_target(ProgressDrawTarget::stderr());
        bar.enable_steady_tick(Duration::from_millis(120));
        let style = ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(style);
        FrameProgress { bar: Some(bar) }
    }
}

pub struct FrameProgress {
    bar: Option<ProgressBar>,
}

impl FrameProgress {
    pub fn frame_done(&self, vehicles: usize) {
        if let Some(bar) = &self.bar {
            bar.inc(1);
            bar.set_message(format!("{vehicles} vehicle(s) in last frame"));
        }
    }

    pub fn finish(&self, frames: u64) {
        match &self.bar {
            Some(bar) => bar.finish_with_message(format!("✔ {frames} frame(s)")),
            None => eprintln!("✔ {frames} frame(s)"),
        }
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let message = format!("✔ {} ({})", self.name, format_duration(elapsed));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
