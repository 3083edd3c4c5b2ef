//! Progress indicators with plain fallback

use super::context::UiContext;
use crate::report::format_bytes;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// A task spinner with plain fallback
pub struct TaskSpinner {
    spinner: Option<cliclack::ProgressBar>,
    interactive: bool,
}

impl TaskSpinner {
    pub fn new(ctx: &UiContext) -> Self {
        Self {
            spinner: None,
            interactive: ctx.use_fancy_output(),
        }
    }

    pub fn start(&mut self, message: &str) {
        if self.interactive {
            let spinner = cliclack::spinner();
            spinner.start(message);
            self.spinner = Some(spinner);
        } else {
            println!("{} {}", style("...").dim(), message);
        }
    }

    pub fn stop(&mut self, message: &str) {
        match self.spinner.take() {
            Some(spinner) => spinner.stop(message),
            None => println!("{} {}", style("[OK]").green(), message),
        }
    }

    pub fn stop_error(&mut self, message: &str) {
        match self.spinner.take() {
            Some(spinner) => spinner.error(message),
            None => println!("{} {}", style("[FAIL]").red(), message),
        }
    }
}

/// Per-file progress for model imports
///
/// An indicatif bar on a terminal, one line per file otherwise.
pub struct TransferProgress {
    bar: Option<ProgressBar>,
    total: usize,
    done: usize,
}

impl TransferProgress {
    pub fn new(ctx: &UiContext, label: &str, files: usize) -> Self {
        let bar = if ctx.use_fancy_output() {
            let bar = ProgressBar::new(files as u64);
            if let Ok(template) = ProgressStyle::default_bar().template(
                "  {spinner:.cyan} {prefix}  {bar:20.cyan/dim} {pos}/{len} {msg:.dim}  {elapsed:.dim}",
            ) {
                bar.set_style(
                    template
                        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
                        .progress_chars("━╸─"),
                );
            }
            bar.set_prefix(label.to_string());
            bar.enable_steady_tick(Duration::from_millis(120));
            Some(bar)
        } else {
            println!("Importing {} ({} files)...", label, files);
            None
        };
        Self {
            bar,
            total: files,
            done: 0,
        }
    }

    /// One file stored
    pub fn advance(&mut self, name: &str, bytes: u64) {
        self.done += 1;
        match self.bar {
            Some(ref bar) => {
                bar.set_message(name.to_string());
                bar.inc(1);
            }
            None => println!(
                "  [{}/{}] {} ({})",
                self.done,
                self.total,
                name,
                format_bytes(bytes)
            ),
        }
    }

    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.disable_steady_tick();
            bar.finish_and_clear();
        }
    }

    /// Leave the bar where it stopped
    pub fn abandon(&self) {
        if let Some(ref bar) = self.bar {
            bar.disable_steady_tick();
            bar.abandon();
        }
    }

    pub fn completed(&self) -> usize {
        self.done
    }
}
