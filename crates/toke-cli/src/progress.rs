//! Terminal progress for downloads and setup phases.
//!
//! Bars are created lazily on the first report, so the same [`CliProgress`]
//! can back a byte-counting [`ProgressCallback`] and a phase-printing
//! [`StatusCallback`].

use std::sync::{Arc, Mutex};

use indicatif::{ProgressBar, ProgressStyle};
use toke_core::{ProgressCallback, StatusCallback};

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})";
const SPINNER_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] {msg}";

#[derive(Default)]
pub struct CliProgress {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliProgress {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn download_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::with_template(BAR_TEMPLATE) {
            pb.set_style(style.progress_chars("█▓░"));
        }
        pb
    }

    fn spinner() -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template(SPINNER_TEMPLATE) {
            pb.set_style(style);
        }
        pb.enable_steady_tick(std::time::Duration::from_millis(120));
        pb
    }

    /// Byte progress; a zero total is ignored until a real one arrives.
    pub fn update(&self, downloaded: u64, total: u64) {
        let Ok(mut guard) = self.bar.lock() else {
            return;
        };
        match guard.as_ref() {
            Some(pb) => {
                if total > 0 && pb.length() != Some(total) {
                    pb.set_length(total);
                }
                pb.set_position(downloaded);
            }
            None if total > 0 => {
                let pb = Self::download_bar(total);
                pb.set_position(downloaded);
                *guard = Some(pb);
            }
            None => {}
        }
    }

    /// Print a phase line, keeping a spinner alive between phases.
    pub fn message(&self, msg: &str) {
        let Ok(mut guard) = self.bar.lock() else {
            println!("{msg}");
            return;
        };
        let pb = guard.get_or_insert_with(Self::spinner);
        pb.set_message(msg.to_string());
        pb.println(msg);
    }

    pub fn finish(&self, message: &str) {
        if let Ok(mut guard) = self.bar.lock()
            && let Some(pb) = guard.take()
        {
            pb.finish_with_message(message.to_string());
        }
    }

    pub fn abandon(&self, message: &str) {
        if let Ok(mut guard) = self.bar.lock()
            && let Some(pb) = guard.take()
        {
            pb.abandon_with_message(message.to_string());
        }
    }

    pub fn progress_callback(self: &Arc<Self>) -> ProgressCallback {
        let this = Arc::clone(self);
        Arc::new(move |downloaded: u64, total: u64| this.update(downloaded, total))
    }

    pub fn status_callback(self: &Arc<Self>) -> StatusCallback {
        let this = Arc::clone(self);
        Arc::new(move |phase: &str| this.message(phase))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn length(progress: &CliProgress) -> Option<u64> {
        progress
            .bar
            .lock()
            .unwrap()
            .as_ref()
            .and_then(ProgressBar::length)
    }

    #[test]
    fn bar_waits_for_a_known_total() {
        let progress = CliProgress::new();
        let report = progress.progress_callback();

        report(10, 0);
        assert!(progress.bar.lock().unwrap().is_none());

        report(10, 100);
        assert_eq!(length(&progress), Some(100));

        report(50, 200);
        assert_eq!(length(&progress), Some(200));
    }

    #[test]
    fn finish_clears_the_bar() {
        let progress = CliProgress::new();
        progress.update(1, 2);
        progress.finish("done");
        assert!(progress.bar.lock().unwrap().is_none());
        progress.finish("again");
    }
}
