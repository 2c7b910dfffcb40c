use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use wallpaper_finder_core::fetch::Progress;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Renders the download counter on a background thread
pub struct DownloadBar {
    done: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl DownloadBar {
    pub fn start(progress: Progress) -> anyhow::Result<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("[{eta}] {bar:40.cyan/blue} {pos}/{len} ({percent}%) {msg}")?
                .progress_chars("##-"),
        );
        bar.set_message("Downloading images...");

        let done = Arc::new(AtomicBool::new(false));
        let thread_done = Arc::clone(&done);

        let handle = thread::spawn(move || {
            while !thread_done.load(Ordering::Relaxed) {
                bar.set_length(progress.total() as u64);
                bar.set_position(progress.completed() as u64);
                thread::sleep(POLL_INTERVAL);
            }
            bar.set_length(progress.total() as u64);
            bar.set_position(progress.completed() as u64);
            bar.finish_with_message("Downloads finished");
        });

        Ok(Self {
            done,
            handle: Some(handle),
        })
    }

    /// Stop polling and leave the final state on screen
    pub fn finish(&mut self) {
        self.done.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for DownloadBar {
    fn drop(&mut self) {
        self.finish();
    }
}
