//! Progress tracking for export and restore runs
//!
//! Wraps an `indicatif` bar (total known) or spinner (total unknown) and
//! keeps the processed count even when drawing is disabled.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

/// Progress tracker for document transfers
pub struct ProgressTracker {
    /// Number of documents processed so far
    processed: AtomicU64,
    /// Start time of the operation
    start_time: Instant,
    /// Progress bar (optional, can be disabled)
    bar: Option<ProgressBar>,
}

impl ProgressTracker {
    /// Create a new progress tracker
    ///
    /// # Arguments
    /// * `total` - Expected number of documents if known
    /// * `enable_bar` - Whether to draw a progress bar on stderr
    pub fn new(total: Option<u64>, enable_bar: bool) -> Self {
        let bar = enable_bar.then(|| match total {
            Some(n) => {
                let bar = ProgressBar::new(n);
                if let Ok(style) =
                    ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                {
                    bar.set_style(style.progress_chars("#>-"));
                }
                bar
            }
            None => {
                let bar = ProgressBar::new_spinner();
                if let Ok(style) =
                    ProgressStyle::default_spinner().template("{spinner:.green} {pos} documents {msg}")
                {
                    bar.set_style(style);
                }
                bar
            }
        });

        Self {
            processed: AtomicU64::new(0),
            start_time: Instant::now(),
            bar,
        }
    }

    /// Update progress with the running total
    pub fn update(&self, count: u64) {
        self.processed.store(count, Ordering::Relaxed);

        if let Some(ref bar) = self.bar {
            // Estimates and counts are advisory; grow the bar instead of overflowing it
            if bar.length().is_some_and(|len| count > len) {
                bar.set_length(count);
            }
            bar.set_position(count);

            let elapsed = self.start_time.elapsed().as_secs_f64();
            if elapsed > 0.0 {
                let speed = count as f64 / elapsed;
                bar.set_message(format!("({:.0} docs/sec)", speed));
            }
        }
    }

    /// Last reported total
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Milliseconds since the tracker was created
    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// Finish and clear the progress bar
    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.finish_and_clear();
        }
        debug!("{} documents in {} ms", self.processed(), self.elapsed_ms());
    }
}
