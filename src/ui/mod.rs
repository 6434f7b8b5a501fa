//! Terminal progress display for enrichment batches.

use indicatif::{ProgressBar, ProgressStyle};

/// Progress bar for one batch of candidates
pub struct BatchProgress {
    pb: ProgressBar,
}

impl BatchProgress {
    /// Create a visible progress bar for `total` candidates
    pub fn new(batch: usize, total: usize) -> Self {
        let pb = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "{msg} {wide_bar:.cyan/blue} {pos}/{len} [{elapsed_precise}<{eta_precise}]",
        ) {
            pb.set_style(style.progress_chars("█▉▊▋▌▍▎▏ "));
        }
        pb.set_message(format!("Enriching batch {}", batch));

        Self { pb }
    }

    /// A progress bar that draws nothing
    pub fn hidden() -> Self {
        Self {
            pb: ProgressBar::hidden(),
        }
    }

    /// Create a bar for a batch, hidden when `visible` is false
    pub fn for_batch(batch: usize, total: usize, visible: bool) -> Self {
        if visible {
            Self::new(batch, total)
        } else {
            Self::hidden()
        }
    }

    /// Mark one candidate as done
    pub fn inc(&self) {
        self.pb.inc(1);
    }

    /// Show the ISBN currently being looked up
    pub fn set_current(&self, isbn: &str) {
        self.pb.set_message(format!("Enriching {}", isbn));
    }

    pub fn position(&self) -> u64 {
        self.pb.position()
    }

    /// Finish and clear the bar
    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}
