use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner for blocking work such as a reconciliation pass
pub struct Spinner {
    pb: ProgressBar,
}

impl Spinner {
    pub fn new(message: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg} {elapsed:.dim}") {
            pb.set_style(style);
        }
        pb.set_message(message.to_string());
        if console::Term::stdout().is_term() {
            pb.enable_steady_tick(Duration::from_millis(100));
        }
        Self { pb }
    }

    pub fn finish_and_clear(&self) {
        self.pb.finish_and_clear();
    }
}
