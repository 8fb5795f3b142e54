use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use subgrab_engine::{ProgressCallback, ProgressEvent};

const BAR_TEMPLATE: &str =
    "{spinner:.yellow} {prefix:.bold} [{bar:30.yellow/white}] {pos}/{len} segments {msg}";

/// Renders extraction progress as a single per-track segment bar.
#[derive(Clone)]
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    pub fn new(hidden: bool) -> Self {
        let bar = if hidden {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(0)
        };
        let style = ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        bar.set_style(style);
        Self { bar }
    }

    pub fn handle(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::TrackStarted {
                index,
                total,
                label,
            } => {
                self.bar.reset();
                self.bar.set_length(0);
                self.bar.set_prefix(format!("[{index}/{total}] {label}"));
                self.bar.set_message("");
            }
            ProgressEvent::SegmentCompleted {
                completed, total, ..
            } => {
                self.bar.set_length(total as u64);
                self.bar.set_position(completed as u64);
            }
            ProgressEvent::TrackExported { name, cues, .. } => {
                self.bar.println(format!("saved {name} ({cues} cues)"));
            }
            ProgressEvent::TrackFailed { label, reason } => {
                self.bar.println(format!("failed {label}: {reason}"));
            }
        }
    }

    /// Callback to hand to the extractor.
    pub fn callback(&self) -> ProgressCallback {
        let reporter = self.clone();
        Arc::new(move |event| reporter.handle(event))
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    pub fn position(&self) -> (u64, Option<u64>) {
        (self.bar.position(), self.bar.length())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    #[test]
    fn tracks_segment_position_per_track() {
        let reporter = ProgressReporter::new(true);
        let callback = reporter.callback();
        let url = Url::parse("https://cdn.example.com/1.vtt").unwrap();

        callback(ProgressEvent::TrackStarted {
            index: 1,
            total: 2,
            label: "sv".into(),
        });
        callback(ProgressEvent::SegmentCompleted {
            completed: 3,
            total: 7,
            url: url.clone(),
        });
        assert_eq!(reporter.position(), (3, Some(7)));

        callback(ProgressEvent::TrackStarted {
            index: 2,
            total: 2,
            label: "en[forced]".into(),
        });
        assert_eq!(reporter.position().0, 0);
    }
}
