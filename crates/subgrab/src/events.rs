use std::sync::Arc;

use url::Url;

/// Progress notifications emitted while extracting subtitle tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    TrackStarted {
        /// 1-based position among the selected tracks
        index: usize,
        total: usize,
        label: String,
    },
    /// One segment of the current track finished (successfully or not).
    /// `completed` increases monotonically up to `total` within a track.
    SegmentCompleted {
        completed: usize,
        total: usize,
        url: Url,
    },
    TrackExported {
        label: String,
        name: String,
        cues: usize,
    },
    TrackFailed {
        label: String,
        reason: String,
    },
}

/// Subscriber for [`ProgressEvent`]s. Must return promptly.
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

pub(crate) fn emit(callback: Option<&ProgressCallback>, event: ProgressEvent) {
    if let Some(callback) = callback {
        callback(event);
    }
}
