use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Liveness snapshot streamed to UIs while a walk is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    #[serde(rename = "folders")]
    pub folders_scanned: u64,
    #[serde(rename = "repos")]
    pub repos_found: u64,
}

/// Consumes progress events. Implementations must not block the walker.
pub trait ProgressSink: Send + Sync {
    fn send(&self, event: ProgressEvent);
}

/// Discards every event. Handy default for callers that only want the
/// final report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn send(&self, _event: ProgressEvent) {}
}

/// Sink backed by an unbounded channel. Sending never blocks, and a
/// receiver dropped mid-scan is tolerated silently.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelSink {
    fn send(&self, event: ProgressEvent) {
        let _ = self.tx.send(event);
    }
}

/// Minimum spacing between unforced emissions.
pub const MIN_EMIT_INTERVAL: Duration = Duration::from_millis(60);

/// Rate-limits progress emissions so a fast walk cannot flood the UI
/// channel. Forced sends always pass and reset the throttle window.
pub struct ProgressReporter<'a> {
    sink: &'a dyn ProgressSink,
    min_interval: Duration,
    last_sent_at: Option<Instant>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(sink: &'a dyn ProgressSink) -> Self {
        Self::with_interval(sink, MIN_EMIT_INTERVAL)
    }

    pub fn with_interval(sink: &'a dyn ProgressSink, min_interval: Duration) -> Self {
        Self {
            sink,
            min_interval,
            last_sent_at: None,
        }
    }

    /// Emits unless an unforced event would land inside the throttle window.
    pub fn report(&mut self, folders_scanned: u64, repos_found: u64, force: bool) {
        let now = Instant::now();
        if !force {
            if let Some(last) = self.last_sent_at {
                if now.duration_since(last) < self.min_interval {
                    return;
                }
            }
        }
        self.last_sent_at = Some(now);
        self.sink.send(ProgressEvent {
            folders_scanned,
            repos_found,
        });
    }
}
