use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::types::ProgressSample;

/// Default number of cells in the rendered progress bar.
pub const PROGRESS_BAR_WIDTH: usize = 10;

/// Longest a single status edit may take before it is abandoned.
const SINK_UPDATE_TIMEOUT: Duration = Duration::from_secs(10);

/// How long [`ProgressReporter::finish`] waits for the last edit.
const FINISH_GRACE: Duration = Duration::from_secs(2);

const FILLED_CELL: char = '▓';
const EMPTY_CELL: char = '░';

const UNITS: [&str; 9] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB", "ZiB", "YiB"];

/// Derived transfer statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressStats {
    /// Completion in percent (0 when the total is unknown).
    pub percentage: f64,
    /// Average throughput in bytes/second.
    pub speed: f64,
    /// Estimated seconds remaining.
    pub eta_secs: f64,
}

/// Computes percentage, throughput and ETA.
///
/// Every division is guarded: a zero total yields 0 %, a non-positive
/// elapsed time yields zero speed, and zero speed yields zero ETA.
pub fn progress_stats(current: u64, total: u64, elapsed_secs: f64) -> ProgressStats {
    let percentage = if total == 0 {
        0.0
    } else {
        current as f64 / total as f64 * 100.0
    };

    let speed = if elapsed_secs > 0.0 {
        current as f64 / elapsed_secs
    } else {
        0.0
    };

    let eta_secs = if speed > 0.0 {
        (total.saturating_sub(current)) as f64 / speed
    } else {
        0.0
    };

    ProgressStats {
        percentage,
        speed,
        eta_secs,
    }
}

/// Formats a byte count with binary prefixes and one decimal (`1.5 MiB`).
pub fn format_size(bytes: u64) -> String {
    format_scaled(bytes as f64)
}

/// Formats a throughput value (`12.0 KiB/s`).
pub fn format_speed(bytes_per_sec: f64) -> String {
    format!("{}/s", format_scaled(bytes_per_sec.max(0.0)))
}

fn format_scaled(mut value: f64) -> String {
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    // 1023.96 would print as "1024.0"; promote instead.
    if (value * 10.0).round() >= 10240.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

/// Formats seconds as `HH:MM:SS`.
pub fn format_eta(secs: f64) -> String {
    let total = if secs.is_finite() && secs > 0.0 {
        secs.round() as u64
    } else {
        0
    };
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

/// Renders a bar of `width` cells, filled proportionally (floor-rounded).
pub fn progress_bar(percentage: f64, width: usize) -> String {
    let ratio = if percentage.is_finite() {
        percentage.clamp(0.0, 100.0) / 100.0
    } else {
        0.0
    };
    let filled = ((ratio * width as f64).floor() as usize).min(width);

    let mut bar = String::with_capacity(width * FILLED_CELL.len_utf8());
    bar.extend(std::iter::repeat_n(FILLED_CELL, filled));
    bar.extend(std::iter::repeat_n(EMPTY_CELL, width - filled));
    bar
}

/// Renders the status text for one sample.
pub fn render_progress(action: &str, sample: &ProgressSample, bar_width: usize) -> String {
    let stats = sample.stats();
    let total = if sample.bytes_total == 0 {
        "unknown".to_string()
    } else {
        format_size(sample.bytes_total)
    };

    format!(
        "{action} progress\n\n\
         Percentage: {:.2}% | {}/{}\n\
         Speed: {} | ETA: {}\n\
         [{}]",
        stats.percentage,
        format_size(sample.bytes_done),
        total,
        format_speed(stats.speed),
        format_eta(stats.eta_secs),
        progress_bar(stats.percentage, bar_width),
    )
}

// ---------------------------------------------------------------------------
// Reporter
// ---------------------------------------------------------------------------

/// Error returned by a [`StatusSink`] that could not show an update.
#[derive(Debug, thiserror::Error)]
#[error("status update failed: {0}")]
pub struct SinkError(pub String);

/// Destination for progress text, typically an editable status message.
///
/// Implementations may reject updates (rate limits, unchanged text); the
/// reporter logs and ignores such failures.
pub trait StatusSink: Send + Sync {
    fn update(&self, text: String) -> Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + '_>>;
}

/// Best-effort progress side channel.
///
/// [`observe`](Self::observe) renders the latest sample synchronously; a
/// background task pushes the newest text to the sink at most once per
/// interval. Nothing the sink does can fail the transfer.
pub struct ProgressReporter {
    action: String,
    started_at: Instant,
    bar_width: usize,
    latest: watch::Sender<Option<String>>,
    finished: CancellationToken,
    task: JoinHandle<()>,
}

impl ProgressReporter {
    /// Starts a reporter for `action` (e.g. "Downloading").
    ///
    /// Must be called within a tokio runtime.
    pub fn spawn(
        sink: Arc<dyn StatusSink>,
        action: impl Into<String>,
        interval: Duration,
        bar_width: usize,
    ) -> Self {
        let (latest, rx) = watch::channel(None);
        let finished = CancellationToken::new();
        let task = tokio::spawn(forward_updates(sink, rx, interval, finished.clone()));

        Self {
            action: action.into(),
            started_at: Instant::now(),
            bar_width,
            latest,
            finished,
            task,
        }
    }

    /// Records a new sample. Never blocks and never fails.
    pub fn observe(&self, bytes_done: u64, bytes_total: u64) {
        let sample = ProgressSample {
            bytes_done,
            bytes_total,
            started_at: self.started_at,
        };
        let text = render_progress(&self.action, &sample, self.bar_width);
        self.latest.send_replace(Some(text));
    }

    /// Pushes the last pending sample (skipping the throttle) and stops.
    ///
    /// A sink still busy after a short grace period is abandoned.
    pub async fn finish(self) {
        let Self {
            action,
            latest,
            finished,
            mut task,
            ..
        } = self;
        finished.cancel();
        drop(latest);
        match tokio::time::timeout(FINISH_GRACE, &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "progress forwarder ended abnormally"),
            Err(_) => {
                task.abort();
                warn!(action = %action, "status sink stalled, last progress update dropped");
            }
        }
    }
}

async fn forward_updates(
    sink: Arc<dyn StatusSink>,
    mut rx: watch::Receiver<Option<String>>,
    interval: Duration,
    finished: CancellationToken,
) {
    let mut last_sent: Option<String> = None;

    // `changed` still yields an unseen value after the sender is dropped.
    while rx.changed().await.is_ok() {
        let Some(text) = rx.borrow_and_update().clone() else {
            continue;
        };
        if last_sent.as_deref() == Some(text.as_str()) {
            continue;
        }

        match tokio::time::timeout(SINK_UPDATE_TIMEOUT, sink.update(text.clone())).await {
            Ok(Ok(())) => debug!("progress update pushed"),
            Ok(Err(e)) => warn!(error = %e, "progress update dropped"),
            Err(_) => warn!(
                timeout_secs = SINK_UPDATE_TIMEOUT.as_secs(),
                "progress update timed out"
            ),
        }
        last_sent = Some(text);

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = finished.cancelled() => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn percentage_formula() {
        let stats = progress_stats(256, 1024, 1.0);
        assert_eq!(stats.percentage, 25.0);
        assert_eq!(progress_stats(3072, 3072, 1.0).percentage, 100.0);
    }

    #[test]
    fn percentage_is_monotonic() {
        let total = 10_000;
        let mut prev = -1.0;
        for current in (0..=total).step_by(37) {
            let pct = progress_stats(current, total, 1.0).percentage;
            assert!(pct >= prev, "{current}: {pct} < {prev}");
            prev = pct;
        }
    }

    #[test]
    fn zero_total_is_guarded() {
        let stats = progress_stats(500, 0, 2.0);
        assert_eq!(stats.percentage, 0.0);
        assert!(!stats.percentage.is_nan());
        assert_eq!(stats.eta_secs, 0.0);
    }

    #[test]
    fn zero_elapsed_is_guarded() {
        let stats = progress_stats(500, 1000, 0.0);
        assert_eq!(stats.speed, 0.0);
        assert_eq!(stats.eta_secs, 0.0);

        let stats = progress_stats(500, 1000, -1.0);
        assert_eq!(stats.speed, 0.0);
    }

    #[test]
    fn speed_and_eta() {
        let stats = progress_stats(1000, 3000, 2.0);
        assert_eq!(stats.speed, 500.0);
        assert_eq!(stats.eta_secs, 4.0);
    }

    #[test]
    fn format_size_units() {
        assert_eq!(format_size(0), "0.0 B");
        assert_eq!(format_size(1023), "1023.0 B");
        assert_eq!(format_size(1024), "1.0 KiB");
        assert_eq!(format_size(1536), "1.5 KiB");
        assert_eq!(format_size(1024 * 1024), "1.0 MiB");
        assert_eq!(format_size(2 * 1024 * 1024 * 1024), "2.0 GiB");
        assert_eq!(format_size(u64::MAX), "16.0 EiB");
    }

    #[test]
    fn format_size_never_prints_1024() {
        assert_eq!(format_size(1024 * 1024 - 1), "1.0 MiB");
    }

    #[test]
    fn format_size_monotonic_across_boundaries() {
        fn magnitude(s: &str) -> f64 {
            let (value, unit) = s.split_once(' ').unwrap();
            let exp = UNITS.iter().position(|u| *u == unit).unwrap();
            value.parse::<f64>().unwrap() * 1024f64.powi(exp as i32)
        }
        let samples = [0u64, 1, 1023, 1024, 1025, 1_048_575, 1_048_576, 5_000_000_000];
        for pair in samples.windows(2) {
            assert!(magnitude(&format_size(pair[0])) <= magnitude(&format_size(pair[1])));
        }
    }

    #[test]
    fn format_speed_suffix() {
        assert_eq!(format_speed(2048.0), "2.0 KiB/s");
        assert_eq!(format_speed(-5.0), "0.0 B/s");
    }

    #[test]
    fn format_eta_clock() {
        assert_eq!(format_eta(0.0), "00:00:00");
        assert_eq!(format_eta(61.4), "00:01:01");
        assert_eq!(format_eta(3600.0 * 25.0 + 5.0), "25:00:05");
        assert_eq!(format_eta(f64::INFINITY), "00:00:00");
    }

    #[test]
    fn bar_is_floor_rounded() {
        assert_eq!(progress_bar(0.0, 10), "░░░░░░░░░░");
        assert_eq!(progress_bar(19.9, 10), "▓░░░░░░░░░");
        assert_eq!(progress_bar(100.0, 10), "▓▓▓▓▓▓▓▓▓▓");
        assert_eq!(progress_bar(150.0, 4), "▓▓▓▓");
        assert_eq!(progress_bar(f64::NAN, 4), "░░░░");
        assert_eq!(progress_bar(50.0, 20).chars().filter(|c| *c == '▓').count(), 10);
    }

    #[test]
    fn render_final_sample() {
        let sample = ProgressSample {
            bytes_done: 3072,
            bytes_total: 3072,
            started_at: Instant::now(),
        };
        let text = render_progress("Downloading", &sample, 10);
        assert!(text.starts_with("Downloading progress"));
        assert!(text.contains("Percentage: 100.00% | 3.0 KiB/3.0 KiB"));
        assert!(text.contains("[▓▓▓▓▓▓▓▓▓▓]"));
    }

    #[test]
    fn render_unknown_total() {
        let sample = ProgressSample {
            bytes_done: 10,
            bytes_total: 0,
            started_at: Instant::now(),
        };
        let text = render_progress("Uploading", &sample, 10);
        assert!(text.contains("Percentage: 0.00% | 10.0 B/unknown"));
    }

    /// Sink recording every update; optionally failing all of them.
    struct RecordingSink {
        updates: Mutex<Vec<String>>,
        fail: bool,
    }

    impl RecordingSink {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                updates: Mutex::new(Vec::new()),
                fail,
            })
        }
    }

    impl StatusSink for RecordingSink {
        fn update(
            &self,
            text: String,
        ) -> Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + '_>> {
            Box::pin(async move {
                self.updates.lock().unwrap().push(text);
                if self.fail {
                    Err(SinkError("message is not modified".into()))
                } else {
                    Ok(())
                }
            })
        }
    }

    #[tokio::test]
    async fn reporter_flushes_final_sample() {
        let sink = RecordingSink::new(false);
        let reporter = ProgressReporter::spawn(
            sink.clone(),
            "Downloading",
            Duration::from_secs(60),
            PROGRESS_BAR_WIDTH,
        );

        reporter.observe(1024, 3072);
        reporter.observe(2048, 3072);
        reporter.observe(3072, 3072);
        reporter.finish().await;

        let updates = sink.updates.lock().unwrap();
        assert!(!updates.is_empty());
        assert!(updates.len() <= 3);
        assert!(updates.last().unwrap().contains("100.00%"));
    }

    #[tokio::test]
    async fn reporter_swallows_sink_errors() {
        let sink = RecordingSink::new(true);
        let reporter =
            ProgressReporter::spawn(sink.clone(), "Uploading", Duration::ZERO, PROGRESS_BAR_WIDTH);

        reporter.observe(1, 2);
        reporter.observe(2, 2);
        // Completes normally even though every push failed.
        reporter.finish().await;

        assert!(!sink.updates.lock().unwrap().is_empty());
    }

    /// Sink whose updates never complete.
    struct StalledSink;

    impl StatusSink for StalledSink {
        fn update(
            &self,
            _text: String,
        ) -> Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + '_>> {
            Box::pin(std::future::pending())
        }
    }

    #[tokio::test]
    async fn stalled_sink_does_not_hold_up_finish() {
        let reporter = ProgressReporter::spawn(
            Arc::new(StalledSink),
            "Downloading",
            Duration::ZERO,
            PROGRESS_BAR_WIDTH,
        );

        reporter.observe(1024, 3072);
        tokio::time::timeout(Duration::from_secs(5), reporter.finish())
            .await
            .expect("finish waited on a stalled sink");
    }

    #[tokio::test]
    async fn reporter_without_samples_pushes_nothing() {
        let sink = RecordingSink::new(false);
        let reporter =
            ProgressReporter::spawn(sink.clone(), "Downloading", Duration::ZERO, PROGRESS_BAR_WIDTH);
        reporter.finish().await;
        assert!(sink.updates.lock().unwrap().is_empty());
    }
}
