//! Frame pipeline stats: throttling, detection timing, and output counts

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Clone, Default)]
pub struct PipelineStats {
    pub frames_received: u64,
    pub frames_skipped: u64,
    pub detect_errors: u64,
    pub events_emitted: u64,
    pub detection: DetectionTiming,
}

/// Running totals over detector calls. Constant size however long the
/// camera runs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectionTiming {
    pub count: u64,
    /// Calls that found at least one hand
    pub with_hands: u64,
    pub total: Duration,
    pub min: Option<Duration>,
    pub max: Duration,
}

impl DetectionTiming {
    pub fn record(&mut self, duration: Duration, hands: usize) {
        self.count += 1;
        if hands > 0 {
            self.with_hands += 1;
        }
        self.total += duration;
        self.min = Some(self.min.map_or(duration, |m| m.min(duration)));
        self.max = self.max.max(duration);
    }

    pub fn average(&self) -> Duration {
        match u32::try_from(self.count) {
            Ok(0) => Duration::ZERO,
            Ok(n) => self.total / n,
            Err(_) => Duration::from_secs_f64(self.total.as_secs_f64() / self.count as f64),
        }
    }
}

impl PipelineStats {
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let detection = &self.detection;

        if self.frames_received > 0 {
            out.push_str(&format!(
                "Frames: received={} skipped={} detected={} errors={}\n",
                self.frames_received, self.frames_skipped, detection.count, self.detect_errors
            ));
        }

        if detection.count > 0 {
            out.push_str(&format!(
                "Detection (n={}): avg={:.1}ms min={:.1}ms max={:.1}ms total={:.2}s \
                 hands-in-view={:.0}%\n",
                detection.count,
                detection.average().as_secs_f64() * 1000.0,
                detection.min.unwrap_or_default().as_secs_f64() * 1000.0,
                detection.max.as_secs_f64() * 1000.0,
                detection.total.as_secs_f64(),
                detection.with_hands as f64 * 100.0 / detection.count as f64
            ));
        }

        if self.events_emitted > 0 {
            out.push_str(&format!("Events: {}\n", self.events_emitted));
        }

        if out.is_empty() {
            out.push_str("No frames processed yet.\n");
        }
        out
    }
}

pub type SharedStats = Arc<Mutex<PipelineStats>>;

pub fn new_shared() -> SharedStats {
    Arc::new(Mutex::new(PipelineStats::default()))
}

/// Times one detection call
pub struct Timer<'a> {
    start: Instant,
    stats: &'a SharedStats,
}

impl<'a> Timer<'a> {
    pub fn new(stats: &'a SharedStats) -> Self {
        Self {
            start: Instant::now(),
            stats,
        }
    }

    pub fn finish(self, hands: usize) {
        let elapsed = self.start.elapsed();
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .detection
            .record(elapsed, hands);
    }
}
