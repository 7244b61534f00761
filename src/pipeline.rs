//! Frame pipeline: capture -> detect -> route -> events
//!
//! Capture pushes frames into a short bounded queue and never waits; if the
//! tracking worker is still busy the frame is dropped. The worker owns the
//! detector and the router and handles one frame at a time, applying control
//! commands only between frames.

use flume::{Receiver, Sender, TrySendError};
use std::sync::{Arc, PoisonError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

use crate::classifier::GestureProfile;
use crate::landmarks::HandObservation;
use crate::router::{AirTypeEvent, ModeRouter, TypingMode};
use crate::state::SharedState;
use crate::stats::{PipelineStats, SharedStats, Timer};

/// Frames allowed to wait for the worker.
pub const FRAME_QUEUE_DEPTH: usize = 2;

/// The hand landmark detector. Implementations wrap whatever model turns an
/// image into hands; the rest of the pipeline only sees the landmarks.
pub trait HandPoseDetector {
    type Image;

    fn detect(&mut self, image: &Self::Image) -> anyhow::Result<Vec<HandObservation>>;
}

/// One captured image and when it was taken, relative to capture start.
#[derive(Debug, Clone)]
pub struct Frame<T> {
    pub captured_at: Duration,
    pub image: T,
}

/// Capture side of the frame queue.
pub struct FrameSender<T> {
    tx: Sender<Frame<T>>,
}

impl<T> Clone for FrameSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> FrameSender<T> {
    /// Hand a frame to the worker without waiting. False if it was dropped.
    pub fn offer(&self, frame: Frame<T>) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                trace!("Tracker busy, frame dropped");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Wait for room in the queue. For lossless sources such as recordings.
    /// False once the worker is gone.
    pub fn send(&self, frame: Frame<T>) -> bool {
        self.tx.send(frame).is_ok()
    }
}

pub fn frame_channel<T>() -> (FrameSender<T>, Receiver<Frame<T>>) {
    let (tx, rx) = flume::bounded(FRAME_QUEUE_DEPTH);
    (FrameSender { tx }, rx)
}

/// Control requests applied between frames.
#[derive(Debug, Clone)]
pub enum RouterCommand {
    SetMode(TypingMode),
    SetTypingActive(bool),
    /// Calibrate the keyboard from the hands in the last processed frame.
    Calibrate,
    ResetCalibration,
    UpdateProfiles(Vec<GestureProfile>),
}

// ============================================================================
// Tracker
// ============================================================================

pub struct Tracker<D: HandPoseDetector> {
    detector: D,
    router: ModeRouter,
    state: SharedState,
    stats: SharedStats,
    events: Sender<AirTypeEvent>,
}

impl<D: HandPoseDetector> Tracker<D> {
    pub fn new(
        detector: D,
        router: ModeRouter,
        state: SharedState,
        stats: SharedStats,
        events: Sender<AirTypeEvent>,
    ) -> Self {
        let tracker = Self {
            detector,
            router,
            state,
            stats,
            events,
        };
        tracker.publish();
        tracker
    }

    pub fn router(&self) -> &ModeRouter {
        &self.router
    }

    pub fn stats(&self) -> &SharedStats {
        &self.stats
    }

    pub fn apply(&mut self, command: RouterCommand) {
        debug!("Router command: {:?}", command);
        match command {
            RouterCommand::SetMode(mode) => self.router.set_mode(mode),
            RouterCommand::SetTypingActive(active) => self.router.set_typing_active(active),
            RouterCommand::Calibrate => {
                if !self.router.calibrate_from_latest() {
                    warn!("Calibration failed: rest all eight fingertips on the home row");
                }
            }
            RouterCommand::ResetCalibration => self.router.mapper().reset(),
            RouterCommand::UpdateProfiles(profiles) => {
                self.router.classifier().update_profiles(profiles)
            }
        }
        self.publish();
    }

    /// Run one captured frame through throttle, detector and router.
    #[hotpath::measure]
    pub fn handle_frame(&mut self, frame: &Frame<D::Image>) {
        self.with_stats(|s| s.frames_received += 1);
        if !self.router.admit_frame() {
            self.with_stats(|s| s.frames_skipped += 1);
            return;
        }

        let timer = Timer::new(&self.stats);
        let hands = match self.detector.detect(&frame.image) {
            Ok(hands) => hands,
            Err(e) => {
                warn!("Hand detection failed: {:#}", e);
                self.with_stats(|s| s.detect_errors += 1);
                return;
            }
        };
        timer.finish(hands.len());
        self.state.record_frame(hands.len());

        let events = self.router.handle_hands(&hands, frame.captured_at);
        if events.is_empty() {
            return;
        }
        self.with_stats(|s| s.events_emitted += events.len() as u64);
        self.publish();
        for event in events {
            if self.events.send(event).is_err() {
                debug!("Event receiver gone");
                break;
            }
        }
    }

    fn with_stats(&self, f: impl FnOnce(&mut PipelineStats)) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut stats);
    }

    fn publish(&self) {
        let state = &self.state;
        state.set_mode(self.router.mode());
        state
            .typing_active
            .store(self.router.is_typing_active(), Ordering::SeqCst);
        state.set_last_key(self.router.last_typed_key());
        state.set_calibration(self.router.mapper().calibration().map(|c| c.key_width));
        state.profile_count.store(
            self.router.classifier().profile_count() as u32,
            Ordering::SeqCst,
        );
    }
}

/// Worker loop. Returns when `running` clears or every frame sender is gone;
/// frames already queued are still processed.
pub fn run_tracker<D: HandPoseDetector>(
    mut tracker: Tracker<D>,
    frames: Receiver<Frame<D::Image>>,
    commands: Receiver<RouterCommand>,
    running: Arc<AtomicBool>,
) -> Tracker<D> {
    info!("Tracker started in {} mode", tracker.router.mode());

    while running.load(Ordering::SeqCst) {
        for command in commands.try_iter() {
            tracker.apply(command);
        }
        match frames.recv_timeout(Duration::from_millis(100)) {
            Ok(frame) => tracker.handle_frame(&frame),
            Err(flume::RecvTimeoutError::Timeout) => continue,
            Err(flume::RecvTimeoutError::Disconnected) => break,
        }
    }

    // Drain remaining
    for command in commands.try_iter() {
        tracker.apply(command);
    }
    for frame in frames.drain() {
        tracker.handle_frame(&frame);
    }

    tracker.router.stop();
    tracker.publish();
    info!("Tracker stopped");
    tracker
}
