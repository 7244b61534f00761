//! Shared runtime state - what the tracking worker publishes for anyone watching
//!
//! The worker owns the router and is the only writer. Readers (status lines,
//! overlays, the CLI summary) see plain values without touching the router.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::config::Config;
use crate::router::TypingMode;

/// Thread-safe f32 using bit casting to AtomicU32
#[derive(Debug)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(v: f32) -> Self {
        Self(AtomicU32::new(v.to_bits()))
    }

    pub fn load(&self, order: Ordering) -> f32 {
        f32::from_bits(self.0.load(order))
    }

    pub fn store(&self, v: f32, order: Ordering) {
        self.0.store(v.to_bits(), order);
    }
}

pub struct RuntimeState {
    // ========================================================================
    // Typing state
    // ========================================================================
    /// Air typing switched on by the activation gesture
    pub typing_active: AtomicBool,
    /// Current typing mode (stored as u8)
    mode: AtomicU8,
    /// Last character typed, for overlays
    last_key: Mutex<Option<String>>,

    // ========================================================================
    // Keyboard state
    // ========================================================================
    pub calibrated: AtomicBool,
    /// Calibrated key width, 0.0 when uncalibrated
    pub key_width: AtomicF32,

    // ========================================================================
    // Classifier state
    // ========================================================================
    pub profile_count: AtomicU32,

    // ========================================================================
    // Frame state
    // ========================================================================
    /// Hands seen in the last detected frame
    pub hands_in_view: AtomicU8,
    /// Frames that went through detection
    pub frames_processed: AtomicU64,
}

impl RuntimeState {
    pub fn new(config: &Config) -> Arc<Self> {
        Arc::new(Self {
            typing_active: AtomicBool::new(false),
            mode: AtomicU8::new(config.router.mode as u8),
            last_key: Mutex::new(None),

            calibrated: AtomicBool::new(false),
            key_width: AtomicF32::new(0.0),

            profile_count: AtomicU32::new(0),

            hands_in_view: AtomicU8::new(0),
            frames_processed: AtomicU64::new(0),
        })
    }

    // ========================================================================
    // Mode helpers
    // ========================================================================

    pub fn mode(&self) -> TypingMode {
        TypingMode::from(self.mode.load(Ordering::SeqCst))
    }

    pub fn set_mode(&self, mode: TypingMode) {
        self.mode.store(mode as u8, Ordering::SeqCst);
    }

    pub fn is_typing_active(&self) -> bool {
        self.typing_active.load(Ordering::SeqCst)
    }

    // ========================================================================
    // Key helpers
    // ========================================================================

    pub fn last_key(&self) -> Option<String> {
        self.last_key
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_last_key(&self, key: Option<&str>) {
        *self.last_key.lock().unwrap_or_else(PoisonError::into_inner) = key.map(str::to_string);
    }

    /// Publish keyboard calibration; `None` means uncalibrated.
    pub fn set_calibration(&self, key_width: Option<f32>) {
        self.calibrated.store(key_width.is_some(), Ordering::SeqCst);
        self.key_width
            .store(key_width.unwrap_or(0.0), Ordering::SeqCst);
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrated.load(Ordering::SeqCst)
    }

    // ========================================================================
    // Frame helpers
    // ========================================================================

    pub fn record_frame(&self, hands: usize) {
        self.hands_in_view
            .store(hands.min(u8::MAX as usize) as u8, Ordering::SeqCst);
        self.frames_processed.fetch_add(1, Ordering::SeqCst);
    }

    /// One-line status for terminals
    pub fn status_line(&self) -> String {
        let keyboard = if self.is_calibrated() {
            format!("calibrated (key {:.3})", self.key_width.load(Ordering::SeqCst))
        } else {
            "not calibrated".to_string()
        };
        format!(
            "mode={} typing={} keyboard={} profiles={} last={}",
            self.mode(),
            if self.is_typing_active() { "on" } else { "off" },
            keyboard,
            self.profile_count.load(Ordering::SeqCst),
            self.last_key().as_deref().unwrap_or("-")
        )
    }
}

impl fmt::Debug for RuntimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeState")
            .field("mode", &self.mode())
            .field("typing_active", &self.is_typing_active())
            .field("calibrated", &self.is_calibrated())
            .field("key_width", &self.key_width.load(Ordering::SeqCst))
            .field("profile_count", &self.profile_count.load(Ordering::SeqCst))
            .field("hands_in_view", &self.hands_in_view.load(Ordering::SeqCst))
            .field(
                "frames_processed",
                &self.frames_processed.load(Ordering::SeqCst),
            )
            .field("last_key", &self.last_key())
            .finish()
    }
}

/// Type alias for shared state
pub type SharedState = Arc<RuntimeState>;
