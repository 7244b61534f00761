use std::time::Duration;
use tracing::{debug, trace};

use super::palm::{PalmHold, is_open_palm};
use super::tap::TapTracker;
use crate::config::GestureConfig;
use crate::landmarks::{Finger, HandObservation, Handedness, JointName, find_hand};

// ── Events ─────────────────────────────────────────────────

/// Events emitted by gesture recognition.
#[derive(Debug, Clone, PartialEq)]
pub enum GestureEvent {
    /// The open palm was held long enough to toggle typing.
    Activation,
    /// The index finger pecked down (profile mode).
    Keystroke,
    /// One typing finger pecked down (QWERTY mode). Carries the full hand so
    /// the key mapper can read the finger's position.
    FingerTap {
        hand: Handedness,
        finger: Finger,
        observation: HandObservation,
    },
}

// ── Occlusion ──────────────────────────────────────────────

/// Counts consecutive frames without a hand.
#[derive(Debug, Clone, Default)]
struct Occlusion {
    missed: u32,
}

impl Occlusion {
    fn seen(&mut self) {
        self.missed = 0;
    }

    /// Record a missing frame; true once the gap exceeds `grace` frames.
    fn missing(&mut self, grace: u32) -> bool {
        self.missed = self.missed.saturating_add(1);
        self.missed > grace
    }
}

// ── Per-hand finger trackers ───────────────────────────────

#[derive(Debug, Clone, Default)]
struct HandTaps {
    fingers: [TapTracker; 4],
    occlusion: Occlusion,
}

impl HandTaps {
    fn reset(&mut self) {
        for tracker in &mut self.fingers {
            tracker.reset();
        }
        self.occlusion = Occlusion::default();
    }

    fn is_idle(&self) -> bool {
        self.fingers
            .iter()
            .all(|t| t.last_y().is_none() && !t.is_active())
    }
}

// ── Recognizer ─────────────────────────────────────────────

/// Palm-hold and tap state for one tracking pipeline.
pub struct GestureRecognizer {
    config: GestureConfig,
    palm: PalmHold,
    index_tap: TapTracker,
    index_occlusion: Occlusion,
    left: HandTaps,
    right: HandTaps,
}

impl GestureRecognizer {
    pub fn new(config: GestureConfig) -> Self {
        let hold = Duration::try_from_secs_f32(config.hold_secs).unwrap_or(Duration::from_secs(2));
        Self {
            config,
            palm: PalmHold::new(hold),
            index_tap: TapTracker::new(),
            index_occlusion: Occlusion::default(),
            left: HandTaps::default(),
            right: HandTaps::default(),
        }
    }

    fn hand_taps_mut(&mut self, hand: Handedness) -> &mut HandTaps {
        match hand {
            Handedness::Left => &mut self.left,
            Handedness::Right => &mut self.right,
        }
    }

    /// Profile-mode path: palm hold plus index-finger tap on the first hand.
    pub fn process(&mut self, hands: &[HandObservation], now: Duration) -> Vec<GestureEvent> {
        let mut events = Vec::new();

        let Some(observation) = hands.first() else {
            self.palm.reset();
            if self.index_occlusion.missing(self.config.occlusion_grace_frames) {
                self.index_tap.reset();
            }
            return events;
        };
        self.index_occlusion.seen();

        if self.update_palm(observation, now) {
            events.push(GestureEvent::Activation);
        }

        // Below the tap confidence the previous position is kept as-is
        if let Some(tip) = observation.point(JointName::IndexTip, self.config.tap_confidence) {
            if self.index_tap.update(tip.y, self.config.tap_threshold) {
                trace!("Index tap at y={:.3}", tip.y);
                events.push(GestureEvent::Keystroke);
            }
        }

        events
    }

    /// QWERTY-mode path: palm hold on the first hand plus independent taps on
    /// all four typing fingers of each hand.
    pub fn process_fingers(
        &mut self,
        hands: &[HandObservation],
        now: Duration,
    ) -> Vec<GestureEvent> {
        let mut events = Vec::new();

        match hands.first() {
            Some(observation) => {
                if self.update_palm(observation, now) {
                    events.push(GestureEvent::Activation);
                }
            }
            None => self.palm.reset(),
        }

        let threshold = self.config.tap_threshold;
        let min_confidence = self.config.finger_tap_confidence;
        let grace = self.config.occlusion_grace_frames;

        for hand in Handedness::BOTH {
            let observation = find_hand(hands, hand);
            let taps = self.hand_taps_mut(hand);

            let Some(observation) = observation else {
                if taps.occlusion.missing(grace) {
                    taps.reset();
                }
                continue;
            };
            taps.occlusion.seen();

            for finger in Finger::ALL {
                let Some(tip) = observation.finger_tip(finger, min_confidence) else {
                    continue;
                };
                if taps.fingers[finger.index()].update(tip.y, threshold) {
                    trace!(
                        "{} {} tap at ({:.3}, {:.3})",
                        hand.as_str(),
                        finger.as_str(),
                        tip.x,
                        tip.y
                    );
                    events.push(GestureEvent::FingerTap {
                        hand,
                        finger,
                        observation: observation.clone(),
                    });
                }
            }
        }

        events
    }

    fn update_palm(&mut self, observation: &HandObservation, now: Duration) -> bool {
        let open = is_open_palm(observation, self.config.palm_confidence);
        let fired = self.palm.update(open, now);
        if fired {
            debug!("Open palm held for {:.1}s", self.config.hold_secs);
        }
        fired
    }

    /// Whether an open palm is currently being timed.
    pub fn is_palm_holding(&self) -> bool {
        self.palm.is_holding()
    }

    /// True when no tracker remembers a previous position.
    pub fn is_idle(&self) -> bool {
        !self.palm.is_holding()
            && self.index_tap.last_y().is_none()
            && self.left.is_idle()
            && self.right.is_idle()
    }

    /// Forget every hold and tap position.
    pub fn reset(&mut self) {
        self.palm.reset();
        self.index_tap.reset();
        self.index_occlusion = Occlusion::default();
        self.left.reset();
        self.right.reset();
    }
}

// ── Tests ──────────────────────────────────────────────────
