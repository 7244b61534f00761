//! Mode routing between the profile classifier and the QWERTY mapper
//!
//! Frames are throttled by count, handed to the gesture recognizer for the
//! current mode, and any resulting taps are resolved to characters. Nothing is
//! typed unless typing has been switched on with the activation gesture.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::classifier::GestureClassifier;
use crate::config::{Config, GestureConfig};
use crate::gesture::{GestureEvent, GestureRecognizer};
use crate::keyboard::KeyboardMapper;
use crate::landmarks::{HandObservation, Handedness, find_hand};

// ============================================================================
// Modes and events
// ============================================================================

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum TypingMode {
    /// One trained hand shape per character, typed with an index-finger tap
    #[default]
    Gesture = 0,
    /// Calibrated virtual keyboard, typed with per-finger taps
    Qwerty = 1,
}

impl TypingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypingMode::Gesture => "gesture",
            TypingMode::Qwerty => "qwerty",
        }
    }
}

impl From<u8> for TypingMode {
    fn from(v: u8) -> Self {
        match v {
            1 => TypingMode::Qwerty,
            _ => TypingMode::Gesture,
        }
    }
}

impl fmt::Display for TypingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the router hands to the text sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AirTypeEvent {
    /// A character, a space, or `"BACKSPACE"`.
    CharacterTyped(String),
    /// Typing was switched on or off by the activation gesture.
    ActivationToggled { active: bool },
}

// ============================================================================
// Throttle
// ============================================================================

/// Admits every Nth frame by count, starting with the Nth.
#[derive(Debug, Clone)]
pub struct FrameThrottle {
    every: u32,
    counter: u32,
}

impl FrameThrottle {
    pub fn new(every: u32) -> Self {
        Self {
            every: every.max(1),
            counter: 0,
        }
    }

    pub fn admit(&mut self) -> bool {
        self.counter += 1;
        if self.counter >= self.every {
            self.counter = 0;
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.counter = 0;
    }
}

// ============================================================================
// Router
// ============================================================================

pub struct ModeRouter {
    mode: TypingMode,
    typing_active: bool,
    last_typed_key: Option<String>,
    throttle: FrameThrottle,
    recognizer: GestureRecognizer,
    classifier: Arc<GestureClassifier>,
    mapper: Arc<KeyboardMapper>,
    /// Hands from the last admitted frame, kept for calibration requests.
    last_hands: Vec<HandObservation>,
}

impl ModeRouter {
    pub fn new(
        config: &Config,
        classifier: Arc<GestureClassifier>,
        mapper: Arc<KeyboardMapper>,
    ) -> Self {
        Self::with_parts(
            config.router.mode,
            config.router.frame_skip,
            config.gesture.clone(),
            classifier,
            mapper,
        )
    }

    pub fn with_parts(
        mode: TypingMode,
        frame_skip: u32,
        gesture: GestureConfig,
        classifier: Arc<GestureClassifier>,
        mapper: Arc<KeyboardMapper>,
    ) -> Self {
        Self {
            mode,
            typing_active: false,
            last_typed_key: None,
            throttle: FrameThrottle::new(frame_skip),
            recognizer: GestureRecognizer::new(gesture),
            classifier,
            mapper,
            last_hands: Vec::new(),
        }
    }

    pub fn mode(&self) -> TypingMode {
        self.mode
    }

    pub fn is_typing_active(&self) -> bool {
        self.typing_active
    }

    pub fn last_typed_key(&self) -> Option<&str> {
        self.last_typed_key.as_deref()
    }

    pub fn latest_hands(&self) -> &[HandObservation] {
        &self.last_hands
    }

    pub fn classifier(&self) -> &Arc<GestureClassifier> {
        &self.classifier
    }

    pub fn mapper(&self) -> &Arc<KeyboardMapper> {
        &self.mapper
    }

    /// Count one captured frame; true if it should go to detection.
    pub fn admit_frame(&mut self) -> bool {
        self.throttle.admit()
    }

    /// Throttle, then route. Skipped frames change nothing.
    pub fn process_frame(&mut self, hands: &[HandObservation], now: Duration) -> Vec<AirTypeEvent> {
        if !self.admit_frame() {
            return Vec::new();
        }
        self.handle_hands(hands, now)
    }

    /// Route one already admitted frame.
    pub fn handle_hands(&mut self, hands: &[HandObservation], now: Duration) -> Vec<AirTypeEvent> {
        self.last_hands.clear();
        self.last_hands.extend_from_slice(hands);

        let gestures = match self.mode {
            TypingMode::Gesture => self.recognizer.process(hands, now),
            TypingMode::Qwerty => self.recognizer.process_fingers(hands, now),
        };

        let mut events = Vec::new();
        for gesture in gestures {
            match gesture {
                GestureEvent::Activation => {
                    self.typing_active = !self.typing_active;
                    info!(
                        "Air typing {}",
                        if self.typing_active { "on" } else { "off" }
                    );
                    events.push(AirTypeEvent::ActivationToggled {
                        active: self.typing_active,
                    });
                }
                GestureEvent::Keystroke => {
                    if !self.typing_active {
                        continue;
                    }
                    let Some(character) = hands.first().and_then(|h| self.classifier.classify(h))
                    else {
                        debug!("Tap matched no profile");
                        continue;
                    };
                    events.push(self.typed(character));
                }
                GestureEvent::FingerTap {
                    hand,
                    finger,
                    observation,
                } => {
                    if !self.typing_active {
                        continue;
                    }
                    let Some(key) = self.mapper.get_key(&observation, finger, hand) else {
                        debug!("{} {} tap hit no key", hand.as_str(), finger.as_str());
                        continue;
                    };
                    events.push(self.typed(key.to_string()));
                }
            }
        }
        events
    }

    fn typed(&mut self, character: String) -> AirTypeEvent {
        debug!("Typed {:?}", character);
        self.last_typed_key = Some(character.clone());
        AirTypeEvent::CharacterTyped(character)
    }

    /// Switch modes. Always drops typing state and trackers; calibration is
    /// dropped only when the mode actually changes.
    pub fn set_mode(&mut self, mode: TypingMode) {
        if mode != self.mode {
            info!("Typing mode {} -> {}", self.mode, mode);
            self.mapper.reset();
        }
        self.mode = mode;
        self.typing_active = false;
        self.last_typed_key = None;
        self.recognizer.reset();
        self.throttle.reset();
    }

    /// Switch typing on or off without the palm gesture.
    pub fn set_typing_active(&mut self, active: bool) {
        if self.typing_active != active {
            info!("Air typing {}", if active { "on" } else { "off" });
        }
        self.typing_active = active;
    }

    /// Calibrate the keyboard from the last admitted frame.
    pub fn calibrate_from_latest(&self) -> bool {
        let left = find_hand(&self.last_hands, Handedness::Left);
        let right = find_hand(&self.last_hands, Handedness::Right);
        match (left, right) {
            (Some(left), Some(right)) => self.mapper.calibrate(left, right),
            _ => {
                debug!("Calibration needs both hands in view");
                false
            }
        }
    }

    /// Stop typing and forget every hand seen so far.
    pub fn stop(&mut self) {
        self.typing_active = false;
        self.last_hands.clear();
        self.recognizer.reset();
        self.throttle.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{GestureProfile, ProfileLandmark};
    use crate::config::{ClassifierConfig, KeyboardConfig};
    use crate::keyboard::HomeRowCalibration;
    use crate::landmarks::JointName;

    fn router(mode: TypingMode, frame_skip: u32) -> ModeRouter {
        let classifier = Arc::new(GestureClassifier::new(ClassifierConfig::default()));
        classifier.update_profiles(vec![GestureProfile::new(
            "A",
            vec![ProfileLandmark::new(JointName::Wrist, 0.5, 0.5)],
        )]);
        let mapper = Arc::new(KeyboardMapper::new(KeyboardConfig::default()));
        ModeRouter::with_parts(mode, frame_skip, GestureConfig::default(), classifier, mapper)
    }

    // Curled hand, left index at (0.30, index_y) on the calibrated home row
    fn typing_hand(side: Handedness, index_y: f32) -> HandObservation {
        let (pinky, step) = match side {
            Handedness::Left => (0.15, 0.05),
            Handedness::Right => (0.85, -0.05),
        };
        HandObservation::new(side)
            .with_joint(JointName::Wrist, 0.5, 0.5, 0.9)
            .with_joint(JointName::LittleTip, pinky, 0.48, 0.9)
            .with_joint(JointName::RingTip, pinky + step, 0.51, 0.9)
            .with_joint(JointName::MiddleTip, pinky + 2.0 * step, 0.52, 0.9)
            .with_joint(JointName::IndexTip, pinky + 3.0 * step, index_y, 0.9)
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_throttle_admits_every_third() {
        let mut throttle = FrameThrottle::new(3);
        let admitted: Vec<bool> = (0..7).map(|_| throttle.admit()).collect();
        assert_eq!(admitted, vec![false, false, true, false, false, true, false]);

        let mut every = FrameThrottle::new(0);
        assert!(every.admit());
        assert!(every.admit());
    }

    #[test]
    fn test_skipped_frames_change_nothing() {
        let mut r = router(TypingMode::Gesture, 3);
        r.set_typing_active(true);
        let hand = typing_hand(Handedness::Right, 0.50);
        assert!(r.process_frame(&[hand.clone()], ms(0)).is_empty());
        assert!(r.latest_hands().is_empty());
        r.process_frame(&[hand], ms(33));
        r.process_frame(&[typing_hand(Handedness::Right, 0.50)], ms(66));
        assert_eq!(r.latest_hands().len(), 1);
    }

    #[test]
    fn test_inactive_typing_emits_nothing() {
        let mut r = router(TypingMode::Gesture, 1);
        r.handle_hands(&[typing_hand(Handedness::Right, 0.50)], ms(0));
        let events = r.handle_hands(&[typing_hand(Handedness::Right, 0.44)], ms(100));
        assert!(events.is_empty());
        assert_eq!(r.last_typed_key(), None);
    }

    #[test]
    fn test_gesture_mode_types_classified_character() {
        let mut r = router(TypingMode::Gesture, 1);
        r.set_typing_active(true);
        r.handle_hands(&[typing_hand(Handedness::Right, 0.50)], ms(0));
        let events = r.handle_hands(&[typing_hand(Handedness::Right, 0.44)], ms(100));
        assert_eq!(events, vec![AirTypeEvent::CharacterTyped("A".into())]);
        assert_eq!(r.last_typed_key(), Some("A"));
    }

    #[test]
    fn test_mode_switch_discards_near_trigger_state() {
        let mut r = router(TypingMode::Gesture, 1);
        r.set_typing_active(true);
        r.handle_hands(&[typing_hand(Handedness::Right, 0.50)], ms(0));

        r.set_mode(TypingMode::Gesture);
        assert!(!r.is_typing_active());
        r.set_typing_active(true);

        let events = r.handle_hands(&[typing_hand(Handedness::Right, 0.44)], ms(100));
        assert!(events.is_empty());
    }

    fn open_palm() -> HandObservation {
        HandObservation::new(Handedness::Right)
            .with_joint(JointName::Wrist, 0.5, 0.2, 0.9)
            .with_joint(JointName::ThumbTip, 0.35, 0.4, 0.9)
            .with_joint(JointName::IndexTip, 0.42, 0.6, 0.9)
            .with_joint(JointName::MiddleTip, 0.5, 0.65, 0.9)
            .with_joint(JointName::RingTip, 0.57, 0.6, 0.9)
            .with_joint(JointName::LittleTip, 0.63, 0.5, 0.9)
    }

    #[test]
    fn test_mode_change_restarts_palm_hold() {
        let mut r = router(TypingMode::Gesture, 1);
        assert!(r.handle_hands(&[open_palm()], ms(0)).is_empty());
        assert!(r.handle_hands(&[open_palm()], ms(1900)).is_empty());

        r.set_mode(TypingMode::Qwerty);
        assert!(r.handle_hands(&[open_palm()], ms(2000)).is_empty());
        assert!(!r.is_typing_active());

        // Timed from the first frame after the switch
        assert!(r.handle_hands(&[open_palm()], ms(3900)).is_empty());
        let events = r.handle_hands(&[open_palm()], ms(4000));
        assert_eq!(events, vec![AirTypeEvent::ActivationToggled { active: true }]);
    }

    #[test]
    fn test_mode_change_clears_finger_trackers() {
        let mut r = router(TypingMode::Qwerty, 1);
        let home = [
            typing_hand(Handedness::Left, 0.50),
            typing_hand(Handedness::Right, 0.50),
        ];
        let pecked = [
            typing_hand(Handedness::Left, 0.44),
            typing_hand(Handedness::Right, 0.50),
        ];
        r.handle_hands(&home, ms(0));

        r.set_mode(TypingMode::Gesture);
        r.set_mode(TypingMode::Qwerty);
        let calibration = HomeRowCalibration::from_hands(&home[0], &home[1], 0.5).unwrap();
        r.mapper().install(calibration).unwrap();
        r.set_typing_active(true);

        // The 0.50 positions were forgotten, so nothing to compare against
        assert!(r.handle_hands(&pecked, ms(100)).is_empty());

        r.handle_hands(&home, ms(200));
        let events = r.handle_hands(&pecked, ms(300));
        assert_eq!(events, vec![AirTypeEvent::CharacterTyped("F".into())]);
    }

    #[test]
    fn test_qwerty_mode_types_mapped_key() {
        let mut r = router(TypingMode::Qwerty, 1);
        let home = [
            typing_hand(Handedness::Left, 0.50),
            typing_hand(Handedness::Right, 0.50),
        ];
        r.handle_hands(&home, ms(0));
        assert!(r.calibrate_from_latest());
        r.set_typing_active(true);

        let pecked = [
            typing_hand(Handedness::Left, 0.44),
            typing_hand(Handedness::Right, 0.50),
        ];
        let events = r.handle_hands(&pecked, ms(100));
        assert_eq!(events, vec![AirTypeEvent::CharacterTyped("F".into())]);
    }

    #[test]
    fn test_switching_mode_clears_calibration() {
        let mut r = router(TypingMode::Qwerty, 1);
        r.handle_hands(
            &[
                typing_hand(Handedness::Left, 0.50),
                typing_hand(Handedness::Right, 0.50),
            ],
            ms(0),
        );
        assert!(r.calibrate_from_latest());

        r.set_mode(TypingMode::Qwerty);
        assert!(r.mapper().is_calibrated());

        r.set_mode(TypingMode::Gesture);
        assert!(!r.mapper().is_calibrated());
        assert_eq!(r.mode(), TypingMode::Gesture);
    }

    #[test]
    fn test_calibration_needs_both_hands() {
        let mut r = router(TypingMode::Qwerty, 1);
        r.handle_hands(&[typing_hand(Handedness::Left, 0.50)], ms(0));
        assert!(!r.calibrate_from_latest());
    }

    #[test]
    fn test_palm_hold_toggles_typing() {
        let mut r = router(TypingMode::Gesture, 1);
        let open = HandObservation::new(Handedness::Right)
            .with_joint(JointName::Wrist, 0.5, 0.2, 0.9)
            .with_joint(JointName::ThumbTip, 0.35, 0.4, 0.9)
            .with_joint(JointName::IndexTip, 0.42, 0.6, 0.9)
            .with_joint(JointName::MiddleTip, 0.5, 0.65, 0.9)
            .with_joint(JointName::RingTip, 0.57, 0.6, 0.9)
            .with_joint(JointName::LittleTip, 0.63, 0.5, 0.9);

        r.handle_hands(&[open.clone()], ms(0));
        let events = r.handle_hands(&[open.clone()], ms(2000));
        assert_eq!(events, vec![AirTypeEvent::ActivationToggled { active: true }]);
        assert!(r.is_typing_active());

        // Released and held again
        r.handle_hands(&[], ms(2100));
        r.handle_hands(&[open.clone()], ms(2200));
        let events = r.handle_hands(&[open], ms(4300));
        assert_eq!(events, vec![AirTypeEvent::ActivationToggled { active: false }]);
    }

    #[test]
    fn test_mode_parses_lowercase() {
        let mode: TypingMode = serde_json::from_str("\"qwerty\"").unwrap();
        assert_eq!(mode, TypingMode::Qwerty);
        assert_eq!(TypingMode::from(mode as u8), TypingMode::Qwerty);
        assert_eq!(TypingMode::from(9), TypingMode::Gesture);
        assert_eq!(TypingMode::Gesture.to_string(), "gesture");
    }
}
