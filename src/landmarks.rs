//! Hand landmark data as produced by an external pose detector
//!
//! Positions are normalized image coordinates (0..1) with the origin at the
//! bottom-left, so a larger `y` is higher up in the frame. Every joint carries
//! the detector's confidence; callers decide which threshold applies.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default confidence a joint must exceed to count as present.
pub const MIN_CONFIDENCE: f32 = 0.5;

// ── Joints ─────────────────────────────────────────────────

/// The 21 joints reported per hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JointName {
    Wrist,
    ThumbCmc,
    ThumbMp,
    ThumbIp,
    ThumbTip,
    IndexMcp,
    IndexPip,
    IndexDip,
    IndexTip,
    MiddleMcp,
    MiddlePip,
    MiddleDip,
    MiddleTip,
    RingMcp,
    RingPip,
    RingDip,
    RingTip,
    LittleMcp,
    LittlePip,
    LittleDip,
    LittleTip,
}

impl JointName {
    pub const ALL: [JointName; 21] = [
        Self::Wrist,
        Self::ThumbCmc,
        Self::ThumbMp,
        Self::ThumbIp,
        Self::ThumbTip,
        Self::IndexMcp,
        Self::IndexPip,
        Self::IndexDip,
        Self::IndexTip,
        Self::MiddleMcp,
        Self::MiddlePip,
        Self::MiddleDip,
        Self::MiddleTip,
        Self::RingMcp,
        Self::RingPip,
        Self::RingDip,
        Self::RingTip,
        Self::LittleMcp,
        Self::LittlePip,
        Self::LittleDip,
        Self::LittleTip,
    ];

    /// The five fingertips, thumb first.
    pub const FINGERTIPS: [JointName; 5] = [
        Self::ThumbTip,
        Self::IndexTip,
        Self::MiddleTip,
        Self::RingTip,
        Self::LittleTip,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wrist => "wrist",
            Self::ThumbCmc => "thumbCmc",
            Self::ThumbMp => "thumbMp",
            Self::ThumbIp => "thumbIp",
            Self::ThumbTip => "thumbTip",
            Self::IndexMcp => "indexMcp",
            Self::IndexPip => "indexPip",
            Self::IndexDip => "indexDip",
            Self::IndexTip => "indexTip",
            Self::MiddleMcp => "middleMcp",
            Self::MiddlePip => "middlePip",
            Self::MiddleDip => "middleDip",
            Self::MiddleTip => "middleTip",
            Self::RingMcp => "ringMcp",
            Self::RingPip => "ringPip",
            Self::RingDip => "ringDip",
            Self::RingTip => "ringTip",
            Self::LittleMcp => "littleMcp",
            Self::LittlePip => "littlePip",
            Self::LittleDip => "littleDip",
            Self::LittleTip => "littleTip",
        }
    }
}

// ── Fingers and hands ──────────────────────────────────────

/// The four typing fingers. The thumb only ever hits the space bar through
/// the index finger entries, so it has no slot here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Finger {
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    /// Enumeration order matters: the any-finger key lookup tries fingers in this order.
    pub const ALL: [Finger; 4] = [Self::Index, Self::Middle, Self::Ring, Self::Pinky];

    pub fn tip(&self) -> JointName {
        match self {
            Self::Index => JointName::IndexTip,
            Self::Middle => JointName::MiddleTip,
            Self::Ring => JointName::RingTip,
            Self::Pinky => JointName::LittleTip,
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Index => "index",
            Self::Middle => "middle",
            Self::Ring => "ring",
            Self::Pinky => "pinky",
        }
    }
}

/// Which hand an observation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    pub const BOTH: [Handedness; 2] = [Self::Left, Self::Right];

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

// ── Geometry ───────────────────────────────────────────────

/// A 2D point in normalized image space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// One tracked joint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    /// Reserved for depth-capable detectors; nothing reads it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f32>,
    pub confidence: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self {
            x,
            y,
            z: None,
            confidence,
        }
    }

    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

// ── Observations ───────────────────────────────────────────

/// All joints reported for one detected hand in one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandObservation {
    pub handedness: Handedness,
    #[serde(default)]
    pub joints: HashMap<JointName, Landmark>,
}

impl HandObservation {
    pub fn new(handedness: Handedness) -> Self {
        Self {
            handedness,
            joints: HashMap::new(),
        }
    }

    /// Builder-style joint insertion, mostly for fixtures.
    pub fn with_joint(mut self, joint: JointName, x: f32, y: f32, confidence: f32) -> Self {
        self.joints.insert(joint, Landmark::new(x, y, confidence));
        self
    }

    pub fn landmark(&self, joint: JointName) -> Option<&Landmark> {
        self.joints.get(&joint)
    }

    /// Position of `joint` if its confidence is strictly above `min_confidence`.
    pub fn point(&self, joint: JointName, min_confidence: f32) -> Option<Point> {
        self.joints
            .get(&joint)
            .filter(|lm| lm.confidence > min_confidence)
            .map(Landmark::point)
    }

    /// Every joint above `min_confidence`, tagged by name.
    pub fn confident_points(&self, min_confidence: f32) -> Vec<(JointName, Point)> {
        self.joints
            .iter()
            .filter(|(_, lm)| lm.confidence > min_confidence)
            .map(|(joint, lm)| (*joint, lm.point()))
            .collect()
    }

    /// Fingertip position for a typing finger.
    pub fn finger_tip(&self, finger: Finger, min_confidence: f32) -> Option<Point> {
        self.point(finger.tip(), min_confidence)
    }
}

/// Picks the first observation tagged with `hand`.
pub fn find_hand(hands: &[HandObservation], hand: Handedness) -> Option<&HandObservation> {
    hands.iter().find(|obs| obs.handedness == hand)
}
