use anyhow::{Context, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::landmarks::{Finger, HandObservation, Handedness, Point};

/// Rows are slightly taller than keys are wide.
pub const ROW_HEIGHT_RATIO: f32 = 1.2;

/// Key widths between the two index fingers at rest (F-G-H-J).
pub const INDEX_SPAN_KEYS: f32 = 4.0;

/// Rest positions of the four typing fingers of one hand.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HomeRow {
    pub index: Point,
    pub middle: Point,
    pub ring: Point,
    pub pinky: Point,
}

impl HomeRow {
    /// Read all four fingertips, or nothing if any one is unreadable.
    pub fn from_observation(observation: &HandObservation, min_confidence: f32) -> Option<Self> {
        Some(Self {
            index: observation.finger_tip(Finger::Index, min_confidence)?,
            middle: observation.finger_tip(Finger::Middle, min_confidence)?,
            ring: observation.finger_tip(Finger::Ring, min_confidence)?,
            pinky: observation.finger_tip(Finger::Pinky, min_confidence)?,
        })
    }

    pub fn get(&self, finger: Finger) -> Point {
        match finger {
            Finger::Index => self.index,
            Finger::Middle => self.middle,
            Finger::Ring => self.ring,
            Finger::Pinky => self.pinky,
        }
    }
}

/// A complete home-row calibration. All eight home positions exist by
/// construction; a record is only ever replaced as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomeRowCalibration {
    pub left: HomeRow,
    pub right: HomeRow,
    /// Horizontal key spacing in normalized units.
    pub key_width: f32,
    /// Vertical row spacing in normalized units.
    pub row_height: f32,
    pub calibrated_at: DateTime<Utc>,
}

impl HomeRowCalibration {
    /// Calibrate from one left and one right observation. Fails if any of the
    /// eight fingertips is below `min_confidence` or the index fingers coincide.
    pub fn from_hands(
        left: &HandObservation,
        right: &HandObservation,
        min_confidence: f32,
    ) -> Option<Self> {
        let left = HomeRow::from_observation(left, min_confidence)?;
        let right = HomeRow::from_observation(right, min_confidence)?;
        Self::from_home_rows(left, right)
    }

    /// Derive key spacing from the index-to-index span.
    pub fn from_home_rows(left: HomeRow, right: HomeRow) -> Option<Self> {
        let key_width = left.index.distance(right.index) / INDEX_SPAN_KEYS;
        let calibration = Self {
            left,
            right,
            key_width,
            row_height: key_width * ROW_HEIGHT_RATIO,
            calibrated_at: Utc::now(),
        };
        calibration.is_valid().then_some(calibration)
    }

    pub fn home_row(&self, hand: Handedness) -> &HomeRow {
        match hand {
            Handedness::Left => &self.left,
            Handedness::Right => &self.right,
        }
    }

    pub fn home(&self, hand: Handedness, finger: Finger) -> Point {
        self.home_row(hand).get(finger)
    }

    /// Spacing must be usable as a divisor.
    pub fn is_valid(&self) -> bool {
        self.key_width.is_finite()
            && self.key_width > 0.0
            && self.row_height.is_finite()
            && self.row_height > 0.0
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read calibration {}", path.display()))?;
        let calibration: Self = serde_json::from_str(&text)
            .with_context(|| format!("Invalid calibration {}", path.display()))?;
        if !calibration.is_valid() {
            bail!(
                "Calibration {} has unusable key width {}",
                path.display(),
                calibration.key_width
            );
        }
        Ok(calibration)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write calibration {}", path.display()))
    }
}
