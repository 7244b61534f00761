use anyhow::bail;
use chrono::{DateTime, Utc};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

use super::calibration::HomeRowCalibration;
use super::layout::{
    BACKSPACE, BACKSPACE_KEY, BACKSPACE_LABEL, KeyDefinition, QWERTY_LAYOUT, keys_for,
};
use crate::config::KeyboardConfig;
use crate::landmarks::{Finger, HandObservation, Handedness, Point};

/// Absolute position of one key, for overlays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyPosition {
    pub character: &'static str,
    pub position: Point,
    pub hand: Handedness,
}

/// Maps fingertip positions to QWERTY keys relative to a calibrated home row.
///
/// The calibration record is held behind an `Arc` and replaced as a whole, so
/// a lookup works against one consistent record even while a recalibration
/// runs on another thread.
pub struct KeyboardMapper {
    config: KeyboardConfig,
    calibration: RwLock<Option<Arc<HomeRowCalibration>>>,
}

impl KeyboardMapper {
    pub fn new(config: KeyboardConfig) -> Self {
        Self {
            config,
            calibration: RwLock::new(None),
        }
    }

    /// Calibrate from a left and a right observation. On failure nothing
    /// changes and any previous calibration stays in place.
    pub fn calibrate(&self, left: &HandObservation, right: &HandObservation) -> bool {
        match HomeRowCalibration::from_hands(left, right, self.config.min_confidence) {
            Some(calibration) => {
                info!(
                    "Keyboard calibrated: key width {:.4}, row height {:.4}",
                    calibration.key_width, calibration.row_height
                );
                self.swap(Some(Arc::new(calibration)));
                true
            }
            None => {
                debug!("Calibration needs all eight fingertips on two separated hands");
                false
            }
        }
    }

    /// Install a previously saved record.
    pub fn install(&self, calibration: HomeRowCalibration) -> anyhow::Result<()> {
        if !calibration.is_valid() {
            bail!("Refusing calibration with key width {}", calibration.key_width);
        }
        info!("Installed calibration from {}", calibration.calibrated_at);
        self.swap(Some(Arc::new(calibration)));
        Ok(())
    }

    pub fn reset(&self) {
        if self.is_calibrated() {
            debug!("Calibration cleared");
        }
        self.swap(None);
    }

    fn swap(&self, calibration: Option<Arc<HomeRowCalibration>>) {
        *self
            .calibration
            .write()
            .unwrap_or_else(PoisonError::into_inner) = calibration;
    }

    /// The current record, if any.
    pub fn calibration(&self) -> Option<Arc<HomeRowCalibration>> {
        self.calibration
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibration().is_some()
    }

    pub fn calibrated_at(&self) -> Option<DateTime<Utc>> {
        self.calibration().map(|c| c.calibrated_at)
    }

    /// Key under `position` for the given finger, or `None` when uncalibrated
    /// or nothing is close enough.
    pub fn key_at(
        &self,
        position: Point,
        finger: Finger,
        hand: Handedness,
    ) -> Option<&'static str> {
        let calibration = self.calibration()?;
        self.resolve(&calibration, position, finger, hand)
    }

    /// Key under one finger of an observed hand.
    pub fn get_key(
        &self,
        observation: &HandObservation,
        finger: Finger,
        hand: Handedness,
    ) -> Option<&'static str> {
        let calibration = self.calibration()?;
        let tip = observation.finger_tip(finger, self.config.min_confidence)?;
        self.resolve(&calibration, tip, finger, hand)
    }

    /// First finger, in index-middle-ring-pinky order, that lands on a key.
    /// Not the globally closest key across fingers.
    pub fn get_key_any_finger(
        &self,
        observation: &HandObservation,
        hand: Handedness,
    ) -> Option<&'static str> {
        let calibration = self.calibration()?;
        Finger::ALL.into_iter().find_map(|finger| {
            let tip = observation.finger_tip(finger, self.config.min_confidence)?;
            self.resolve(&calibration, tip, finger, hand)
        })
    }

    fn resolve(
        &self,
        calibration: &HomeRowCalibration,
        position: Point,
        finger: Finger,
        hand: Handedness,
    ) -> Option<&'static str> {
        let home = calibration.home(hand, finger);
        let columns = (position.x - home.x) / calibration.key_width;
        let rows = (position.y - home.y) / calibration.row_height;

        if hand == Handedness::Right
            && finger == Finger::Pinky
            && rows > self.config.backspace_row
            && columns > self.config.backspace_column
        {
            return Some(BACKSPACE);
        }

        let target = Point::new(columns, rows);
        let mut best: Option<&KeyDefinition> = None;
        let mut min_distance = f32::INFINITY;
        for key in keys_for(hand, finger) {
            let distance = target.distance(Point::new(key.column_offset, key.row_offset));
            if distance < min_distance {
                min_distance = distance;
                best = Some(key);
            }
        }

        best.filter(|_| min_distance < self.config.match_threshold)
            .map(|key| key.character)
    }

    /// Projected position of every key, backspace last. Empty when
    /// uncalibrated.
    pub fn key_positions(&self) -> Vec<KeyPosition> {
        let Some(calibration) = self.calibration() else {
            return Vec::new();
        };

        let project = |key: &KeyDefinition| {
            let home = calibration.home(key.hand, key.finger);
            Point::new(
                home.x + key.column_offset * calibration.key_width,
                home.y + key.row_offset * calibration.row_height,
            )
        };

        let mut positions: Vec<KeyPosition> = QWERTY_LAYOUT
            .iter()
            .map(|key| KeyPosition {
                character: key.character,
                position: project(key),
                hand: key.hand,
            })
            .collect();
        positions.push(KeyPosition {
            character: BACKSPACE_LABEL,
            position: project(&BACKSPACE_KEY),
            hand: BACKSPACE_KEY.hand,
        });
        positions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::JointName;

    // Index tips 0.4 apart: key width 0.1, row height 0.12
    fn home_hand(side: Handedness) -> HandObservation {
        // Outermost finger first
        let (pinky, step) = match side {
            Handedness::Left => (0.15, 0.05),
            Handedness::Right => (0.85, -0.05),
        };
        HandObservation::new(side)
            .with_joint(JointName::LittleTip, pinky, 0.48, 0.9)
            .with_joint(JointName::RingTip, pinky + step, 0.51, 0.9)
            .with_joint(JointName::MiddleTip, pinky + 2.0 * step, 0.52, 0.9)
            .with_joint(JointName::IndexTip, pinky + 3.0 * step, 0.50, 0.9)
    }

    fn calibrated() -> KeyboardMapper {
        let mapper = KeyboardMapper::new(KeyboardConfig::default());
        assert!(mapper.calibrate(&home_hand(Handedness::Left), &home_hand(Handedness::Right)));
        mapper
    }

    #[test]
    fn test_calibration_spacing() {
        let mapper = calibrated();
        let cal = mapper.calibration().unwrap();
        assert!((cal.key_width - 0.1).abs() < 1e-6);
        assert!((cal.row_height - 0.12).abs() < 1e-6);
        assert!(mapper.calibrated_at().is_some());
    }

    #[test]
    fn test_failed_calibration_keeps_previous() {
        let mapper = calibrated();
        let before = mapper.calibration().unwrap();
        let mut right = home_hand(Handedness::Right);
        right.joints.get_mut(&JointName::RingTip).unwrap().confidence = 0.3;
        assert!(!mapper.calibrate(&home_hand(Handedness::Left), &right));
        assert!(Arc::ptr_eq(&before, &mapper.calibration().unwrap()));
    }

    #[test]
    fn test_uncalibrated_lookup_is_none() {
        let mapper = KeyboardMapper::new(KeyboardConfig::default());
        assert!(!mapper.is_calibrated());
        assert_eq!(mapper.key_at(Point::new(0.3, 0.5), Finger::Index, Handedness::Left), None);
        assert!(mapper.key_positions().is_empty());
    }

    #[test]
    fn test_home_positions_map_to_home_keys() {
        let mapper = calibrated();
        let left = home_hand(Handedness::Left);
        let right = home_hand(Handedness::Right);
        let keys: Vec<&str> = Finger::ALL
            .iter()
            .map(|f| mapper.get_key(&left, *f, Handedness::Left).unwrap())
            .collect();
        assert_eq!(keys, vec!["F", "D", "S", "A"]);
        assert_eq!(mapper.get_key(&right, Finger::Index, Handedness::Right), Some("J"));
        assert_eq!(mapper.get_key(&right, Finger::Ring, Handedness::Right), Some("L"));
    }

    #[test]
    fn test_half_row_up_resolves_to_nearest_entry() {
        let mapper = calibrated();
        // Half a row above the left index home: column 0, row 0.5
        let position = Point::new(0.30, 0.56);
        let expected = keys_for(Handedness::Left, Finger::Index)
            .min_by(|a, b| {
                let da = Point::new(0.0, 0.5).distance(Point::new(a.column_offset, a.row_offset));
                let db = Point::new(0.0, 0.5).distance(Point::new(b.column_offset, b.row_offset));
                da.total_cmp(&db)
            })
            .unwrap()
            .character;
        assert_eq!(mapper.key_at(position, Finger::Index, Handedness::Left), Some(expected));
        assert_eq!(expected, "F");
    }

    #[test]
    fn test_top_row_reach() {
        let mapper = calibrated();
        // Up one row, half a key left of the left index: R
        assert_eq!(
            mapper.key_at(Point::new(0.25, 0.62), Finger::Index, Handedness::Left),
            Some("R")
        );
        // Down two rows: space
        assert_eq!(
            mapper.key_at(Point::new(0.70, 0.26), Finger::Index, Handedness::Right),
            Some(" ")
        );
    }

    #[test]
    fn test_backspace_short_circuit() {
        let mapper = calibrated();
        // Right pinky home (0.85, 0.48): column 0.5, row 0.8. P is only 0.2 away.
        let position = Point::new(0.90, 0.576);
        assert_eq!(
            mapper.key_at(position, Finger::Pinky, Handedness::Right),
            Some(BACKSPACE)
        );
        // The left pinky has no backspace
        assert_eq!(
            mapper.key_at(Point::new(0.10, 0.60), Finger::Pinky, Handedness::Left),
            Some("Q")
        );
    }

    #[test]
    fn test_far_away_is_no_match() {
        let mapper = calibrated();
        // Three keys right of the left middle home
        assert_eq!(
            mapper.key_at(Point::new(0.55, 0.52), Finger::Middle, Handedness::Left),
            None
        );
    }

    #[test]
    fn test_any_finger_uses_first_matching_finger() {
        let mapper = calibrated();
        let left = home_hand(Handedness::Left);
        assert_eq!(mapper.get_key_any_finger(&left, Handedness::Left), Some("F"));

        // Index unreadable: falls through to middle
        let mut blurry = left.clone();
        blurry.joints.get_mut(&JointName::IndexTip).unwrap().confidence = 0.2;
        assert_eq!(mapper.get_key_any_finger(&blurry, Handedness::Left), Some("D"));

        // Index far off the keyboard: falls through as well
        let mut stretched = left;
        stretched.joints.get_mut(&JointName::IndexTip).unwrap().x = 0.9;
        assert_eq!(mapper.get_key_any_finger(&stretched, Handedness::Left), Some("D"));
    }

    #[test]
    fn test_key_positions() {
        let mapper = calibrated();
        let positions = mapper.key_positions();
        assert_eq!(positions.len(), QWERTY_LAYOUT.len() + 1);

        let f = positions.iter().find(|k| k.character == "F").unwrap();
        assert!(f.position.distance(Point::new(0.30, 0.50)) < 1e-6);

        let q = positions.iter().find(|k| k.character == "Q").unwrap();
        assert!((q.position.x - 0.10).abs() < 1e-6);
        assert!((q.position.y - 0.60).abs() < 1e-6);

        let last = positions.last().unwrap();
        assert_eq!(last.character, BACKSPACE_LABEL);
        assert_eq!(last.hand, Handedness::Right);
        assert!((last.position.x - 0.95).abs() < 1e-6);
    }

    #[test]
    fn test_reset_and_install() {
        let mapper = calibrated();
        let saved = (*mapper.calibration().unwrap()).clone();
        mapper.reset();
        assert!(!mapper.is_calibrated());
        assert_eq!(
            mapper.get_key(&home_hand(Handedness::Left), Finger::Index, Handedness::Left),
            None
        );

        mapper.install(saved.clone()).unwrap();
        assert_eq!(
            mapper.get_key(&home_hand(Handedness::Left), Finger::Index, Handedness::Left),
            Some("F")
        );

        let mut broken = saved;
        broken.key_width = f32::NAN;
        assert!(mapper.install(broken).is_err());
        assert!(mapper.is_calibrated());
    }
}
