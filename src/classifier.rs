//! Nearest-profile gesture classification
//!
//! Each stored profile is a snapshot of one hand shape labelled with the
//! character it should type. A live hand is compared against every profile by
//! the mean Euclidean distance over the joints both sides share; joints present
//! on only one side are ignored. The closest profile wins if it is strictly
//! under the match threshold.
//!
//! Distances are in raw normalized image units and are not scaled by hand
//! size, so a profile recorded close to the camera will not match the same
//! shape made further away.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

use crate::config::ClassifierConfig;
use crate::landmarks::{HandObservation, JointName, Point};

/// One joint of a stored profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileLandmark {
    pub joint: JointName,
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl ProfileLandmark {
    pub fn new(joint: JointName, x: f32, y: f32) -> Self {
        Self { joint, x, y, z: 0.0 }
    }

    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// A trained hand shape for one character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GestureProfile {
    pub character: String,
    pub landmarks: Vec<ProfileLandmark>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl GestureProfile {
    pub fn new(character: impl Into<String>, landmarks: Vec<ProfileLandmark>) -> Self {
        Self {
            character: character.into(),
            landmarks,
            created_at: Utc::now(),
        }
    }

    /// Snapshot the confident joints of `observation` as a profile for
    /// `character`. Returns `None` if no joint is confident enough.
    pub fn capture(
        character: impl Into<String>,
        observation: &HandObservation,
        min_confidence: f32,
    ) -> Option<Self> {
        let mut landmarks: Vec<ProfileLandmark> = observation
            .confident_points(min_confidence)
            .into_iter()
            .map(|(joint, p)| ProfileLandmark::new(joint, p.x, p.y))
            .collect();
        if landmarks.is_empty() {
            return None;
        }
        landmarks.sort_by_key(|lm| lm.joint as usize);
        Some(Self::new(character, landmarks))
    }
}

/// The winning profile for an observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub character: String,
    pub distance: f32,
}

/// Mean distance over shared joints, or infinity when nothing is shared.
pub fn profile_distance(current: &[(JointName, Point)], profile: &GestureProfile) -> f32 {
    let mut total = 0.0;
    let mut matched = 0usize;

    for (joint, point) in current {
        if let Some(stored) = profile.landmarks.iter().find(|lm| lm.joint == *joint) {
            total += point.distance(stored.point());
            matched += 1;
        }
    }

    if matched == 0 {
        f32::INFINITY
    } else {
        total / matched as f32
    }
}

/// Classifies one hand against the currently installed profile set.
///
/// The set is swapped as a whole by `update_profiles`; a classification
/// always sees either the old or the new set, never a mix.
pub struct GestureClassifier {
    config: ClassifierConfig,
    profiles: RwLock<Arc<[GestureProfile]>>,
}

impl GestureClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config,
            profiles: RwLock::new(Arc::from(Vec::new())),
        }
    }

    /// Replace the working profile set.
    pub fn update_profiles(&self, profiles: Vec<GestureProfile>) {
        debug!("Installing {} gesture profiles", profiles.len());
        let profiles: Arc<[GestureProfile]> = Arc::from(profiles);
        *self.profiles.write().unwrap_or_else(PoisonError::into_inner) = profiles;
    }

    pub fn profile_count(&self) -> usize {
        self.snapshot().len()
    }

    fn snapshot(&self) -> Arc<[GestureProfile]> {
        let profiles = self.profiles.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*profiles)
    }

    /// Closest profile and its distance, regardless of the threshold.
    pub fn nearest(&self, observation: &HandObservation) -> Option<Match> {
        let profiles = self.snapshot();
        if profiles.is_empty() {
            return None;
        }

        let current = observation.confident_points(self.config.min_confidence);
        if current.is_empty() {
            return None;
        }

        let mut best: Option<&GestureProfile> = None;
        let mut min_distance = f32::INFINITY;
        for profile in profiles.iter() {
            let distance = profile_distance(&current, profile);
            // Strict comparison: the first of equally close profiles wins
            if distance < min_distance {
                min_distance = distance;
                best = Some(profile);
            }
        }

        best.map(|profile| Match {
            character: profile.character.clone(),
            distance: min_distance,
        })
    }

    /// Closest profile if it is under the match threshold.
    pub fn best_match(&self, observation: &HandObservation) -> Option<Match> {
        self.nearest(observation)
            .filter(|m| m.distance < self.config.match_threshold)
    }

    /// The character for `observation`, if any profile matches.
    pub fn classify(&self, observation: &HandObservation) -> Option<String> {
        self.best_match(observation).map(|m| m.character)
    }
}
