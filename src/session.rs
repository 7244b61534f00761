//! Recorded landmark sessions
//!
//! A session is a JSON Lines file with one detected frame per line:
//!
//! ```text
//! {"t":0.033,"hands":[{"handedness":"right","joints":{"wrist":{"x":0.5,"y":0.2,"confidence":0.9}}}]}
//! ```
//!
//! `t` is seconds since capture start. Replaying a session feeds the same
//! pipeline a live camera would, with a detector that just hands back the
//! recorded landmarks.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::landmarks::{HandObservation, Handedness, find_hand};
use crate::pipeline::{Frame, HandPoseDetector};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkFrame {
    /// Seconds since capture start
    pub t: f64,
    #[serde(default)]
    pub hands: Vec<HandObservation>,
}

impl LandmarkFrame {
    pub fn captured_at(&self) -> Duration {
        Duration::try_from_secs_f64(self.t).unwrap_or_default()
    }

    pub fn hand(&self, hand: Handedness) -> Option<&HandObservation> {
        find_hand(&self.hands, hand)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordedSession {
    pub frames: Vec<LandmarkFrame>,
}

impl RecordedSession {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let file =
            File::open(path).with_context(|| format!("Failed to open session {}", path.display()))?;
        let mut frames = Vec::new();
        for (i, line) in BufReader::new(file).lines().enumerate() {
            let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
            if line.trim().is_empty() {
                continue;
            }
            let frame: LandmarkFrame = serde_json::from_str(&line)
                .with_context(|| format!("{}:{}: invalid frame", path.display(), i + 1))?;
            frames.push(frame);
        }
        debug!("Loaded {} frames from {}", frames.len(), path.display());
        Ok(Self { frames })
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let file = fs::File::create(path)
            .with_context(|| format!("Failed to create session {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        for frame in &self.frames {
            serde_json::to_writer(&mut writer, frame)?;
            writeln!(writer)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// First frame with both a left and a right hand, for calibration.
    pub fn first_with_both_hands(&self) -> Option<&LandmarkFrame> {
        self.frames.iter().find(|f| {
            f.hand(Handedness::Left).is_some() && f.hand(Handedness::Right).is_some()
        })
    }

    /// Frames as the pipeline expects them, images being the recorded hands.
    pub fn into_frames(self) -> impl Iterator<Item = Frame<Vec<HandObservation>>> {
        self.frames.into_iter().map(|f| Frame {
            captured_at: f.captured_at(),
            image: f.hands,
        })
    }
}

/// Detector for recorded sessions: the image already is the landmarks.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReplayDetector;

impl HandPoseDetector for ReplayDetector {
    type Image = Vec<HandObservation>;

    fn detect(&mut self, image: &Vec<HandObservation>) -> anyhow::Result<Vec<HandObservation>> {
        Ok(image.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::JointName;

    const SAMPLE: &str = r#"{"t":0.0,"hands":[]}

{"t":0.1,"hands":[{"handedness":"left","joints":{"indexTip":{"x":0.3,"y":0.5,"confidence":0.9}}}]}
{"t":0.2,"hands":[{"handedness":"right","joints":{}},{"handedness":"left","joints":{}}]}
"#;

    #[test]
    fn test_load_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.jsonl");
        fs::write(&path, SAMPLE).unwrap();

        let session = RecordedSession::load(&path).unwrap();
        assert_eq!(session.len(), 3);
        assert!(session.frames[0].hands.is_empty());
        let left = session.frames[1].hand(Handedness::Left).unwrap();
        assert_eq!(left.landmark(JointName::IndexTip).unwrap().x, 0.3);
        assert_eq!(session.first_with_both_hands().unwrap().t, 0.2);
    }

    #[test]
    fn test_bad_line_reports_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.jsonl");
        fs::write(&path, "{\"t\":0.0,\"hands\":[]}\n{\"t\":\n").unwrap();
        let err = RecordedSession::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("session.jsonl:2"));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        let session = RecordedSession {
            frames: vec![LandmarkFrame {
                t: 1.5,
                hands: vec![
                    HandObservation::new(Handedness::Right)
                        .with_joint(JointName::Wrist, 0.5, 0.2, 0.8),
                ],
            }],
        };
        session.save(&path).unwrap();
        assert_eq!(RecordedSession::load(&path).unwrap().frames, session.frames);
    }

    #[test]
    fn test_replay_frames() {
        let session = RecordedSession {
            frames: vec![
                LandmarkFrame {
                    t: 0.5,
                    hands: vec![HandObservation::new(Handedness::Left)],
                },
                LandmarkFrame {
                    t: -1.0,
                    hands: vec![],
                },
            ],
        };
        let frames: Vec<_> = session.into_frames().collect();
        assert_eq!(frames[0].captured_at, Duration::from_millis(500));
        assert_eq!(frames[1].captured_at, Duration::ZERO);

        let mut detector = ReplayDetector;
        let hands = detector.detect(&frames[0].image).unwrap();
        assert_eq!(hands[0].handedness, Handedness::Left);
    }
}
