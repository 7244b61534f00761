use std::time::Duration;

use crate::landmarks::{HandObservation, JointName};

/// True when the wrist and all five fingertips are confident and every tip
/// sits above the wrist.
pub fn is_open_palm(observation: &HandObservation, min_confidence: f32) -> bool {
    let Some(wrist) = observation.point(JointName::Wrist, min_confidence) else {
        return false;
    };

    JointName::FINGERTIPS.iter().all(|tip| {
        observation
            .point(*tip, min_confidence)
            .is_some_and(|p| p.y > wrist.y)
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum HoldPhase {
    Idle,
    Holding { since: Duration },
    /// Fired for the current hold; waits for the palm to close.
    Latched,
}

/// Hold-to-activate timer for the open palm.
#[derive(Debug, Clone)]
pub struct PalmHold {
    hold: Duration,
    phase: HoldPhase,
}

impl PalmHold {
    pub fn new(hold: Duration) -> Self {
        Self {
            hold,
            phase: HoldPhase::Idle,
        }
    }

    /// Feed one frame. Returns true exactly once per continuous hold, on the
    /// first frame at which the palm has been open for the hold duration.
    pub fn update(&mut self, open: bool, now: Duration) -> bool {
        if !open {
            self.phase = HoldPhase::Idle;
            return false;
        }

        match self.phase {
            HoldPhase::Idle => {
                self.phase = HoldPhase::Holding { since: now };
                false
            }
            HoldPhase::Holding { since } if now.saturating_sub(since) >= self.hold => {
                self.phase = HoldPhase::Latched;
                true
            }
            HoldPhase::Holding { .. } | HoldPhase::Latched => false,
        }
    }

    /// Whether an open palm is currently being timed.
    pub fn is_holding(&self) -> bool {
        matches!(self.phase, HoldPhase::Holding { .. })
    }

    pub fn reset(&mut self) {
        self.phase = HoldPhase::Idle;
    }
}
