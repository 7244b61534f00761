/// Edge-triggered "peck" detector for one fingertip.
///
/// A drop of more than `threshold` since the previous sample fires once and
/// arms the tracker; only a rise of more than `threshold` disarms it. Movement
/// inside the band does nothing.
#[derive(Debug, Clone, Default)]
pub struct TapTracker {
    last_y: Option<f32>,
    active: bool,
}

impl TapTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the fingertip height for one frame; returns true on a tap.
    pub fn update(&mut self, y: f32, threshold: f32) -> bool {
        let mut fired = false;

        if let Some(last) = self.last_y {
            let dy = last - y;
            if dy > threshold && !self.active {
                self.active = true;
                fired = true;
            } else if dy < -threshold {
                self.active = false;
            }
        }

        self.last_y = Some(y);
        fired
    }

    /// Whether a down-stroke has fired and not yet returned.
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn last_y(&self) -> Option<f32> {
        self.last_y
    }

    pub fn reset(&mut self) {
        self.last_y = None;
        self.active = false;
    }
}
