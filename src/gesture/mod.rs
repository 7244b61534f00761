//! Activation and keystroke detection over successive landmark frames
//!
//! Recognizes:
//! - **Open-palm hold**: wrist plus all five fingertips confident, every tip
//!   above the wrist, held continuously for the configured duration. Fires once
//!   per hold and re-arms only after the palm closes or leaves the frame.
//! - **Index tap** (profile mode): the index tip dropping by more than the tap
//!   threshold between processed frames. The return stroke only re-arms.
//! - **Finger taps** (QWERTY mode): the same edge trigger on each of the four
//!   typing fingers of each hand, tagged with hand and finger.

mod palm;
mod recognizer;
mod tap;

pub use palm::{PalmHold, is_open_palm};
pub use recognizer::{GestureEvent, GestureRecognizer};
pub use tap::TapTracker;
