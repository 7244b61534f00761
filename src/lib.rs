//! Camera air typing
//!
//! Turns per-frame hand landmarks into typed characters, either by matching
//! trained hand shapes or by mapping fingertips onto a calibrated virtual
//! QWERTY keyboard. The landmark detector itself is supplied by the caller
//! through [`pipeline::HandPoseDetector`].

pub mod classifier;
pub mod config;
pub mod gesture;
pub mod keyboard;
pub mod landmarks;
pub mod pipeline;
pub mod profiles;
pub mod router;
pub mod session;
pub mod state;
pub mod stats;
pub mod typing;

pub use classifier::{GestureClassifier, GestureProfile};
pub use config::Config;
pub use keyboard::KeyboardMapper;
pub use landmarks::{Finger, HandObservation, Handedness, JointName};
pub use router::{AirTypeEvent, ModeRouter, TypingMode};
