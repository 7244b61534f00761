//! Virtual QWERTY keyboard in the air
//!
//! The user rests both hands on an imaginary home row and calibrates once.
//! Every later fingertip position is expressed in key widths and row heights
//! relative to that finger's home point and matched against the fixed layout.

pub mod calibration;
pub mod layout;
mod mapper;

pub use calibration::{HomeRow, HomeRowCalibration};
pub use layout::{BACKSPACE, BACKSPACE_LABEL, KeyDefinition, QWERTY_LAYOUT};
pub use mapper::{KeyPosition, KeyboardMapper};
