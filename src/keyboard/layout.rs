//! The fixed virtual QWERTY layout
//!
//! Every key is owned by one finger of one hand and placed relative to that
//! finger's home-row position: `row_offset` counts rows up from the home row
//! (negative is down), `column_offset` counts key widths to the right.

use crate::landmarks::Finger::{Index, Middle, Pinky, Ring};
use crate::landmarks::Handedness::{Left, Right};
use crate::landmarks::{Finger, Handedness};

/// Character emitted for the backspace gesture.
pub const BACKSPACE: &str = "BACKSPACE";

/// Label used for backspace in overlay positions.
pub const BACKSPACE_LABEL: &str = "⌫";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyDefinition {
    pub character: &'static str,
    pub hand: Handedness,
    pub finger: Finger,
    pub row_offset: f32,
    pub column_offset: f32,
}

const fn key(
    character: &'static str,
    hand: Handedness,
    finger: Finger,
    row_offset: f32,
    column_offset: f32,
) -> KeyDefinition {
    KeyDefinition {
        character,
        hand,
        finger,
        row_offset,
        column_offset,
    }
}

/// Letter rows plus a space bar under each index finger.
pub static QWERTY_LAYOUT: [KeyDefinition; 28] = [
    // Top row
    key("Q", Left, Pinky, 1.0, -0.5),
    key("W", Left, Ring, 1.0, -0.5),
    key("E", Left, Middle, 1.0, -0.5),
    key("R", Left, Index, 1.0, -0.5),
    key("T", Left, Index, 1.0, 0.5),
    key("Y", Right, Index, 1.0, -0.5),
    key("U", Right, Index, 1.0, 0.5),
    key("I", Right, Middle, 1.0, 0.5),
    key("O", Right, Ring, 1.0, 0.5),
    key("P", Right, Pinky, 1.0, 0.5),
    // Home row
    key("A", Left, Pinky, 0.0, 0.0),
    key("S", Left, Ring, 0.0, 0.0),
    key("D", Left, Middle, 0.0, 0.0),
    key("F", Left, Index, 0.0, 0.0),
    key("G", Left, Index, 0.0, 1.0),
    key("H", Right, Index, 0.0, -1.0),
    key("J", Right, Index, 0.0, 0.0),
    key("K", Right, Middle, 0.0, 0.0),
    key("L", Right, Ring, 0.0, 0.0),
    // Bottom row
    key("Z", Left, Pinky, -1.0, 0.5),
    key("X", Left, Ring, -1.0, 0.5),
    key("C", Left, Middle, -1.0, 0.5),
    key("V", Left, Index, -1.0, 0.5),
    key("B", Left, Index, -1.0, 1.5),
    key("N", Right, Index, -1.0, -0.5),
    key("M", Right, Index, -1.0, 0.5),
    // Space bar
    key(" ", Left, Index, -2.0, 0.0),
    key(" ", Right, Index, -2.0, 0.0),
];

/// Up and to the right of the right pinky. Resolved ahead of the table rather
/// than by nearest match.
pub static BACKSPACE_KEY: KeyDefinition = key(BACKSPACE, Right, Pinky, 1.0, 1.0);

/// Table entries owned by `finger` on `hand`.
pub fn keys_for(hand: Handedness, finger: Finger) -> impl Iterator<Item = &'static KeyDefinition> {
    QWERTY_LAYOUT
        .iter()
        .filter(move |k| k.hand == hand && k.finger == finger)
}
