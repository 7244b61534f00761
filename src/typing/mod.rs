//! Where typed characters end up
//!
//! The router only produces characters and the `"BACKSPACE"` sentinel; a sink
//! decides what that means. `TextBuffer` composes a message in memory, and
//! with the `typing` feature `KeystrokeSink` types into whatever application
//! has focus.

mod buffer;
#[cfg(feature = "typing")]
mod input;

pub use buffer::TextBuffer;
#[cfg(feature = "typing")]
pub use input::{InputMethod, KeystrokeSink, TypingError};

/// Consumer of typed characters.
pub trait TextSink {
    /// Apply one character, space, or `"BACKSPACE"`.
    fn apply(&mut self, character: &str) -> anyhow::Result<()>;
}
