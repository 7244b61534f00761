use super::TextSink;
use crate::keyboard::BACKSPACE;

/// In-memory message being composed by air typing.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TextBuffer {
    text: String,
}

impl TextBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Hand back the composed text and start over.
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.text)
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }
}

impl TextSink for TextBuffer {
    fn apply(&mut self, character: &str) -> anyhow::Result<()> {
        if character == BACKSPACE {
            self.text.pop();
        } else {
            self.text.push_str(character);
        }
        Ok(())
    }
}
