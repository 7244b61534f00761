//! Keystroke injection into the focused application
//!
//! Characters go out either as native enigo text or through a clipboard
//! paste (Cmd/Ctrl+V). Backspace is always a key press.

use arboard::Clipboard;
use enigo::{Direction, Enigo, Key, Keyboard, Settings};
use std::fmt;
use std::thread;
use std::time::Duration;
use tracing::{trace, warn};

use super::TextSink;
use crate::keyboard::BACKSPACE;

#[derive(Clone, Copy, Debug, Default, PartialEq, clap::ValueEnum)]
pub enum InputMethod {
    /// enigo text input
    #[default]
    Direct,
    /// Paste through the clipboard, restoring its previous text afterwards
    Clipboard,
}

/// A failed keyboard or clipboard operation.
#[derive(Debug)]
pub enum TypingError {
    Keyboard { action: &'static str, reason: String },
    Clipboard { action: &'static str, reason: String },
}

impl TypingError {
    fn keyboard(action: &'static str) -> impl FnOnce(enigo::InputError) -> Self {
        move |e| TypingError::Keyboard {
            action,
            reason: e.to_string(),
        }
    }

    fn clipboard(action: &'static str) -> impl FnOnce(arboard::Error) -> Self {
        move |e| TypingError::Clipboard {
            action,
            reason: e.to_string(),
        }
    }
}

impl fmt::Display for TypingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypingError::Keyboard { action, reason } => {
                write!(f, "Keyboard failed to {}: {}", action, reason)
            }
            TypingError::Clipboard { action, reason } => {
                write!(f, "Clipboard failed to {}: {}", action, reason)
            }
        }
    }
}

impl std::error::Error for TypingError {}

/// Types air-typed characters wherever the cursor is.
pub struct KeystrokeSink {
    enigo: Enigo,
    clipboard: Clipboard,
    method: InputMethod,
}

impl KeystrokeSink {
    pub fn new(method: InputMethod) -> Result<Self, TypingError> {
        let enigo = Enigo::new(&Settings::default()).map_err(|e| TypingError::Keyboard {
            action: "initialize",
            reason: e.to_string(),
        })?;
        let clipboard = Clipboard::new().map_err(TypingError::clipboard("initialize"))?;
        Ok(Self {
            enigo,
            clipboard,
            method,
        })
    }

    pub fn type_character(&mut self, character: &str) -> Result<(), TypingError> {
        if character == BACKSPACE {
            return self.click(Key::Backspace);
        }
        if character.is_empty() {
            return Ok(());
        }
        trace!("Injecting {:?}", character);

        if self.method == InputMethod::Clipboard {
            match self.paste(character) {
                Ok(()) => return Ok(()),
                Err(e) => warn!("{}, typing directly instead", e),
            }
        }
        self.enigo
            .text(character)
            .map_err(TypingError::keyboard("type text"))
    }

    fn click(&mut self, key: Key) -> Result<(), TypingError> {
        self.enigo
            .key(key, Direction::Click)
            .map_err(TypingError::keyboard("click key"))
    }

    fn paste(&mut self, text: &str) -> Result<(), TypingError> {
        let previous = self.clipboard.get_text().ok();
        self.clipboard
            .set_text(text)
            .map_err(TypingError::clipboard("set text"))?;
        thread::sleep(Duration::from_millis(50));

        let result = self.paste_shortcut();
        if result.is_ok() {
            // Let the target read the clipboard before it changes back
            thread::sleep(Duration::from_millis(100));
        }
        if let Some(previous) = previous {
            let _ = self.clipboard.set_text(previous);
        }
        result
    }

    fn paste_shortcut(&mut self) -> Result<(), TypingError> {
        #[cfg(target_os = "macos")]
        let modifier = Key::Meta;
        #[cfg(not(target_os = "macos"))]
        let modifier = Key::Control;

        self.enigo
            .key(modifier, Direction::Press)
            .map_err(TypingError::keyboard("press modifier"))?;
        thread::sleep(Duration::from_millis(10));
        let clicked = self.click(Key::Unicode('v'));
        thread::sleep(Duration::from_millis(50));
        // Never leave the modifier held
        self.enigo
            .key(modifier, Direction::Release)
            .map_err(TypingError::keyboard("release modifier"))?;
        clicked
    }
}

impl TextSink for KeystrokeSink {
    fn apply(&mut self, character: &str) -> anyhow::Result<()> {
        self.type_character(character)?;
        Ok(())
    }
}
