//! Sentence Accumulation
//!
//! Builds a running sentence from recognized gestures:
//!
//! - `SPACE` appends a space
//! - `BACKSPACE` removes the last character
//! - `CLEAR` empties the sentence (output line: "Text cleared")
//! - a single letter `A`-`Z` is appended as is
//! - any other name is a word, appended after a separating space
//!
//! The sentence never exceeds [`MAX_SENTENCE_LEN`] bytes; anything that
//! would overflow it is ignored.

use super::ResultSink;
use crate::recognition::RecognitionResult;
use crate::Result;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

/// Longest sentence kept, in bytes
pub const MAX_SENTENCE_LEN: usize = 127;

/// Output line shown after `CLEAR`
pub const CLEARED_MESSAGE: &str = "Text cleared";

/// Read-only view of an accumulator's sentence, usable from other threads
#[derive(Debug, Clone)]
pub struct TextView {
    sentence: Arc<Mutex<String>>,
}

impl TextView {
    pub fn text(&self) -> String {
        self.sentence.lock().clone()
    }
}

#[derive(Debug, Default)]
pub struct TextAccumulator {
    sentence: Arc<Mutex<String>>,
}

impl TextAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> TextView {
        TextView {
            sentence: Arc::clone(&self.sentence),
        }
    }

    pub fn text(&self) -> String {
        self.sentence.lock().clone()
    }

    pub fn clear(&mut self) {
        self.sentence.lock().clear();
    }

    /// Apply one gesture and return the line to present
    pub fn apply(&mut self, gesture: &str) -> String {
        let mut sentence = self.sentence.lock();

        match gesture {
            "SPACE" => {
                if sentence.len() < MAX_SENTENCE_LEN {
                    sentence.push(' ');
                }
            }
            "BACKSPACE" => {
                sentence.pop();
            }
            "CLEAR" => {
                sentence.clear();
                return CLEARED_MESSAGE.to_string();
            }
            letter if is_letter(letter) => {
                if sentence.len() < MAX_SENTENCE_LEN {
                    sentence.push_str(letter);
                }
            }
            word => {
                if !sentence.is_empty() && !sentence.ends_with(' ') && sentence.len() < MAX_SENTENCE_LEN {
                    sentence.push(' ');
                }
                if sentence.len() + word.len() < MAX_SENTENCE_LEN {
                    sentence.push_str(word);
                }
            }
        }

        sentence.clone()
    }
}

fn is_letter(gesture: &str) -> bool {
    gesture.len() == 1 && gesture.as_bytes()[0].is_ascii_uppercase()
}

impl ResultSink for TextAccumulator {
    fn name(&self) -> &str {
        "text"
    }

    fn handle(&mut self, result: &RecognitionResult) -> Result<()> {
        let line = self.apply(&result.name);
        info!(gesture = %result.name, text = %line, "Text updated");
        Ok(())
    }
}
