// src/models/question.rs

use serde::{Deserialize, Serialize};

/// A single multiple-choice question.
///
/// Lives inside a quiz's question list and, once an attempt is submitted,
/// inside that attempt's snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// The text content of the question.
    pub text: String,

    /// Ordered option strings (at least two).
    pub options: Vec<String>,

    /// Position of the correct entry in `options`.
    pub correct_option_index: i64,
}

impl Question {
    pub fn new(text: impl Into<String>, options: &[&str], correct_option_index: i64) -> Self {
        Self {
            text: text.into(),
            options: options.iter().map(|o| o.to_string()).collect(),
            correct_option_index,
        }
    }
}
