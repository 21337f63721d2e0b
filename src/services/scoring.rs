// src/services/scoring.rs

use crate::models::{attempt::AnswerMap, question::Question};

/// Counts the questions whose selected option equals the correct index.
///
/// Only positions `0..questions.len()` are looked at, so extra keys in
/// `answers` are ignored. A missing answer or one pointing outside the option
/// list simply does not match. No partial credit, no negative marking.
pub fn score(questions: &[Question], answers: &AnswerMap) -> i32 {
    let correct = questions
        .iter()
        .enumerate()
        .filter(|(position, question)| {
            u32::try_from(*position)
                .ok()
                .and_then(|key| answers.get(&key))
                .is_some_and(|selected| *selected == question.correct_option_index)
        })
        .count();

    i32::try_from(correct).unwrap_or(i32::MAX)
}
