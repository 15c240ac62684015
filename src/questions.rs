//! Question bank
//!
//! Loads the fixed pool of quiz questions from a YAML (or JSON) file and
//! validates every entry before the bot starts. A malformed bank is fatal.

use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading the question bank
#[derive(Debug, Error)]
pub enum QuestionBankError {
    /// The questions file could not be read
    #[error("Failed to read questions file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The questions file is not a valid list of questions
    #[error("Failed to parse questions: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A question failed validation, `position` is 1-based
    #[error("Error while parsing question {position}: {text:?}: {reason}")]
    InvalidQuestion {
        position: usize,
        text: String,
        reason: String,
    },
}

/// Most options a question may have: four full rows of answer buttons, with
/// the fifth and last row a message can carry left for navigation
pub const MAX_OPTIONS: usize = 20;

/// A single question of the quiz
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Question text
    #[serde(rename = "question")]
    pub text: String,
    /// Answer options, in display order
    pub options: Vec<String>,
    /// Index of the correct option
    #[serde(rename = "answer")]
    pub correct_index: usize,
}

impl Question {
    pub fn new(text: impl Into<String>, options: &[&str], correct_index: usize) -> Self {
        Self {
            text: text.into(),
            options: options.iter().map(ToString::to_string).collect(),
            correct_index,
        }
    }

    /// Check the question invariants
    ///
    /// # Errors
    /// Returns a description of the first violated invariant
    pub fn validate(&self) -> Result<(), String> {
        if self.options.len() < 2 {
            return Err(format!(
                "expected at least 2 options, got {}",
                self.options.len()
            ));
        }
        if self.options.len() > MAX_OPTIONS {
            return Err(format!(
                "expected at most {MAX_OPTIONS} options, got {}",
                self.options.len()
            ));
        }
        if self.correct_index >= self.options.len() {
            return Err(format!(
                "answer {} is out of range 0..{}",
                self.correct_index,
                self.options.len()
            ));
        }
        Ok(())
    }
}

/// The read-only pool of questions
#[derive(Debug, Clone, Default)]
pub struct QuestionBank {
    questions: Vec<Question>,
}

impl QuestionBank {
    /// Build a bank from already constructed questions, validating each of them
    ///
    /// # Errors
    /// Returns `InvalidQuestion` naming the first offending question
    pub fn new(questions: Vec<Question>) -> Result<Self, QuestionBankError> {
        for (i, question) in questions.iter().enumerate() {
            question
                .validate()
                .map_err(|reason| QuestionBankError::InvalidQuestion {
                    position: i + 1,
                    text: question.text.clone(),
                    reason,
                })?;
        }
        Ok(Self { questions })
    }

    /// Parse a bank from YAML source. JSON is accepted as well.
    ///
    /// # Errors
    /// Returns an error if the source doesn't parse or a question is invalid
    pub fn from_yaml_str(source: &str) -> Result<Self, QuestionBankError> {
        let questions: Vec<Question> = serde_yaml::from_str(source)?;
        Self::new(questions)
    }

    /// Load the bank from a file
    ///
    /// # Errors
    /// Returns an error if the file can't be read or its content is invalid
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, QuestionBankError> {
        let path = path.as_ref();
        let source =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| QuestionBankError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
        Self::from_yaml_str(&source)
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

/// Picks the questions for a new quiz pass
pub trait QuestionSampler: Send + Sync {
    /// Select `count` distinct questions from the bank
    fn sample(&self, bank: &QuestionBank, count: usize) -> Vec<Question>;
}

/// Uniform random selection without replacement
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomSampler;

impl QuestionSampler for RandomSampler {
    fn sample(&self, bank: &QuestionBank, count: usize) -> Vec<Question> {
        let mut rng = rand::rng();
        bank.questions()
            .choose_multiple(&mut rng, count)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BANK: &str = r#"
- question: "What does `len([])` return?"
  options: ["0", "None", "an error"]
  answer: 0
- question: "Which keyword defines a function?"
  options: ["fn", "def", "func", "lambda"]
  answer: 1
"#;

    #[test]
    fn test_load_valid_bank() {
        let bank = QuestionBank::from_yaml_str(BANK).unwrap();
        assert_eq!(bank.len(), 2);
        assert_eq!(bank.questions()[1].options.len(), 4);
        assert_eq!(bank.questions()[1].correct_index, 1);
    }

    #[test]
    fn test_json_bank_is_accepted() {
        let json = r#"[{"question": "2 + 2?", "options": ["3", "4"], "answer": 1}]"#;
        let bank = QuestionBank::from_yaml_str(json).unwrap();
        assert_eq!(bank.questions()[0].text, "2 + 2?");
    }

    #[test]
    fn test_invalid_answer_names_position() {
        let source = r#"
- question: "fine"
  options: ["a", "b"]
  answer: 1
- question: "broken"
  options: ["a", "b"]
  answer: 2
"#;
        let err = QuestionBank::from_yaml_str(source).unwrap_err();
        match err {
            QuestionBankError::InvalidQuestion { position, text, .. } => {
                assert_eq!(position, 2);
                assert_eq!(text, "broken");
            }
            other => panic!("Expected InvalidQuestion, got {other:?}"),
        }
    }

    #[test]
    fn test_single_option_is_rejected() {
        let err = QuestionBank::new(vec![Question::new("lonely", &["only"], 0)]).unwrap_err();
        assert!(err.to_string().contains("question 1"));
    }

    #[test]
    fn test_too_many_options_are_rejected() {
        let options: Vec<String> = (0..=MAX_OPTIONS).map(|i| i.to_string()).collect();
        let refs: Vec<&str> = options.iter().map(String::as_str).collect();

        let at_limit = Question::new("most", &refs[..MAX_OPTIONS], 0);
        assert!(QuestionBank::new(vec![at_limit]).is_ok());

        let over = Question::new("crowded", &refs, 0);
        let err = QuestionBank::new(vec![over]).unwrap_err();
        assert!(err.to_string().contains("at most 20 options, got 21"), "{err}");
    }

    #[test]
    fn test_random_sampler_picks_distinct_questions() {
        let questions = (0..10)
            .map(|i| Question::new(format!("q{i}"), &["a", "b"], 0))
            .collect();
        let bank = QuestionBank::new(questions).unwrap();

        let picked = RandomSampler.sample(&bank, 5);
        assert_eq!(picked.len(), 5);

        let mut texts: Vec<_> = picked.iter().map(|q| q.text.clone()).collect();
        texts.sort();
        texts.dedup();
        assert_eq!(texts.len(), 5);
    }
}
