//! Quiz pass state machine
//!
//! A `QuizPass` is an in-memory view of one attempt at the quiz together with
//! its items and options. Its status is never stored: `is_finished`,
//! `correct_given`, `has_passed` and `last_answer_at` are recomputed from the
//! items on every call.

use crate::questions::Question;
use crate::quiz::{QuizError, QuizResult};
use chrono::{DateTime, Utc};
use std::fmt;

/// Derived status of a quiz pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassStatus {
    /// At least one item is still unanswered
    InProgress,
    /// All items answered and enough of them correctly
    Passed,
    /// All items answered but not enough of them correctly
    Failed,
}

impl fmt::Display for PassStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InProgress => write!(f, "In progress"),
            Self::Passed => write!(f, "Passed"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// One answer option of a quiz item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizOption {
    pub index: usize,
    pub text: String,
}

/// An answer given to an item. The option and the timestamp only ever exist together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GivenAnswer {
    pub option: usize,
    pub answered_at: DateTime<Utc>,
}

/// One question instance within a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizItem {
    /// Database id, 0 until stored
    pub id: i64,
    /// Position within the pass
    pub index: usize,
    pub text: String,
    pub correct_answer: usize,
    pub options: Vec<QuizOption>,
    answer: Option<GivenAnswer>,
}

impl QuizItem {
    pub fn new(
        id: i64,
        index: usize,
        text: impl Into<String>,
        correct_answer: usize,
        options: Vec<QuizOption>,
    ) -> Self {
        Self {
            id,
            index,
            text: text.into(),
            correct_answer,
            options,
            answer: None,
        }
    }

    /// Build an unsaved item from a bank question
    #[must_use]
    pub fn from_question(index: usize, question: &Question) -> Self {
        let options = question
            .options
            .iter()
            .enumerate()
            .map(|(index, text)| QuizOption {
                index,
                text: text.clone(),
            })
            .collect();
        Self::new(0, index, question.text.clone(), question.correct_index, options)
    }

    /// Restore a previously stored answer
    #[must_use]
    pub fn with_answer(mut self, answer: Option<GivenAnswer>) -> Self {
        self.answer = answer;
        self
    }

    /// Record an answer. The first answer wins: once answered, later calls
    /// leave the stored answer untouched and return `Ok(false)`.
    ///
    /// # Errors
    /// Returns `AnswerOutOfRange` if `answer` is not a valid option index,
    /// even when the item is already answered
    pub fn set_answer(&mut self, answer: usize, now: DateTime<Utc>) -> QuizResult<bool> {
        if answer >= self.options.len() {
            return Err(QuizError::AnswerOutOfRange {
                answer,
                options: self.options.len(),
            });
        }

        if self.answer.is_some() {
            return Ok(false);
        }

        self.answer = Some(GivenAnswer {
            option: answer,
            answered_at: now,
        });
        Ok(true)
    }

    #[must_use]
    pub fn answer(&self) -> Option<GivenAnswer> {
        self.answer
    }

    #[must_use]
    pub fn given_answer(&self) -> Option<usize> {
        self.answer.map(|a| a.option)
    }

    #[must_use]
    pub fn answered_at(&self) -> Option<DateTime<Utc>> {
        self.answer.map(|a| a.answered_at)
    }

    #[must_use]
    pub fn is_answered(&self) -> bool {
        self.answer.is_some()
    }

    #[must_use]
    pub fn is_answered_correctly(&self) -> bool {
        self.given_answer() == Some(self.correct_answer)
    }
}

/// One attempt by a user at the quiz
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizPass {
    /// Database id, 0 until stored
    pub id: i64,
    /// Platform user id of the owner
    pub user_id: u64,
    /// Number of correct answers needed to pass
    pub correct_required: usize,
    /// When the pass was created
    pub created_at: DateTime<Utc>,
    /// Whether the passed result has been published to the group
    pub result_shared: bool,
    current_item_index: usize,
    items: Vec<QuizItem>,
}

impl QuizPass {
    /// Assemble a pass from its parts
    ///
    /// # Errors
    /// Returns `EmptyQuiz` without items and `ItemIndexOutOfRange` if
    /// `current_item_index` doesn't point inside `items`
    pub fn from_parts(
        id: i64,
        user_id: u64,
        correct_required: usize,
        current_item_index: usize,
        created_at: DateTime<Utc>,
        result_shared: bool,
        items: Vec<QuizItem>,
    ) -> QuizResult<Self> {
        if items.is_empty() {
            return Err(QuizError::EmptyQuiz);
        }
        if current_item_index >= items.len() {
            return Err(QuizError::ItemIndexOutOfRange {
                index: current_item_index,
                len: items.len(),
            });
        }

        Ok(Self {
            id,
            user_id,
            correct_required,
            created_at,
            result_shared,
            current_item_index,
            items,
        })
    }

    /// Build an unsaved pass from bank questions, in the given order
    ///
    /// # Errors
    /// Returns `EmptyQuiz` if `questions` is empty
    pub fn from_questions(
        user_id: u64,
        questions: &[Question],
        correct_required: usize,
        created_at: DateTime<Utc>,
    ) -> QuizResult<Self> {
        let items = questions
            .iter()
            .enumerate()
            .map(|(index, question)| QuizItem::from_question(index, question))
            .collect();
        Self::from_parts(0, user_id, correct_required, 0, created_at, false, items)
    }

    #[must_use]
    pub fn items(&self) -> &[QuizItem] {
        &self.items
    }

    pub(crate) fn items_mut(&mut self) -> &mut [QuizItem] {
        &mut self.items
    }

    /// Number of items in the pass
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn current_item_index(&self) -> usize {
        self.current_item_index
    }

    /// The item whose index matches the current index
    ///
    /// # Errors
    /// Returns `CurrentItemMissing` if no item carries the current index
    pub fn current_item(&self) -> QuizResult<&QuizItem> {
        let index = self.current_item_index;
        self.items
            .iter()
            .find(|item| item.index == index)
            .ok_or(QuizError::CurrentItemMissing {
                pass_id: self.id,
                index,
            })
    }

    fn current_item_mut(&mut self) -> QuizResult<&mut QuizItem> {
        let index = self.current_item_index;
        let pass_id = self.id;
        self.items
            .iter_mut()
            .find(|item| item.index == index)
            .ok_or(QuizError::CurrentItemMissing { pass_id, index })
    }

    /// Move to the next item, wrapping around to the first one
    pub fn move_to_next(&mut self) {
        self.current_item_index += 1;
        if self.current_item_index >= self.items.len() {
            self.current_item_index = 0;
        }
    }

    /// Move to the previous item, wrapping around to the last one
    pub fn move_to_prev(&mut self) {
        self.current_item_index = self
            .current_item_index
            .checked_sub(1)
            .unwrap_or(self.items.len() - 1);
    }

    /// Answer the current item. Returns whether the answer was recorded.
    ///
    /// # Errors
    /// Returns `AnswerOutOfRange` for an invalid option or
    /// `CurrentItemMissing` if the pass is corrupted
    pub fn answer_current(&mut self, answer: usize, now: DateTime<Utc>) -> QuizResult<bool> {
        self.current_item_mut()?.set_answer(answer, now)
    }

    /// All items have been answered
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.items.iter().all(QuizItem::is_answered)
    }

    /// Number of items answered correctly
    #[must_use]
    pub fn correct_given(&self) -> usize {
        self.items
            .iter()
            .filter(|item| item.is_answered_correctly())
            .count()
    }

    #[must_use]
    pub fn has_passed(&self) -> bool {
        self.correct_given() >= self.correct_required
    }

    /// Time of the most recent answer, if any
    #[must_use]
    pub fn last_answer_at(&self) -> Option<DateTime<Utc>> {
        self.items.iter().filter_map(QuizItem::answered_at).max()
    }

    #[must_use]
    pub fn status(&self) -> PassStatus {
        if !self.is_finished() {
            PassStatus::InProgress
        } else if self.has_passed() {
            PassStatus::Passed
        } else {
            PassStatus::Failed
        }
    }

    /// The result may be published once, after passing
    #[must_use]
    pub fn can_share_result(&self) -> bool {
        self.status() == PassStatus::Passed && !self.result_shared
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Duration;

    pub(crate) fn sample_questions() -> Vec<Question> {
        vec![
            Question::new(
                "Test question #1",
                &["Test option 1.1", "Test option 1.2", "Test option 1.3"],
                0,
            ),
            Question::new(
                "Test question #2",
                &[
                    "Test option 2.1",
                    "Test option 2.2",
                    "Test option 2.3",
                    "Test option 2.4",
                ],
                3,
            ),
            Question::new(
                "Test question #3",
                &[
                    "Test option 3.1",
                    "Test option 3.2",
                    "Test option 3.3",
                    "Test option 3.4",
                    "Test option 3.5",
                ],
                1,
            ),
        ]
    }

    fn new_pass() -> QuizPass {
        QuizPass::from_questions(12345, &sample_questions(), 2, Utc::now()).unwrap()
    }

    #[test]
    fn test_new_pass_starts_at_first_item() {
        let pass = new_pass();
        assert_eq!(pass.current_item_index(), 0);
        assert_eq!(pass.current_item().unwrap().text, "Test question #1");
        assert_eq!(pass.status(), PassStatus::InProgress);
        assert!(pass.last_answer_at().is_none());
        assert!(!pass.result_shared);
    }

    #[test]
    fn test_empty_pass_is_rejected() {
        let result = QuizPass::from_questions(1, &[], 0, Utc::now());
        assert!(matches!(result, Err(QuizError::EmptyQuiz)));
    }

    #[test]
    fn test_out_of_range_index_is_rejected() {
        let items = vec![QuizItem::from_question(0, &sample_questions()[0])];
        let result = QuizPass::from_parts(1, 1, 1, 1, Utc::now(), false, items);
        assert!(matches!(
            result,
            Err(QuizError::ItemIndexOutOfRange { index: 1, len: 1 })
        ));
    }

    #[test]
    fn test_navigation_wraps_both_ways() {
        let mut pass = new_pass();

        pass.move_to_prev();
        assert_eq!(pass.current_item_index(), 2);

        pass.move_to_next();
        assert_eq!(pass.current_item_index(), 0);

        pass.move_to_next();
        pass.move_to_next();
        assert_eq!(pass.current_item_index(), 2);
        pass.move_to_next();
        assert_eq!(pass.current_item_index(), 0);
    }

    #[test]
    fn test_navigation_stays_in_bounds() {
        let mut pass = new_pass();
        let moves = [true, true, false, true, true, true, false, false, false, false, true];
        for forward in moves {
            if forward {
                pass.move_to_next();
            } else {
                pass.move_to_prev();
            }
            assert!(pass.current_item_index() < pass.item_count());
            assert!(pass.current_item().is_ok());
        }
    }

    #[test]
    fn test_navigation_allowed_when_finished() {
        let mut pass = QuizPass::from_questions(1, &sample_questions()[..1], 1, Utc::now()).unwrap();
        pass.answer_current(0, Utc::now()).unwrap();
        assert!(pass.is_finished());

        pass.move_to_next();
        pass.move_to_prev();
        assert_eq!(pass.current_item_index(), 0);
    }

    #[test]
    fn test_first_answer_wins() {
        let mut pass = new_pass();
        let first = Utc::now();
        let later = first + Duration::minutes(5);

        assert!(pass.answer_current(1, first).unwrap());
        assert!(!pass.answer_current(0, later).unwrap());

        let item = pass.current_item().unwrap();
        assert_eq!(item.given_answer(), Some(1));
        assert_eq!(item.answered_at(), Some(first));
    }

    #[test]
    fn test_out_of_range_answer_is_an_error() {
        let mut pass = new_pass();
        let result = pass.answer_current(3, Utc::now());
        assert!(matches!(
            result,
            Err(QuizError::AnswerOutOfRange {
                answer: 3,
                options: 3
            })
        ));
        assert!(!pass.current_item().unwrap().is_answered());

        // Still checked once the item is answered
        pass.answer_current(0, Utc::now()).unwrap();
        assert!(pass.answer_current(9, Utc::now()).is_err());
    }

    #[test]
    fn test_correct_given_ignores_unanswered_items() {
        let mut pass = new_pass();
        assert_eq!(pass.correct_given(), 0);

        pass.answer_current(0, Utc::now()).unwrap();
        assert_eq!(pass.correct_given(), 1);

        pass.move_to_next();
        pass.answer_current(0, Utc::now()).unwrap();
        assert_eq!(pass.correct_given(), 1);
        assert!(!pass.is_finished());
    }

    #[test]
    fn test_pass_at_exact_threshold() {
        let mut pass = new_pass();
        let now = Utc::now();

        pass.answer_current(0, now).unwrap();
        pass.move_to_next();
        pass.answer_current(3, now + Duration::seconds(10)).unwrap();
        pass.move_to_next();
        pass.answer_current(0, now + Duration::seconds(20)).unwrap();

        assert!(pass.is_finished());
        assert_eq!(pass.correct_given(), 2);
        assert!(pass.has_passed());
        assert_eq!(pass.status(), PassStatus::Passed);
        assert_eq!(pass.last_answer_at(), Some(now + Duration::seconds(20)));
        assert!(pass.can_share_result());
    }

    #[test]
    fn test_all_wrong_fails() {
        let mut pass = new_pass();
        for answer in [1, 0, 0] {
            pass.answer_current(answer, Utc::now()).unwrap();
            pass.move_to_next();
        }

        assert!(pass.is_finished());
        assert_eq!(pass.correct_given(), 0);
        assert_eq!(pass.status(), PassStatus::Failed);
        assert!(!pass.can_share_result());
    }

    #[test]
    fn test_single_item_quiz_finishes_after_one_answer() {
        let mut pass = QuizPass::from_questions(1, &sample_questions()[..1], 1, Utc::now()).unwrap();
        assert!(!pass.is_finished());

        pass.answer_current(2, Utc::now()).unwrap();
        assert!(pass.is_finished());
        assert_eq!(pass.status(), PassStatus::Failed);
    }

    #[test]
    fn test_last_answer_is_the_latest_timestamp() {
        let mut pass = new_pass();
        let now = Utc::now();

        pass.move_to_next();
        pass.answer_current(0, now + Duration::hours(2)).unwrap();
        pass.move_to_next();
        pass.answer_current(0, now).unwrap();

        assert_eq!(pass.last_answer_at(), Some(now + Duration::hours(2)));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(PassStatus::InProgress.to_string(), "In progress");
        assert_eq!(PassStatus::Passed.to_string(), "Passed");
        assert_eq!(PassStatus::Failed.to_string(), "Failed");
    }
}
