//! Error types for the quiz state machine and its storage

use thiserror::Error;

/// Errors that can occur while creating, reading or mutating a quiz pass
#[derive(Debug, Error)]
pub enum QuizError {
    /// An answer index outside of the item's options
    #[error("Answer out of range: {answer} (item has {options} options)")]
    AnswerOutOfRange { answer: usize, options: usize },

    /// A current item index outside of the pass's items
    #[error("Item index out of range: {index} (pass has {len} items)")]
    ItemIndexOutOfRange { index: usize, len: usize },

    /// No item carries the pass's current index; the stored pass is corrupted
    #[error("Quiz pass {pass_id} has no item with index {index}")]
    CurrentItemMissing { pass_id: i64, index: usize },

    /// A pass needs at least one question
    #[error("Cannot create a quiz pass without questions")]
    EmptyQuiz,

    /// Platform user ids are stored as signed 64-bit integers
    #[error("User id {0} does not fit the database column")]
    UserIdOutOfRange(u64),

    /// A stored pass carries a negative user id; the row is corrupted
    #[error("Quiz pass {pass_id} has an invalid user id {user_id}")]
    StoredUserIdInvalid { pass_id: i64, user_id: i64 },

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration error
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for quiz operations
pub type QuizResult<T> = Result<T, QuizError>;
