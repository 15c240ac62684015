//! Quiz passes
//!
//! The state machine of a single quiz attempt and its SQLite storage.

mod error;
pub(crate) mod model;
mod store;

pub use error::{QuizError, QuizResult};
pub use model::{GivenAnswer, PassStatus, QuizItem, QuizOption, QuizPass};
pub use store::{QuizStore, QuizTx};
