//! Quiz pass storage
//!
//! Passes, items and options live in three SQLite tables linked by
//! cascading foreign keys. All reads and writes go through a `QuizTx`,
//! which rolls back unless it is explicitly committed.

use crate::questions::Question;
use crate::quiz::{GivenAnswer, QuizError, QuizItem, QuizOption, QuizPass, QuizResult};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::info;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Persistence handle shared by everything that reads or writes quiz passes
#[derive(Debug, Clone)]
pub struct QuizStore {
    pool: SqlitePool,
}

impl QuizStore {
    /// Connect to the database at `url` and apply pending migrations
    ///
    /// # Errors
    /// Returns an error if the connection or a migration fails
    pub async fn connect(url: &str) -> QuizResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        info!(url = %url, "Quiz store ready");
        Ok(store)
    }

    /// A private in-memory database, kept alive by a single pooled connection
    ///
    /// # Errors
    /// Returns an error if the database can't be created
    pub async fn in_memory() -> QuizResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Apply pending schema migrations
    ///
    /// # Errors
    /// Returns an error if a migration fails
    pub async fn migrate(&self) -> QuizResult<()> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    /// Start a transaction
    ///
    /// # Errors
    /// Returns an error if no connection can be acquired
    pub async fn begin(&self) -> QuizResult<QuizTx> {
        Ok(QuizTx {
            tx: self.pool.begin().await?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PassRow {
    id: i64,
    user_id: i64,
    correct_required: i64,
    current_item_index: i64,
    created_at: DateTime<Utc>,
    result_shared: bool,
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: i64,
    index: i64,
    text: String,
    correct_answer: i64,
    given_answer: Option<i64>,
    answered_at: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow)]
struct OptionRow {
    quizitem_id: i64,
    index: i64,
    text: String,
}

fn to_db_user_id(user_id: u64) -> QuizResult<i64> {
    i64::try_from(user_id).map_err(|_| QuizError::UserIdOutOfRange(user_id))
}

fn to_db_int(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

// Negative values can only come from a corrupted row; they map to an index
// that the pass invariants reject.
fn from_db_int(value: i64) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

/// One unit of work against the quiz tables. Dropping it without calling
/// `commit` rolls everything back.
pub struct QuizTx {
    tx: Transaction<'static, Sqlite>,
}

impl QuizTx {
    /// Create a pass with its items and options, in the order of `questions`
    ///
    /// # Errors
    /// Returns `EmptyQuiz` without questions, or a database error
    pub async fn create_pass(
        &mut self,
        user_id: u64,
        questions: &[Question],
        correct_required: usize,
        now: DateTime<Utc>,
    ) -> QuizResult<QuizPass> {
        let mut pass = QuizPass::from_questions(user_id, questions, correct_required, now)?;

        pass.id = sqlx::query(
            "INSERT INTO quizpass (user_id, correct_required, current_item_index, created_at, result_shared) \
             VALUES (?, ?, 0, ?, FALSE)",
        )
        .bind(to_db_user_id(user_id)?)
        .bind(to_db_int(correct_required))
        .bind(now)
        .execute(&mut *self.tx)
        .await?
        .last_insert_rowid();

        let pass_id = pass.id;
        for item in pass.items_mut() {
            item.id = sqlx::query(
                r#"INSERT INTO quizitem (quizpass_id, "index", text, correct_answer) VALUES (?, ?, ?, ?)"#,
            )
            .bind(pass_id)
            .bind(to_db_int(item.index))
            .bind(&item.text)
            .bind(to_db_int(item.correct_answer))
            .execute(&mut *self.tx)
            .await?
            .last_insert_rowid();

            for option in &item.options {
                sqlx::query(r#"INSERT INTO "option" (quizitem_id, "index", text) VALUES (?, ?, ?)"#)
                    .bind(item.id)
                    .bind(to_db_int(option.index))
                    .bind(&option.text)
                    .execute(&mut *self.tx)
                    .await?;
            }
        }

        Ok(pass)
    }

    /// The most recently created pass of the user
    ///
    /// # Errors
    /// Returns a database error, or a range error if the stored pass is corrupted
    pub async fn active_pass(&mut self, user_id: u64) -> QuizResult<Option<QuizPass>> {
        let row = sqlx::query_as::<_, PassRow>(
            "SELECT id, user_id, correct_required, current_item_index, created_at, result_shared \
             FROM quizpass WHERE user_id = ? ORDER BY created_at DESC, id DESC LIMIT 1",
        )
        .bind(to_db_user_id(user_id)?)
        .fetch_optional(&mut *self.tx)
        .await?;

        match row {
            Some(row) => self.load_pass(row).await.map(Some),
            None => Ok(None),
        }
    }

    async fn load_pass(&mut self, row: PassRow) -> QuizResult<QuizPass> {
        let item_rows = sqlx::query_as::<_, ItemRow>(
            r#"SELECT id, "index", text, correct_answer, given_answer, answered_at
               FROM quizitem WHERE quizpass_id = ? ORDER BY "index""#,
        )
        .bind(row.id)
        .fetch_all(&mut *self.tx)
        .await?;

        let option_rows = sqlx::query_as::<_, OptionRow>(
            r#"SELECT o.quizitem_id, o."index", o.text
               FROM "option" o JOIN quizitem i ON i.id = o.quizitem_id
               WHERE i.quizpass_id = ? ORDER BY o.quizitem_id, o."index""#,
        )
        .bind(row.id)
        .fetch_all(&mut *self.tx)
        .await?;

        let mut options: HashMap<i64, Vec<QuizOption>> = HashMap::new();
        for option in option_rows {
            options.entry(option.quizitem_id).or_default().push(QuizOption {
                index: from_db_int(option.index),
                text: option.text,
            });
        }

        let items = item_rows
            .into_iter()
            .map(|item| {
                let answer = match (item.given_answer, item.answered_at) {
                    (Some(option), Some(answered_at)) => Some(GivenAnswer {
                        option: from_db_int(option),
                        answered_at,
                    }),
                    _ => None,
                };
                QuizItem::new(
                    item.id,
                    from_db_int(item.index),
                    item.text,
                    from_db_int(item.correct_answer),
                    options.remove(&item.id).unwrap_or_default(),
                )
                .with_answer(answer)
            })
            .collect();

        let user_id =
            u64::try_from(row.user_id).map_err(|_| QuizError::StoredUserIdInvalid {
                pass_id: row.id,
                user_id: row.user_id,
            })?;

        QuizPass::from_parts(
            row.id,
            user_id,
            from_db_int(row.correct_required),
            from_db_int(row.current_item_index),
            row.created_at,
            row.result_shared,
            items,
        )
    }

    /// Persist navigation, sharing and newly given answers of a pass.
    /// Stored answers are never overwritten.
    ///
    /// # Errors
    /// Returns a database error
    pub async fn save_pass(&mut self, pass: &QuizPass) -> QuizResult<()> {
        sqlx::query("UPDATE quizpass SET current_item_index = ?, result_shared = ? WHERE id = ?")
            .bind(to_db_int(pass.current_item_index()))
            .bind(pass.result_shared)
            .bind(pass.id)
            .execute(&mut *self.tx)
            .await?;

        for item in pass.items() {
            if let Some(answer) = item.answer() {
                sqlx::query(
                    "UPDATE quizitem SET given_answer = ?, answered_at = ? \
                     WHERE id = ? AND given_answer IS NULL",
                )
                .bind(to_db_int(answer.option))
                .bind(answer.answered_at)
                .bind(item.id)
                .execute(&mut *self.tx)
                .await?;
            }
        }

        Ok(())
    }

    /// Delete a pass; its items and options go with it
    ///
    /// # Errors
    /// Returns a database error
    pub async fn delete_pass(&mut self, pass_id: i64) -> QuizResult<()> {
        sqlx::query("DELETE FROM quizpass WHERE id = ?")
            .bind(pass_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    /// Number of passes, active or superseded, stored for the user
    ///
    /// # Errors
    /// Returns a database error
    pub async fn pass_count(&mut self, user_id: u64) -> QuizResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM quizpass WHERE user_id = ?")
            .bind(to_db_user_id(user_id)?)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(count)
    }

    #[cfg(test)]
    pub(crate) fn connection(&mut self) -> &mut sqlx::SqliteConnection {
        &mut self.tx
    }

    /// Make every change of this transaction permanent
    ///
    /// # Errors
    /// Returns a database error
    pub async fn commit(self) -> QuizResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    /// Discard every change of this transaction
    ///
    /// # Errors
    /// Returns a database error
    pub async fn rollback(self) -> QuizResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
