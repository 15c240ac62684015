//! User-facing texts

use poise::serenity_prelude::MessageBuilder;

pub const START_QUIZ_LABEL: &str = "Start the quiz";
pub const SHARE_RESULT_LABEL: &str = "Share the result";

/// Sent when a user attempts to restart an unfinished quiz
pub const ALREADY_STARTED: &str = "You have already started the quiz.";

pub const UNAUTHORIZED: &str = "Only group admins can use this command.";

pub const NO_TARGET: &str =
    "Who should that be? Mention the user, reply to one of their messages or pass their id.";

#[must_use]
pub fn getting_started(questions_total: usize, answers_required: usize) -> String {
    format!(
        "Hello fellow rustacean!\n\
         You're going to be presented with {questions_total} randomly picked questions. \
         To pass the test and be able to chat you'll have to answer {answers_required} of them correctly.\n\
         When you're ready, press '{START_QUIZ_LABEL}'.\n\
         Good luck!"
    )
}

/// Sent when a user passes the quiz, and again whenever they try to start it after passing
#[must_use]
pub fn passed(result: usize, total: usize) -> String {
    format!(
        "You have passed the quiz with the result of {result}/{total}.\n\
         You can now chat in the group.\n\
         Click the button below to publish your result for other group members to see, if you want it."
    )
}

/// Sent when a user fails the quiz, and when they try again before the wait is over
#[must_use]
pub fn failed(result: usize, total: usize, required: usize, wait_hours: u64) -> String {
    format!(
        "Unfortunately you have failed with the result of {result}/{total}, \
         which is not enough to pass ({required}). \
         But no worries, you can try again in {wait_hours} hours."
    )
}

/// Posted in the group; the name is escaped so it can't ping or format
#[must_use]
pub fn result_share(name: &str, result: usize, total: usize) -> String {
    MessageBuilder::new()
        .push_bold_safe(name)
        .push(format!(
            " has just passed the quiz with the result of {result}/{total}.\n\
             Welcome to the group!"
        ))
        .build()
}

#[must_use]
pub fn kicked(user: &str) -> String {
    MessageBuilder::new()
        .push_safe(user)
        .push(" has been kicked.")
        .build()
}

#[must_use]
pub fn banned(user: &str) -> String {
    MessageBuilder::new()
        .push_safe(user)
        .push(" has been banned.")
        .build()
}
