//! Quiz display

use crate::gate::event::ButtonAction;
use crate::gate::platform::{Button, Markup};
use crate::quiz::{QuizPass, QuizResult};
use std::fmt::Write;

/// Discord allows at most five buttons per row
const BUTTONS_PER_ROW: usize = 5;

/// Text and buttons showing the current item of a pass
///
/// # Errors
/// Returns `CurrentItemMissing` if the pass is corrupted
pub fn render_current_item(pass: &QuizPass) -> QuizResult<(String, Markup)> {
    let item = pass.current_item()?;

    let mut text = format!("{}\n\n", item.text);
    for option in &item.options {
        let _ = writeln!(text, "{}. {}", option.index, option.text);
    }
    if item.is_answered() {
        text.push('\n');
        text.push_str(if item.is_answered_correctly() {
            "Correct."
        } else {
            "Wrong."
        });
    }

    let mut rows = Vec::new();
    if !item.is_answered() {
        let answers: Vec<Button> = item
            .options
            .iter()
            .map(|option| Button::new(option.index.to_string(), ButtonAction::Answer(option.index)))
            .collect();
        rows.extend(answers.chunks(BUTTONS_PER_ROW).map(<[Button]>::to_vec));
    }
    rows.push(vec![
        Button::new("<", ButtonAction::Prev),
        Button::new(
            format!("{}/{}", item.index + 1, pass.item_count()),
            ButtonAction::Ignore,
        ),
        Button::new(">", ButtonAction::Next),
    ]);

    Ok((text.trim().to_string(), Markup { rows }))
}
