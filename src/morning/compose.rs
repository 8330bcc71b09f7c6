//! Message composition — deterministic template rotation plus token
//! substitution.

use chrono::{Datelike, NaiveDate};

use super::parser::AnswerSet;

/// Placeholder tokens every template is expected to carry once each.
pub const TOKEN_LOVE_NOTE: &str = "{loveNote}";
pub const TOKEN_GRATITUDE: &str = "{gratitude}";
pub const TOKEN_ENCOURAGEMENT: &str = "{encouragement}";

/// Built-in templates, used when the store holds none.
pub fn default_templates() -> Vec<String> {
    vec![
        "Good morning, beautiful! 💕\n\n{loveNote}\n\nToday I'm feeling especially grateful: {gratitude}\n\nI want you to know: {encouragement}\n\nHave an amazing day! I love you! ❤️".to_string(),
        "Hey love! ☀️\n\nJust wanted to tell you: {loveNote}\n\nThis morning I'm grateful for: {gratitude}\n\nRemember this: {encouragement}\n\nYou're amazing! Love you lots! 💕".to_string(),
        "Good morning sunshine! 🌅\n\n{loveNote}\n\nI'm grateful today because: {gratitude}\n\nI hope you remember: {encouragement}\n\nHave the best day ever! Love you! ❤️".to_string(),
    ]
}

/// Pick a template for `date` and fill in the answers.
///
/// The template index is `dayOfYear % len` (Jan 1 is day 1), so the
/// selection advances by one each day and resets across a year boundary.
/// The caller supplies `date` so that selection stays a pure function of
/// the instant; production code passes "today" in the configured timezone.
///
/// Each token is substituted at its first occurrence only. A template
/// missing a token keeps the literal token text — composition never fails.
pub fn compose(answers: &AnswerSet, templates: &[String], date: NaiveDate) -> String {
    let defaults;
    let templates = if templates.is_empty() {
        defaults = default_templates();
        &defaults
    } else {
        templates
    };

    let index = date.ordinal() as usize % templates.len();
    render(&templates[index], answers)
}

/// Substitute the three named tokens, first occurrence each.
fn render(template: &str, answers: &AnswerSet) -> String {
    template
        .replacen(TOKEN_LOVE_NOTE, &answers.love_note, 1)
        .replacen(TOKEN_GRATITUDE, &answers.gratitude, 1)
        .replacen(TOKEN_ENCOURAGEMENT, &answers.encouragement, 1)
}
