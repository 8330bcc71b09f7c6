//! Reply parsing — turns a free-text reply into a structured answer set.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// The three answers behind a morning message. Fixed arity: a value of
/// this type only exists when all three fields were parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSet {
    pub love_note: String,
    pub gratitude: String,
    pub encouragement: String,
}

/// Matches `"1. answer"` / `"1) answer"`.
static NUMBERED_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)[.)]\s*(.+)$").expect("valid regex"));

/// Parse a reply into an [`AnswerSet`].
///
/// Two grammars, tried in order:
/// 1. Numbered lines (`1.` / `1)`), collected by their number so line order
///    does not matter. A repeated number overwrites the earlier slot.
///    Succeeds only when all `expected` slots are filled.
/// 2. Positional: the first `expected` non-empty lines, in order.
///
/// Returns `None` when neither grammar yields a complete set — partial
/// results are never produced.
pub fn parse_answers(text: &str, expected: usize) -> Option<AnswerSet> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    if let Some(answers) = parse_numbered(&lines, expected) {
        return Some(to_answer_set(&answers));
    }

    if lines.len() >= expected {
        let positional: Vec<String> =
            lines[..expected].iter().map(|l| l.to_string()).collect();
        return Some(to_answer_set(&positional));
    }

    None
}

fn parse_numbered(lines: &[&str], expected: usize) -> Option<Vec<String>> {
    let mut slots: Vec<Option<String>> = vec![None; expected];

    for line in lines {
        let Some(caps) = NUMBERED_LINE.captures(line) else {
            continue;
        };
        // Out-of-range numbers are ignored rather than consuming a slot;
        // a number too large to even parse counts as out of range.
        let Ok(number) = caps[1].parse::<usize>() else {
            continue;
        };
        if (1..=expected).contains(&number) {
            slots[number - 1] = Some(caps[2].trim().to_string());
        }
    }

    slots
        .into_iter()
        .map(|s| s.filter(|v| !v.is_empty()))
        .collect()
}

fn to_answer_set(answers: &[String]) -> AnswerSet {
    AnswerSet {
        love_note: answers[0].clone(),
        gratitude: answers[1].clone(),
        encouragement: answers[2].clone(),
    }
}
