//! The daily ritual core: question prompt, reply capture, scheduled
//! delivery.

pub mod compose;
pub mod parser;
pub mod pending;
pub mod service;

pub use parser::AnswerSet;
pub use pending::PendingState;
pub use service::MorningService;

use serde::{Deserialize, Serialize};

/// A single morning question. `number` is what the reply grammar keys on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub number: u32,
    pub text: String,
}

/// The built-in question set; the store seeds itself with these.
pub fn default_questions() -> Vec<Question> {
    vec![
        Question {
            number: 1,
            text: "What's one thing you love about her today?".to_string(),
        },
        Question {
            number: 2,
            text: "What are you grateful for this morning?".to_string(),
        },
        Question {
            number: 3,
            text: "What do you want to encourage her about today?".to_string(),
        },
    ]
}
