//! GoodMorning Love — a daily affection-message ritual.
//!
//! Every morning the service texts the sender a few reflective questions,
//! parses the free-text reply, holds the answers until a second scheduled
//! moment, then composes a templated message and fans it out across the
//! recipient's channels.

pub mod channels;
pub mod config;
pub mod error;
pub mod history;
pub mod morning;
pub mod scheduler;
pub mod server;
pub mod store;
pub mod voice;
