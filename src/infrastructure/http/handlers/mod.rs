//! HTTP Handlers

mod health;
mod tts;

pub use health::*;
pub use tts::*;
