//! Query Handlers 实现

mod status_handlers;

pub use status_handlers::*;
