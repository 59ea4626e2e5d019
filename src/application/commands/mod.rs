//! 应用层 - 命令（写操作）
//!
//! CQRS 命令侧：一次合成请求即一次运行

mod synthesize_commands;

pub mod handlers;

pub use synthesize_commands::*;
