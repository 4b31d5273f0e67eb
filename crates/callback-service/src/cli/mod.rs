//! 命令行模块
//!
//! 提供 CLI 命令定义和执行逻辑：
//! - `commands`: clap 命令结构定义
//! - `runner`: 命令执行器

mod commands;
mod runner;

pub use commands::{Cli, Commands, SceneSource};
pub use runner::CommandRunner;
