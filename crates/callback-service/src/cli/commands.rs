//! CLI 命令定义
//!
//! 使用 clap derive 宏定义命令行接口结构。
//! `serve` 启动 HTTP 服务，其余子命令直接在本地读取场景文件执行，不依赖运行中的服务。

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// 回调模拟服务命令行工具
#[derive(Parser, Debug)]
#[command(name = "callback-server")]
#[command(version, about = "配置驱动的 HTTP 回调模拟工具")]
#[command(propagate_version = true)]
pub struct Cli {
    /// 日志级别 (trace, debug, info, warn, error)，覆盖配置文件
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// 配置环境名，决定加载 config/{env}.toml（默认读取 CALLBACK_ENV）
    #[arg(long, global = true)]
    pub config_env: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// 场景文件参数，未指定时使用配置中的 scenes.file
#[derive(Args, Debug, Clone, Default)]
pub struct SceneSource {
    /// 场景配置文件路径
    #[arg(short, long)]
    pub scenes: Option<PathBuf>,
}

/// 子命令枚举
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 启动 HTTP 服务
    Serve {
        /// 服务端口（覆盖 server.port）
        #[arg(short, long)]
        port: Option<u16>,

        /// 监听场景文件变更并自动重载
        #[arg(long)]
        watch: bool,

        #[command(flatten)]
        source: SceneSource,
    },

    /// 在本地执行单个回调场景并输出结果 JSON
    Fire {
        /// 场景 ID
        scene: String,

        /// 目标环境（默认 scenes.default_env）
        #[arg(short, long)]
        env: Option<String>,

        /// 仅渲染预览，不发送请求
        #[arg(long)]
        dry_run: bool,

        /// 变量覆盖，格式 KEY=VALUE，可重复
        #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
        vars: Vec<(String, String)>,

        #[command(flatten)]
        source: SceneSource,
    },

    /// 在本地执行批量场景并输出结果 JSON，任一步骤失败时以非零状态退出
    Run {
        /// 批量场景 ID
        scenario: String,

        /// 目标环境（默认 scenes.default_env）
        #[arg(short, long)]
        env: Option<String>,

        /// 仅渲染预览，不发送请求，也不等待步骤间延迟
        #[arg(long)]
        dry_run: bool,

        /// 公共变量，格式 KEY=VALUE，可重复
        #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
        vars: Vec<(String, String)>,

        #[command(flatten)]
        source: SceneSource,
    },

    /// 列出场景与批量场景
    List {
        #[command(flatten)]
        source: SceneSource,
    },

    /// 校验场景配置文件
    Validate {
        #[command(flatten)]
        source: SceneSource,
    },
}

/// 解析 KEY=VALUE，值按字符串处理（与 URL 查询参数一致）
fn parse_var(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("变量格式应为 KEY=VALUE: {}", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("变量名不能为空: {}", raw));
    }
    Ok((key.to_string(), value.to_string()))
}
