//! 统一错误处理模块
//!
//! 定义回调模拟服务中共享的错误类型，使用 thiserror 提供良好的错误信息。

use std::path::PathBuf;

use thiserror::Error;

/// 系统错误类型
#[derive(Debug, Error)]
pub enum CallbackError {
    // ==================== 配置源错误 ====================
    #[error("场景配置文件不存在: {}", path.display())]
    SourceNotFound { path: PathBuf },

    #[error("配置文件解析失败: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("配置内容无效: {0}")]
    InvalidConfig(String),

    #[error("读取配置文件失败: {0}")]
    Io(#[from] std::io::Error),

    // ==================== 状态错误 ====================
    #[error("状态无效: {0}")]
    InvalidState(String),

    // ==================== 网络错误 ====================
    #[error("请求超时")]
    Timeout,

    #[error("请求错误: {0}")]
    Transport(String),

    // ==================== 通用错误 ====================
    #[error("内部错误: {0}")]
    Internal(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, CallbackError>;

impl CallbackError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::SourceNotFound { .. } => "SOURCE_NOT_FOUND",
            Self::Parse(_) => "PARSE_ERROR",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Io(_) => "IO_ERROR",
            Self::InvalidState(_) => "INVALID_STATE",
            Self::Timeout => "TIMEOUT",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 配置文件是否缺失
    ///
    /// 启动阶段据此区分"配置文件缺失"（仅告警）与真正的解析失败。
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::SourceNotFound { .. })
    }
}
