//! 错误定义模块

use thiserror::Error;

/// 放射科系统统一错误类型
#[derive(Error, Debug)]
pub enum RadError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("验证错误: {0}")]
    Validation(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("快照获取失败: {0}")]
    SnapshotFetch(String),

    #[error("无效状态转换: 从 {from} 到 {event}")]
    InvalidStateTransition { from: String, event: String },

    #[error("安全检查单未通过: {}", .errors.join("; "))]
    ChecklistGate { errors: Vec<String> },
}

impl RadError {
    /// 检查单门控失败时返回的错误列表
    pub fn gate_errors(&self) -> Option<&[String]> {
        match self {
            RadError::ChecklistGate { errors } => Some(errors),
            _ => None,
        }
    }
}

/// 放射科系统统一结果类型
pub type Result<T> = std::result::Result<T, RadError>;
