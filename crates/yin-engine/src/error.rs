//! 引擎错误类型.
//!
//! 对标 FFmpeg 的 `AVERROR` 取值, `Again` / `Eof` 对应 `EAGAIN` / `AVERROR_EOF`.

use thiserror::Error;

/// 引擎统一错误类型
#[derive(Debug, Error)]
pub enum EngineError {
    /// 需要先取出数据 (send 侧) 或送入更多数据 (receive 侧)
    #[error("资源暂不可用, 请重试")]
    Again,

    /// 已到达流末尾
    #[error("已到达流末尾")]
    Eof,

    /// 无效参数
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 无效数据 (损坏的码流等)
    #[error("无效数据: {0}")]
    InvalidData(String),

    /// 不支持的操作或参数
    #[error("不支持的操作: {0}")]
    Unsupported(String),

    /// 内存分配失败
    #[error("内存分配失败: {0}")]
    OutOfMemory(String),

    /// 未找到指定的编解码器
    #[error("未找到编解码器: {0}")]
    CodecNotFound(String),

    /// 内部错误 (不应发生)
    #[error("内部错误: {0}")]
    Internal(String),
}

/// 引擎统一 Result 类型
pub type EngineResult<T> = Result<T, EngineError>;

impl From<symphonia_core::errors::Error> for EngineError {
    fn from(err: symphonia_core::errors::Error) -> Self {
        use symphonia_core::errors::Error as SymError;
        match err {
            SymError::DecodeError(msg) => Self::InvalidData(msg.to_string()),
            SymError::IoError(e) => Self::InvalidData(e.to_string()),
            SymError::Unsupported(msg) => Self::Unsupported(msg.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}
