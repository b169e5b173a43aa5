//! 统一错误码定义.
//!
//! 插件层对外暴露的错误码, 调用方按错误类别分支处理:
//! `Again` / `NotEnoughData` 表示再调用一次, `EndOfStream` 表示正常结束, 其余均为失败.

use thiserror::Error;

/// 编解码服务错误码
///
/// 成功由 `Ok(())` 表示, 因此这里不包含 OK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum CodecError {
    /// 未知错误 (引擎未映射的错误)
    #[error("未知错误")]
    Unknown,

    /// 无效参数值
    #[error("无效参数值")]
    InvalidValue,

    /// 不允许的操作
    #[error("不允许的操作")]
    InvalidOperation,

    /// 状态机状态不匹配
    #[error("无效状态")]
    InvalidState,

    /// 引擎上下文不存在或未打开
    #[error("错误状态: 引擎上下文不可用")]
    WrongState,

    /// 内存不足或缓冲区容量不足
    #[error("内存不足")]
    NoMemory,

    /// 需要送入更多数据
    #[error("数据不足")]
    NotEnoughData,

    /// 已到达流末尾
    #[error("已到达流末尾")]
    EndOfStream,

    /// 引擎要求先取出数据再送入
    #[error("请重试")]
    Again,

    /// 引擎中不存在该名称的实现
    #[error("不支持的协议类型")]
    UnsupportProtocolType,

    /// 采样率不匹配
    #[error("采样率不匹配")]
    MismatchSampleRate,

    /// 码率或位深不匹配
    #[error("码率不匹配")]
    MismatchBitRate,

    /// 声道数不匹配
    #[error("声道数不匹配")]
    ConfigureMismatchChannelCount,

    /// 配置错误
    #[error("配置错误")]
    ConfigureError,

    /// 不支持的音频参数
    #[error("不支持的音频参数")]
    UnsupportAudParams,
}

impl CodecError {
    /// 是否为稳态信号 (调用方应交替送入/取出后重试)
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Again | Self::NotEnoughData)
    }

    /// 是否为配置类错误 (调用方修正参数后可恢复)
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidValue
                | Self::MismatchSampleRate
                | Self::MismatchBitRate
                | Self::ConfigureMismatchChannelCount
                | Self::ConfigureError
                | Self::UnsupportAudParams
        )
    }
}

/// 编解码服务统一 Result 类型
pub type CodecResult<T> = Result<T, CodecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_可重试错误分类() {
        assert!(CodecError::Again.is_retryable());
        assert!(CodecError::NotEnoughData.is_retryable());
        assert!(!CodecError::EndOfStream.is_retryable());
        assert!(!CodecError::Unknown.is_retryable());
    }

    #[test]
    fn test_configuration_errors() {
        assert!(CodecError::MismatchSampleRate.is_configuration());
        assert!(CodecError::UnsupportAudParams.is_configuration());
        assert!(!CodecError::WrongState.is_configuration());
        assert!(!CodecError::NoMemory.is_configuration());
    }
}
