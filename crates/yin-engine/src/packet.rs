//! 压缩数据包 (Packet).
//!
//! 对标 FFmpeg 的 `AVPacket`. 数据为空的包表示送入结束 (drain).

use bytes::Bytes;
use yin_core::Rational;
use yin_core::timestamp::NOPTS_VALUE;

/// 压缩数据包
#[derive(Debug, Clone)]
pub struct Packet {
    /// 压缩数据
    pub data: Bytes,
    /// 显示时间戳 (PTS), 解码时为宿主给出的微秒时间戳
    pub pts: i64,
    /// 数据包时长 (以 time_base 为单位)
    pub duration: i64,
    /// 时间基
    pub time_base: Rational,
}

impl Packet {
    /// 创建空数据包 (drain)
    pub fn empty() -> Self {
        Self {
            data: Bytes::new(),
            pts: NOPTS_VALUE,
            duration: 0,
            time_base: Rational::UNDEFINED,
        }
    }

    pub fn from_data(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            ..Self::empty()
        }
    }

    /// 负载字节数
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// 是否为空包 (drain packet)
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
