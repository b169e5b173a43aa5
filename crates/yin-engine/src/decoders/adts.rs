//! ADTS 帧头解析与分帧.

use yin_core::audio_format::AAC_SAMPLE_RATES;

use crate::error::{EngineError, EngineResult};

/// ADTS 固定头 + 可变头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdtsHeader {
    /// profile 字段 (object type - 1)
    pub profile: u8,
    /// 采样率索引
    pub sample_rate_index: u8,
    /// 声道配置
    pub channel_config: u8,
    /// 整帧长度 (含头部)
    pub frame_length: usize,
    /// 头部长度: 无 CRC 为 7, 有 CRC 为 9
    pub header_length: usize,
}

impl AdtsHeader {
    /// 解析帧头, 不是合法 ADTS 头时返回 None
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < 7 || data[0] != 0xFF || data[1] & 0xF6 != 0xF0 {
            return None;
        }
        let header_length = if data[1] & 0x01 == 1 { 7 } else { 9 };
        let profile = data[2] >> 6;
        let sample_rate_index = (data[2] >> 2) & 0x0F;
        let channel_config = ((data[2] & 0x01) << 2) | (data[3] >> 6);
        let frame_length = (usize::from(data[3] & 0x03) << 11)
            | (usize::from(data[4]) << 3)
            | usize::from(data[5] >> 5);

        if usize::from(sample_rate_index) >= AAC_SAMPLE_RATES.len() || frame_length < header_length
        {
            return None;
        }
        Some(Self {
            profile,
            sample_rate_index,
            channel_config,
            frame_length,
            header_length,
        })
    }

    /// 采样率 (Hz)
    pub fn sample_rate(&self) -> u32 {
        AAC_SAMPLE_RATES[usize::from(self.sample_rate_index)]
    }

    /// 由帧头推导 AudioSpecificConfig
    pub fn audio_specific_config(&self) -> [u8; 2] {
        audio_specific_config(self.profile + 1, self.sample_rate_index, self.channel_config)
    }
}

/// 构造 2 字节 AudioSpecificConfig (GASpecificConfig 各标志位为 0)
pub fn audio_specific_config(object_type: u8, sample_rate_index: u8, channel_config: u8) -> [u8; 2] {
    [
        (object_type << 3) | (sample_rate_index >> 1),
        ((sample_rate_index & 0x01) << 7) | ((channel_config & 0x0F) << 3),
    ]
}

/// 按 ADTS 头拆分数据包, 返回去掉头部的原始帧
///
/// 数据不以 ADTS 同步字开头时返回 None, 由调用方按原始 AAC 帧处理.
pub fn split_frames(data: &[u8]) -> EngineResult<Option<Vec<&[u8]>>> {
    if AdtsHeader::parse(data).is_none() {
        return Ok(None);
    }

    let mut frames = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        let header = AdtsHeader::parse(&data[pos..])
            .ok_or_else(|| EngineError::InvalidData(format!("偏移 {pos} 处 ADTS 头无效")))?;
        let end = pos + header.frame_length;
        if end > data.len() {
            return Err(EngineError::InvalidData(format!(
                "ADTS 帧不完整: 需要 {} 字节, 剩余 {} 字节",
                header.frame_length,
                data.len() - pos,
            )));
        }
        frames.push(&data[pos + header.header_length..end]);
        pos = end;
    }
    Ok(Some(frames))
}
