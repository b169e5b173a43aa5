//! 编解码上下文 (CodecContext).
//!
//! 对标 FFmpeg 的 `AVCodecContext`, 保存插件层协商出的参数.
//! 编码器在 `open` 时回写 `frame_size`、`time_base` 和 `extra_data`.

use yin_core::{ChannelLayout, ChannelMask, Rational, SampleFormat};

/// 未指定 profile
pub const PROFILE_UNKNOWN: i32 = -99;
/// AAC Main (ADTS profile 字段取值)
pub const PROFILE_AAC_MAIN: i32 = 0;
/// AAC LC (ADTS profile 字段取值)
pub const PROFILE_AAC_LOW: i32 = 1;

/// 编解码上下文
#[derive(Debug, Clone)]
pub struct CodecContext {
    /// 声道数
    pub channels: u32,
    /// 采样率 (Hz)
    pub sample_rate: u32,
    /// 码率 (bps)
    pub bit_rate: i64,
    /// 每个编码采样的位数 (FLAC 等无损格式使用)
    pub bits_per_coded_sample: u32,
    /// 编解码器私有数据 (AudioSpecificConfig / STREAMINFO / Vorbis 头)
    pub extra_data: Vec<u8>,
    /// 采样格式 (解码器为请求的输出格式, 编码器为输入格式)
    pub sample_format: SampleFormat,
    /// 声道布局
    pub channel_layout: ChannelLayout,
    /// 每帧每声道采样数, 由编码器在打开时设置
    pub frame_size: u32,
    /// 时间基
    pub time_base: Rational,
    /// profile, AAC 为 ADTS profile 字段 (object type - 1)
    pub profile: i32,
    /// 标准兼容级别 (-2..=2)
    pub compliance: i32,
}

impl CodecContext {
    pub fn new() -> Self {
        Self {
            channels: 0,
            sample_rate: 0,
            bit_rate: 0,
            bits_per_coded_sample: 0,
            extra_data: Vec::new(),
            sample_format: SampleFormat::None,
            channel_layout: ChannelLayout {
                channels: 0,
                mask: ChannelMask::empty(),
            },
            frame_size: 0,
            time_base: Rational::UNDEFINED,
            profile: PROFILE_UNKNOWN,
            compliance: 0,
        }
    }

    /// 有效声道数: 优先取布局中的声道数
    pub fn channel_count(&self) -> u32 {
        if self.channel_layout.channels > 0 {
            self.channel_layout.channels
        } else {
            self.channels
        }
    }
}

impl Default for CodecContext {
    fn default() -> Self {
        Self::new()
    }
}
