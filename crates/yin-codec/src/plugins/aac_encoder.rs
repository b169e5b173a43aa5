//! AAC 编码插件 (`avenc_aac`).
//!
//! 输出的每个数据包前都带一个 7 字节 ADTS 头 (无 CRC).

use std::sync::Arc;

use log::{debug, error};
use yin_core::audio_format::aac_sample_rate_index;
use yin_core::format::keys;
use yin_core::{AacProfile, AudioChannelLayout, AudioSampleFormat, CodecError, CodecResult, Format};
use yin_engine::{CodecContext, EngineRegistry};

use super::input_size_within;
use crate::codec::AudioCodec;
use crate::converter::{convert_channel_layout_to_engine, convert_sample_format_to_engine};
use crate::encoder_core::EncoderCore;

const INPUT_BUFFER_SIZE: usize = 32768;
const INPUT_SIZE_LIMIT: usize = 8192;
const OUTPUT_BUFFER_SIZE: usize = 8192;
/// ADTS 头长度
pub const ADTS_HEADER_SIZE: usize = 7;
/// 采样率不在 AAC 表中时使用的索引 (44100)
const DEFAULT_FREQ_INDEX: u8 = 4;
/// ADTS 帧长度字段为 13 位
const MAX_ADTS_FRAME_LENGTH: usize = 0x1FFF;

/// 生成 ADTS 头
///
/// # 参数
/// - `profile`: ADTS profile 字段 (object type - 1, LC 为 1)
/// - `sample_rate`: 采样率, 不在 AAC 采样率表中时按 44100 处理
/// - `channels`: 声道配置
/// - `payload_len`: 原始 AAC 负载长度
///
/// 帧长度超出 13 位时返回空向量.
pub fn adts_header(profile: i32, sample_rate: u32, channels: u32, payload_len: usize) -> Vec<u8> {
    let frame_len = payload_len + ADTS_HEADER_SIZE;
    if frame_len > MAX_ADTS_FRAME_LENGTH {
        error!("ADTS 帧长度 {frame_len} 超出 13 位");
        return Vec::new();
    }
    let freq_idx = aac_sample_rate_index(sample_rate).unwrap_or(DEFAULT_FREQ_INDEX);
    let profile = (profile & 0x3) as u8;
    let chan_cfg = (channels & 0x7) as u8;
    let frame_len = frame_len as u16;

    vec![
        0xFF,
        0xF1,
        (profile << 6) | (freq_idx << 2) | (chan_cfg >> 2),
        ((chan_cfg & 3) << 6) | (frame_len >> 11) as u8,
        ((frame_len & 0x7FF) >> 3) as u8,
        (((frame_len & 7) << 5) as u8) | 0x1F,
        0xFC,
    ]
}

/// AAC 编码插件
pub struct AacEncoderPlugin {
    core: EncoderCore,
    input_size: usize,
}

impl AacEncoderPlugin {
    pub const NAME: &'static str = "avenc_aac";

    pub fn new(engine: Arc<EngineRegistry>) -> Self {
        Self {
            core: EncoderCore::new(engine),
            input_size: INPUT_BUFFER_SIZE,
        }
    }

    pub fn create(engine: Arc<EngineRegistry>) -> Box<dyn AudioCodec> {
        Box::new(Self::new(engine))
    }

    /// 校验必需参数并与引擎能力比对
    fn check_format(&self, format: &Format) -> CodecResult<()> {
        let (Some(raw_format), Some(raw_layout), Some(sample_rate)) = (
            format.get_int(keys::AUDIO_SAMPLE_FORMAT),
            format.get_long(keys::CHANNEL_LAYOUT),
            format.get_int(keys::SAMPLE_RATE),
        ) else {
            error!("avenc_aac: 缺少 audio_sample_format / channel_layout / sample_rate");
            return Err(CodecError::UnsupportAudParams);
        };
        let descriptor = self.core.descriptor().ok_or(CodecError::WrongState)?;

        let sample_format = convert_sample_format_to_engine(AudioSampleFormat::from_raw(raw_format));
        if !descriptor.supports_sample_format(sample_format) {
            error!("avenc_aac: 不支持的采样格式 {raw_format}");
            return Err(CodecError::UnsupportAudParams);
        }
        let mask = convert_channel_layout_to_engine(AudioChannelLayout::from_raw(raw_layout));
        if mask.is_empty() || !descriptor.supports_channel_layout(mask) {
            error!("avenc_aac: 不支持的声道布局 0x{raw_layout:x}");
            return Err(CodecError::UnsupportAudParams);
        }
        if !u32::try_from(sample_rate).is_ok_and(|rate| descriptor.supports_sample_rate(rate)) {
            error!("avenc_aac: 不支持的采样率 {sample_rate}");
            return Err(CodecError::UnsupportAudParams);
        }
        Ok(())
    }

    /// 读取 `aac_profile`, 缺省为 LC, 返回 ADTS profile 字段
    fn adts_profile(format: &Format) -> CodecResult<i32> {
        let raw = format.get_int(keys::AAC_PROFILE).unwrap_or(0);
        AacProfile::from_raw(raw)
            .and_then(|profile| profile.adts_profile())
            .map(i32::from)
            .ok_or_else(|| {
                error!("avenc_aac: 不支持的 profile {raw}");
                CodecError::UnsupportAudParams
            })
    }
}

impl AudioCodec for AacEncoderPlugin {
    fn codec_name(&self) -> &str {
        Self::NAME
    }

    fn init(&mut self, format: &Format) -> CodecResult<()> {
        self.core.allocate_context("aac")?;
        self.check_format(format)?;
        let profile = Self::adts_profile(format)?;

        self.core.init_context(format)?;
        self.core.set_profile(profile)?;
        self.core.open_context()?;
        self.core.init_frame()?;
        self.core
            .register_header_func(Box::new(|ctx: &CodecContext, payload_len: usize| {
                adts_header(ctx.profile, ctx.sample_rate, ctx.channels, payload_len)
            }));

        self.input_size = input_size_within(
            self.core.max_input_size(),
            INPUT_SIZE_LIMIT,
            INPUT_BUFFER_SIZE,
        );
        debug!(
            "avenc_aac: 帧长 {}, 输入缓冲 {} 字节",
            self.core.frame_size(),
            self.input_size
        );
        Ok(())
    }

    delegate_to_core!();

    fn input_buffer_size(&self) -> usize {
        self.input_size
    }

    fn output_buffer_size(&self) -> usize {
        OUTPUT_BUFFER_SIZE
    }

    fn format(&self) -> Format {
        self.core.format()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer_info::CodecBufferInfo;
    use crate::plugins::test_engine;

    fn aac_format(layout: AudioChannelLayout, sample_rate: i32) -> Format {
        let mut format = Format::new();
        format
            .put_int(keys::AUDIO_SAMPLE_FORMAT, AudioSampleFormat::F32p.as_raw())
            .put_long(keys::CHANNEL_LAYOUT, layout.as_raw())
            .put_int(keys::SAMPLE_RATE, sample_rate)
            .put_int(keys::CHANNEL_COUNT, layout.channels() as i32)
            .put_long(keys::BITRATE, 128_000);
        format
    }

    #[test]
    fn test_adts_header_formula() {
        assert_eq!(
            adts_header(1, 44100, 2, 100),
            vec![0xFF, 0xF1, 0x50, 0x80, 0x0D, 0x7F, 0xFC]
        );
        // 48 kHz 立体声, 帧长 819
        assert_eq!(
            adts_header(1, 48000, 2, 812),
            vec![0xFF, 0xF1, 0x4C, 0x80, 0x66, 0x7F, 0xFC]
        );
    }

    #[test]
    fn test_adts_未知采样率使用默认索引() {
        let header = adts_header(1, 44000, 1, 0);
        assert_eq!((header[2] >> 2) & 0xF, 4);
        assert_eq!(header[3] >> 6, 1);
        assert!(adts_header(1, 44100, 2, 0x1FFF).is_empty());
    }

    #[test]
    fn test_缺少必需参数() {
        let mut plugin = AacEncoderPlugin::new(test_engine());
        let mut format = aac_format(AudioChannelLayout::Stereo, 44100);
        format.remove(keys::CHANNEL_LAYOUT);
        assert_eq!(plugin.init(&format), Err(CodecError::UnsupportAudParams));
    }

    #[test]
    fn test_unsupported_params() {
        let mut plugin = AacEncoderPlugin::new(test_engine());
        assert_eq!(
            plugin.init(&aac_format(AudioChannelLayout::Ch7Point1, 44100)),
            Err(CodecError::UnsupportAudParams)
        );
        assert_eq!(
            plugin.init(&aac_format(AudioChannelLayout::Stereo, 44000)),
            Err(CodecError::UnsupportAudParams)
        );

        let mut format = aac_format(AudioChannelLayout::Stereo, 44100);
        format.put_int(keys::AUDIO_SAMPLE_FORMAT, AudioSampleFormat::S16Le.as_raw());
        assert_eq!(plugin.init(&format), Err(CodecError::UnsupportAudParams));

        let mut format = aac_format(AudioChannelLayout::Stereo, 44100);
        format.put_int(keys::AAC_PROFILE, AacProfile::Ld as i32);
        assert_eq!(plugin.init(&format), Err(CodecError::UnsupportAudParams));
    }

    #[test]
    fn test_编码输出带_adts_头() {
        let mut plugin = AacEncoderPlugin::new(test_engine());
        plugin
            .init(&aac_format(AudioChannelLayout::Stereo, 44100))
            .unwrap();
        assert_eq!(plugin.input_buffer_size(), 32768);
        assert_eq!(plugin.output_buffer_size(), 8192);
        assert_eq!(
            plugin.format().get_buffer(keys::CODEC_CONFIG),
            Some(&[0x12, 0x10][..])
        );

        // 一帧静音: 1024 采样 x 2 声道 x 4 字节
        let mut input = CodecBufferInfo::new(32768, "in", 0, 0);
        input.buffer_mut().unwrap().write(&[0u8; 8192], None);
        plugin.process_send_data(&input).unwrap();

        let mut output = CodecBufferInfo::new(8192, "out", 0, 0);
        plugin.process_receive_data(&mut output).unwrap();
        let data = output.buffer().unwrap().data();
        assert_eq!(&data[..2], &[0xFF, 0xF1]);
        let frame_len =
            (usize::from(data[3] & 3) << 11) | (usize::from(data[4]) << 3) | usize::from(data[5] >> 5);
        assert_eq!(frame_len, data.len());
        assert_eq!(output.buffer_attr().presentation_time_us, 0);
    }
}
