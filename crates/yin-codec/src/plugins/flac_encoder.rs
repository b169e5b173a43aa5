//! FLAC 编码插件 (`avenc_flac`).
//!
//! 输入为交错 S16 或 S32 PCM. 未指定采样格式时按位深选择: 16 位用 S16, 其余用 S32.
//! 32 位编码需要 `compliance_level <= -2`.

use std::sync::Arc;

use log::error;
use yin_core::format::keys;
use yin_core::{AudioChannelLayout, AudioSampleFormat, CodecError, CodecResult, Format};
use yin_engine::EngineRegistry;

use super::{FLAC_SAMPLE_RATES, MAX_CHANNELS, input_size_within, required_int};
use crate::codec::AudioCodec;
use crate::converter::convert_channel_layout_to_engine;
use crate::encoder_core::EncoderCore;

const BITS_PER_SAMPLE: [i32; 3] = [16, 24, 32];
const COMPLIANCE_LEVELS: std::ops::RangeInclusive<i32> = -2..=2;
/// 缓冲大小下限
const BUFFER_SIZE: usize = 65536;
/// 输出格式中的 MIME 类型
const FLAC_MIME: &str = "audio/flac";

/// FLAC 编码插件
pub struct FlacEncoderPlugin {
    core: EncoderCore,
    input_size: usize,
    output_size: usize,
}

impl FlacEncoderPlugin {
    pub const NAME: &'static str = "avenc_flac";

    pub fn new(engine: Arc<EngineRegistry>) -> Self {
        Self {
            core: EncoderCore::new(engine),
            input_size: BUFFER_SIZE,
            output_size: BUFFER_SIZE,
        }
    }

    pub fn create(engine: Arc<EngineRegistry>) -> Box<dyn AudioCodec> {
        Box::new(Self::new(engine))
    }

    /// 校验参数, 返回 (声道数, 位深)
    fn check_format(format: &Format) -> CodecResult<(i32, i32)> {
        let sample_rate = required_int(format, keys::SAMPLE_RATE, CodecError::MismatchSampleRate)?;
        if !FLAC_SAMPLE_RATES.contains(&sample_rate) {
            error!("avenc_flac: 不支持的采样率 {sample_rate}");
            return Err(CodecError::MismatchSampleRate);
        }
        let channels = required_int(
            format,
            keys::CHANNEL_COUNT,
            CodecError::ConfigureMismatchChannelCount,
        )?;
        if !(1..=MAX_CHANNELS).contains(&channels) {
            error!("avenc_flac: 不支持的声道数 {channels}");
            return Err(CodecError::ConfigureMismatchChannelCount);
        }
        let bits = required_int(
            format,
            keys::BITS_PER_CODED_SAMPLE,
            CodecError::MismatchBitRate,
        )?;
        if !BITS_PER_SAMPLE.contains(&bits) {
            error!("avenc_flac: 不支持的位深 {bits}");
            return Err(CodecError::MismatchBitRate);
        }
        let compliance = format.get_int(keys::COMPLIANCE_LEVEL).unwrap_or(0);
        if !COMPLIANCE_LEVELS.contains(&compliance) {
            error!("avenc_flac: 兼容级别 {compliance} 超出 -2..=2");
            return Err(CodecError::InvalidValue);
        }
        if let Some(raw) = format.get_long(keys::CHANNEL_LAYOUT) {
            if convert_channel_layout_to_engine(AudioChannelLayout::from_raw(raw)).is_empty() {
                error!("avenc_flac: 无法映射声道布局 0x{raw:x}");
                return Err(CodecError::UnsupportAudParams);
            }
        }
        Ok((channels, bits))
    }
}

impl AudioCodec for FlacEncoderPlugin {
    fn codec_name(&self) -> &str {
        Self::NAME
    }

    fn init(&mut self, format: &Format) -> CodecResult<()> {
        let (channels, bits) = Self::check_format(format)?;

        let mut format = format.clone();
        if !format.contains_key(keys::AUDIO_SAMPLE_FORMAT) {
            let sample_format = if bits == 16 {
                AudioSampleFormat::S16Le
            } else {
                AudioSampleFormat::S32Le
            };
            format.put_int(keys::AUDIO_SAMPLE_FORMAT, sample_format.as_raw());
        }

        self.core.allocate_context("flac")?;
        self.core.init_context(&format)?;
        self.core.open_context()?;
        self.core.init_frame()?;

        // 一帧 PCM 超过默认大小时按帧放大, 避免补零和输出截断
        let bytes_per_sample = if bits == 16 { 2 } else { 4 };
        let frame_bytes = self.core.frame_size() as usize * channels as usize * bytes_per_sample;
        let floor = BUFFER_SIZE.max(frame_bytes);
        self.input_size = input_size_within(self.core.max_input_size(), floor, floor);
        self.output_size = floor;
        Ok(())
    }

    delegate_to_core!();

    fn input_buffer_size(&self) -> usize {
        self.input_size
    }

    fn output_buffer_size(&self) -> usize {
        self.output_size
    }

    fn format(&self) -> Format {
        let mut format = self.core.format();
        format.put_string(keys::CODEC_MIME, FLAC_MIME);
        format
    }
}
