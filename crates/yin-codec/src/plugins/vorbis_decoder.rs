//! Vorbis 解码插件 (`avdec_vorbis`).
//!
//! 引擎需要识别头和设置头, 由客户端通过 `codec_config` 提供.

use std::sync::Arc;

use log::error;
use yin_core::format::keys;
use yin_core::{CodecError, CodecResult, Format};
use yin_engine::EngineRegistry;

use super::{MAX_CHANNELS, input_size_within, required_int};
use crate::codec::AudioCodec;
use crate::decoder_core::DecoderCore;

const MAX_SAMPLE_RATE: i32 = 384_000;
const INPUT_BUFFER_SIZE: usize = 8192;
const OUTPUT_BUFFER_SIZE: usize = 32768;

/// Vorbis 解码插件
pub struct VorbisDecoderPlugin {
    core: DecoderCore,
    input_size: usize,
}

impl VorbisDecoderPlugin {
    pub const NAME: &'static str = "avdec_vorbis";

    pub fn new(engine: Arc<EngineRegistry>) -> Self {
        Self {
            core: DecoderCore::new(engine),
            input_size: INPUT_BUFFER_SIZE,
        }
    }

    pub fn create(engine: Arc<EngineRegistry>) -> Box<dyn AudioCodec> {
        Box::new(Self::new(engine))
    }

    fn check_format(format: &Format) -> CodecResult<()> {
        let sample_rate = required_int(format, keys::SAMPLE_RATE, CodecError::MismatchSampleRate)?;
        if !(1..=MAX_SAMPLE_RATE).contains(&sample_rate) {
            error!("avdec_vorbis: 不支持的采样率 {sample_rate}");
            return Err(CodecError::MismatchSampleRate);
        }
        let channels = required_int(
            format,
            keys::CHANNEL_COUNT,
            CodecError::ConfigureMismatchChannelCount,
        )?;
        if !(1..=MAX_CHANNELS).contains(&channels) {
            error!("avdec_vorbis: 不支持的声道数 {channels}");
            return Err(CodecError::ConfigureMismatchChannelCount);
        }
        if format
            .get_buffer(keys::CODEC_CONFIG)
            .is_none_or(<[u8]>::is_empty)
        {
            error!("avdec_vorbis: 缺少 codec_config");
            return Err(CodecError::InvalidValue);
        }
        Ok(())
    }
}

impl AudioCodec for VorbisDecoderPlugin {
    fn codec_name(&self) -> &str {
        Self::NAME
    }

    fn init(&mut self, format: &Format) -> CodecResult<()> {
        Self::check_format(format)?;
        self.core.allocate_context("vorbis")?;
        self.core.init_context(format)?;
        self.core.open_context()?;
        self.input_size =
            input_size_within(self.core.max_input_size(), INPUT_BUFFER_SIZE, INPUT_BUFFER_SIZE);
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
