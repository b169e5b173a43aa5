//! AAC 解码插件 (`avdec_aac`).

use std::sync::Arc;

use log::{debug, error};
use yin_core::audio_format::AAC_SAMPLE_RATES;
use yin_core::format::keys;
use yin_core::{CodecError, CodecResult, Format};
use yin_engine::EngineRegistry;

use super::{MAX_CHANNELS, input_size_within, required_int};
use crate::codec::AudioCodec;
use crate::decoder_core::DecoderCore;

const INPUT_BUFFER_SIZE: usize = 8192;
const OUTPUT_BUFFER_SIZE: usize = 32768;

/// AAC 解码插件
///
/// `aac_is_adts` 为 0 时使用 LATM 引擎实现, 缺省或为 1 时按 ADTS 处理.
pub struct AacDecoderPlugin {
    core: DecoderCore,
    input_size: usize,
}

impl AacDecoderPlugin {
    pub const NAME: &'static str = "avdec_aac";

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
        if !u32::try_from(sample_rate).is_ok_and(|rate| AAC_SAMPLE_RATES.contains(&rate)) {
            error!("avdec_aac: 不支持的采样率 {sample_rate}");
            return Err(CodecError::MismatchSampleRate);
        }
        let channels = required_int(
            format,
            keys::CHANNEL_COUNT,
            CodecError::ConfigureMismatchChannelCount,
        )?;
        if !(1..=MAX_CHANNELS).contains(&channels) {
            error!("avdec_aac: 不支持的声道数 {channels}");
            return Err(CodecError::ConfigureMismatchChannelCount);
        }
        Ok(())
    }
}

impl AudioCodec for AacDecoderPlugin {
    fn codec_name(&self) -> &str {
        Self::NAME
    }

    fn init(&mut self, format: &Format) -> CodecResult<()> {
        Self::check_format(format)?;
        let engine_name = match format.get_int(keys::AAC_IS_ADTS) {
            Some(0) => "aac_latm",
            _ => "aac",
        };
        debug!("avdec_aac: 使用引擎解码器 {engine_name}");

        self.core.allocate_context(engine_name)?;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::test_engine;

    fn aac_format(channels: i32, sample_rate: i32) -> Format {
        let mut format = Format::new();
        format
            .put_int(keys::CHANNEL_COUNT, channels)
            .put_int(keys::SAMPLE_RATE, sample_rate);
        format
    }

    #[test]
    fn test_参数校验顺序() {
        let mut plugin = AacDecoderPlugin::new(test_engine());
        assert_eq!(
            plugin.init(&aac_format(9, 12345)),
            Err(CodecError::MismatchSampleRate)
        );
        assert_eq!(
            plugin.init(&aac_format(9, 44100)),
            Err(CodecError::ConfigureMismatchChannelCount)
        );
        assert_eq!(
            plugin.init(&aac_format(2, 44000)),
            Err(CodecError::MismatchSampleRate)
        );
        assert_eq!(
            plugin.init(&Format::new()),
            Err(CodecError::MismatchSampleRate)
        );
    }

    #[test]
    fn test_latm_not_in_engine() {
        let mut plugin = AacDecoderPlugin::new(test_engine());
        let mut format = aac_format(2, 44100);
        format.put_int(keys::AAC_IS_ADTS, 0);
        assert_eq!(plugin.init(&format), Err(CodecError::UnsupportProtocolType));
    }

    #[test]
    fn test_缓冲大小() {
        let mut plugin = AacDecoderPlugin::new(test_engine());
        let mut format = aac_format(2, 44100);
        format.put_int(keys::MAX_INPUT_SIZE, 4096);
        plugin.init(&format).unwrap();
        assert_eq!(plugin.input_buffer_size(), 4096);
        assert_eq!(plugin.output_buffer_size(), 32768);
        assert_eq!(plugin.codec_name(), "avdec_aac");

        let mut plugin = AacDecoderPlugin::new(test_engine());
        let mut format = aac_format(1, 48000);
        format.put_int(keys::MAX_INPUT_SIZE, 100_000);
        plugin.init(&format).unwrap();
        assert_eq!(plugin.input_buffer_size(), 8192);
        plugin.release().unwrap();
        plugin.release().unwrap();
    }
}
