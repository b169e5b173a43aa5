//! MP3 解码插件 (`avdec_mp3`).

use std::sync::Arc;

use log::error;
use yin_core::format::keys;
use yin_core::{CodecError, CodecResult, Format};
use yin_engine::EngineRegistry;

use super::required_int;
use crate::codec::AudioCodec;
use crate::decoder_core::DecoderCore;

/// 支持的采样率
const SAMPLE_RATES: [i32; 9] = [8000, 11025, 12000, 16000, 22050, 24000, 32000, 44100, 48000];
const MAX_CHANNELS: i32 = 2;
const MAX_BIT_RATE: i64 = 320_000;
/// 码率未知时的输入缓冲大小
const DEFAULT_INPUT_SIZE: usize = 8192;
/// 一个 MPEG-1 Layer III 立体声帧解码后的字节数
const MIN_OUTPUT_SIZE: usize = 1152 * 2 * 2;

/// MP3 解码插件
pub struct Mp3DecoderPlugin {
    core: DecoderCore,
    input_size: usize,
    output_size: usize,
}

impl Mp3DecoderPlugin {
    pub const NAME: &'static str = "avdec_mp3";

    pub fn new(engine: Arc<EngineRegistry>) -> Self {
        Self {
            core: DecoderCore::new(engine),
            input_size: DEFAULT_INPUT_SIZE,
            output_size: MIN_OUTPUT_SIZE,
        }
    }

    pub fn create(engine: Arc<EngineRegistry>) -> Box<dyn AudioCodec> {
        Box::new(Self::new(engine))
    }

    /// 校验参数, 返回 (采样率, 声道数, 码率)
    fn check_format(format: &Format) -> CodecResult<(i32, i32, Option<i64>)> {
        let sample_rate = required_int(format, keys::SAMPLE_RATE, CodecError::MismatchSampleRate)?;
        if !SAMPLE_RATES.contains(&sample_rate) {
            error!("avdec_mp3: 不支持的采样率 {sample_rate}");
            return Err(CodecError::MismatchSampleRate);
        }
        let channels = required_int(format, keys::CHANNEL_COUNT, CodecError::InvalidValue)?;
        if !(1..=MAX_CHANNELS).contains(&channels) {
            error!("avdec_mp3: 不支持的声道数 {channels}");
            return Err(CodecError::InvalidValue);
        }
        let bit_rate = format.get_long(keys::BITRATE);
        if let Some(rate) = bit_rate.filter(|&rate| rate > MAX_BIT_RATE) {
            error!("avdec_mp3: 码率 {rate} 超过上限 {MAX_BIT_RATE}");
            return Err(CodecError::MismatchBitRate);
        }
        Ok((sample_rate, channels, bit_rate))
    }
}

impl AudioCodec for Mp3DecoderPlugin {
    fn codec_name(&self) -> &str {
        Self::NAME
    }

    fn init(&mut self, format: &Format) -> CodecResult<()> {
        let (sample_rate, channels, bit_rate) = Self::check_format(format)?;

        self.core.allocate_context("mp3")?;
        self.core.init_context(format)?;
        self.core.open_context()?;

        self.input_size = match bit_rate {
            Some(rate) if rate > 0 => (rate / 150) as usize,
            _ => DEFAULT_INPUT_SIZE,
        };
        let estimated = (sample_rate as usize / 31 + 128) * channels as usize * 2;
        self.output_size = estimated.max(MIN_OUTPUT_SIZE);
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
        self.core.format()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::test_engine;

    fn mp3_format(sample_rate: i32, channels: i32, bit_rate: i64) -> Format {
        let mut format = Format::new();
        format
            .put_int(keys::SAMPLE_RATE, sample_rate)
            .put_int(keys::CHANNEL_COUNT, channels)
            .put_long(keys::BITRATE, bit_rate);
        format
    }

    #[test]
    fn test_拒绝超范围码率与声道() {
        let mut plugin = Mp3DecoderPlugin::new(test_engine());
        assert_eq!(
            plugin.init(&mp3_format(44100, 2, 320_001)),
            Err(CodecError::MismatchBitRate)
        );
        assert_eq!(
            plugin.init(&mp3_format(44100, 3, 128_000)),
            Err(CodecError::InvalidValue)
        );
        assert_eq!(
            plugin.init(&mp3_format(96000, 2, 128_000)),
            Err(CodecError::MismatchSampleRate)
        );
    }

    #[test]
    fn test_buffer_sizes_follow_bitrate() {
        let mut plugin = Mp3DecoderPlugin::new(test_engine());
        plugin.init(&mp3_format(44100, 2, 320_000)).unwrap();
        assert_eq!(plugin.input_buffer_size(), 2133);
        assert_eq!(plugin.output_buffer_size(), (44100 / 31 + 128) * 2 * 2);

        let mut plugin = Mp3DecoderPlugin::new(test_engine());
        let mut format = mp3_format(8000, 1, 0);
        format.remove(keys::BITRATE);
        plugin.init(&format).unwrap();
        assert_eq!(plugin.input_buffer_size(), 8192);
        assert_eq!(plugin.output_buffer_size(), 4608);
    }
}
