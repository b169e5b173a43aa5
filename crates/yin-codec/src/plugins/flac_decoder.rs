//! FLAC 解码插件 (`avdec_flac`).
//!
//! 客户端未提供 `codec_config` 时按格式参数合成一个 STREAMINFO.

use std::sync::Arc;

use log::{debug, error};
use yin_core::bitwriter::BitWriter;
use yin_core::format::keys;
use yin_core::{CodecError, CodecResult, Format};
use yin_engine::EngineRegistry;

use super::{FLAC_SAMPLE_RATES, MAX_CHANNELS, required_int};
use crate::codec::AudioCodec;
use crate::decoder_core::DecoderCore;

/// 支持的采样位深
const SAMPLE_SIZES: [i32; 6] = [8, 12, 16, 20, 24, 32];
const BUFFER_SIZE: usize = 65536;
const MIN_BLOCK_SIZE: u32 = 16;
const MAX_BLOCK_SIZE: u32 = 65535;

/// FLAC 解码插件
pub struct FlacDecoderPlugin {
    core: DecoderCore,
}

impl FlacDecoderPlugin {
    pub const NAME: &'static str = "avdec_flac";

    pub fn new(engine: Arc<EngineRegistry>) -> Self {
        Self {
            core: DecoderCore::new(engine),
        }
    }

    pub fn create(engine: Arc<EngineRegistry>) -> Box<dyn AudioCodec> {
        Box::new(Self::new(engine))
    }

    /// 校验参数, 返回 (采样率, 声道数, 位深)
    fn check_format(format: &Format) -> CodecResult<(i32, i32, i32)> {
        let sample_rate = required_int(format, keys::SAMPLE_RATE, CodecError::MismatchSampleRate)?;
        if !FLAC_SAMPLE_RATES.contains(&sample_rate) {
            error!("avdec_flac: 不支持的采样率 {sample_rate}");
            return Err(CodecError::MismatchSampleRate);
        }
        let channels = required_int(
            format,
            keys::CHANNEL_COUNT,
            CodecError::ConfigureMismatchChannelCount,
        )?;
        if !(1..=MAX_CHANNELS).contains(&channels) {
            error!("avdec_flac: 不支持的声道数 {channels}");
            return Err(CodecError::ConfigureMismatchChannelCount);
        }
        let bits = required_int(
            format,
            keys::BITS_PER_CODED_SAMPLE,
            CodecError::MismatchBitRate,
        )?;
        if !SAMPLE_SIZES.contains(&bits) {
            error!("avdec_flac: 不支持的位深 {bits}");
            return Err(CodecError::MismatchBitRate);
        }
        Ok((sample_rate, channels, bits))
    }
}

/// 合成 STREAMINFO (34 字节): 块大小取 16..=65535, 帧大小、总采样数和 MD5 未知
pub fn synthesize_stream_info(sample_rate: u32, channels: u32, bits_per_sample: u32) -> Vec<u8> {
    let mut bw = BitWriter::with_capacity(34);
    bw.write_bits(MIN_BLOCK_SIZE, 16);
    bw.write_bits(MAX_BLOCK_SIZE, 16);
    bw.write_bits(0, 24);
    bw.write_bits(0, 24);
    bw.write_bits(sample_rate, 20);
    bw.write_bits(channels - 1, 3);
    bw.write_bits(bits_per_sample - 1, 5);
    bw.write_bits_u64(0, 36);
    bw.write_bytes(&[0u8; 16]);
    bw.finish()
}

impl AudioCodec for FlacDecoderPlugin {
    fn codec_name(&self) -> &str {
        Self::NAME
    }

    fn init(&mut self, format: &Format) -> CodecResult<()> {
        let (sample_rate, channels, bits) = Self::check_format(format)?;

        let mut format = format.clone();
        if format.get_buffer(keys::CODEC_CONFIG).is_none_or(<[u8]>::is_empty) {
            debug!("avdec_flac: 未提供 STREAMINFO, 按格式参数合成");
            format.put_buffer(
                keys::CODEC_CONFIG,
                synthesize_stream_info(sample_rate as u32, channels as u32, bits as u32),
            );
        }

        self.core.allocate_context("flac")?;
        self.core.init_context(&format)?;
        self.core.open_context()
    }

    delegate_to_core!();

    fn input_buffer_size(&self) -> usize {
        BUFFER_SIZE
    }

    fn output_buffer_size(&self) -> usize {
        BUFFER_SIZE
    }

    fn format(&self) -> Format {
        self.core.format()
    }
}
