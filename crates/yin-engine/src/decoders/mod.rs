//! 解码器实现.
//!
//! 所有解码器输出平面 S16 (`S16p`) 音频帧.

pub mod adts;
pub mod backend;
pub mod mpa;

use yin_core::SampleFormat;
use yin_core::audio_format::AAC_SAMPLE_RATES;

use crate::registry::{CodecDescriptor, EngineRegistry};

pub use backend::SymphoniaDecoder;

const S16P_ONLY: &[SampleFormat] = &[SampleFormat::S16p];

const MP3_SAMPLE_RATES: &[u32] = &[
    44100, 48000, 32000, 22050, 24000, 16000, 11025, 12000, 8000,
];

pub const AAC_DECODER: CodecDescriptor = CodecDescriptor {
    name: "aac",
    long_name: "AAC (Advanced Audio Coding)",
    sample_formats: S16P_ONLY,
    sample_rates: &AAC_SAMPLE_RATES,
    channel_layouts: &[],
};

pub const MP3_DECODER: CodecDescriptor = CodecDescriptor {
    name: "mp3",
    long_name: "MP3 (MPEG audio layer 3)",
    sample_formats: S16P_ONLY,
    sample_rates: MP3_SAMPLE_RATES,
    channel_layouts: &[],
};

pub const FLAC_DECODER: CodecDescriptor = CodecDescriptor {
    name: "flac",
    long_name: "FLAC (Free Lossless Audio Codec)",
    sample_formats: S16P_ONLY,
    sample_rates: &[],
    channel_layouts: &[],
};

pub const VORBIS_DECODER: CodecDescriptor = CodecDescriptor {
    name: "vorbis",
    long_name: "Vorbis",
    sample_formats: S16P_ONLY,
    sample_rates: &[],
    channel_layouts: &[],
};

/// 注册所有内置解码器
pub fn register_all_decoders(registry: &mut EngineRegistry) {
    registry.register_decoder(AAC_DECODER, SymphoniaDecoder::create_aac);
    registry.register_decoder(MP3_DECODER, SymphoniaDecoder::create_mp3);
    registry.register_decoder(FLAC_DECODER, SymphoniaDecoder::create_flac);
    registry.register_decoder(VORBIS_DECODER, SymphoniaDecoder::create_vorbis);
}
