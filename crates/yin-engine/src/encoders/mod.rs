//! 编码器实现.

pub mod aac;
pub mod flac;

use yin_core::audio_format::AAC_SAMPLE_RATES;
use yin_core::{ChannelMask, SampleFormat};

use crate::registry::{CodecDescriptor, EngineRegistry};

pub use aac::AacEncoder;
pub use flac::FlacEncoder;

pub const AAC_ENCODER: CodecDescriptor = CodecDescriptor {
    name: "aac",
    long_name: "AAC (Advanced Audio Coding) LC",
    sample_formats: &[SampleFormat::F32p],
    sample_rates: &AAC_SAMPLE_RATES,
    channel_layouts: &[
        ChannelMask::LAYOUT_MONO,
        ChannelMask::LAYOUT_STEREO,
        ChannelMask::LAYOUT_SURROUND,
        ChannelMask::LAYOUT_4POINT0,
        ChannelMask::LAYOUT_5POINT0_BACK,
        ChannelMask::LAYOUT_5POINT1_BACK,
    ],
};

pub const FLAC_ENCODER: CodecDescriptor = CodecDescriptor {
    name: "flac",
    long_name: "FLAC (Free Lossless Audio Codec)",
    sample_formats: &[SampleFormat::S16, SampleFormat::S32],
    sample_rates: &[],
    channel_layouts: &[],
};

/// 注册所有内置编码器
pub fn register_all_encoders(registry: &mut EngineRegistry) {
    registry.register_encoder(AAC_ENCODER, AacEncoder::create);
    registry.register_encoder(FLAC_ENCODER, FlacEncoder::create);
}
