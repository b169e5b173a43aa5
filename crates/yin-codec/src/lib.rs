//! # yin-codec
//!
//! Yin 音频编解码插件核心. 在 [`yin_engine`] 之上提供:
//!
//! - **共享缓冲**: [`SharedBuffer`] 与 [`CodecBufferInfo`]
//! - **编解码会话**: [`DecoderCore`] / [`EncoderCore`], 负责参数复制、时间戳换算和数据搬运
//! - **转换表**: 宿主与引擎之间的声道布局、采样格式映射
//! - **插件**: AAC / MP3 / FLAC / Vorbis 解码, AAC (ADTS) / FLAC 编码
//! - **适配器**: [`CodecAdapter`] 状态机与 [`BuffersManager`] 缓冲池
//!
//! ## 使用示例
//!
//! ```rust
//! use std::sync::Arc;
//! use yin_codec::PluginRegistry;
//! use yin_engine::EngineRegistry;
//!
//! let mut engine = EngineRegistry::new();
//! yin_engine::register_all(&mut engine);
//!
//! let mut plugins = PluginRegistry::new(Arc::new(engine));
//! yin_codec::register_all(&mut plugins);
//!
//! let codec = plugins.create("avdec_flac").unwrap();
//! assert_eq!(codec.codec_name(), "avdec_flac");
//! ```

pub mod adapter;
pub mod buffer_info;
pub mod buffers_manager;
pub mod codec;
pub mod converter;
pub mod decoder_core;
pub mod encoder_core;
pub mod plugins;
pub mod registry;
pub mod session;
pub mod shared_buffer;

// 重导出常用类型
pub use adapter::{CodecAdapter, CodecCallback, CodecState};
pub use buffer_info::{BufferAttr, BufferFlag, BufferStatus, CodecBufferInfo};
pub use buffers_manager::BuffersManager;
pub use codec::AudioCodec;
pub use decoder_core::DecoderCore;
pub use encoder_core::EncoderCore;
pub use registry::{PluginKind, PluginRegistry};
pub use session::SessionState;
pub use shared_buffer::{MemoryFlags, SharedBuffer};

use plugins::{
    AacDecoderPlugin, AacEncoderPlugin, FlacDecoderPlugin, FlacEncoderPlugin, Mp3DecoderPlugin,
    VorbisDecoderPlugin,
};

/// 注册所有内置插件
pub fn register_all(registry: &mut PluginRegistry) {
    registry.register(
        AacDecoderPlugin::NAME,
        PluginKind::Decoder,
        AacDecoderPlugin::create,
    );
    registry.register(
        Mp3DecoderPlugin::NAME,
        PluginKind::Decoder,
        Mp3DecoderPlugin::create,
    );
    registry.register(
        FlacDecoderPlugin::NAME,
        PluginKind::Decoder,
        FlacDecoderPlugin::create,
    );
    registry.register(
        VorbisDecoderPlugin::NAME,
        PluginKind::Decoder,
        VorbisDecoderPlugin::create,
    );
    registry.register(
        AacEncoderPlugin::NAME,
        PluginKind::Encoder,
        AacEncoderPlugin::create,
    );
    registry.register(
        FlacEncoderPlugin::NAME,
        PluginKind::Encoder,
        FlacEncoderPlugin::create,
    );
}
