//! # yin-engine
//!
//! Yin 原生音频编解码引擎, 对标 libavcodec 中音频部分的最小子集.
//!
//! 插件层只通过名称查找引擎实现, 再以 send/receive 模型驱动:
//!
//! - **解码器**: AAC, MP3, FLAC, Vorbis (基于 symphonia, 输出 S16p)
//! - **编码器**: AAC-LC (F32p 输入), FLAC (S16/S32 交错输入)
//!
//! ## 使用示例
//!
//! ```rust
//! use yin_engine::EngineRegistry;
//!
//! let mut reg = EngineRegistry::new();
//! yin_engine::register_all(&mut reg);
//!
//! let decoder = reg.create_decoder("flac").unwrap();
//! let encoder = reg.create_encoder("aac").unwrap();
//! assert_eq!(decoder.name(), "flac");
//! assert_eq!(encoder.name(), "aac");
//! ```

pub mod context;
pub mod decoder;
pub mod decoders;
pub mod encoder;
pub mod encoders;
pub mod error;
pub mod frame;
pub mod packet;
pub mod registry;

pub use context::CodecContext;
pub use decoder::Decoder;
pub use encoder::Encoder;
pub use error::{EngineError, EngineResult};
pub use frame::AudioFrame;
pub use packet::Packet;
pub use registry::{CodecDescriptor, EngineRegistry};

/// 注册所有内置编解码器
pub fn register_all(registry: &mut EngineRegistry) {
    decoders::register_all_decoders(registry);
    encoders::register_all_encoders(registry);
}
