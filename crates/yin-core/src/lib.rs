//! # yin-core
//!
//! Yin 音频编解码插件核心库, 提供错误码、格式描述、宿主与引擎两侧的音频枚举,
//! 以及时间戳换算、比特流写入和 CRC 等基础设施.

pub mod audio_format;
pub mod bitwriter;
pub mod channel_layout;
pub mod crc;
pub mod error;
pub mod format;
pub mod rational;
pub mod sample_format;
pub mod timestamp;

// 重导出常用类型
pub use audio_format::{AacProfile, AudioChannelLayout, AudioSampleFormat};
pub use channel_layout::{ChannelLayout, ChannelMask};
pub use error::{CodecError, CodecResult};
pub use format::{Format, FormatValue};
pub use rational::Rational;
pub use sample_format::SampleFormat;
pub use timestamp::Timestamp;
