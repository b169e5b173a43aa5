//! 引擎编解码器注册表.
//!
//! 对标 `avcodec_find_decoder_by_name` / `avcodec_find_encoder_by_name`,
//! 按名称查找编解码器描述并创建实例.

use std::collections::HashMap;

use yin_core::{ChannelMask, SampleFormat};

use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::error::{EngineError, EngineResult};

/// 解码器工厂函数类型
pub type DecoderFactory = fn() -> EngineResult<Box<dyn Decoder>>;

/// 编码器工厂函数类型
pub type EncoderFactory = fn() -> EngineResult<Box<dyn Encoder>>;

/// 编解码器描述
///
/// 能力列表为空表示不限制.
#[derive(Debug, Clone, Copy)]
pub struct CodecDescriptor {
    /// 短名称 (查找键)
    pub name: &'static str,
    /// 描述
    pub long_name: &'static str,
    /// 支持的采样格式
    pub sample_formats: &'static [SampleFormat],
    /// 支持的采样率
    pub sample_rates: &'static [u32],
    /// 支持的声道布局
    pub channel_layouts: &'static [ChannelMask],
}

impl CodecDescriptor {
    pub fn supports_sample_format(&self, format: SampleFormat) -> bool {
        self.sample_formats.is_empty() || self.sample_formats.contains(&format)
    }

    pub fn supports_sample_rate(&self, rate: u32) -> bool {
        self.sample_rates.is_empty() || self.sample_rates.contains(&rate)
    }

    pub fn supports_channel_layout(&self, mask: ChannelMask) -> bool {
        self.channel_layouts.is_empty() || self.channel_layouts.contains(&mask)
    }
}

struct DecoderEntry {
    descriptor: CodecDescriptor,
    factory: DecoderFactory,
}

struct EncoderEntry {
    descriptor: CodecDescriptor,
    factory: EncoderFactory,
}

/// 引擎注册表
pub struct EngineRegistry {
    decoders: HashMap<&'static str, DecoderEntry>,
    encoders: HashMap<&'static str, EncoderEntry>,
}

impl EngineRegistry {
    /// 创建空的注册表
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
            encoders: HashMap::new(),
        }
    }

    /// 注册一个解码器, 同名时覆盖
    pub fn register_decoder(&mut self, descriptor: CodecDescriptor, factory: DecoderFactory) {
        self.decoders.insert(
            descriptor.name,
            DecoderEntry {
                descriptor,
                factory,
            },
        );
    }

    /// 注册一个编码器, 同名时覆盖
    pub fn register_encoder(&mut self, descriptor: CodecDescriptor, factory: EncoderFactory) {
        self.encoders.insert(
            descriptor.name,
            EncoderEntry {
                descriptor,
                factory,
            },
        );
    }

    /// 按名称查找解码器描述
    pub fn find_decoder(&self, name: &str) -> Option<&CodecDescriptor> {
        self.decoders.get(name).map(|entry| &entry.descriptor)
    }

    /// 按名称查找编码器描述
    pub fn find_encoder(&self, name: &str) -> Option<&CodecDescriptor> {
        self.encoders.get(name).map(|entry| &entry.descriptor)
    }

    /// 创建指定名称的解码器实例
    pub fn create_decoder(&self, name: &str) -> EngineResult<Box<dyn Decoder>> {
        let entry = self
            .decoders
            .get(name)
            .ok_or_else(|| EngineError::CodecNotFound(format!("未找到解码器 {name}")))?;
        (entry.factory)()
    }

    /// 创建指定名称的编码器实例
    pub fn create_encoder(&self, name: &str) -> EngineResult<Box<dyn Encoder>> {
        let entry = self
            .encoders
            .get(name)
            .ok_or_else(|| EngineError::CodecNotFound(format!("未找到编码器 {name}")))?;
        (entry.factory)()
    }

    /// 获取所有已注册的解码器名称 (按名称排序)
    pub fn list_decoders(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.decoders.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// 获取所有已注册的编码器名称 (按名称排序)
    pub fn list_encoders(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.encoders.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}
