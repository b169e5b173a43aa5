//! # Yin (音)
//!
//! 纯 Rust 实现的音频编解码插件框架.
//!
//! 插件层向宿主暴露统一的缓冲与错误码模型, 引擎层提供实际的编解码实现:
//! - **解码**: AAC (ADTS / LATM), MP3, FLAC, Vorbis
//! - **编码**: AAC-LC (ADTS 封装), FLAC
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use yin::codec::CodecAdapter;
//!
//! let plugins = yin::default_plugin_registry();
//! let adapter = CodecAdapter::new("avenc_flac", &plugins).unwrap();
//! println!("{} -> {}", adapter.name(), adapter.state());
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `yin-core` | 错误码、格式描述、音频枚举与工具 |
//! | `yin-engine` | 原生编解码引擎 |
//! | `yin-codec` | 插件核心: 共享缓冲、会话、转换表、插件、适配器 |

use std::sync::Arc;

pub mod logging;

/// 核心类型与工具
pub use yin_core as core;

/// 编解码引擎
pub use yin_engine as engine;

/// 插件核心
pub use yin_codec as codec;

/// 获取 Yin 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// 创建已注册所有内置引擎实现的注册表
pub fn default_engine_registry() -> yin_engine::EngineRegistry {
    let mut registry = yin_engine::EngineRegistry::new();
    yin_engine::register_all(&mut registry);
    registry
}

/// 创建已注册所有内置插件的注册表
pub fn default_plugin_registry() -> yin_codec::PluginRegistry {
    let mut registry = yin_codec::PluginRegistry::new(Arc::new(default_engine_registry()));
    yin_codec::register_all(&mut registry);
    registry
}
