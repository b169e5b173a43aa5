//! 插件注册表.
//!
//! 按插件名 (如 `avdec_aac`) 查找工厂并创建 [`AudioCodec`] 实例.
//! 注册表在启动时构建一次, 之后以引用传递.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::error;
use yin_core::{CodecError, CodecResult};
use yin_engine::EngineRegistry;

use crate::codec::AudioCodec;

/// 插件工厂函数类型
pub type PluginFactory = fn(Arc<EngineRegistry>) -> Box<dyn AudioCodec>;

/// 插件类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginKind {
    Decoder,
    Encoder,
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decoder => write!(f, "decoder"),
            Self::Encoder => write!(f, "encoder"),
        }
    }
}

struct PluginEntry {
    kind: PluginKind,
    factory: PluginFactory,
}

/// 插件注册表
pub struct PluginRegistry {
    engine: Arc<EngineRegistry>,
    plugins: HashMap<&'static str, PluginEntry>,
}

impl PluginRegistry {
    /// 创建空的注册表, 插件实例共享给定的引擎
    pub fn new(engine: Arc<EngineRegistry>) -> Self {
        Self {
            engine,
            plugins: HashMap::new(),
        }
    }

    /// 注册一个插件, 同名时覆盖
    pub fn register(&mut self, name: &'static str, kind: PluginKind, factory: PluginFactory) {
        self.plugins.insert(name, PluginEntry { kind, factory });
    }

    /// 创建指定名称的插件实例
    pub fn create(&self, name: &str) -> CodecResult<Box<dyn AudioCodec>> {
        let entry = self.plugins.get(name).ok_or_else(|| {
            error!("未注册的插件 {name}");
            CodecError::UnsupportProtocolType
        })?;
        Ok((entry.factory)(Arc::clone(&self.engine)))
    }

    /// 查询插件类别
    pub fn kind(&self, name: &str) -> Option<PluginKind> {
        self.plugins.get(name).map(|entry| entry.kind)
    }

    /// 获取所有已注册的插件名称 (按名称排序)
    pub fn list(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.plugins.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// 获取某一类别的插件名称 (按名称排序)
    pub fn list_by_kind(&self, kind: PluginKind) -> Vec<&'static str> {
        let mut names: Vec<_> = self
            .plugins
            .iter()
            .filter(|(_, entry)| entry.kind == kind)
            .map(|(name, _)| *name)
            .collect();
        names.sort_unstable();
        names
    }

    /// 插件共享的引擎注册表
    pub fn engine(&self) -> &Arc<EngineRegistry> {
        &self.engine
    }
}
