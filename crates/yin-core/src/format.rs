//! 媒体格式描述 (Format).
//!
//! 外部传入的键值配置对象, 初始化时读取, 并作为协商后的输出格式回传.
//! 取值接口按类型区分, 类型不匹配视为键不存在.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// 常用键名
pub mod keys {
    /// 声道数 (int)
    pub const CHANNEL_COUNT: &str = "channel_count";
    /// 采样率 (int)
    pub const SAMPLE_RATE: &str = "sample_rate";
    /// 码率 (long)
    pub const BITRATE: &str = "bitrate";
    /// 最大输入缓冲大小 (int)
    pub const MAX_INPUT_SIZE: &str = "max_input_size";
    /// 编解码器私有数据, 如 AudioSpecificConfig / STREAMINFO (buffer)
    pub const CODEC_CONFIG: &str = "codec_config";
    /// 宿主采样格式 (int, 取值见 `AudioSampleFormat`)
    pub const AUDIO_SAMPLE_FORMAT: &str = "audio_sample_format";
    /// 宿主声道布局 (long, 取值见 `AudioChannelLayout`)
    pub const CHANNEL_LAYOUT: &str = "channel_layout";
    /// 每个编码采样的位数 (int)
    pub const BITS_PER_CODED_SAMPLE: &str = "bits_per_coded_sample";
    /// FLAC 编码兼容级别 (int)
    pub const COMPLIANCE_LEVEL: &str = "compliance_level";
    /// AAC 输入是否为 ADTS 封装 (int, 1=ADTS, 0=LATM)
    pub const AAC_IS_ADTS: &str = "aac_is_adts";
    /// AAC profile (int, 取值见 `AacProfile`)
    pub const AAC_PROFILE: &str = "aac_profile";
    /// MIME 类型 (string)
    pub const CODEC_MIME: &str = "codec_mime";
    /// 编解码插件名称 (string)
    pub const CODEC_NAME: &str = "codec_name";
}

/// 格式值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FormatValue {
    /// 32 位整数
    Int(i32),
    /// 64 位整数
    Long(i64),
    /// 单精度浮点
    Float(f32),
    /// 双精度浮点
    Double(f64),
    /// 字符串
    String(String),
    /// 二进制数据
    Buffer(Vec<u8>),
}

/// 媒体格式键值表
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Format {
    entries: BTreeMap<String, FormatValue>,
}

impl Format {
    /// 创建空格式
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_int(&mut self, key: &str, value: i32) -> &mut Self {
        self.put(key, FormatValue::Int(value))
    }

    pub fn put_long(&mut self, key: &str, value: i64) -> &mut Self {
        self.put(key, FormatValue::Long(value))
    }

    pub fn put_float(&mut self, key: &str, value: f32) -> &mut Self {
        self.put(key, FormatValue::Float(value))
    }

    pub fn put_double(&mut self, key: &str, value: f64) -> &mut Self {
        self.put(key, FormatValue::Double(value))
    }

    pub fn put_string(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.put(key, FormatValue::String(value.into()))
    }

    pub fn put_buffer(&mut self, key: &str, value: impl Into<Vec<u8>>) -> &mut Self {
        self.put(key, FormatValue::Buffer(value.into()))
    }

    fn put(&mut self, key: &str, value: FormatValue) -> &mut Self {
        self.entries.insert(key.to_string(), value);
        self
    }

    pub fn get_int(&self, key: &str) -> Option<i32> {
        match self.entries.get(key) {
            Some(FormatValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_long(&self, key: &str) -> Option<i64> {
        match self.entries.get(key) {
            Some(FormatValue::Long(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_float(&self, key: &str) -> Option<f32> {
        match self.entries.get(key) {
            Some(FormatValue::Float(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_double(&self, key: &str) -> Option<f64> {
        match self.entries.get(key) {
            Some(FormatValue::Double(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        match self.entries.get(key) {
            Some(FormatValue::String(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn get_buffer(&self, key: &str) -> Option<&[u8]> {
        match self.entries.get(key) {
            Some(FormatValue::Buffer(v)) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// 是否包含指定键 (不区分类型)
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<FormatValue> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按键名顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FormatValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, value) in &self.entries {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            match value {
                FormatValue::Int(v) => write!(f, "{key}={v}")?,
                FormatValue::Long(v) => write!(f, "{key}={v}")?,
                FormatValue::Float(v) => write!(f, "{key}={v}")?,
                FormatValue::Double(v) => write!(f, "{key}={v}")?,
                FormatValue::String(v) => write!(f, "{key}={v}")?,
                FormatValue::Buffer(v) => write!(f, "{key}=<{} bytes>", v.len())?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_getters() {
        let mut format = Format::new();
        format
            .put_int(keys::SAMPLE_RATE, 44100)
            .put_long(keys::BITRATE, 128_000)
            .put_string(keys::CODEC_MIME, "audio/flac")
            .put_buffer(keys::CODEC_CONFIG, vec![0x12, 0x10]);

        assert_eq!(format.get_int(keys::SAMPLE_RATE), Some(44100));
        assert_eq!(format.get_long(keys::BITRATE), Some(128_000));
        assert_eq!(format.get_string(keys::CODEC_MIME), Some("audio/flac"));
        assert_eq!(format.get_buffer(keys::CODEC_CONFIG), Some(&[0x12, 0x10][..]));
        assert_eq!(format.len(), 4);
    }

    #[test]
    fn test_类型不匹配视为不存在() {
        let mut format = Format::new();
        format.put_int(keys::BITRATE, 128_000);
        assert_eq!(format.get_long(keys::BITRATE), None);
        assert!(format.contains_key(keys::BITRATE));
        assert_eq!(format.get_int(keys::CHANNEL_COUNT), None);
    }

    #[test]
    fn test_json_序列化往返() {
        let mut format = Format::new();
        format
            .put_int(keys::CHANNEL_COUNT, 2)
            .put_buffer(keys::CODEC_CONFIG, vec![1, 2, 3]);
        let json = serde_json::to_string(&format).expect("序列化失败");
        let parsed: Format = serde_json::from_str(&json).expect("反序列化失败");
        assert_eq!(parsed, format);
    }

    #[test]
    fn test_display_隐藏二进制内容() {
        let mut format = Format::new();
        format
            .put_int(keys::CHANNEL_COUNT, 2)
            .put_buffer(keys::CODEC_CONFIG, vec![0; 34]);
        assert_eq!(
            format.to_string(),
            "channel_count=2, codec_config=<34 bytes>"
        );
    }
}
