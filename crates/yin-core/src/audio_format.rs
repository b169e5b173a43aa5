//! 宿主侧音频枚举.
//!
//! 客户端通过 `Format` 传入的采样格式、声道布局和 AAC profile 取值.
//! 与引擎侧的 `SampleFormat` / `ChannelMask` 通过转换表互相映射.

use std::fmt;

/// 宿主采样格式
///
/// 原始取值与客户端约定一致, 未知取值映射为 `InvalidWidth`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioSampleFormat {
    U8,
    S16Le,
    S24Le,
    S32Le,
    F32Le,
    U8p,
    S16p,
    S24p,
    S32p,
    F32p,
    /// 无效位宽 (哨兵值)
    InvalidWidth,
}

impl AudioSampleFormat {
    /// 从原始整数取值解析
    pub const fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::U8,
            1 => Self::S16Le,
            2 => Self::S24Le,
            3 => Self::S32Le,
            4 => Self::F32Le,
            5 => Self::U8p,
            6 => Self::S16p,
            7 => Self::S24p,
            8 => Self::S32p,
            9 => Self::F32p,
            _ => Self::InvalidWidth,
        }
    }

    /// 原始整数取值
    pub const fn as_raw(&self) -> i32 {
        match self {
            Self::U8 => 0,
            Self::S16Le => 1,
            Self::S24Le => 2,
            Self::S32Le => 3,
            Self::F32Le => 4,
            Self::U8p => 5,
            Self::S16p => 6,
            Self::S24p => 7,
            Self::S32p => 8,
            Self::F32p => 9,
            Self::InvalidWidth => -1,
        }
    }
}

/// 宿主声道布局
///
/// 原始取值为扬声器位掩码, 与引擎位定义相同.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioChannelLayout {
    Mono,
    Stereo,
    Ch2Point1,
    Ch2_1,
    Surround,
    Ch3Point1,
    Ch4Point0,
    Ch4Point1,
    Ch2_2,
    Quad,
    Ch5Point0,
    Ch5Point1,
    Ch5Point0Back,
    Ch5Point1Back,
    Ch6Point0,
    Ch6Point0Front,
    Hexagonal,
    Ch6Point1,
    Ch6Point1Back,
    Ch6Point1Front,
    Ch7Point0,
    Ch7Point0Front,
    Ch7Point1,
    Ch7Point1Wide,
    Ch7Point1WideBack,
    Octagonal,
    Hexadecagonal,
    StereoDownmix,
    /// 未知布局 (哨兵值)
    Unknown,
}

impl AudioChannelLayout {
    /// 全部已知布局
    pub const ALL: [Self; 28] = [
        Self::Mono,
        Self::Stereo,
        Self::Ch2Point1,
        Self::Ch2_1,
        Self::Surround,
        Self::Ch3Point1,
        Self::Ch4Point0,
        Self::Ch4Point1,
        Self::Ch2_2,
        Self::Quad,
        Self::Ch5Point0,
        Self::Ch5Point1,
        Self::Ch5Point0Back,
        Self::Ch5Point1Back,
        Self::Ch6Point0,
        Self::Ch6Point0Front,
        Self::Hexagonal,
        Self::Ch6Point1,
        Self::Ch6Point1Back,
        Self::Ch6Point1Front,
        Self::Ch7Point0,
        Self::Ch7Point0Front,
        Self::Ch7Point1,
        Self::Ch7Point1Wide,
        Self::Ch7Point1WideBack,
        Self::Octagonal,
        Self::Hexadecagonal,
        Self::StereoDownmix,
    ];

    /// 原始掩码取值, `Unknown` 为 0
    pub const fn as_raw(&self) -> i64 {
        match self {
            Self::Mono => 0x4,
            Self::Stereo => 0x3,
            Self::Ch2Point1 => 0xB,
            Self::Ch2_1 => 0x103,
            Self::Surround => 0x7,
            Self::Ch3Point1 => 0xF,
            Self::Ch4Point0 => 0x107,
            Self::Ch4Point1 => 0x10F,
            Self::Ch2_2 => 0x603,
            Self::Quad => 0x33,
            Self::Ch5Point0 => 0x607,
            Self::Ch5Point1 => 0x60F,
            Self::Ch5Point0Back => 0x37,
            Self::Ch5Point1Back => 0x3F,
            Self::Ch6Point0 => 0x707,
            Self::Ch6Point0Front => 0x6C3,
            Self::Hexagonal => 0x137,
            Self::Ch6Point1 => 0x70F,
            Self::Ch6Point1Back => 0x13F,
            Self::Ch6Point1Front => 0x6CB,
            Self::Ch7Point0 => 0x637,
            Self::Ch7Point0Front => 0x6C7,
            Self::Ch7Point1 => 0x63F,
            Self::Ch7Point1Wide => 0x6CF,
            Self::Ch7Point1WideBack => 0xFF,
            Self::Octagonal => 0x737,
            Self::Hexadecagonal => 0x1_8003_F737,
            Self::StereoDownmix => 0x6000_0000,
            Self::Unknown => 0,
        }
    }

    /// 从原始掩码取值解析
    pub fn from_raw(raw: i64) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|layout| layout.as_raw() == raw)
            .unwrap_or(Self::Unknown)
    }

    /// 声道数
    pub const fn channels(&self) -> u32 {
        (self.as_raw() as u64).count_ones()
    }
}

impl fmt::Display for AudioChannelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// AAC profile (宿主取值)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AacProfile {
    Lc,
    Eld,
    Erlc,
    He,
    HeV2,
    Ld,
    Main,
}

impl AacProfile {
    pub const fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Lc),
            1 => Some(Self::Eld),
            2 => Some(Self::Erlc),
            3 => Some(Self::He),
            4 => Some(Self::HeV2),
            5 => Some(Self::Ld),
            6 => Some(Self::Main),
            _ => None,
        }
    }

    /// ADTS 头中的 2 位 profile 字段 (object type - 1), 非 ADTS 可表达的 profile 返回 None
    pub const fn adts_profile(&self) -> Option<u8> {
        match self {
            Self::Main => Some(0),
            Self::Lc | Self::He | Self::HeV2 => Some(1),
            _ => None,
        }
    }
}

/// AAC 采样率表, 下标即 ADTS / AudioSpecificConfig 的采样率索引
pub const AAC_SAMPLE_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

/// 查找 AAC 采样率索引
pub fn aac_sample_rate_index(sample_rate: u32) -> Option<u8> {
    AAC_SAMPLE_RATES
        .iter()
        .position(|&rate| rate == sample_rate)
        .map(|idx| idx as u8)
}
