//! 宿主枚举与引擎枚举的转换表.
//!
//! 全部为静态数组线性查找, 查不到时返回哨兵值.

use yin_core::timestamp::{NOPTS_VALUE, Timestamp};
use yin_core::{AudioChannelLayout, AudioSampleFormat, ChannelMask, Rational, SampleFormat};

/// 声道布局对照表: 宿主布局, 引擎掩码, 显示名称
const CHANNEL_LAYOUT_TABLE: [(AudioChannelLayout, ChannelMask, &str); 28] = [
    (AudioChannelLayout::Mono, ChannelMask::LAYOUT_MONO, "mono"),
    (AudioChannelLayout::Stereo, ChannelMask::LAYOUT_STEREO, "stereo"),
    (AudioChannelLayout::Ch2Point1, ChannelMask::LAYOUT_2POINT1, "2.1"),
    (AudioChannelLayout::Ch2_1, ChannelMask::LAYOUT_2_1, "3.0(back)"),
    (AudioChannelLayout::Surround, ChannelMask::LAYOUT_SURROUND, "3.0"),
    (AudioChannelLayout::Ch3Point1, ChannelMask::LAYOUT_3POINT1, "3.1"),
    (AudioChannelLayout::Ch4Point0, ChannelMask::LAYOUT_4POINT0, "4.0"),
    (AudioChannelLayout::Ch4Point1, ChannelMask::LAYOUT_4POINT1, "4.1"),
    (AudioChannelLayout::Ch2_2, ChannelMask::LAYOUT_2_2, "quad(side)"),
    (AudioChannelLayout::Quad, ChannelMask::LAYOUT_QUAD, "quad"),
    (AudioChannelLayout::Ch5Point0, ChannelMask::LAYOUT_5POINT0, "5.0(side)"),
    (AudioChannelLayout::Ch5Point1, ChannelMask::LAYOUT_5POINT1, "5.1(side)"),
    (AudioChannelLayout::Ch5Point0Back, ChannelMask::LAYOUT_5POINT0_BACK, "5.0"),
    (AudioChannelLayout::Ch5Point1Back, ChannelMask::LAYOUT_5POINT1_BACK, "5.1"),
    (AudioChannelLayout::Ch6Point0, ChannelMask::LAYOUT_6POINT0, "6.0"),
    (AudioChannelLayout::Ch6Point0Front, ChannelMask::LAYOUT_6POINT0_FRONT, "6.0(front)"),
    (AudioChannelLayout::Hexagonal, ChannelMask::LAYOUT_HEXAGONAL, "hexagonal"),
    (AudioChannelLayout::Ch6Point1, ChannelMask::LAYOUT_6POINT1, "6.1"),
    (AudioChannelLayout::Ch6Point1Back, ChannelMask::LAYOUT_6POINT1_BACK, "6.1(back)"),
    (AudioChannelLayout::Ch6Point1Front, ChannelMask::LAYOUT_6POINT1_FRONT, "6.1(front)"),
    (AudioChannelLayout::Ch7Point0, ChannelMask::LAYOUT_7POINT0, "7.0"),
    (AudioChannelLayout::Ch7Point0Front, ChannelMask::LAYOUT_7POINT0_FRONT, "7.0(front)"),
    (AudioChannelLayout::Ch7Point1, ChannelMask::LAYOUT_7POINT1, "7.1"),
    (AudioChannelLayout::Ch7Point1Wide, ChannelMask::LAYOUT_7POINT1_WIDE, "7.1(wide-side)"),
    (AudioChannelLayout::Ch7Point1WideBack, ChannelMask::LAYOUT_7POINT1_WIDE_BACK, "7.1(wide)"),
    (AudioChannelLayout::Octagonal, ChannelMask::LAYOUT_OCTAGONAL, "octagonal"),
    (AudioChannelLayout::Hexadecagonal, ChannelMask::LAYOUT_HEXADECAGONAL, "hexadecagonal"),
    (AudioChannelLayout::StereoDownmix, ChannelMask::LAYOUT_STEREO_DOWNMIX, "downmix"),
];

/// 采样格式对照表
const SAMPLE_FORMAT_TABLE: [(AudioSampleFormat, SampleFormat); 8] = [
    (AudioSampleFormat::U8, SampleFormat::U8),
    (AudioSampleFormat::S16Le, SampleFormat::S16),
    (AudioSampleFormat::S32Le, SampleFormat::S32),
    (AudioSampleFormat::F32Le, SampleFormat::F32),
    (AudioSampleFormat::U8p, SampleFormat::U8p),
    (AudioSampleFormat::S16p, SampleFormat::S16p),
    (AudioSampleFormat::S32p, SampleFormat::S32p),
    (AudioSampleFormat::F32p, SampleFormat::F32p),
];

/// 宿主布局转引擎掩码, 未知时返回空掩码
pub fn convert_channel_layout_to_engine(layout: AudioChannelLayout) -> ChannelMask {
    CHANNEL_LAYOUT_TABLE
        .iter()
        .find(|(host, _, _)| *host == layout)
        .map_or(ChannelMask::empty(), |(_, mask, _)| *mask)
}

/// 引擎掩码转宿主布局, 未知时返回 `Unknown`
pub fn convert_channel_layout_from_engine(mask: ChannelMask) -> AudioChannelLayout {
    CHANNEL_LAYOUT_TABLE
        .iter()
        .find(|(_, engine, _)| *engine == mask)
        .map_or(AudioChannelLayout::Unknown, |(host, _, _)| *host)
}

/// 宿主布局的显示名称, 未知时返回空字符串
pub fn channel_layout_name(layout: AudioChannelLayout) -> &'static str {
    CHANNEL_LAYOUT_TABLE
        .iter()
        .find(|(host, _, _)| *host == layout)
        .map_or("", |(_, _, name)| name)
}

/// 由显示名称查找宿主布局, 未知时返回 `Unknown`
pub fn channel_layout_from_name(name: &str) -> AudioChannelLayout {
    CHANNEL_LAYOUT_TABLE
        .iter()
        .find(|(_, _, n)| *n == name)
        .map_or(AudioChannelLayout::Unknown, |(host, _, _)| *host)
}

/// 宿主采样格式转引擎格式, 未知时返回 `SampleFormat::None`
pub fn convert_sample_format_to_engine(format: AudioSampleFormat) -> SampleFormat {
    SAMPLE_FORMAT_TABLE
        .iter()
        .find(|(host, _)| *host == format)
        .map_or(SampleFormat::None, |(_, engine)| *engine)
}

/// 引擎采样格式转宿主格式, 未知时返回 `InvalidWidth`
pub fn convert_sample_format_from_engine(format: SampleFormat) -> AudioSampleFormat {
    SAMPLE_FORMAT_TABLE
        .iter()
        .find(|(_, engine)| *engine == format)
        .map_or(AudioSampleFormat::InvalidWidth, |(host, _)| *host)
}

/// 以 `time_base` 为单位的时间戳转微秒
///
/// 时间戳或时间基无效时原样返回 `NOPTS_VALUE`.
pub fn convert_pts_to_us(pts: i64, time_base: Rational) -> i64 {
    if pts == NOPTS_VALUE {
        return NOPTS_VALUE;
    }
    Timestamp::new(pts, time_base).rescale(Rational::MICRO).pts
}
