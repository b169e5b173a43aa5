//! 引擎侧声道布局定义.
//!
//! 对标 FFmpeg 的 `AV_CH_*` / `AV_CH_LAYOUT_*`.

use bitflags::bitflags;
use std::fmt;

bitflags! {
    /// 声道位掩码, 每个位代表一个扬声器位置
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ChannelMask: u64 {
        /// 前方左声道
        const FRONT_LEFT            = 1 << 0;
        /// 前方右声道
        const FRONT_RIGHT           = 1 << 1;
        /// 前方中央声道
        const FRONT_CENTER          = 1 << 2;
        /// 低频效果 (LFE / 重低音)
        const LOW_FREQUENCY         = 1 << 3;
        /// 后方左声道
        const BACK_LEFT             = 1 << 4;
        /// 后方右声道
        const BACK_RIGHT            = 1 << 5;
        /// 前方中左声道
        const FRONT_LEFT_OF_CENTER  = 1 << 6;
        /// 前方中右声道
        const FRONT_RIGHT_OF_CENTER = 1 << 7;
        /// 后方中央声道
        const BACK_CENTER           = 1 << 8;
        /// 侧方左声道
        const SIDE_LEFT             = 1 << 9;
        /// 侧方右声道
        const SIDE_RIGHT            = 1 << 10;
        /// 顶部中央
        const TOP_CENTER            = 1 << 11;
        /// 顶部前左
        const TOP_FRONT_LEFT        = 1 << 12;
        /// 顶部前中
        const TOP_FRONT_CENTER      = 1 << 13;
        /// 顶部前右
        const TOP_FRONT_RIGHT       = 1 << 14;
        /// 顶部后左
        const TOP_BACK_LEFT         = 1 << 15;
        /// 顶部后中
        const TOP_BACK_CENTER       = 1 << 16;
        /// 顶部后右
        const TOP_BACK_RIGHT        = 1 << 17;
        /// 下混左声道
        const STEREO_LEFT           = 1 << 29;
        /// 下混右声道
        const STEREO_RIGHT          = 1 << 30;
        /// 宽左声道
        const WIDE_LEFT             = 1 << 31;
        /// 宽右声道
        const WIDE_RIGHT            = 1 << 32;
    }
}

impl ChannelMask {
    pub const LAYOUT_MONO: Self = Self::FRONT_CENTER;
    pub const LAYOUT_STEREO: Self = Self::FRONT_LEFT.union(Self::FRONT_RIGHT);
    pub const LAYOUT_2POINT1: Self = Self::LAYOUT_STEREO.union(Self::LOW_FREQUENCY);
    pub const LAYOUT_2_1: Self = Self::LAYOUT_STEREO.union(Self::BACK_CENTER);
    pub const LAYOUT_SURROUND: Self = Self::LAYOUT_STEREO.union(Self::FRONT_CENTER);
    pub const LAYOUT_3POINT1: Self = Self::LAYOUT_SURROUND.union(Self::LOW_FREQUENCY);
    pub const LAYOUT_4POINT0: Self = Self::LAYOUT_SURROUND.union(Self::BACK_CENTER);
    pub const LAYOUT_4POINT1: Self = Self::LAYOUT_4POINT0.union(Self::LOW_FREQUENCY);
    pub const LAYOUT_2_2: Self = Self::LAYOUT_STEREO
        .union(Self::SIDE_LEFT)
        .union(Self::SIDE_RIGHT);
    pub const LAYOUT_QUAD: Self = Self::LAYOUT_STEREO
        .union(Self::BACK_LEFT)
        .union(Self::BACK_RIGHT);
    pub const LAYOUT_5POINT0: Self = Self::LAYOUT_SURROUND
        .union(Self::SIDE_LEFT)
        .union(Self::SIDE_RIGHT);
    pub const LAYOUT_5POINT1: Self = Self::LAYOUT_5POINT0.union(Self::LOW_FREQUENCY);
    pub const LAYOUT_5POINT0_BACK: Self = Self::LAYOUT_SURROUND
        .union(Self::BACK_LEFT)
        .union(Self::BACK_RIGHT);
    pub const LAYOUT_5POINT1_BACK: Self = Self::LAYOUT_5POINT0_BACK.union(Self::LOW_FREQUENCY);
    pub const LAYOUT_6POINT0: Self = Self::LAYOUT_5POINT0.union(Self::BACK_CENTER);
    pub const LAYOUT_6POINT0_FRONT: Self = Self::LAYOUT_2_2
        .union(Self::FRONT_LEFT_OF_CENTER)
        .union(Self::FRONT_RIGHT_OF_CENTER);
    pub const LAYOUT_HEXAGONAL: Self = Self::LAYOUT_5POINT0_BACK.union(Self::BACK_CENTER);
    pub const LAYOUT_6POINT1: Self = Self::LAYOUT_5POINT1.union(Self::BACK_CENTER);
    pub const LAYOUT_6POINT1_BACK: Self = Self::LAYOUT_5POINT1_BACK.union(Self::BACK_CENTER);
    pub const LAYOUT_6POINT1_FRONT: Self = Self::LAYOUT_6POINT0_FRONT.union(Self::LOW_FREQUENCY);
    pub const LAYOUT_7POINT0: Self = Self::LAYOUT_5POINT0
        .union(Self::BACK_LEFT)
        .union(Self::BACK_RIGHT);
    pub const LAYOUT_7POINT0_FRONT: Self = Self::LAYOUT_5POINT0
        .union(Self::FRONT_LEFT_OF_CENTER)
        .union(Self::FRONT_RIGHT_OF_CENTER);
    pub const LAYOUT_7POINT1: Self = Self::LAYOUT_5POINT1
        .union(Self::BACK_LEFT)
        .union(Self::BACK_RIGHT);
    pub const LAYOUT_7POINT1_WIDE: Self = Self::LAYOUT_5POINT1
        .union(Self::FRONT_LEFT_OF_CENTER)
        .union(Self::FRONT_RIGHT_OF_CENTER);
    pub const LAYOUT_7POINT1_WIDE_BACK: Self = Self::LAYOUT_5POINT1_BACK
        .union(Self::FRONT_LEFT_OF_CENTER)
        .union(Self::FRONT_RIGHT_OF_CENTER);
    pub const LAYOUT_OCTAGONAL: Self = Self::LAYOUT_5POINT0
        .union(Self::BACK_LEFT)
        .union(Self::BACK_CENTER)
        .union(Self::BACK_RIGHT);
    pub const LAYOUT_HEXADECAGONAL: Self = Self::LAYOUT_OCTAGONAL
        .union(Self::WIDE_LEFT)
        .union(Self::WIDE_RIGHT)
        .union(Self::TOP_BACK_LEFT)
        .union(Self::TOP_BACK_RIGHT)
        .union(Self::TOP_BACK_CENTER)
        .union(Self::TOP_FRONT_CENTER)
        .union(Self::TOP_FRONT_LEFT)
        .union(Self::TOP_FRONT_RIGHT);
    pub const LAYOUT_STEREO_DOWNMIX: Self = Self::STEREO_LEFT.union(Self::STEREO_RIGHT);
}

/// 声道布局
///
/// 描述音频流中声道的数量和排列方式. 掩码为空表示仅知道声道数.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelLayout {
    /// 声道数量
    pub channels: u32,
    /// 声道位掩码
    pub mask: ChannelMask,
}

impl ChannelLayout {
    /// 单声道
    pub const MONO: Self = Self::from_mask(ChannelMask::LAYOUT_MONO);

    /// 立体声 (左右)
    pub const STEREO: Self = Self::from_mask(ChannelMask::LAYOUT_STEREO);

    /// 由位掩码创建, 声道数取置位个数
    pub const fn from_mask(mask: ChannelMask) -> Self {
        Self {
            channels: mask.bits().count_ones(),
            mask,
        }
    }

    /// 根据声道数创建默认布局
    pub fn from_channels(channels: u32) -> Self {
        let mask = match channels {
            1 => ChannelMask::LAYOUT_MONO,
            2 => ChannelMask::LAYOUT_STEREO,
            3 => ChannelMask::LAYOUT_SURROUND,
            4 => ChannelMask::LAYOUT_4POINT0,
            5 => ChannelMask::LAYOUT_5POINT0_BACK,
            6 => ChannelMask::LAYOUT_5POINT1_BACK,
            7 => ChannelMask::LAYOUT_6POINT1,
            8 => ChannelMask::LAYOUT_7POINT1,
            n => {
                return Self {
                    channels: n,
                    mask: ChannelMask::empty(),
                };
            }
        };
        Self::from_mask(mask)
    }
}

impl fmt::Display for ChannelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::MONO => write!(f, "mono"),
            Self::STEREO => write!(f, "stereo"),
            _ => write!(f, "{}ch(0x{:x})", self.channels, self.mask.bits()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_布局声道数() {
        assert_eq!(ChannelLayout::from_mask(ChannelMask::LAYOUT_5POINT1).channels, 6);
        assert_eq!(ChannelLayout::from_mask(ChannelMask::LAYOUT_7POINT1).channels, 8);
        assert_eq!(
            ChannelLayout::from_mask(ChannelMask::LAYOUT_HEXADECAGONAL).channels,
            16
        );
    }

    #[test]
    fn test_from_channels_defaults() {
        assert_eq!(ChannelLayout::from_channels(2), ChannelLayout::STEREO);
        assert_eq!(
            ChannelLayout::from_channels(6).mask,
            ChannelMask::LAYOUT_5POINT1_BACK
        );
        let unusual = ChannelLayout::from_channels(11);
        assert_eq!(unusual.channels, 11);
        assert!(unusual.mask.is_empty());
    }
}
