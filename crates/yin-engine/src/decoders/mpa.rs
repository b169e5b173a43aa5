//! MPEG 音频 (Layer III) 帧头解析与分帧.

use crate::error::{EngineError, EngineResult};

/// MPEG 版本
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    Mpeg1,
    Mpeg2,
    Mpeg25,
}

/// 声道模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    Stereo,
    JointStereo,
    DualChannel,
    SingleChannel,
}

/// MPEG 音频帧头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MpaHeader {
    pub version: MpegVersion,
    pub has_crc: bool,
    /// 码率 (bps)
    pub bitrate: u32,
    pub sample_rate: u32,
    pub padding: bool,
    pub mode: ChannelMode,
    /// 帧大小 (字节, 含帧头)
    pub frame_size: usize,
}

const V1_L3_KBPS: [u32; 16] = [
    0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 0,
];
const V2_L3_KBPS: [u32; 16] = [
    0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160, 0,
];

impl MpaHeader {
    /// 解析 4 字节帧头
    ///
    /// 布局: AAAAAAAA AAABBCCD EEEEFFGH IIJJKLMM
    /// (A 同步, B 版本, C 层, D 无 CRC, E 码率, F 采样率, G 填充, I 声道模式)
    pub fn parse(header: u32) -> EngineResult<Self> {
        if header & 0xFFE0_0000 != 0xFFE0_0000 {
            return Err(EngineError::InvalidData("MPEG 音频同步字无效".into()));
        }

        let version = match (header >> 19) & 0x3 {
            3 => MpegVersion::Mpeg1,
            2 => MpegVersion::Mpeg2,
            0 => MpegVersion::Mpeg25,
            _ => return Err(EngineError::InvalidData("保留的 MPEG 版本".into())),
        };

        if (header >> 17) & 0x3 != 1 {
            return Err(EngineError::Unsupported("仅支持 Layer III".into()));
        }

        let has_crc = (header >> 16) & 0x1 == 0;

        let bitrate_idx = ((header >> 12) & 0xF) as usize;
        if bitrate_idx == 0 || bitrate_idx == 15 {
            return Err(EngineError::InvalidData(format!(
                "无效码率索引 {bitrate_idx}"
            )));
        }

        let samplerate_idx = ((header >> 10) & 0x3) as usize;
        if samplerate_idx == 3 {
            return Err(EngineError::InvalidData("无效采样率索引".into()));
        }

        let padding = (header >> 9) & 0x1 == 1;
        let mode = match (header >> 6) & 0x3 {
            0 => ChannelMode::Stereo,
            1 => ChannelMode::JointStereo,
            2 => ChannelMode::DualChannel,
            _ => ChannelMode::SingleChannel,
        };

        let (kbps, sample_rate) = match version {
            MpegVersion::Mpeg1 => (V1_L3_KBPS[bitrate_idx], [44100, 48000, 32000][samplerate_idx]),
            MpegVersion::Mpeg2 => (V2_L3_KBPS[bitrate_idx], [22050, 24000, 16000][samplerate_idx]),
            MpegVersion::Mpeg25 => (V2_L3_KBPS[bitrate_idx], [11025, 12000, 8000][samplerate_idx]),
        };
        let bitrate = kbps * 1000;

        // Layer III: 144 * bitrate / samplerate (MPEG1), 72 * bitrate / samplerate (MPEG2/2.5)
        let coeff = if version == MpegVersion::Mpeg1 { 144 } else { 72 };
        let frame_size = (coeff * bitrate / sample_rate + u32::from(padding)) as usize;

        Ok(Self {
            version,
            has_crc,
            bitrate,
            sample_rate,
            padding,
            mode,
            frame_size,
        })
    }

    pub fn channels(&self) -> u32 {
        if self.mode == ChannelMode::SingleChannel {
            1
        } else {
            2
        }
    }

    /// 每帧每声道采样数
    pub fn samples_per_frame(&self) -> u32 {
        if self.version == MpegVersion::Mpeg1 {
            1152
        } else {
            576
        }
    }
}

/// 按帧头把数据包拆成完整的 MPEG 音频帧
pub fn split_frames(data: &[u8]) -> EngineResult<Vec<&[u8]>> {
    let mut frames = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        let rest = &data[pos..];
        if rest.len() < 4 {
            return Err(EngineError::InvalidData(format!(
                "MPEG 音频帧头不完整: 剩余 {} 字节",
                rest.len()
            )));
        }
        let header = MpaHeader::parse(u32::from_be_bytes([rest[0], rest[1], rest[2], rest[3]]))?;
        if header.frame_size > rest.len() {
            return Err(EngineError::InvalidData(format!(
                "MPEG 音频帧不完整: 需要 {} 字节, 剩余 {} 字节",
                header.frame_size,
                rest.len(),
            )));
        }
        frames.push(&rest[..header.frame_size]);
        pos += header.frame_size;
    }
    Ok(frames)
}
