//! 基于 symphonia 的解码器实现.
//!
//! 负责码流分帧 (ADTS / MPEG 音频帧) 和私有数据准备, 逐帧交给 symphonia 解码,
//! 并把结果统一转换为平面 S16 音频帧. 一个数据包拆出多帧时, 只有第一帧带 PTS.

use std::collections::VecDeque;

use log::{debug, warn};
use symphonia_bundle_flac::FlacDecoder as SymFlacDecoder;
use symphonia_bundle_mp3::MpaDecoder as SymMpaDecoder;
use symphonia_codec_aac::AacDecoder as SymAacDecoder;
use symphonia_codec_vorbis::VorbisDecoder as SymVorbisDecoder;
use symphonia_core::audio::{Channels, SampleBuffer};
use symphonia_core::codecs::{
    CODEC_TYPE_AAC, CODEC_TYPE_FLAC, CODEC_TYPE_MP3, CODEC_TYPE_VORBIS,
    CodecParameters as SymCodecParameters, CodecType, Decoder as SymDecoderTrait,
    DecoderOptions as SymDecoderOptions,
};
use symphonia_core::formats::Packet as SymPacket;
use yin_core::audio_format::aac_sample_rate_index;
use yin_core::timestamp::NOPTS_VALUE;
use yin_core::{ChannelLayout, Rational, SampleFormat};

use super::{adts, mpa};
use crate::context::CodecContext;
use crate::decoder::Decoder;
use crate::error::{EngineError, EngineResult};
use crate::frame::AudioFrame;
use crate::packet::Packet;

/// STREAMINFO 块长度
const STREAMINFO_SIZE: usize = 34;
/// AAC LC 的 object type
const AAC_OBJECT_TYPE_LC: u8 = 2;

/// 码流类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bitstream {
    Aac,
    Mp3,
    Flac,
    Vorbis,
}

impl Bitstream {
    fn codec_type(self) -> CodecType {
        match self {
            Self::Aac => CODEC_TYPE_AAC,
            Self::Mp3 => CODEC_TYPE_MP3,
            Self::Flac => CODEC_TYPE_FLAC,
            Self::Vorbis => CODEC_TYPE_VORBIS,
        }
    }
}

/// symphonia 解码器包装
pub struct SymphoniaDecoder {
    name: &'static str,
    bitstream: Bitstream,
    /// 内部解码器, AAC 在缺少私有数据时延迟到首个 ADTS 帧创建
    inner: Option<Box<dyn SymDecoderTrait>>,
    /// 已解码但未取出的帧
    pending: VecDeque<AudioFrame>,
    opened: bool,
    draining: bool,
}

impl SymphoniaDecoder {
    fn new(name: &'static str, bitstream: Bitstream) -> Self {
        Self {
            name,
            bitstream,
            inner: None,
            pending: VecDeque::new(),
            opened: false,
            draining: false,
        }
    }

    pub fn create_aac() -> EngineResult<Box<dyn Decoder>> {
        Ok(Box::new(Self::new("aac", Bitstream::Aac)))
    }

    pub fn create_mp3() -> EngineResult<Box<dyn Decoder>> {
        Ok(Box::new(Self::new("mp3", Bitstream::Mp3)))
    }

    pub fn create_flac() -> EngineResult<Box<dyn Decoder>> {
        Ok(Box::new(Self::new("flac", Bitstream::Flac)))
    }

    pub fn create_vorbis() -> EngineResult<Box<dyn Decoder>> {
        Ok(Box::new(Self::new("vorbis", Bitstream::Vorbis)))
    }

    /// 创建 symphonia 解码器实例
    fn build_inner(
        bitstream: Bitstream,
        sample_rate: u32,
        channels: u32,
        extra_data: Option<&[u8]>,
    ) -> EngineResult<Box<dyn SymDecoderTrait>> {
        let mut params = SymCodecParameters::new();
        params.for_codec(bitstream.codec_type());
        if sample_rate > 0 {
            params.with_sample_rate(sample_rate);
        }
        if (1..=32).contains(&channels) {
            let bits = if channels == 32 {
                u32::MAX
            } else {
                (1u32 << channels) - 1
            };
            params.with_channels(Channels::from_bits_truncate(bits));
        }
        if let Some(extra) = extra_data {
            params.with_extra_data(extra.to_vec().into_boxed_slice());
        }

        let options = SymDecoderOptions::default();
        let decoder: Box<dyn SymDecoderTrait> = match bitstream {
            Bitstream::Aac => Box::new(SymAacDecoder::try_new(&params, &options)?),
            Bitstream::Mp3 => Box::new(SymMpaDecoder::try_new(&params, &options)?),
            Bitstream::Flac => Box::new(SymFlacDecoder::try_new(&params, &options)?),
            Bitstream::Vorbis => Box::new(SymVorbisDecoder::try_new(&params, &options)?),
        };
        Ok(decoder)
    }

    /// 解码一个完整的码流单元, 输出帧进入待取队列
    fn decode_unit(&mut self, unit: &[u8], pts: i64, time_base: Rational) -> EngineResult<()> {
        let decoder = self
            .inner
            .as_mut()
            .ok_or_else(|| EngineError::Internal(format!("{}: 内部解码器未创建", self.name)))?;

        let ts = if pts == NOPTS_VALUE { 0 } else { pts.max(0) as u64 };
        let sym_packet = SymPacket::new_from_slice(0, ts, 0, unit);
        let decoded = decoder.decode(&sym_packet)?;

        let spec = *decoded.spec();
        let nb_frames = decoded.frames();
        if nb_frames == 0 {
            return Ok(());
        }
        let channels = spec.channels.count();
        let mut sample_buf = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
        sample_buf.copy_planar_ref(decoded);

        let mut frame = AudioFrame::new(
            nb_frames as u32,
            spec.rate,
            SampleFormat::S16p,
            ChannelLayout::from_channels(channels as u32),
        );
        frame.data = sample_buf
            .samples()
            .chunks_exact(nb_frames)
            .take(channels)
            .map(|plane| plane.iter().flat_map(|s| s.to_le_bytes()).collect())
            .collect();
        frame.pts = pts;
        frame.time_base = time_base;
        frame.duration = nb_frames as i64;
        self.pending.push_back(frame);
        Ok(())
    }

    /// 把数据包拆分为码流单元
    fn split<'a>(&self, data: &'a [u8]) -> EngineResult<Vec<&'a [u8]>> {
        match self.bitstream {
            Bitstream::Aac => Ok(adts::split_frames(data)?.unwrap_or_else(|| vec![data])),
            Bitstream::Mp3 => mpa::split_frames(data),
            Bitstream::Flac | Bitstream::Vorbis => Ok(vec![data]),
        }
    }
}

impl Decoder for SymphoniaDecoder {
    fn name(&self) -> &str {
        self.name
    }

    fn open(&mut self, ctx: &mut CodecContext) -> EngineResult<()> {
        let channels = ctx.channel_count();
        self.inner = match self.bitstream {
            Bitstream::Aac => {
                if !ctx.extra_data.is_empty() {
                    Some(Self::build_inner(
                        self.bitstream,
                        ctx.sample_rate,
                        channels,
                        Some(&ctx.extra_data),
                    )?)
                } else if let (Some(idx), 1..=7) = (aac_sample_rate_index(ctx.sample_rate), channels)
                {
                    // 无私有数据时按 LC 合成 AudioSpecificConfig
                    let asc = adts::audio_specific_config(AAC_OBJECT_TYPE_LC, idx, channels as u8);
                    Some(Self::build_inner(
                        self.bitstream,
                        ctx.sample_rate,
                        channels,
                        Some(&asc),
                    )?)
                } else {
                    debug!("aac: 参数不足, 等待首个 ADTS 帧头创建解码器");
                    None
                }
            }
            Bitstream::Mp3 => Some(Self::build_inner(self.bitstream, 0, 0, None)?),
            Bitstream::Flac => {
                if ctx.extra_data.len() < STREAMINFO_SIZE {
                    return Err(EngineError::InvalidArgument(format!(
                        "flac: 需要 {STREAMINFO_SIZE} 字节 STREAMINFO, 实际 {} 字节",
                        ctx.extra_data.len(),
                    )));
                }
                Some(Self::build_inner(
                    self.bitstream,
                    ctx.sample_rate,
                    channels,
                    Some(&ctx.extra_data),
                )?)
            }
            Bitstream::Vorbis => {
                if ctx.extra_data.is_empty() {
                    return Err(EngineError::InvalidArgument(
                        "vorbis: 缺少识别头与设置头".into(),
                    ));
                }
                Some(Self::build_inner(
                    self.bitstream,
                    ctx.sample_rate,
                    channels,
                    Some(&ctx.extra_data),
                )?)
            }
        };

        ctx.sample_format = SampleFormat::S16p;
        self.pending.clear();
        self.draining = false;
        self.opened = true;
        debug!(
            "打开 {} 解码器: {} Hz, {} 声道, 私有数据 {} 字节",
            self.name,
            ctx.sample_rate,
            channels,
            ctx.extra_data.len(),
        );
        Ok(())
    }

    fn send_packet(&mut self, packet: &Packet) -> EngineResult<()> {
        if !self.opened {
            return Err(EngineError::InvalidArgument(format!(
                "{}: 解码器未打开",
                self.name
            )));
        }
        if !self.pending.is_empty() {
            return Err(EngineError::Again);
        }
        if packet.is_empty() {
            self.draining = true;
            return Ok(());
        }
        if self.draining {
            return Err(EngineError::Eof);
        }

        let data = packet.data.as_ref();
        if self.inner.is_none() {
            let header = adts::AdtsHeader::parse(data).ok_or_else(|| {
                EngineError::InvalidData("aac: 缺少 AudioSpecificConfig 且输入不是 ADTS".into())
            })?;
            self.inner = Some(Self::build_inner(
                self.bitstream,
                header.sample_rate(),
                u32::from(header.channel_config),
                Some(&header.audio_specific_config()),
            )?);
        }

        let units = self.split(data)?;
        for (i, unit) in units.into_iter().enumerate() {
            let pts = if i == 0 { packet.pts } else { NOPTS_VALUE };
            if let Err(err) = self.decode_unit(unit, pts, packet.time_base) {
                if self.pending.is_empty() {
                    return Err(err);
                }
                warn!("{}: 丢弃损坏的帧: {}", self.name, err);
            }
        }
        Ok(())
    }

    fn receive_frame(&mut self) -> EngineResult<AudioFrame> {
        if let Some(frame) = self.pending.pop_front() {
            return Ok(frame);
        }
        if self.draining {
            return Err(EngineError::Eof);
        }
        Err(EngineError::Again)
    }

    fn flush(&mut self) {
        self.pending.clear();
        self.draining = false;
        if let Some(inner) = self.inner.as_mut() {
            inner.reset();
        }
    }
}
