//! AAC-LC 音频编码器.
//!
//! 输出不带 ADTS 头的 raw_data_block, 封装由上层负责.
//!
//! 实现要点:
//! - 长窗口 MDCT (2048 输入样本 -> 1024 频谱系数), 正弦窗
//! - 全局增益统一作为所有频带的比例因子, 按码率预算逐步提高增益
//! - 非零频带统一使用码本 11 (ESC)
//! - 1~6 声道按标准声道配置组织 SCE / CPE / LFE 元素

mod tables;

use std::collections::VecDeque;
use std::f64::consts::PI;

use bytes::Bytes;
use log::{debug, trace};
use yin_core::bitwriter::BitWriter;
use yin_core::audio_format::aac_sample_rate_index;
use yin_core::{Rational, SampleFormat};

use crate::context::{CodecContext, PROFILE_AAC_LOW, PROFILE_UNKNOWN};
use crate::decoders::adts::audio_specific_config;
use crate::encoder::Encoder;
use crate::error::{EngineError, EngineResult};
use crate::frame::AudioFrame;
use crate::packet::Packet;

use tables::{CB11_BITS, CB11_CODES, SF_DELTA_ZERO, swb_offsets};

/// AAC 帧大小 (每声道采样数)
pub const AAC_FRAME_SIZE: usize = 1024;
/// MDCT 输入长度
const MDCT_INPUT_SIZE: usize = 2 * AAC_FRAME_SIZE;
/// 余弦表周期: cos(pi * m / 4096), m 取模 8192
const COS_TABLE_SIZE: usize = 8192;
/// 比例因子偏移, 增益为 2^((sf - 100) / 4)
const SF_OFFSET: i32 = 100;
/// 静音帧使用的全局增益
const SILENT_GAIN: i32 = SF_OFFSET;
/// ESC 码本可表达的最大量化值
const MAX_QUANT: i32 = 8191;
/// 单声道每帧位数上限
const MAX_CHANNEL_BITS: u32 = 6144;
/// 单声道每帧位数下限
const MIN_CHANNEL_BITS: u32 = 256;
/// 未指定码率时每声道的默认码率
const DEFAULT_BIT_RATE_PER_CHANNEL: i64 = 64_000;

/// 语法元素 ID
const ID_SCE: u32 = 0;
const ID_CPE: u32 = 1;
const ID_LFE: u32 = 3;
const ID_END: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Element {
    Single,
    Pair,
    Lfe,
}

/// 声道配置 1~6 对应的元素序列
const ELEMENTS: [&[Element]; 6] = [
    &[Element::Single],
    &[Element::Pair],
    &[Element::Single, Element::Pair],
    &[Element::Single, Element::Pair, Element::Single],
    &[Element::Single, Element::Pair, Element::Pair],
    &[Element::Single, Element::Pair, Element::Pair, Element::Lfe],
];

/// 码流声道顺序 -> 输入声道下标
const CHANNEL_MAPS: [&[usize]; 6] = [
    &[0],
    &[0, 1],
    &[2, 0, 1],
    &[2, 0, 1, 3],
    &[2, 0, 1, 3, 4],
    &[2, 0, 1, 4, 5, 3],
];

/// 单声道一帧的量化结果
#[derive(Debug, Clone)]
struct ChannelStream {
    global_gain: i32,
    max_sfb: usize,
    quant: Vec<i32>,
}

/// AAC-LC 编码器
pub struct AacEncoder {
    sample_rate: u32,
    channels: u32,
    swb_offset: &'static [u16],
    /// 每声道每帧的位数预算
    channel_bits: u32,
    /// 正弦窗 (2048)
    window: Vec<f64>,
    /// MDCT 余弦表
    cos_table: Vec<f64>,
    /// 重叠缓冲 (上一块输入, 每声道 1024 样本)
    overlap: Vec<Vec<f32>>,
    /// 输入缓冲 (尚未凑满一帧的样本)
    input: Vec<Vec<f32>>,
    pending: VecDeque<Packet>,
    /// 已输出的帧数
    frames_encoded: u64,
    opened: bool,
    draining: bool,
}

impl AacEncoder {
    /// 创建 AAC-LC 编码器实例
    pub fn create() -> EngineResult<Box<dyn Encoder>> {
        Ok(Box::new(Self::new()))
    }

    fn new() -> Self {
        Self {
            sample_rate: 0,
            channels: 0,
            swb_offset: &[],
            channel_bits: MAX_CHANNEL_BITS,
            window: Vec::new(),
            cos_table: Vec::new(),
            overlap: Vec::new(),
            input: Vec::new(),
            pending: VecDeque::new(),
            frames_encoded: 0,
            opened: false,
            draining: false,
        }
    }

    /// 从平面 F32 帧中提取每声道样本
    fn extract_samples(&self, frame: &AudioFrame) -> EngineResult<Vec<Vec<f32>>> {
        if frame.sample_format != SampleFormat::F32p {
            return Err(EngineError::InvalidArgument(format!(
                "AAC 编码器仅接受 F32p 输入, 实际 {}",
                frame.sample_format,
            )));
        }
        let channels = self.channels as usize;
        let nb_samples = frame.nb_samples as usize;
        if frame.data.len() < channels {
            return Err(EngineError::InvalidData(format!(
                "AAC 输入平面数不足: 需要 {channels}, 实际 {}",
                frame.data.len()
            )));
        }

        frame.data[..channels]
            .iter()
            .map(|plane| {
                if plane.len() < nb_samples * 4 {
                    return Err(EngineError::InvalidData("AAC 输入数据长度不足".into()));
                }
                Ok(plane
                    .chunks_exact(4)
                    .take(nb_samples)
                    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                    .collect())
            })
            .collect()
    }

    /// 将输入缓冲中满 1024 的部分编码
    fn encode_buffered(&mut self) {
        while self.input.first().is_some_and(|ch| ch.len() >= AAC_FRAME_SIZE) {
            let block: Vec<Vec<f32>> = self
                .input
                .iter_mut()
                .map(|ch| ch.drain(..AAC_FRAME_SIZE).collect())
                .collect();
            self.encode_block(block);
        }
    }

    /// 编码一块 1024 样本并放入输出队列
    fn encode_block(&mut self, block: Vec<Vec<f32>>) {
        let spectra: Vec<Vec<f64>> = block
            .iter()
            .zip(&self.overlap)
            .map(|(current, previous)| {
                let mut windowed = vec![0.0f64; MDCT_INPUT_SIZE];
                for (n, x) in windowed.iter_mut().enumerate() {
                    let sample = if n < AAC_FRAME_SIZE {
                        previous[n]
                    } else {
                        current[n - AAC_FRAME_SIZE]
                    };
                    *x = f64::from(sample) * 32768.0 * self.window[n];
                }
                self.mdct(&windowed)
            })
            .collect();
        self.overlap = block;

        let channel_cfg = self.channels as usize;
        let map = CHANNEL_MAPS[channel_cfg - 1];
        let streams: Vec<ChannelStream> = map
            .iter()
            .map(|&src| analyze(&spectra[src], self.swb_offset, self.channel_bits))
            .collect();

        let mut bw = BitWriter::with_capacity(MAX_CHANNEL_BITS as usize / 8 * channel_cfg);
        let mut stream_iter = streams.iter();
        let (mut sce_tag, mut cpe_tag, mut lfe_tag) = (0u32, 0u32, 0u32);
        for element in ELEMENTS[channel_cfg - 1] {
            match element {
                Element::Single | Element::Lfe => {
                    let (id, tag) = if *element == Element::Single {
                        sce_tag += 1;
                        (ID_SCE, sce_tag - 1)
                    } else {
                        lfe_tag += 1;
                        (ID_LFE, lfe_tag - 1)
                    };
                    bw.write_bits(id, 3);
                    bw.write_bits(tag, 4);
                    if let Some(stream) = stream_iter.next() {
                        write_ics(&mut bw, stream, self.swb_offset);
                    }
                }
                Element::Pair => {
                    bw.write_bits(ID_CPE, 3);
                    bw.write_bits(cpe_tag, 4);
                    cpe_tag += 1;
                    // common_window = 0, 两个声道各自携带 ics_info
                    bw.write_bit(0);
                    for stream in stream_iter.by_ref().take(2) {
                        write_ics(&mut bw, stream, self.swb_offset);
                    }
                }
            }
        }
        bw.write_bits(ID_END, 3);
        bw.align_to_byte();
        let data = bw.finish();

        let mut packet = Packet::from_data(Bytes::from(data));
        packet.pts = (self.frames_encoded * AAC_FRAME_SIZE as u64) as i64;
        packet.duration = AAC_FRAME_SIZE as i64;
        packet.time_base = Rational::new(1, self.sample_rate as i32);
        trace!(
            "AAC 帧 #{}: {} 字节, 增益 {:?}",
            self.frames_encoded,
            packet.size(),
            streams.iter().map(|s| s.global_gain).collect::<Vec<_>>(),
        );

        self.frames_encoded += 1;
        self.pending.push_back(packet);
    }

    /// MDCT: X[k] = 2 * sum z[n] * cos(pi/1024 * (n + 512.5) * (k + 0.5))
    ///
    /// 相位写成 pi/4096 * (2n + 1025)(2k + 1), 整数部分对 8192 取模后查表.
    fn mdct(&self, input: &[f64]) -> Vec<f64> {
        let mask = COS_TABLE_SIZE - 1;
        (0..AAC_FRAME_SIZE)
            .map(|k| {
                let kk = 2 * k + 1;
                let sum: f64 = input
                    .iter()
                    .enumerate()
                    .map(|(n, &x)| x * self.cos_table[((2 * n + 1025) * kk) & mask])
                    .sum();
                2.0 * sum
            })
            .collect()
    }

    /// 排空: 补零编码剩余样本, 再追加一帧静音输出重叠部分
    fn drain_remaining(&mut self) {
        let buffered = self.input.first().map_or(0, Vec::len);
        if buffered > 0 {
            for ch in &mut self.input {
                ch.resize(AAC_FRAME_SIZE, 0.0);
            }
            self.encode_buffered();
        }
        if self.frames_encoded > 0 {
            let silence = vec![vec![0.0f32; AAC_FRAME_SIZE]; self.channels as usize];
            self.encode_block(silence);
        }
    }

    fn reset_buffers(&mut self) {
        let channels = self.channels as usize;
        self.overlap = vec![vec![0.0; AAC_FRAME_SIZE]; channels];
        self.input = vec![Vec::with_capacity(AAC_FRAME_SIZE); channels];
        self.pending.clear();
        self.frames_encoded = 0;
        self.draining = false;
    }
}

impl Encoder for AacEncoder {
    fn name(&self) -> &str {
        "aac"
    }

    fn open(&mut self, ctx: &mut CodecContext) -> EngineResult<()> {
        if ctx.sample_format != SampleFormat::F32p {
            return Err(EngineError::Unsupported(format!(
                "AAC 编码器不支持采样格式: {}",
                ctx.sample_format
            )));
        }
        let sr_index = aac_sample_rate_index(ctx.sample_rate).ok_or_else(|| {
            EngineError::InvalidArgument(format!("AAC 不支持的采样率: {}", ctx.sample_rate))
        })?;
        let channels = ctx.channel_count();
        if !(1..=ELEMENTS.len() as u32).contains(&channels) {
            return Err(EngineError::Unsupported(format!(
                "AAC 编码器不支持 {channels} 声道"
            )));
        }
        if ctx.profile == PROFILE_UNKNOWN {
            ctx.profile = PROFILE_AAC_LOW;
        }
        if !(0..=3).contains(&ctx.profile) {
            return Err(EngineError::Unsupported(format!(
                "AAC profile 无效: {}",
                ctx.profile
            )));
        }

        let bit_rate = if ctx.bit_rate > 0 {
            ctx.bit_rate
        } else {
            DEFAULT_BIT_RATE_PER_CHANNEL * i64::from(channels)
        };
        let channel_bits = bit_rate * AAC_FRAME_SIZE as i64
            / i64::from(ctx.sample_rate)
            / i64::from(channels);
        self.channel_bits = channel_bits.clamp(
            i64::from(MIN_CHANNEL_BITS),
            i64::from(MAX_CHANNEL_BITS),
        ) as u32;

        self.sample_rate = ctx.sample_rate;
        self.channels = channels;
        self.swb_offset = swb_offsets(sr_index);
        self.window = (0..MDCT_INPUT_SIZE)
            .map(|n| (PI / MDCT_INPUT_SIZE as f64 * (n as f64 + 0.5)).sin())
            .collect();
        self.cos_table = (0..COS_TABLE_SIZE)
            .map(|m| (PI * m as f64 / 4096.0).cos())
            .collect();
        self.reset_buffers();
        self.opened = true;

        ctx.frame_size = AAC_FRAME_SIZE as u32;
        ctx.time_base = Rational::new(1, self.sample_rate as i32);
        ctx.bit_rate = bit_rate;
        ctx.extra_data = audio_specific_config(ctx.profile as u8 + 1, sr_index, channels as u8).to_vec();

        debug!(
            "打开 AAC 编码器: {} Hz, {} 声道, 码率 {} bps, 每声道预算 {} 位",
            self.sample_rate, self.channels, bit_rate, self.channel_bits,
        );
        Ok(())
    }

    fn send_frame(&mut self, frame: Option<&AudioFrame>) -> EngineResult<()> {
        if !self.opened {
            return Err(EngineError::InvalidArgument("AAC 编码器未打开".into()));
        }
        if !self.pending.is_empty() {
            return Err(EngineError::Again);
        }
        if self.draining {
            return Err(EngineError::Eof);
        }
        let Some(frame) = frame else {
            self.drain_remaining();
            self.draining = true;
            return Ok(());
        };

        let samples = self.extract_samples(frame)?;
        for (buffer, channel) in self.input.iter_mut().zip(samples) {
            buffer.extend(channel);
        }
        self.encode_buffered();
        Ok(())
    }

    fn receive_packet(&mut self) -> EngineResult<Packet> {
        if let Some(packet) = self.pending.pop_front() {
            return Ok(packet);
        }
        if self.draining {
            return Err(EngineError::Eof);
        }
        Err(EngineError::Again)
    }

    fn flush(&mut self) {
        self.reset_buffers();
    }
}

/// 量化并做码率控制: 从能容纳峰值的最小增益开始, 逐步提高直到满足位数预算
fn analyze(spectrum: &[f64], swb: &[u16], budget: u32) -> ChannelStream {
    let peak = spectrum.iter().fold(0.0f64, |m, &c| m.max(c.abs()));
    let mut quant = vec![0i32; spectrum.len()];
    if peak < f64::EPSILON {
        return ChannelStream {
            global_gain: SILENT_GAIN,
            max_sfb: 0,
            quant,
        };
    }

    // 峰值量化后不超过 MAX_QUANT: step >= peak / MAX_QUANT^(4/3)
    let min_step = peak / f64::from(MAX_QUANT).powf(4.0 / 3.0);
    let mut gain = (SF_OFFSET + (4.0 * min_step.log2()).ceil() as i32).clamp(0, 255);
    loop {
        quantize(spectrum, gain, &mut quant);
        let (max_sfb, bits) = count_ics_bits(&quant, swb);
        if bits <= budget || gain >= 255 {
            return ChannelStream {
                global_gain: gain,
                max_sfb,
                quant,
            };
        }
        gain = (gain + if bits > 2 * budget { 4 } else { 1 }).min(255);
    }
}

fn quantize(spectrum: &[f64], gain: i32, out: &mut [i32]) {
    let step = 2f64.powf(f64::from(gain - SF_OFFSET) / 4.0);
    for (q, &c) in out.iter_mut().zip(spectrum) {
        let magnitude = ((c.abs() / step).powf(0.75) + 0.4054).floor() as i32;
        let magnitude = magnitude.min(MAX_QUANT);
        *q = if c < 0.0 { -magnitude } else { magnitude };
    }
}

/// 频带是否全为零
fn band_is_zero(quant: &[i32], swb: &[u16], band: usize) -> bool {
    quant[swb[band] as usize..swb[band + 1] as usize]
        .iter()
        .all(|&q| q == 0)
}

/// 最后一个非零频带 + 1
fn find_max_sfb(quant: &[i32], swb: &[u16]) -> usize {
    (0..swb.len() - 1)
        .rev()
        .find(|&band| !band_is_zero(quant, swb, band))
        .map_or(0, |band| band + 1)
}

/// 各频带码本: 全零为 0, 其余为 11
fn band_codebooks(quant: &[i32], swb: &[u16], max_sfb: usize) -> Vec<u32> {
    (0..max_sfb)
        .map(|band| if band_is_zero(quant, swb, band) { 0 } else { 11 })
        .collect()
}

/// 连续相同码本的分段 (码本, 长度)
fn sections(codebooks: &[u32]) -> Vec<(u32, usize)> {
    let mut result: Vec<(u32, usize)> = Vec::new();
    for &cb in codebooks {
        match result.last_mut() {
            Some((last, len)) if *last == cb => *len += 1,
            _ => result.push((cb, 1)),
        }
    }
    result
}

/// 单声道 individual_channel_stream 的位数
fn count_ics_bits(quant: &[i32], swb: &[u16]) -> (usize, u32) {
    let max_sfb = find_max_sfb(quant, swb);
    let codebooks = band_codebooks(quant, swb, max_sfb);
    // global_gain + ics_info + pulse/tns/gain_control
    let mut bits = 8 + 11 + 3;
    for (_, len) in sections(&codebooks) {
        bits += 4 + 5 * (len as u32 / 31 + 1);
    }
    for (band, &cb) in codebooks.iter().enumerate() {
        if cb == 0 {
            continue;
        }
        bits += SF_DELTA_ZERO.1;
        let range = swb[band] as usize..swb[band + 1] as usize;
        for pair in quant[range].chunks_exact(2) {
            bits += spectral_pair_bits(pair[0], pair[1]);
        }
    }
    (max_sfb, bits)
}

/// 写入 individual_channel_stream (common_window = 0, 长窗口)
fn write_ics(bw: &mut BitWriter, stream: &ChannelStream, swb: &[u16]) {
    bw.write_bits(stream.global_gain as u32, 8);

    // ics_info: reserved, ONLY_LONG_SEQUENCE, 正弦窗, max_sfb, 无预测
    bw.write_bit(0);
    bw.write_bits(0, 2);
    bw.write_bit(0);
    bw.write_bits(stream.max_sfb as u32, 6);
    bw.write_bit(0);

    let codebooks = band_codebooks(&stream.quant, swb, stream.max_sfb);
    for (cb, len) in sections(&codebooks) {
        bw.write_bits(cb, 4);
        let mut remaining = len as u32;
        while remaining >= 31 {
            bw.write_bits(31, 5);
            remaining -= 31;
        }
        bw.write_bits(remaining, 5);
    }

    // 所有频带比例因子等于全局增益, 差分恒为 0
    for _ in codebooks.iter().filter(|&&cb| cb != 0) {
        bw.write_bits(SF_DELTA_ZERO.0, SF_DELTA_ZERO.1);
    }

    // pulse / tns / gain_control
    bw.write_bits(0, 3);

    for (band, &cb) in codebooks.iter().enumerate() {
        if cb == 0 {
            continue;
        }
        let range = swb[band] as usize..swb[band + 1] as usize;
        for pair in stream.quant[range].chunks_exact(2) {
            write_spectral_pair(bw, pair[0], pair[1]);
        }
    }
}

fn cb11_index(y: i32, z: i32) -> usize {
    let y = y.unsigned_abs().min(16) as usize;
    let z = z.unsigned_abs().min(16) as usize;
    y * 17 + z
}

fn escape_bits(value: i32) -> u32 {
    let value = value.unsigned_abs();
    if value < 16 {
        return 0;
    }
    let n = 31 - value.leading_zeros();
    (n - 4) + 1 + n
}

fn spectral_pair_bits(y: i32, z: i32) -> u32 {
    u32::from(CB11_BITS[cb11_index(y, z)])
        + u32::from(y != 0)
        + u32::from(z != 0)
        + escape_bits(y)
        + escape_bits(z)
}

fn write_spectral_pair(bw: &mut BitWriter, y: i32, z: i32) {
    let idx = cb11_index(y, z);
    bw.write_bits(u32::from(CB11_CODES[idx]), u32::from(CB11_BITS[idx]));
    for v in [y, z] {
        if v != 0 {
            bw.write_bit(u32::from(v < 0));
        }
    }
    for v in [y, z] {
        write_escape(bw, v);
    }
}

/// ESC 序列: N-4 个 1, 一个 0, 再写 |v| - 2^N 的低 N 位
fn write_escape(bw: &mut BitWriter, value: i32) {
    let value = value.unsigned_abs();
    if value < 16 {
        return;
    }
    let n = 31 - value.leading_zeros();
    for _ in 0..n - 4 {
        bw.write_bit(1);
    }
    bw.write_bit(0);
    bw.write_bits(value - (1 << n), n);
}
