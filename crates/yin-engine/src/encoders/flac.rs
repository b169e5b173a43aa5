//! FLAC 无损音频编码器.
//!
//! 将交错 PCM 帧编码为 FLAC 帧. 支持:
//! - Constant 子帧 (所有采样相同)
//! - Verbatim 子帧 (未压缩)
//! - Fixed 预测子帧 (0-4 阶)
//! - Rice 熵编码
//! - CRC-8 (帧头) 和 CRC-16 (帧尾)

use std::collections::VecDeque;

use bytes::Bytes;
use log::debug;
use yin_core::bitwriter::BitWriter;
use yin_core::crc;
use yin_core::{Rational, SampleFormat};

use crate::context::CodecContext;
use crate::encoder::Encoder;
use crate::error::{EngineError, EngineResult};
use crate::frame::AudioFrame;
use crate::packet::Packet;

/// 默认块大小 (每帧每声道采样数)
pub const FLAC_FRAME_SIZE: u32 = 4608;
/// 最大 Rice 参数 (15 为转义码)
const MAX_RICE_PARAM: u32 = 14;
/// 最大固定预测阶数
const MAX_FIXED_ORDER: u32 = 4;
/// 最大 Rice 分区阶数
const MAX_PARTITION_ORDER: u32 = 8;
/// 子帧头开销的估算位数
const SUBFRAME_OVERHEAD_BITS: u64 = 100;

/// FLAC 编码器
pub struct FlacEncoder {
    sample_rate: u32,
    channels: u32,
    bits_per_sample: u32,
    sample_format: SampleFormat,
    block_size: u32,
    /// 待取出的数据包
    pending: VecDeque<Packet>,
    /// 帧序号
    frame_number: u64,
    /// 已编码的总采样数, 用作下一包的 PTS
    total_samples: u64,
    opened: bool,
    draining: bool,
}

impl FlacEncoder {
    /// 创建 FLAC 编码器实例
    pub fn create() -> EngineResult<Box<dyn Encoder>> {
        Ok(Box::new(Self::new()))
    }

    fn new() -> Self {
        Self {
            sample_rate: 0,
            channels: 0,
            bits_per_sample: 0,
            sample_format: SampleFormat::None,
            block_size: FLAC_FRAME_SIZE,
            pending: VecDeque::new(),
            frame_number: 0,
            total_samples: 0,
            opened: false,
            draining: false,
        }
    }

    /// 生成 STREAMINFO 元数据块 (34 字节, 不含块头)
    ///
    /// 打开时尚不知道帧大小和总采样数, 对应字段写 0; MD5 不计算.
    pub fn stream_info(&self) -> Vec<u8> {
        let mut bw = BitWriter::with_capacity(34);
        bw.write_bits(self.block_size, 16);
        bw.write_bits(self.block_size, 16);
        bw.write_bits(0, 24);
        bw.write_bits(0, 24);
        bw.write_bits(self.sample_rate, 20);
        bw.write_bits(self.channels - 1, 3);
        bw.write_bits(self.bits_per_sample - 1, 5);
        bw.write_bits_u64(0, 36);
        bw.write_bytes(&[0u8; 16]);
        bw.finish()
    }

    /// 编码一个 FLAC 帧
    fn encode_frame(&self, samples: &[Vec<i32>], nb_samples: u32) -> Vec<u8> {
        let mut bw =
            BitWriter::with_capacity(nb_samples as usize * self.channels as usize * 4 + 64);

        self.write_frame_header(&mut bw, nb_samples);
        let header_crc = crc::crc8(bw.data());
        bw.write_bits(u32::from(header_crc), 8);

        for channel in samples.iter().take(self.channels as usize) {
            self.encode_subframe(&mut bw, channel);
        }

        bw.align_to_byte();
        let frame_crc = crc::crc16(bw.data());
        bw.write_bits(u32::from(frame_crc), 16);
        bw.finish()
    }

    /// 写入帧头 (不含 CRC-8)
    fn write_frame_header(&self, bw: &mut BitWriter, nb_samples: u32) {
        // 同步码 (14 bits) + reserved (1 bit) + 固定块大小 (1 bit)
        bw.write_bits(0b11111111111110, 14);
        bw.write_bit(0);
        bw.write_bit(0);

        let bs_code = block_size_code(nb_samples);
        bw.write_bits(bs_code, 4);
        let sr_code = sample_rate_code(self.sample_rate);
        bw.write_bits(sr_code, 4);

        // 独立声道
        bw.write_bits(self.channels - 1, 4);
        bw.write_bits(sample_size_code(self.bits_per_sample), 3);
        bw.write_bit(0);

        bw.write_utf8_u64(self.frame_number);

        match bs_code {
            6 => bw.write_bits(nb_samples - 1, 8),
            7 => bw.write_bits(nb_samples - 1, 16),
            _ => {}
        }
        match sr_code {
            12 => bw.write_bits(self.sample_rate / 1000, 8),
            13 => bw.write_bits(self.sample_rate, 16),
            14 => bw.write_bits(self.sample_rate / 10, 16),
            _ => {}
        }
    }

    /// 编码一个子帧, 选择最小的编码方式
    fn encode_subframe(&self, bw: &mut BitWriter, samples: &[i32]) {
        let bps = self.bits_per_sample;
        let Some(&first) = samples.first() else {
            return;
        };

        if samples.iter().all(|&s| s == first) {
            write_subframe_header(bw, 0b000000);
            bw.write_bits_signed(first, bps);
            return;
        }

        let verbatim_bits = samples.len() as u64 * u64::from(bps);
        let best = (0..=MAX_FIXED_ORDER.min(samples.len() as u32 - 1))
            .filter_map(|order| {
                let residuals = fixed_residuals(samples, order)?;
                Some((order, residuals))
            })
            .map(|(order, residuals)| {
                let bits = estimate_rice_bits(&residuals)
                    + u64::from(order) * u64::from(bps);
                (order, residuals, bits)
            })
            .min_by_key(|(_, _, bits)| *bits);

        match best {
            Some((order, residuals, bits)) if bits + SUBFRAME_OVERHEAD_BITS < verbatim_bits => {
                write_subframe_header(bw, 0b001000 | order);
                for &sample in &samples[..order as usize] {
                    bw.write_bits_signed(sample, bps);
                }
                encode_residual(bw, &residuals, samples.len() as u32, order);
            }
            _ => {
                write_subframe_header(bw, 0b000001);
                for &sample in samples {
                    bw.write_bits_signed(sample, bps);
                }
            }
        }
    }

    /// 从交错 PCM 帧中提取每声道 i32 样本
    fn extract_samples(&self, frame: &AudioFrame) -> EngineResult<Vec<Vec<i32>>> {
        if frame.sample_format != self.sample_format {
            return Err(EngineError::InvalidArgument(format!(
                "FLAC 输入格式不匹配: 期望 {}, 实际 {}",
                self.sample_format, frame.sample_format,
            )));
        }
        let channels = self.channels as usize;
        let nb_samples = frame.nb_samples as usize;
        let bytes = self.sample_format.bytes_per_sample() as usize;
        let data = frame
            .data
            .first()
            .filter(|plane| plane.len() >= nb_samples * channels * bytes)
            .ok_or_else(|| EngineError::InvalidData("FLAC 输入数据长度不足".into()))?;

        let mut result = vec![Vec::with_capacity(nb_samples); channels];
        let shift = 32 - self.bits_per_sample;
        for (i, chunk) in data.chunks_exact(bytes).take(nb_samples * channels).enumerate() {
            let sample = match self.sample_format {
                SampleFormat::S16 => i32::from(i16::from_le_bytes([chunk[0], chunk[1]])),
                // S32 输入按位深取高位
                _ => i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) >> shift,
            };
            result[i % channels].push(sample);
        }
        Ok(result)
    }
}

impl Encoder for FlacEncoder {
    fn name(&self) -> &str {
        "flac"
    }

    fn open(&mut self, ctx: &mut CodecContext) -> EngineResult<()> {
        let channels = ctx.channel_count();
        if ctx.sample_rate == 0 || ctx.sample_rate > 655_350 {
            return Err(EngineError::InvalidArgument(format!(
                "FLAC 不支持的采样率: {}",
                ctx.sample_rate
            )));
        }
        if channels == 0 || channels > 8 {
            return Err(EngineError::InvalidArgument(format!(
                "FLAC 不支持的声道数: {channels}"
            )));
        }

        self.bits_per_sample = match ctx.sample_format {
            SampleFormat::S16 => 16,
            SampleFormat::S32 if ctx.bits_per_coded_sample == 32 => {
                if ctx.compliance > -2 {
                    return Err(EngineError::Unsupported(
                        "32 位 FLAC 编码需要 compliance <= -2".into(),
                    ));
                }
                32
            }
            SampleFormat::S32 => 24,
            other => {
                return Err(EngineError::Unsupported(format!(
                    "FLAC 不支持采样格式: {other}"
                )));
            }
        };

        self.sample_rate = ctx.sample_rate;
        self.channels = channels;
        self.sample_format = ctx.sample_format;
        self.block_size = FLAC_FRAME_SIZE;
        self.pending.clear();
        self.frame_number = 0;
        self.total_samples = 0;
        self.draining = false;
        self.opened = true;

        ctx.frame_size = self.block_size;
        ctx.time_base = Rational::new(1, self.sample_rate as i32);
        ctx.bits_per_coded_sample = self.bits_per_sample;
        ctx.extra_data = self.stream_info();

        debug!(
            "打开 FLAC 编码器: {} Hz, {} 声道, {} 位, 块大小={}",
            self.sample_rate, self.channels, self.bits_per_sample, self.block_size,
        );
        Ok(())
    }

    fn send_frame(&mut self, frame: Option<&AudioFrame>) -> EngineResult<()> {
        if !self.opened {
            return Err(EngineError::InvalidArgument("FLAC 编码器未打开".into()));
        }
        if !self.pending.is_empty() {
            return Err(EngineError::Again);
        }
        let Some(frame) = frame else {
            self.draining = true;
            return Ok(());
        };
        if self.draining {
            return Err(EngineError::Eof);
        }
        if frame.nb_samples == 0 || frame.nb_samples > 65535 {
            return Err(EngineError::InvalidArgument(format!(
                "FLAC 块大小无效: {}",
                frame.nb_samples
            )));
        }

        let samples = self.extract_samples(frame)?;
        let data = self.encode_frame(&samples, frame.nb_samples);

        let mut packet = Packet::from_data(Bytes::from(data));
        packet.pts = self.total_samples as i64;
        packet.duration = i64::from(frame.nb_samples);
        packet.time_base = Rational::new(1, self.sample_rate as i32);

        self.frame_number += 1;
        self.total_samples += u64::from(frame.nb_samples);
        self.pending.push_back(packet);
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
        self.pending.clear();
        self.draining = false;
    }
}

fn write_subframe_header(bw: &mut BitWriter, kind: u32) {
    // padding(1)=0 + type(6) + wasted(1)=0
    bw.write_bit(0);
    bw.write_bits(kind, 6);
    bw.write_bit(0);
}

/// 编码残差 (Rice 分区, coding method = 0)
fn encode_residual(bw: &mut BitWriter, residuals: &[i32], block_size: u32, order: u32) {
    bw.write_bits(0, 2);
    let partition_order = select_partition_order(block_size, order);
    bw.write_bits(partition_order, 4);

    let partition_len = (block_size >> partition_order) as usize;
    let mut start = 0usize;
    for partition in 0..(1usize << partition_order) {
        let len = if partition == 0 {
            partition_len - order as usize
        } else {
            partition_len
        };
        let part = &residuals[start..start + len];
        let rice_param = optimal_rice_param(part);
        bw.write_bits(rice_param, 4);
        for &residual in part {
            let folded = fold_signed(residual);
            bw.write_unary(folded >> rice_param, 1);
            if rice_param > 0 {
                bw.write_bits(folded & ((1u32 << rice_param) - 1), rice_param);
            }
        }
        start += len;
    }
}

/// 计算 Fixed 预测残差, 残差超出 i32 范围时返回 None
fn fixed_residuals(samples: &[i32], order: u32) -> Option<Vec<i32>> {
    let order = order as usize;
    let s = |i: usize| i64::from(samples[i]);
    (order..samples.len())
        .map(|i| {
            let predicted = match order {
                0 => 0,
                1 => s(i - 1),
                2 => 2 * s(i - 1) - s(i - 2),
                3 => 3 * s(i - 1) - 3 * s(i - 2) + s(i - 3),
                _ => 4 * s(i - 1) - 6 * s(i - 2) + 4 * s(i - 3) - s(i - 4),
            };
            i32::try_from(s(i) - predicted)
                .ok()
                .filter(|r| *r > i32::MIN / 2 && *r < i32::MAX / 2)
        })
        .collect()
}

/// 估算 Rice 编码所需的位数
fn estimate_rice_bits(residuals: &[i32]) -> u64 {
    let param = optimal_rice_param(residuals);
    residuals
        .iter()
        .map(|&r| u64::from(fold_signed(r) >> param) + 1 + u64::from(param))
        .sum()
}

/// 以残差均值的 log2 估算 Rice 参数
fn optimal_rice_param(residuals: &[i32]) -> u32 {
    if residuals.is_empty() {
        return 0;
    }
    let sum: u64 = residuals.iter().map(|&r| u64::from(fold_signed(r))).sum();
    let avg = sum / residuals.len() as u64;
    if avg == 0 {
        0
    } else {
        (63 - avg.leading_zeros()).min(MAX_RICE_PARAM)
    }
}

/// 有符号值折叠为无符号: 0->0, -1->1, 1->2, -2->3, ...
fn fold_signed(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

/// 选择分区阶数, 分区数必须整除块大小且首个分区能容纳预测阶数
fn select_partition_order(block_size: u32, predictor_order: u32) -> u32 {
    let mut order = 0u32;
    while order < MAX_PARTITION_ORDER {
        let next = order + 1;
        if block_size % (1 << next) != 0 || (block_size >> next) < predictor_order + 4 {
            break;
        }
        order = next;
    }
    order
}

fn block_size_code(block_size: u32) -> u32 {
    match block_size {
        192 => 1,
        576 => 2,
        1152 => 3,
        2304 => 4,
        4608 => 5,
        256 => 8,
        512 => 9,
        1024 => 10,
        2048 => 11,
        4096 => 12,
        8192 => 13,
        16384 => 14,
        32768 => 15,
        bs if bs <= 256 => 6,
        _ => 7,
    }
}

fn sample_rate_code(sample_rate: u32) -> u32 {
    match sample_rate {
        88200 => 1,
        176400 => 2,
        192000 => 3,
        8000 => 4,
        16000 => 5,
        22050 => 6,
        24000 => 7,
        32000 => 8,
        44100 => 9,
        48000 => 10,
        96000 => 11,
        sr if sr % 1000 == 0 && sr / 1000 <= 255 => 12,
        sr if sr <= 65535 => 13,
        sr if sr % 10 == 0 && sr / 10 <= 65535 => 14,
        _ => 0,
    }
}

/// 32 位写 0, 由 STREAMINFO 提供
fn sample_size_code(bps: u32) -> u32 {
    match bps {
        8 => 1,
        12 => 2,
        16 => 4,
        20 => 5,
        24 => 6,
        _ => 0,
    }
}
