//! 解码会话 (DecoderCore).
//!
//! 持有一个引擎解码器, 负责:
//! - 从 `Format` 协商解码参数并打开引擎
//! - 把输入缓冲送入引擎, 把解码帧交错后写入输出缓冲
//! - 为不带时间戳的帧推算 PTS
//!
//! 所有引擎交互都在会话锁内完成.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use log::{debug, error, warn};
use yin_core::format::keys;
use yin_core::timestamp::NOPTS_VALUE;
use yin_core::{
    AudioSampleFormat, ChannelLayout, CodecError, CodecResult, Format, Rational, SampleFormat,
};
use yin_engine::{
    AudioFrame, CodecContext, CodecDescriptor, Decoder, EngineError, EngineRegistry, Packet,
};

use crate::buffer_info::{BufferAttr, CodecBufferInfo};
use crate::session::{SessionState, lock};

/// 时间戳推算器
///
/// 带 PTS 的帧原样输出并更新帧间距; 不带 PTS 的帧按
/// `cur + |cur - prev| * (index - 1) / num` 线性插值,
/// 跨度大于已知帧间距时直接取最近的 PTS.
#[derive(Debug, Clone)]
pub(crate) struct PtsTracker {
    prev: i64,
    cur: i64,
    distance: i64,
    index: i64,
    num: i64,
}

impl PtsTracker {
    pub(crate) fn new() -> Self {
        Self {
            prev: 0,
            cur: 0,
            distance: 0,
            index: 1,
            num: 1,
        }
    }

    /// 计算当前帧的输出 PTS
    pub(crate) fn next(&mut self, frame_pts: Option<i64>) -> i64 {
        match frame_pts {
            Some(pts) => {
                self.prev = self.cur;
                self.cur = pts;
                if self.distance == 0 {
                    self.distance = (self.cur - self.prev).abs();
                }
                if self.index >= self.num {
                    self.num = self.index;
                }
                self.index = 1;
                pts
            }
            None => {
                self.index += 1;
                let span = (self.cur - self.prev).abs();
                if span > self.distance {
                    self.prev = self.cur;
                    self.cur
                } else {
                    self.cur + span * (self.index - 1) / self.num
                }
            }
        }
    }
}

impl Default for PtsTracker {
    fn default() -> Self {
        Self::new()
    }
}

struct DecoderEngine {
    descriptor: CodecDescriptor,
    context: CodecContext,
    decoder: Box<dyn Decoder>,
}

struct DecoderSession {
    state: SessionState,
    engine: Option<DecoderEngine>,
    format: Format,
    has_extra_data: bool,
    max_input_size: i32,
    pts: PtsTracker,
}

impl DecoderSession {
    fn close(&mut self) {
        if let Some(engine) = self.engine.take() {
            debug!("关闭 {} 解码器", engine.descriptor.name);
        }
        self.pts = PtsTracker::new();
        self.has_extra_data = false;
    }
}

/// 解码会话
pub struct DecoderCore {
    registry: Arc<EngineRegistry>,
    session: Mutex<DecoderSession>,
}

impl DecoderCore {
    pub fn new(registry: Arc<EngineRegistry>) -> Self {
        Self {
            registry,
            session: Mutex::new(DecoderSession {
                state: SessionState::Unallocated,
                engine: None,
                format: Format::new(),
                has_extra_data: false,
                max_input_size: 0,
                pts: PtsTracker::new(),
            }),
        }
    }

    /// 按名称查找并创建引擎解码器
    pub fn allocate_context(&self, name: &str) -> CodecResult<()> {
        let mut session = lock(&self.session);
        let Some(descriptor) = self.registry.find_decoder(name).copied() else {
            error!("引擎中不存在解码器 {name}");
            return Err(CodecError::UnsupportProtocolType);
        };
        let decoder = self.registry.create_decoder(name).map_err(|err| {
            error!("创建 {name} 解码器失败: {err}");
            CodecError::Unknown
        })?;

        session.close();
        session.engine = Some(DecoderEngine {
            descriptor,
            context: CodecContext::new(),
            decoder,
        });
        session.state = SessionState::ContextAllocated;
        debug!("分配 {name} 解码上下文");
        Ok(())
    }

    /// 从格式描述复制解码参数, 输出固定为交错 S16
    pub fn init_context(&self, format: &Format) -> CodecResult<()> {
        let mut session = lock(&self.session);
        let session = &mut *session;
        let Some(engine) = session.engine.as_mut() else {
            return Err(CodecError::WrongState);
        };

        let ctx = &mut engine.context;
        if let Some(channels) = format.get_int(keys::CHANNEL_COUNT).filter(|&c| c > 0) {
            ctx.channels = channels as u32;
            ctx.channel_layout = ChannelLayout::from_channels(ctx.channels);
        }
        if let Some(rate) = format.get_int(keys::SAMPLE_RATE).filter(|&r| r > 0) {
            ctx.sample_rate = rate as u32;
        }
        if let Some(bit_rate) = format.get_long(keys::BITRATE) {
            ctx.bit_rate = bit_rate;
        }
        if let Some(bits) = format.get_int(keys::BITS_PER_CODED_SAMPLE).filter(|&b| b > 0) {
            ctx.bits_per_coded_sample = bits as u32;
        }
        session.max_input_size = format.get_int(keys::MAX_INPUT_SIZE).unwrap_or(0);

        match format.get_buffer(keys::CODEC_CONFIG) {
            Some(config) if !config.is_empty() => {
                ctx.extra_data = config.to_vec();
                session.has_extra_data = true;
            }
            _ => {
                ctx.extra_data.clear();
                session.has_extra_data = false;
            }
        }
        ctx.sample_format = SampleFormat::S16;

        let mut stored = format.clone();
        stored.put_int(
            keys::AUDIO_SAMPLE_FORMAT,
            AudioSampleFormat::S16Le.as_raw(),
        );
        session.format = stored;
        debug!(
            "{} 解码参数: {} Hz, {} 声道, 私有数据 {} 字节",
            engine.descriptor.name,
            ctx.sample_rate,
            ctx.channels,
            ctx.extra_data.len(),
        );
        Ok(())
    }

    /// 打开引擎解码器
    pub fn open_context(&self) -> CodecResult<()> {
        let mut session = lock(&self.session);
        let session = &mut *session;
        let Some(engine) = session.engine.as_mut() else {
            return Err(CodecError::WrongState);
        };
        if let Err(err) = engine.decoder.open(&mut engine.context) {
            error!("打开 {} 解码器失败: {err}", engine.descriptor.name);
            return Err(CodecError::Unknown);
        }
        session.state = SessionState::ContextOpened;
        session.pts = PtsTracker::new();
        Ok(())
    }

    /// 送入一个输入缓冲, EOS 缓冲送入排空包
    pub fn process_send_data(&self, buffer: &CodecBufferInfo) -> CodecResult<()> {
        let mut session = lock(&self.session);
        let session = &mut *session;
        if !session.state.is_open() {
            return Err(CodecError::WrongState);
        }
        let Some(engine) = session.engine.as_mut() else {
            return Err(CodecError::WrongState);
        };

        let packet = if buffer.check_is_eos() {
            Packet::empty()
        } else {
            let payload = buffer.payload();
            if payload.is_empty() {
                debug!("{}: 跳过空输入缓冲", engine.descriptor.name);
                return Ok(());
            }
            let mut packet = Packet::from_data(Bytes::copy_from_slice(payload));
            packet.pts = buffer.buffer_attr().presentation_time_us;
            packet.time_base = Rational::MICRO;
            packet
        };

        match engine.decoder.send_packet(&packet) {
            Ok(()) => {
                session.state = SessionState::Running;
                Ok(())
            }
            Err(EngineError::Again) => Err(CodecError::Again),
            Err(EngineError::Eof) => Err(CodecError::EndOfStream),
            Err(err) => {
                error!("{} 送入数据失败: {err}", engine.descriptor.name);
                Err(CodecError::Unknown)
            }
        }
    }

    /// 取出一帧解码数据写入输出缓冲
    pub fn process_receive_data(&self, buffer: &mut CodecBufferInfo) -> CodecResult<()> {
        let mut session = lock(&self.session);
        let session = &mut *session;
        if !session.state.is_open() {
            return Err(CodecError::WrongState);
        }
        let Some(engine) = session.engine.as_mut() else {
            return Err(CodecError::WrongState);
        };

        match engine.decoder.receive_frame() {
            Ok(frame) => write_frame(&frame, &mut session.pts, buffer),
            Err(EngineError::Eof) => {
                debug!("{} 解码排空完成", engine.descriptor.name);
                buffer.set_eos(true);
                engine.decoder.flush();
                Err(CodecError::EndOfStream)
            }
            Err(EngineError::Again) => Err(CodecError::NotEnoughData),
            Err(err) => {
                error!("{} 取出数据失败: {err}", engine.descriptor.name);
                Err(CodecError::Unknown)
            }
        }
    }

    /// 关闭并丢弃引擎, 之后可以重新分配
    pub fn reset(&self) -> CodecResult<()> {
        let mut session = lock(&self.session);
        session.close();
        session.state = SessionState::Unallocated;
        Ok(())
    }

    /// 清空引擎内部缓存和时间戳推算状态
    pub fn flush(&self) -> CodecResult<()> {
        let mut session = lock(&self.session);
        let session = &mut *session;
        if let Some(engine) = session.engine.as_mut() {
            engine.decoder.flush();
            if session.state.is_open() {
                session.state = SessionState::Flushed;
            }
        }
        session.pts = PtsTracker::new();
        Ok(())
    }

    /// 关闭并丢弃引擎 (可重复调用)
    pub fn release(&self) -> CodecResult<()> {
        let mut session = lock(&self.session);
        session.close();
        session.state = SessionState::Closed;
        Ok(())
    }

    /// 协商后的格式
    pub fn format(&self) -> Format {
        lock(&self.session).format.clone()
    }

    pub fn max_input_size(&self) -> i32 {
        lock(&self.session).max_input_size
    }

    pub fn has_extra_data(&self) -> bool {
        lock(&self.session).has_extra_data
    }

    pub fn state(&self) -> SessionState {
        lock(&self.session).state
    }
}

/// 把解码帧交错写入输出缓冲
fn write_frame(
    frame: &AudioFrame,
    pts: &mut PtsTracker,
    buffer: &mut CodecBufferInfo,
) -> CodecResult<()> {
    let channels = frame.channel_layout.channels as usize;
    let bytes_per_sample = frame.sample_format.bytes_per_sample() as usize;
    let nb_samples = frame.nb_samples as usize;
    let output_size = nb_samples * bytes_per_sample * channels;

    let Some(memory) = buffer.buffer_mut() else {
        return Err(CodecError::NoMemory);
    };
    if memory.capacity() < output_size {
        warn!(
            "{}: 输出缓冲不足, 容量 {} 字节, 需要 {output_size} 字节",
            memory.name(),
            memory.capacity(),
        );
        return Err(CodecError::NoMemory);
    }

    let interleaved = if frame.sample_format.is_planar() {
        interleave(&frame.data, channels, nb_samples, bytes_per_sample)?
    } else {
        let data = frame.data.first().ok_or(CodecError::Unknown)?;
        data.get(..output_size).ok_or(CodecError::Unknown)?.to_vec()
    };

    memory.reset();
    memory.write(&interleaved, Some(0));

    let frame_pts = (frame.pts != NOPTS_VALUE).then_some(frame.pts);
    buffer.set_buffer_attr(BufferAttr {
        presentation_time_us: pts.next(frame_pts),
        size: output_size as i32,
        offset: 0,
    });
    Ok(())
}

/// 平面数据转交错
fn interleave(
    planes: &[Vec<u8>],
    channels: usize,
    nb_samples: usize,
    bytes_per_sample: usize,
) -> CodecResult<Vec<u8>> {
    let plane_size = nb_samples * bytes_per_sample;
    if planes.len() < channels || planes.iter().take(channels).any(|p| p.len() < plane_size) {
        error!(
            "解码帧平面不完整: 需要 {channels} 个 {plane_size} 字节的平面, 实际 {} 个",
            planes.len()
        );
        return Err(CodecError::Unknown);
    }

    let mut out = Vec::with_capacity(plane_size * channels);
    for i in 0..nb_samples {
        let start = i * bytes_per_sample;
        for plane in &planes[..channels] {
            out.extend_from_slice(&plane[start..start + bytes_per_sample]);
        }
    }
    Ok(out)
}
