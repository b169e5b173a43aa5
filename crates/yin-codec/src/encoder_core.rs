//! 编码会话 (EncoderCore).
//!
//! 持有一个引擎编码器. 输入缓冲为交错 PCM, 按引擎帧长组装成一帧后送入;
//! 取出的数据包可在前面插入由回调生成的封装头 (如 ADTS).
//! 输出时间戳为之前所有数据包时长之和, 首包为 0.

use std::fmt;
use std::sync::{Arc, Mutex};

use log::{debug, error, warn};
use yin_core::format::keys;
use yin_core::timestamp::NOPTS_VALUE;
use yin_core::{
    AudioChannelLayout, AudioSampleFormat, ChannelLayout, CodecError, CodecResult, Format,
    SampleFormat,
};
use yin_engine::{
    AudioFrame, CodecContext, CodecDescriptor, Encoder, EngineError, EngineRegistry,
};

use crate::buffer_info::{BufferAttr, CodecBufferInfo};
use crate::converter::{
    convert_channel_layout_to_engine, convert_pts_to_us, convert_sample_format_to_engine,
};
use crate::session::{SessionState, lock};

/// 封装头生成函数: 参数为编码上下文和负载长度
pub type HeaderFn = Box<dyn Fn(&CodecContext, usize) -> Vec<u8> + Send>;

struct EncoderEngine {
    descriptor: CodecDescriptor,
    context: CodecContext,
    encoder: Box<dyn Encoder>,
    /// 复用的输入帧
    frame: Option<AudioFrame>,
}

struct EncoderSession {
    state: SessionState,
    engine: Option<EncoderEngine>,
    format: Format,
    max_input_size: i32,
    header_fn: Option<HeaderFn>,
    /// 已输出数据包的累计时长 (以上下文时间基为单位)
    total_duration: i64,
}

impl EncoderSession {
    fn close(&mut self) {
        if let Some(engine) = self.engine.take() {
            debug!("关闭 {} 编码器", engine.descriptor.name);
        }
        self.total_duration = 0;
    }
}

/// 编码会话
pub struct EncoderCore {
    registry: Arc<EngineRegistry>,
    session: Mutex<EncoderSession>,
}

impl EncoderCore {
    pub fn new(registry: Arc<EngineRegistry>) -> Self {
        Self {
            registry,
            session: Mutex::new(EncoderSession {
                state: SessionState::Unallocated,
                engine: None,
                format: Format::new(),
                max_input_size: 0,
                header_fn: None,
                total_duration: 0,
            }),
        }
    }

    /// 按名称查找并创建引擎编码器
    pub fn allocate_context(&self, name: &str) -> CodecResult<()> {
        let mut session = lock(&self.session);
        let Some(descriptor) = self.registry.find_encoder(name).copied() else {
            error!("引擎中不存在编码器 {name}");
            return Err(CodecError::UnsupportProtocolType);
        };
        let encoder = self.registry.create_encoder(name).map_err(|err| {
            error!("创建 {name} 编码器失败: {err}");
            CodecError::Unknown
        })?;

        session.close();
        session.engine = Some(EncoderEngine {
            descriptor,
            context: CodecContext::new(),
            encoder,
            frame: None,
        });
        session.state = SessionState::ContextAllocated;
        debug!("分配 {name} 编码上下文");
        Ok(())
    }

    /// 引擎编码器描述, 未分配时为 None
    pub fn descriptor(&self) -> Option<CodecDescriptor> {
        lock(&self.session)
            .engine
            .as_ref()
            .map(|engine| engine.descriptor)
    }

    /// 从格式描述复制编码参数
    ///
    /// 声道布局和采样格式经转换表映射到引擎取值, 映射失败返回 `Unknown`.
    /// 未给出声道布局时按声道数取默认布局.
    pub fn init_context(&self, format: &Format) -> CodecResult<()> {
        let mut session = lock(&self.session);
        let session = &mut *session;
        let Some(engine) = session.engine.as_mut() else {
            return Err(CodecError::WrongState);
        };
        let name = engine.descriptor.name;
        let ctx = &mut engine.context;

        let channels = format
            .get_int(keys::CHANNEL_COUNT)
            .filter(|&c| c > 0)
            .map_or(0, |c| c as u32);
        if let Some(rate) = format.get_int(keys::SAMPLE_RATE).filter(|&r| r > 0) {
            ctx.sample_rate = rate as u32;
        }
        if let Some(bit_rate) = format.get_long(keys::BITRATE) {
            ctx.bit_rate = bit_rate;
        }
        if let Some(bits) = format.get_int(keys::BITS_PER_CODED_SAMPLE).filter(|&b| b > 0) {
            ctx.bits_per_coded_sample = bits as u32;
        }
        if let Some(level) = format.get_int(keys::COMPLIANCE_LEVEL) {
            ctx.compliance = level;
        }
        session.max_input_size = format.get_int(keys::MAX_INPUT_SIZE).unwrap_or(0);

        ctx.channel_layout = match format.get_long(keys::CHANNEL_LAYOUT) {
            Some(raw) => {
                let mask = convert_channel_layout_to_engine(AudioChannelLayout::from_raw(raw));
                if mask.is_empty() {
                    error!("{name}: 无法映射声道布局 0x{raw:x}");
                    return Err(CodecError::Unknown);
                }
                ChannelLayout::from_mask(mask)
            }
            None => ChannelLayout::from_channels(channels),
        };
        ctx.channels = if channels > 0 {
            channels
        } else {
            ctx.channel_layout.channels
        };

        let raw_format = format
            .get_int(keys::AUDIO_SAMPLE_FORMAT)
            .unwrap_or(AudioSampleFormat::InvalidWidth.as_raw());
        ctx.sample_format = convert_sample_format_to_engine(AudioSampleFormat::from_raw(raw_format));
        if ctx.sample_format == SampleFormat::None {
            error!("{name}: 无法映射采样格式 {raw_format}");
            return Err(CodecError::Unknown);
        }

        session.format = format.clone();
        debug!(
            "{name} 编码参数: {} Hz, {} 声道, 布局 {}, 格式 {}, 码率 {}",
            ctx.sample_rate, ctx.channels, ctx.channel_layout, ctx.sample_format, ctx.bit_rate,
        );
        Ok(())
    }

    /// 以 AAC 等需要 profile 的编码器设置上下文 profile
    pub fn set_profile(&self, profile: i32) -> CodecResult<()> {
        let mut session = lock(&self.session);
        let engine = session.engine.as_mut().ok_or(CodecError::WrongState)?;
        engine.context.profile = profile;
        Ok(())
    }

    /// 打开引擎编码器
    pub fn open_context(&self) -> CodecResult<()> {
        let mut session = lock(&self.session);
        let session = &mut *session;
        let Some(engine) = session.engine.as_mut() else {
            return Err(CodecError::WrongState);
        };
        if let Err(err) = engine.encoder.open(&mut engine.context) {
            error!("打开 {} 编码器失败: {err}", engine.descriptor.name);
            return Err(CodecError::Unknown);
        }
        session.state = SessionState::ContextOpened;
        session.total_duration = 0;
        Ok(())
    }

    /// 按协商后的帧长分配输入帧
    pub fn init_frame(&self) -> CodecResult<()> {
        let mut session = lock(&self.session);
        let engine = session.engine.as_mut().ok_or(CodecError::WrongState)?;
        let ctx = &engine.context;
        let mut frame = AudioFrame::new(
            ctx.frame_size,
            ctx.sample_rate,
            ctx.sample_format,
            ctx.channel_layout,
        );
        frame.time_base = ctx.time_base;
        if let Err(err) = frame.alloc_buffers() {
            error!("{} 分配输入帧失败: {err}", engine.descriptor.name);
            return Err(CodecError::NoMemory);
        }
        engine.frame = Some(frame);
        Ok(())
    }

    /// 注册封装头生成函数
    pub fn register_header_func(&self, header_fn: HeaderFn) {
        lock(&self.session).header_fn = Some(header_fn);
    }

    /// 送入一个交错 PCM 输入缓冲, EOS 缓冲进入排空
    pub fn process_send_data(&self, buffer: &CodecBufferInfo) -> CodecResult<()> {
        let mut session = lock(&self.session);
        let session = &mut *session;
        if !session.state.is_open() {
            return Err(CodecError::WrongState);
        }
        let Some(engine) = session.engine.as_mut() else {
            return Err(CodecError::WrongState);
        };
        let name = engine.descriptor.name;

        let result = if buffer.check_is_eos() {
            engine.encoder.send_frame(None)
        } else {
            let frame = engine.frame.as_mut().ok_or(CodecError::WrongState)?;
            if let Err(err) = frame.make_writable() {
                error!("{name} 输入帧不可写: {err}");
                return Err(CodecError::Unknown);
            }
            let input = buffer.payload();
            let frame_bytes = frame.plane_size() * frame.plane_count();
            if input.len() > frame_bytes {
                warn!(
                    "{name}: 输入 {} 字节超过一帧 {frame_bytes} 字节, 多余部分被丢弃",
                    input.len()
                );
            }
            fill_frame(frame, input);
            frame.pts = NOPTS_VALUE;
            engine.encoder.send_frame(Some(&*frame))
        };

        match result {
            Ok(()) => {
                session.state = SessionState::Running;
                Ok(())
            }
            Err(EngineError::Again) => Err(CodecError::Again),
            Err(EngineError::Eof) => Err(CodecError::EndOfStream),
            Err(err) => {
                error!("{name} 送入数据失败: {err}");
                Err(CodecError::Unknown)
            }
        }
    }

    /// 取出一个数据包写入输出缓冲, 注册了封装头时先写入头部
    pub fn process_receive_data(&self, buffer: &mut CodecBufferInfo) -> CodecResult<()> {
        let mut session = lock(&self.session);
        let session = &mut *session;
        if !session.state.is_open() {
            return Err(CodecError::WrongState);
        }
        let Some(engine) = session.engine.as_mut() else {
            return Err(CodecError::WrongState);
        };
        let name = engine.descriptor.name;

        let packet = match engine.encoder.receive_packet() {
            Ok(packet) => packet,
            Err(EngineError::Eof) => {
                debug!("{name} 编码排空完成");
                buffer.set_eos(true);
                engine.encoder.flush();
                return Err(CodecError::EndOfStream);
            }
            Err(EngineError::Again) => return Err(CodecError::NotEnoughData),
            Err(err) => {
                error!("{name} 取出数据失败: {err}");
                return Err(CodecError::Unknown);
            }
        };

        let header = match session.header_fn.as_ref() {
            Some(header_fn) => {
                let header = header_fn(&engine.context, packet.size());
                if header.is_empty() {
                    error!("{name}: 封装头生成失败");
                    return Err(CodecError::Unknown);
                }
                header
            }
            None => Vec::new(),
        };

        let total = header.len() + packet.size();
        let Some(memory) = buffer.buffer_mut() else {
            return Err(CodecError::NoMemory);
        };
        if memory.capacity() < total {
            warn!(
                "{}: 输出缓冲不足, 容量 {} 字节, 需要 {total} 字节",
                memory.name(),
                memory.capacity(),
            );
            return Err(CodecError::NoMemory);
        }
        memory.reset();
        memory.write(&header, Some(0));
        memory.write(&packet.data, None);

        let time_base = engine.context.time_base;
        let pts = convert_pts_to_us(session.total_duration, time_base);
        session.total_duration += packet.duration;
        buffer.set_buffer_attr(BufferAttr {
            presentation_time_us: pts,
            size: total as i32,
            offset: 0,
        });
        Ok(())
    }

    /// 关闭并丢弃引擎, 之后可以重新分配
    pub fn reset(&self) -> CodecResult<()> {
        let mut session = lock(&self.session);
        session.close();
        session.state = SessionState::Unallocated;
        Ok(())
    }

    /// 清空引擎内部缓存, 时长累计归零
    pub fn flush(&self) -> CodecResult<()> {
        let mut session = lock(&self.session);
        let session = &mut *session;
        if let Some(engine) = session.engine.as_mut() {
            engine.encoder.flush();
            if session.state.is_open() {
                session.state = SessionState::Flushed;
            }
        }
        session.total_duration = 0;
        Ok(())
    }

    /// 关闭并丢弃引擎 (可重复调用)
    pub fn release(&self) -> CodecResult<()> {
        let mut session = lock(&self.session);
        session.close();
        session.state = SessionState::Closed;
        Ok(())
    }

    /// 协商后的格式, 引擎生成了私有数据时附带 `codec_config`
    pub fn format(&self) -> Format {
        let session = lock(&self.session);
        let mut format = session.format.clone();
        if let Some(engine) = session.engine.as_ref() {
            if !engine.context.extra_data.is_empty() {
                format.put_buffer(keys::CODEC_CONFIG, engine.context.extra_data.clone());
            }
        }
        format
    }

    pub fn max_input_size(&self) -> i32 {
        lock(&self.session).max_input_size
    }

    /// 引擎帧长 (每声道采样数), 未打开时为 0
    pub fn frame_size(&self) -> u32 {
        lock(&self.session)
            .engine
            .as_ref()
            .map_or(0, |engine| engine.context.frame_size)
    }

    pub fn state(&self) -> SessionState {
        lock(&self.session).state
    }
}

impl fmt::Debug for EncoderCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let session = lock(&self.session);
        f.debug_struct("EncoderCore")
            .field("state", &session.state)
            .field(
                "encoder",
                &session.engine.as_ref().map(|engine| engine.descriptor.name),
            )
            .field("total_duration", &session.total_duration)
            .finish()
    }
}

/// 把交错 PCM 填入输入帧, 不足一帧的部分补零, 超出的部分丢弃
fn fill_frame(frame: &mut AudioFrame, input: &[u8]) {
    let bytes_per_sample = frame.sample_format.bytes_per_sample() as usize;
    if frame.sample_format.is_planar() {
        let channels = frame.data.len();
        let stride = bytes_per_sample * channels;
        for plane in frame.data.iter_mut() {
            plane.fill(0);
        }
        for (i, sample) in input.chunks_exact(stride).enumerate() {
            let start = i * bytes_per_sample;
            for (ch, plane) in frame.data.iter_mut().enumerate() {
                let Some(dst) = plane.get_mut(start..start + bytes_per_sample) else {
                    return;
                };
                dst.copy_from_slice(&sample[ch * bytes_per_sample..(ch + 1) * bytes_per_sample]);
            }
        }
    } else if let Some(plane) = frame.data.first_mut() {
        let copied = input.len().min(plane.len());
        plane[..copied].copy_from_slice(&input[..copied]);
        plane[copied..].fill(0);
    }
}
