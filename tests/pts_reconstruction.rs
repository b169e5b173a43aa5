//! 解码时间戳推算集成测试.
//!
//! 注册一个脚本化的引擎解码器和包装它的插件, 通过 CodecAdapter 驱动,
//! 检查回调中拿到的输出时间戳. 另用 FLAC 往返验证真实解码器上的插值.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use yin::codec::{
    AudioCodec, BufferAttr, BufferFlag, CodecAdapter, CodecBufferInfo, CodecCallback, DecoderCore,
    PluginKind, PluginRegistry,
};
use yin::core::format::keys;
use yin::core::timestamp::NOPTS_VALUE;
use yin::core::{ChannelLayout, CodecError, CodecResult, Format, SampleFormat};
use yin::engine::{
    AudioFrame, CodecContext, CodecDescriptor, Decoder, EngineRegistry, EngineResult, Packet,
};

// ============================================================
// 脚本化解码器
// ============================================================

/// 每个包的第一个字节为输出帧数, 每帧 2 个单声道采样, 只有首帧带 PTS
struct TickerDecoder {
    pending: VecDeque<AudioFrame>,
    draining: bool,
}

impl TickerDecoder {
    fn create() -> EngineResult<Box<dyn Decoder>> {
        Ok(Box::new(Self {
            pending: VecDeque::new(),
            draining: false,
        }))
    }
}

impl Decoder for TickerDecoder {
    fn name(&self) -> &str {
        "ticker"
    }

    fn open(&mut self, ctx: &mut CodecContext) -> EngineResult<()> {
        ctx.sample_format = SampleFormat::S16p;
        Ok(())
    }

    fn send_packet(&mut self, packet: &Packet) -> EngineResult<()> {
        if packet.is_empty() {
            self.draining = true;
            return Ok(());
        }
        for i in 0..packet.data[0] {
            let mut frame = AudioFrame::new(2, 8000, SampleFormat::S16p, ChannelLayout::MONO);
            let value = i16::from(i);
            frame.data = vec![[value.to_le_bytes(), value.to_le_bytes()].concat()];
            frame.pts = if i == 0 { packet.pts } else { NOPTS_VALUE };
            frame.time_base = packet.time_base;
            self.pending.push_back(frame);
        }
        Ok(())
    }

    fn receive_frame(&mut self) -> EngineResult<AudioFrame> {
        if let Some(frame) = self.pending.pop_front() {
            return Ok(frame);
        }
        if self.draining {
            return Err(yin::engine::EngineError::Eof);
        }
        Err(yin::engine::EngineError::Again)
    }

    fn flush(&mut self) {
        self.pending.clear();
        self.draining = false;
    }
}

const TICKER: CodecDescriptor = CodecDescriptor {
    name: "ticker",
    long_name: "ticker test decoder",
    sample_formats: &[],
    sample_rates: &[],
    channel_layouts: &[],
};

/// 包装 ticker 解码器的插件
struct TickerPlugin {
    core: DecoderCore,
}

impl TickerPlugin {
    fn create(engine: Arc<EngineRegistry>) -> Box<dyn AudioCodec> {
        Box::new(Self {
            core: DecoderCore::new(engine),
        })
    }
}

impl AudioCodec for TickerPlugin {
    fn codec_name(&self) -> &str {
        "avdec_ticker"
    }

    fn init(&mut self, format: &Format) -> CodecResult<()> {
        self.core.allocate_context("ticker")?;
        self.core.init_context(format)?;
        self.core.open_context()
    }

    fn process_send_data(&self, buffer: &CodecBufferInfo) -> CodecResult<()> {
        self.core.process_send_data(buffer)
    }

    fn process_receive_data(&self, buffer: &mut CodecBufferInfo) -> CodecResult<()> {
        self.core.process_receive_data(buffer)
    }

    fn reset(&mut self) -> CodecResult<()> {
        self.core.reset()
    }

    fn release(&mut self) -> CodecResult<()> {
        self.core.release()
    }

    fn flush(&mut self) -> CodecResult<()> {
        self.core.flush()
    }

    fn input_buffer_size(&self) -> usize {
        64
    }

    fn output_buffer_size(&self) -> usize {
        64
    }

    fn format(&self) -> Format {
        self.core.format()
    }
}

/// 适配器配置要求的最小参数集
fn ticker_format() -> Format {
    let mut format = Format::new();
    format
        .put_int(keys::CHANNEL_COUNT, 1)
        .put_int(keys::SAMPLE_RATE, 8000)
        .put_long(keys::BITRATE, 0);
    format
}

fn ticker_registry() -> PluginRegistry {
    let mut engine = EngineRegistry::new();
    engine.register_decoder(TICKER, TickerDecoder::create);
    let mut plugins = PluginRegistry::new(Arc::new(engine));
    plugins.register("avdec_ticker", PluginKind::Decoder, TickerPlugin::create);
    plugins
}

// ============================================================
// 回调
// ============================================================

#[derive(Default)]
struct Recorder {
    inputs: Mutex<VecDeque<u32>>,
    outputs: Mutex<Vec<(u32, BufferAttr, BufferFlag)>>,
    errors: Mutex<Vec<CodecError>>,
}

impl CodecCallback for Recorder {
    fn on_input_buffer_available(&self, index: u32) {
        self.inputs.lock().unwrap().push_back(index);
    }

    fn on_output_buffer_available(&self, index: u32, attr: BufferAttr, flag: BufferFlag) {
        self.outputs.lock().unwrap().push((index, attr, flag));
    }

    fn on_error(&self, error: CodecError) {
        self.errors.lock().unwrap().push(error);
    }
}

/// 依次送入 (帧数, PTS) 描述的包并送入 EOS, 返回所有非 EOS 输出的时间戳
fn decode_timestamps(packets: &[(u8, i64)]) -> Vec<i64> {
    let plugins = ticker_registry();
    let mut adapter = CodecAdapter::new("avdec_ticker", &plugins).unwrap();
    let recorder = Arc::new(Recorder::default());
    adapter.set_callback(recorder.clone()).unwrap();
    adapter.configure(&ticker_format()).unwrap();
    adapter.start().unwrap();

    let mut timestamps = Vec::new();
    let mut saw_eos = false;
    let steps = packets.iter().map(Some).chain(std::iter::once(None));
    for step in steps {
        let index = recorder.inputs.lock().unwrap().pop_front().unwrap();
        let (attr, flag) = match step {
            Some(&(frames, pts)) => {
                let slot = adapter.input_buffer(index).unwrap();
                slot.lock().unwrap().buffer_mut().unwrap().write(&[frames], Some(0));
                let attr = BufferAttr {
                    presentation_time_us: pts,
                    size: 1,
                    offset: 0,
                };
                (attr, BufferFlag::None)
            }
            None => (BufferAttr::default(), BufferFlag::Eos),
        };
        adapter.queue_input_buffer(index, attr, flag).unwrap();

        let ready: Vec<_> = recorder.outputs.lock().unwrap().drain(..).collect();
        for (out_index, attr, flag) in ready {
            if flag == BufferFlag::Eos {
                saw_eos = true;
            } else {
                assert_eq!(attr.size, 4, "2 个 S16 单声道采样");
                timestamps.push(attr.presentation_time_us);
            }
            adapter.release_output_buffer(out_index).unwrap();
        }
    }

    assert!(saw_eos);
    assert!(recorder.errors.lock().unwrap().is_empty());
    adapter.release().unwrap();
    timestamps
}

// ============================================================
// 测试
// ============================================================

#[test]
fn test_每包多帧按包内帧数插值() {
    let timestamps = decode_timestamps(&[(3, 0), (3, 3000), (3, 6000)]);
    // 首包之前没有帧间距, 无 PTS 帧沿用首帧时间戳
    assert_eq!(
        timestamps,
        vec![0, 0, 0, 3000, 4000, 5000, 6000, 7000, 8000]
    );
}

#[test]
fn test_单帧包原样输出() {
    let timestamps = decode_timestamps(&[(1, 0), (1, 1000), (1, 2000), (1, 3000)]);
    assert_eq!(timestamps, vec![0, 1000, 2000, 3000]);
}

#[test]
fn test_时间戳跳变时不插值() {
    let timestamps = decode_timestamps(&[(1, 0), (1, 1000), (2, 2000), (2, 50_000)]);
    // 2000 之后按 1000 间距插值; 跳到 50000 时跨度超过已知间距, 取最近的 PTS
    assert_eq!(timestamps, vec![0, 1000, 2000, 3000, 50_000, 50_000]);
}

#[test]
fn test_first_frame_flag_set_once() {
    let plugins = ticker_registry();
    let mut adapter = CodecAdapter::new("avdec_ticker", &plugins).unwrap();
    let recorder = Arc::new(Recorder::default());
    adapter.set_callback(recorder.clone()).unwrap();
    adapter.configure(&ticker_format()).unwrap();
    adapter.start().unwrap();

    let index = recorder.inputs.lock().unwrap().pop_front().unwrap();
    adapter
        .input_buffer(index)
        .unwrap()
        .lock()
        .unwrap()
        .buffer_mut()
        .unwrap()
        .write(&[2], Some(0));
    let attr = BufferAttr {
        presentation_time_us: 0,
        size: 1,
        offset: 0,
    };
    adapter
        .queue_input_buffer(index, attr, BufferFlag::None)
        .unwrap();

    let outputs: Vec<_> = recorder.outputs.lock().unwrap().drain(..).collect();
    assert_eq!(outputs.len(), 2);
    let first = adapter.output_buffer(outputs[0].0).unwrap();
    assert!(first.lock().unwrap().check_is_first_frame());
    let second = adapter.output_buffer(outputs[1].0).unwrap();
    assert!(!second.lock().unwrap().check_is_first_frame());
}

// ============================================================
// 真实解码器
// ============================================================

#[test]
fn test_flac_解码缺失时间戳按帧间距补齐() {
    let plugins = yin::default_plugin_registry();
    let mut format = Format::new();
    format
        .put_int(keys::SAMPLE_RATE, 48000)
        .put_int(keys::CHANNEL_COUNT, 1)
        .put_int(keys::BITS_PER_CODED_SAMPLE, 16);

    let mut encoder = plugins.create("avenc_flac").unwrap();
    encoder.init(&format).unwrap();
    let stream_info = encoder
        .format()
        .get_buffer(keys::CODEC_CONFIG)
        .map(<[u8]>::to_vec)
        .unwrap();

    // 4 帧, 每帧 4608 个单声道 S16 采样
    let frame_bytes = 4608 * 2;
    let mut input = CodecBufferInfo::new(encoder.input_buffer_size(), "enc_in", 0, 0);
    let mut output = CodecBufferInfo::new(encoder.output_buffer_size(), "enc_out", 0, 0);
    let mut packets = Vec::new();
    for n in 0..4u8 {
        input.reset_buffer();
        input
            .buffer_mut()
            .unwrap()
            .write(&vec![n; frame_bytes], Some(0));
        input.set_buffer_attr(BufferAttr {
            presentation_time_us: 0,
            size: frame_bytes as i32,
            offset: 0,
        });
        encoder.process_send_data(&input).unwrap();
        encoder.process_receive_data(&mut output).unwrap();
        packets.push(output.payload().to_vec());
    }
    encoder.release().unwrap();

    let mut decoder = plugins.create("avdec_flac").unwrap();
    format.put_buffer(keys::CODEC_CONFIG, stream_info);
    decoder.init(&format).unwrap();

    let mut input = CodecBufferInfo::new(decoder.input_buffer_size(), "dec_in", 0, 0);
    let mut output = CodecBufferInfo::new(decoder.output_buffer_size(), "dec_out", 0, 0);
    // 只有前两个包带时间戳: 0 与 96 ms
    let host_pts = [0, 96_000, NOPTS_VALUE, NOPTS_VALUE];
    let mut timestamps = Vec::new();
    for (packet, pts) in packets.iter().zip(host_pts) {
        input.reset_buffer();
        input.buffer_mut().unwrap().write(packet, Some(0));
        input.set_buffer_attr(BufferAttr {
            presentation_time_us: pts,
            size: packet.len() as i32,
            offset: 0,
        });
        decoder.process_send_data(&input).unwrap();
        decoder.process_receive_data(&mut output).unwrap();
        assert_eq!(output.buffer_attr().size, frame_bytes as i32);
        timestamps.push(output.buffer_attr().presentation_time_us);
    }
    assert_eq!(timestamps, vec![0, 96_000, 192_000, 288_000]);
    decoder.release().unwrap();
}
