//! AAC 编码插件 + ADTS 封装 集成测试.
//!
//! 交错 F32 PCM → avenc_aac → 带 ADTS 头的数据包, 逐包校验 ADTS 头字段
//! 与负载长度、时间戳以及排空行为.

use yin::codec::converter::convert_pts_to_us;
use yin::codec::{AudioCodec, BufferAttr, CodecBufferInfo};
use yin::core::format::keys;
use yin::core::{AudioChannelLayout, AudioSampleFormat, CodecError, Format, Rational};

/// AAC 每帧采样数
const AAC_FRAME_SIZE: usize = 1024;

// ============================================================
// 辅助函数
// ============================================================

/// 生成 F32 交错正弦波帧数据
fn generate_sine_f32(sample_rate: u32, freq: f64, nb_samples: usize, channels: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(nb_samples * channels as usize * 4);
    for i in 0..nb_samples {
        let t = i as f64 / f64::from(sample_rate);
        let value = ((t * freq * 2.0 * std::f64::consts::PI).sin() * 0.5) as f32;
        for _ in 0..channels {
            buf.extend_from_slice(&value.to_le_bytes());
        }
    }
    buf
}

fn aac_format(layout: AudioChannelLayout, sample_rate: i32) -> Format {
    let mut format = Format::new();
    format
        .put_int(keys::AUDIO_SAMPLE_FORMAT, AudioSampleFormat::F32p.as_raw())
        .put_long(keys::CHANNEL_LAYOUT, layout.as_raw())
        .put_int(keys::CHANNEL_COUNT, layout.channels() as i32)
        .put_int(keys::SAMPLE_RATE, sample_rate)
        .put_long(keys::BITRATE, 128_000);
    format
}

/// 解析出的 ADTS 头字段
#[derive(Debug, PartialEq, Eq)]
struct AdtsFields {
    profile: u8,
    freq_index: u8,
    channel_config: u8,
    frame_length: usize,
}

fn parse_adts(data: &[u8]) -> AdtsFields {
    assert!(data.len() >= 7, "数据包短于 ADTS 头");
    assert_eq!(data[0], 0xFF);
    assert_eq!(data[1], 0xF1, "MPEG-4, 无 CRC");
    assert_eq!(data[6], 0xFC, "单个原始数据块");
    AdtsFields {
        profile: data[2] >> 6,
        freq_index: (data[2] >> 2) & 0xF,
        channel_config: ((data[2] & 1) << 2) | (data[3] >> 6),
        frame_length: (usize::from(data[3] & 3) << 11)
            | (usize::from(data[4]) << 3)
            | usize::from(data[5] >> 5),
    }
}

/// 编码全部输入并排空, 返回 (数据包, 时间戳)
fn encode_all(codec: &dyn AudioCodec, pcm: &[u8], chunk_bytes: usize) -> Vec<(Vec<u8>, i64)> {
    let mut input = CodecBufferInfo::new(codec.input_buffer_size(), "aac_in", 0, 0);
    let mut output = CodecBufferInfo::new(codec.output_buffer_size(), "aac_out", 0, 0);
    let mut packets = Vec::new();

    let mut collect = |output: &mut CodecBufferInfo, packets: &mut Vec<(Vec<u8>, i64)>| loop {
        match codec.process_receive_data(output) {
            Ok(()) => packets.push((
                output.buffer().unwrap().data().to_vec(),
                output.buffer_attr().presentation_time_us,
            )),
            Err(CodecError::NotEnoughData) => return false,
            Err(CodecError::EndOfStream) => return true,
            Err(err) => panic!("取出数据失败: {err}"),
        }
    };

    for chunk in pcm.chunks(chunk_bytes) {
        input.reset_buffer();
        input.buffer_mut().unwrap().write(chunk, Some(0));
        input.set_buffer_attr(BufferAttr {
            presentation_time_us: 0,
            size: chunk.len() as i32,
            offset: 0,
        });
        codec.process_send_data(&input).unwrap();
        assert!(!collect(&mut output, &mut packets));
    }

    input.reset_buffer();
    input.set_buffer_attr(BufferAttr::default());
    input.set_eos(true);
    codec.process_send_data(&input).unwrap();
    assert!(collect(&mut output, &mut packets), "排空后应返回 EndOfStream");
    packets
}

// ============================================================
// 测试
// ============================================================

#[test]
fn test_aac_stereo_adts_framing() {
    let plugins = yin::default_plugin_registry();
    let mut encoder = plugins.create("avenc_aac").unwrap();
    encoder
        .init(&aac_format(AudioChannelLayout::Stereo, 44100))
        .unwrap();

    let frames = 5;
    let pcm = generate_sine_f32(44100, 440.0, AAC_FRAME_SIZE * frames, 2);
    let packets = encode_all(encoder.as_ref(), &pcm, AAC_FRAME_SIZE * 2 * 4);
    assert!(packets.len() > frames, "排空应输出剩余帧");

    let time_base = Rational::new(1, 44100);
    for (k, (data, pts)) in packets.iter().enumerate() {
        let header = parse_adts(data);
        assert_eq!(
            header,
            AdtsFields {
                profile: 1,
                freq_index: 4,
                channel_config: 2,
                frame_length: data.len(),
            }
        );
        let expected = convert_pts_to_us((k * AAC_FRAME_SIZE) as i64, time_base);
        assert_eq!(*pts, expected, "第 {k} 个数据包的时间戳");
    }
    encoder.release().unwrap();
}

#[test]
fn test_aac_单声道_48k() {
    let plugins = yin::default_plugin_registry();
    let mut encoder = plugins.create("avenc_aac").unwrap();
    encoder
        .init(&aac_format(AudioChannelLayout::Mono, 48000))
        .unwrap();
    // 单声道 LC 48 kHz: object type 2, 索引 3, 声道 1
    assert_eq!(
        encoder.format().get_buffer(keys::CODEC_CONFIG),
        Some(&[0x11, 0x88][..])
    );

    let pcm = generate_sine_f32(48000, 1000.0, AAC_FRAME_SIZE * 2, 1);
    let packets = encode_all(encoder.as_ref(), &pcm, AAC_FRAME_SIZE * 4);
    for (data, _) in &packets {
        let header = parse_adts(data);
        assert_eq!(header.freq_index, 3);
        assert_eq!(header.channel_config, 1);
        assert_eq!(header.frame_length, data.len());
    }
    assert_eq!(packets[1].1, 21_333);
}

#[test]
fn test_aac_flush_restarts_timestamps() {
    let plugins = yin::default_plugin_registry();
    let mut encoder = plugins.create("avenc_aac").unwrap();
    encoder
        .init(&aac_format(AudioChannelLayout::Stereo, 44100))
        .unwrap();

    let pcm = vec![0u8; AAC_FRAME_SIZE * 2 * 4 * 2];
    let first = encode_all(encoder.as_ref(), &pcm, AAC_FRAME_SIZE * 2 * 4);
    assert!(first.len() >= 2);
    assert!(first[1].1 > 0);

    encoder.flush().unwrap();
    let second = encode_all(encoder.as_ref(), &pcm, AAC_FRAME_SIZE * 2 * 4);
    assert_eq!(second[0].1, 0, "flush 后时间戳从 0 重新累加");
}

#[test]
fn test_aac_较小输出缓冲返回_no_memory() {
    let plugins = yin::default_plugin_registry();
    let mut encoder = plugins.create("avenc_aac").unwrap();
    encoder
        .init(&aac_format(AudioChannelLayout::Stereo, 44100))
        .unwrap();

    let pcm = generate_sine_f32(44100, 440.0, AAC_FRAME_SIZE, 2);
    let mut input = CodecBufferInfo::new(encoder.input_buffer_size(), "aac_in", 0, 0);
    input.buffer_mut().unwrap().write(&pcm, None);
    encoder.process_send_data(&input).unwrap();

    // 只放得下 ADTS 头
    let mut output = CodecBufferInfo::new(7, "tiny", 0, 0);
    assert_eq!(
        encoder.process_receive_data(&mut output),
        Err(CodecError::NoMemory)
    );
}
