//! Yin 插件层性能基准测试.
//!
//! 覆盖 FLAC / AAC 编码插件的整帧编码和共享缓冲写入.

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use yin::codec::{AudioCodec, BufferAttr, CodecBufferInfo, MemoryFlags, SharedBuffer};
use yin::core::format::keys;
use yin::core::{AudioChannelLayout, AudioSampleFormat, CodecError, Format};

/// 生成交错 S16 立体声测试数据
fn make_s16_stereo(nb_samples: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(nb_samples * 4);
    for i in 0..nb_samples {
        let v = ((i % 256) as i16).wrapping_mul(100);
        data.extend_from_slice(&v.to_le_bytes());
        data.extend_from_slice(&(-v).to_le_bytes());
    }
    data
}

/// 生成交错 F32 立体声测试数据
fn make_f32_stereo(nb_samples: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(nb_samples * 8);
    for i in 0..nb_samples {
        let v = (i as f32 * 0.05).sin() * 0.5;
        data.extend_from_slice(&v.to_le_bytes());
        data.extend_from_slice(&v.to_le_bytes());
    }
    data
}

/// 送入一帧并取出全部数据包
fn encode_once(codec: &dyn AudioCodec, input: &CodecBufferInfo, output: &mut CodecBufferInfo) {
    codec.process_send_data(input).unwrap();
    loop {
        match codec.process_receive_data(output) {
            Ok(()) => {
                black_box(output.buffer_attr());
            }
            Err(CodecError::NotEnoughData) => break,
            Err(err) => panic!("编码失败: {err}"),
        }
    }
}

fn filled_input(codec: &dyn AudioCodec, data: &[u8]) -> CodecBufferInfo {
    let mut input = CodecBufferInfo::new(codec.input_buffer_size(), "bench_in", 0, 0);
    input.buffer_mut().unwrap().write(data, Some(0));
    input.set_buffer_attr(BufferAttr {
        presentation_time_us: 0,
        size: data.len() as i32,
        offset: 0,
    });
    input
}

fn bench_flac_plugin_encode(c: &mut Criterion) {
    let plugins = yin::default_plugin_registry();
    let mut encoder = plugins.create("avenc_flac").unwrap();
    let mut format = Format::new();
    format
        .put_int(keys::SAMPLE_RATE, 44100)
        .put_int(keys::CHANNEL_COUNT, 2)
        .put_int(keys::BITS_PER_CODED_SAMPLE, 16);
    encoder.init(&format).unwrap();

    let input = filled_input(encoder.as_ref(), &make_s16_stereo(4608));
    let mut output = CodecBufferInfo::new(encoder.output_buffer_size(), "bench_out", 0, 0);
    c.bench_function("avenc_flac_4608_s16_stereo", |b| {
        b.iter(|| encode_once(encoder.as_ref(), black_box(&input), &mut output));
    });
}

fn bench_aac_plugin_encode(c: &mut Criterion) {
    let plugins = yin::default_plugin_registry();
    let mut encoder = plugins.create("avenc_aac").unwrap();
    let mut format = Format::new();
    format
        .put_int(keys::AUDIO_SAMPLE_FORMAT, AudioSampleFormat::F32p.as_raw())
        .put_long(keys::CHANNEL_LAYOUT, AudioChannelLayout::Stereo.as_raw())
        .put_int(keys::CHANNEL_COUNT, 2)
        .put_int(keys::SAMPLE_RATE, 44100)
        .put_long(keys::BITRATE, 128_000);
    encoder.init(&format).unwrap();

    let input = filled_input(encoder.as_ref(), &make_f32_stereo(1024));
    let mut output = CodecBufferInfo::new(encoder.output_buffer_size(), "bench_out", 0, 0);
    c.bench_function("avenc_aac_1024_f32_stereo", |b| {
        b.iter(|| encode_once(encoder.as_ref(), black_box(&input), &mut output));
    });
}

fn bench_shared_buffer_write(c: &mut Criterion) {
    let data = vec![0x5Au8; 16384];
    let mut buffer = SharedBuffer::new(65536, "bench", MemoryFlags::ReadWrite, 64);
    c.bench_function("shared_buffer_write_4x16k", |b| {
        b.iter(|| {
            buffer.reset();
            for _ in 0..4 {
                black_box(buffer.write(black_box(&data), None));
            }
        });
    });
}

criterion_group!(
    benches,
    bench_flac_plugin_encode,
    bench_aac_plugin_encode,
    bench_shared_buffer_write
);
criterion_main!(benches);
