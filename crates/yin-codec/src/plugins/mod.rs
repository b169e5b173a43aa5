//! 编解码插件实现.
//!
//! 每个插件在通用会话之上做参数校验和缓冲大小计算:
//! - 解码: `avdec_aac`, `avdec_mp3`, `avdec_flac`, `avdec_vorbis`
//! - 编码: `avenc_aac`, `avenc_flac`

/// 生成委托给内部会话的收发与生命周期方法
macro_rules! delegate_to_core {
    () => {
        fn process_send_data(
            &self,
            buffer: &$crate::buffer_info::CodecBufferInfo,
        ) -> ::yin_core::CodecResult<()> {
            self.core.process_send_data(buffer)
        }

        fn process_receive_data(
            &self,
            buffer: &mut $crate::buffer_info::CodecBufferInfo,
        ) -> ::yin_core::CodecResult<()> {
            self.core.process_receive_data(buffer)
        }

        fn reset(&mut self) -> ::yin_core::CodecResult<()> {
            self.core.reset()
        }

        fn release(&mut self) -> ::yin_core::CodecResult<()> {
            self.core.release()
        }

        fn flush(&mut self) -> ::yin_core::CodecResult<()> {
            self.core.flush()
        }
    };
}

pub mod aac_decoder;
pub mod aac_encoder;
pub mod flac_decoder;
pub mod flac_encoder;
pub mod mp3_decoder;
pub mod vorbis_decoder;

use yin_core::{CodecError, CodecResult, Format};

pub use aac_decoder::AacDecoderPlugin;
pub use aac_encoder::{AacEncoderPlugin, adts_header};
pub use flac_decoder::FlacDecoderPlugin;
pub use flac_encoder::FlacEncoderPlugin;
pub use mp3_decoder::Mp3DecoderPlugin;
pub use vorbis_decoder::VorbisDecoderPlugin;

/// FLAC 插件接受的采样率
pub(crate) const FLAC_SAMPLE_RATES: [i32; 11] = [
    88200, 176400, 192000, 8000, 16000, 22050, 24000, 32000, 44100, 48000, 96000,
];

/// 最大声道数
pub(crate) const MAX_CHANNELS: i32 = 8;

/// 客户端给出的输入缓冲大小在 `1..=limit` 内时采用, 否则取默认值
pub(crate) fn input_size_within(max_input_size: i32, limit: usize, default: usize) -> usize {
    match usize::try_from(max_input_size) {
        Ok(size) if (1..=limit).contains(&size) => size,
        _ => default,
    }
}

/// 读取必需的 int 键, 缺失时返回给定错误
pub(crate) fn required_int(format: &Format, key: &str, err: CodecError) -> CodecResult<i32> {
    format.get_int(key).ok_or(err)
}

/// 注册了全部内置引擎实现的注册表
#[cfg(test)]
pub(crate) fn test_engine() -> std::sync::Arc<yin_engine::EngineRegistry> {
    let mut registry = yin_engine::EngineRegistry::new();
    yin_engine::register_all(&mut registry);
    std::sync::Arc::new(registry)
}
