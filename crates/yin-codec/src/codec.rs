//! 编解码插件 trait 定义.

use yin_core::{CodecResult, Format};

use crate::buffer_info::CodecBufferInfo;

/// 音频编解码插件
///
/// 使用流程:
/// 1. `init()` 校验参数并打开引擎
/// 2. 交替调用 `process_send_data()` / `process_receive_data()`,
///    直到 `process_receive_data()` 返回 `NotEnoughData`
/// 3. 送入 EOS 缓冲后取空剩余数据, 最后一次返回 `EndOfStream`
/// 4. `release()` 释放引擎
pub trait AudioCodec: Send + Sync {
    /// 插件名称 (如 `avdec_aac`)
    fn codec_name(&self) -> &str;

    /// 校验格式参数并打开引擎
    fn init(&mut self, format: &Format) -> CodecResult<()>;

    /// 送入一个输入缓冲
    fn process_send_data(&self, buffer: &CodecBufferInfo) -> CodecResult<()>;

    /// 取出一个输出写入缓冲
    fn process_receive_data(&self, buffer: &mut CodecBufferInfo) -> CodecResult<()>;

    /// 关闭引擎, 之后需要重新 `init()`
    fn reset(&mut self) -> CodecResult<()>;

    /// 释放引擎 (可重复调用)
    fn release(&mut self) -> CodecResult<()>;

    /// 清空引擎内部缓存
    fn flush(&mut self) -> CodecResult<()>;

    /// 输入缓冲大小 (字节)
    fn input_buffer_size(&self) -> usize;

    /// 输出缓冲大小 (字节)
    fn output_buffer_size(&self) -> usize;

    /// 协商后的格式
    fn format(&self) -> Format;
}
