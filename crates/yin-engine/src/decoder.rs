//! 解码器 trait 定义.

use crate::context::CodecContext;
use crate::error::EngineResult;
use crate::frame::AudioFrame;
use crate::packet::Packet;

/// 解码器 trait
///
/// 解码流程:
/// 1. 调用 `send_packet()` 送入压缩数据
/// 2. 调用 `receive_frame()` 取出解码后的帧, 直到返回 `Again`
/// 3. 送入空包进入排空模式, 取完缓存帧后返回 `Eof`
pub trait Decoder: Send {
    /// 获取解码器名称
    fn name(&self) -> &str;

    /// 使用上下文参数打开解码器
    fn open(&mut self, ctx: &mut CodecContext) -> EngineResult<()>;

    /// 送入一个压缩数据包
    ///
    /// # 返回
    /// - `Ok(())`: 数据包已接受
    /// - `Err(EngineError::Again)`: 内部仍有未取出的帧, 需要先调用 `receive_frame()`
    fn send_packet(&mut self, packet: &Packet) -> EngineResult<()>;

    /// 取出一帧解码数据
    ///
    /// # 返回
    /// - `Err(EngineError::Again)`: 需要送入更多数据包
    /// - `Err(EngineError::Eof)`: 排空完成
    fn receive_frame(&mut self) -> EngineResult<AudioFrame>;

    /// 清空内部状态, 退出排空模式
    fn flush(&mut self);
}
