//! 编码器 trait 定义.

use crate::context::CodecContext;
use crate::error::EngineResult;
use crate::frame::AudioFrame;
use crate::packet::Packet;

/// 编码器 trait
///
/// 编码流程:
/// 1. 调用 `send_frame()` 送入原始帧
/// 2. 调用 `receive_packet()` 取出压缩数据包, 直到返回 `Again`
/// 3. 送入 `None` 进入排空模式, 取完缓存包后返回 `Eof`
pub trait Encoder: Send {
    /// 获取编码器名称
    fn name(&self) -> &str;

    /// 使用上下文参数打开编码器
    ///
    /// 成功后回写 `frame_size`、`time_base` 和 `extra_data`.
    fn open(&mut self, ctx: &mut CodecContext) -> EngineResult<()>;

    /// 送入一帧原始数据, `None` 表示排空
    ///
    /// 内部仍有未取出的数据包时返回 `Err(EngineError::Again)`.
    fn send_frame(&mut self, frame: Option<&AudioFrame>) -> EngineResult<()>;

    /// 取出一个压缩数据包
    fn receive_packet(&mut self) -> EngineResult<Packet>;

    /// 清空内部状态, 退出排空模式
    fn flush(&mut self);
}
