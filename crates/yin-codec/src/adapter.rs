//! 编解码适配器.
//!
//! 在插件之上提供客户端可见的状态机和输入/输出缓冲池:
//!
//! ```text
//! Released ─configure─▶ Initialized ─start─▶ Running ─flush─▶ Flushed
//!     ▲                      ▲                  │                │
//!     └───── release ────────┴────── stop ──────┴───── start ────┘
//! ```
//!
//! 每次 `queue_input_buffer()` 同步执行一步处理: 送入输入缓冲, 把能取出的数据
//! 全部写入输出槽位并通过回调通知, 最后归还输入槽位并重新交给客户端.
//!
//! 输出槽位被客户端占满且插件返回 `Again` 时, 输入槽位留在待送队列中,
//! 直到 `release_output_buffer()` 腾出槽位后再按提交顺序重新送入.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use log::{debug, error, info, warn};
use yin_core::format::keys;
use yin_core::{CodecError, CodecResult, Format};

use crate::buffer_info::{BufferAttr, BufferFlag, BufferStatus};
use crate::buffers_manager::{BuffersManager, SharedBufferInfo};
use crate::codec::AudioCodec;
use crate::registry::PluginRegistry;
use crate::session::lock;

/// 输入缓冲池名称
const INPUT_POOL: &str = "input_buffer";
/// 输出缓冲池名称
const OUTPUT_POOL: &str = "output_buffer";

/// 适配器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecState {
    Released,
    Initializing,
    Initialized,
    Starting,
    Running,
    Stopping,
    Flushing,
    Flushed,
    Resuming,
    Releasing,
}

impl fmt::Display for CodecState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Released => "RELEASED",
            Self::Initializing => "INITIALIZING",
            Self::Initialized => "INITIALIZED",
            Self::Starting => "STARTING",
            Self::Running => "RUNNING",
            Self::Stopping => "STOPPING",
            Self::Flushing => "FLUSHING",
            Self::Flushed => "FLUSHED",
            Self::Resuming => "RESUMING",
            Self::Releasing => "RELEASING",
        };
        write!(f, "{name}")
    }
}

/// 客户端回调
///
/// 回调在适配器方法内部同步调用, 实现中不能再调用同一个适配器.
pub trait CodecCallback: Send + Sync {
    /// 输入槽位可写
    fn on_input_buffer_available(&self, index: u32);

    /// 输出槽位就绪
    fn on_output_buffer_available(&self, index: u32, attr: BufferAttr, flag: BufferFlag);

    /// 处理出错
    fn on_error(&self, error: CodecError);
}

struct BufferPools {
    input: BuffersManager,
    output: BuffersManager,
}

impl BufferPools {
    fn set_running(&self, running: bool) {
        self.input.set_running(running);
        self.output.set_running(running);
    }

    fn release_all(&self) {
        self.input.release_all();
        self.output.release_all();
    }
}

/// 编解码适配器
pub struct CodecAdapter {
    name: String,
    codec: Box<dyn AudioCodec>,
    callback: Option<Arc<dyn CodecCallback>>,
    state: CodecState,
    pools: Option<BufferPools>,
    /// 已提交但插件暂不接收的输入槽位
    pending_inputs: VecDeque<u32>,
    first_frame: bool,
    /// 已向客户端交出 EOS 输出
    output_eos: bool,
}

impl CodecAdapter {
    /// 按插件名创建适配器, 未注册的名称返回 `UnsupportProtocolType`
    pub fn new(name: &str, registry: &PluginRegistry) -> CodecResult<Self> {
        let codec = registry.create(name)?;
        debug!("创建适配器 {name}");
        Ok(Self {
            name: name.to_string(),
            codec,
            callback: None,
            state: CodecState::Released,
            pools: None,
            pending_inputs: VecDeque::new(),
            first_frame: true,
            output_eos: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CodecState {
        self.state
    }

    /// 设置回调, 仅在启动前允许
    pub fn set_callback(&mut self, callback: Arc<dyn CodecCallback>) -> CodecResult<()> {
        if !matches!(
            self.state,
            CodecState::Released | CodecState::Initializing | CodecState::Initialized
        ) {
            error!("{}: 状态 {} 下不能设置回调", self.name, self.state);
            return Err(CodecError::InvalidState);
        }
        self.callback = Some(callback);
        Ok(())
    }

    /// 校验必需参数, 初始化插件并创建缓冲池
    pub fn configure(&mut self, format: &Format) -> CodecResult<()> {
        if !format.contains_key(keys::CHANNEL_COUNT) {
            error!("{}: 缺少 channel_count", self.name);
            return Err(CodecError::ConfigureMismatchChannelCount);
        }
        if !format.contains_key(keys::SAMPLE_RATE) {
            error!("{}: 缺少 sample_rate", self.name);
            return Err(CodecError::MismatchSampleRate);
        }
        if !format.contains_key(keys::BITRATE) {
            error!("{}: 缺少 bitrate", self.name);
            return Err(CodecError::MismatchBitRate);
        }
        if self.state != CodecState::Released {
            error!("{}: 状态 {} 下不能配置", self.name, self.state);
            return Err(CodecError::InvalidState);
        }

        self.transition(CodecState::Initializing);
        if let Err(err) = self.codec.init(format) {
            error!("{}: 插件初始化失败: {err}", self.name);
            self.state = CodecState::Released;
            return Err(err);
        }
        self.pools = Some(BufferPools {
            input: BuffersManager::new(self.codec.input_buffer_size(), INPUT_POOL, 0, 0),
            output: BuffersManager::new(self.codec.output_buffer_size(), OUTPUT_POOL, 0, 0),
        });
        self.transition(CodecState::Initialized);
        Ok(())
    }

    /// 启动或从 Flushed 恢复, 把空闲输入槽位全部交给客户端
    pub fn start(&mut self) -> CodecResult<()> {
        let Some(callback) = self.callback.clone() else {
            error!("{}: 未设置回调", self.name);
            return Err(CodecError::Unknown);
        };
        let next = match self.state {
            CodecState::Initialized => CodecState::Starting,
            CodecState::Flushed => CodecState::Resuming,
            state => {
                error!("{}: 状态 {state} 下不能启动", self.name);
                return Err(CodecError::InvalidState);
            }
        };
        let Some(pools) = self.pools.as_ref() else {
            return Err(CodecError::Unknown);
        };

        info!("{}: 状态 {} -> {next} -> RUNNING", self.name, self.state);
        self.state = next;
        pools.set_running(true);
        self.first_frame = true;
        self.output_eos = false;
        self.state = CodecState::Running;
        while let Some(index) = pools.input.try_request_available_index() {
            callback.on_input_buffer_available(index);
        }
        Ok(())
    }

    /// 停止处理, 回到 Initialized
    pub fn stop(&mut self) -> CodecResult<()> {
        if matches!(
            self.state,
            CodecState::Initialized
                | CodecState::Released
                | CodecState::Stopping
                | CodecState::Releasing
        ) {
            debug!("{}: 状态 {} 下忽略 stop", self.name, self.state);
            return Ok(());
        }
        self.transition(CodecState::Stopping);
        let status = self.codec.flush();
        self.pending_inputs.clear();
        if let Some(pools) = self.pools.as_ref() {
            pools.release_all();
        }
        self.transition(CodecState::Initialized);
        status
    }

    /// 清空插件缓存并暂停, 仅 Running 状态允许
    pub fn flush(&mut self) -> CodecResult<()> {
        if self.state == CodecState::Flushed {
            warn!("{}: 已处于 FLUSHED", self.name);
            return Ok(());
        }
        if self.state != CodecState::Running {
            error!("{}: 状态 {} 下不能 flush", self.name, self.state);
            self.report_error(CodecError::InvalidState);
            return Err(CodecError::InvalidState);
        }
        self.transition(CodecState::Flushing);
        let status = self.codec.flush();
        self.pending_inputs.clear();
        if let Some(pools) = self.pools.as_ref() {
            pools.release_all();
        }
        self.transition(CodecState::Flushed);
        status.map_err(|err| {
            error!("{}: 插件 flush 失败: {err}", self.name);
            CodecError::InvalidState
        })
    }

    /// 复位插件并丢弃缓冲池, 回到 Released
    pub fn reset(&mut self) -> CodecResult<()> {
        if matches!(self.state, CodecState::Released | CodecState::Releasing) {
            return Ok(());
        }
        let status = self.codec.reset();
        self.drop_pools();
        self.transition(CodecState::Released);
        status
    }

    /// 释放插件并丢弃缓冲池, 回到 Released
    pub fn release(&mut self) -> CodecResult<()> {
        if matches!(self.state, CodecState::Released | CodecState::Releasing) {
            warn!("{}: 已处于 {}", self.name, self.state);
            return Ok(());
        }
        if matches!(self.state, CodecState::Running | CodecState::Starting) {
            warn!("{}: 运行中直接释放", self.name);
        }
        self.transition(CodecState::Releasing);
        let status = self.codec.release();
        self.drop_pools();
        self.transition(CodecState::Released);
        status
    }

    /// 插件输出格式, 补充 `codec_name`
    pub fn output_format(&self) -> Format {
        let mut format = self.codec.format();
        if !format.contains_key(keys::CODEC_NAME) {
            format.put_string(keys::CODEC_NAME, self.name.as_str());
        }
        format
    }

    /// 客户端持有的输入槽位
    pub fn input_buffer(&self, index: u32) -> CodecResult<SharedBufferInfo> {
        let pool = self.pools.as_ref().map(|pools| &pools.input);
        self.client_buffer(pool, index)
    }

    /// 客户端持有的输出槽位
    pub fn output_buffer(&self, index: u32) -> CodecResult<SharedBufferInfo> {
        let pool = self.pools.as_ref().map(|pools| &pools.output);
        self.client_buffer(pool, index)
    }

    /// 提交一个已写入数据的输入槽位并同步处理
    pub fn queue_input_buffer(
        &mut self,
        index: u32,
        attr: BufferAttr,
        flag: BufferFlag,
    ) -> CodecResult<()> {
        let Some(callback) = self.callback.clone() else {
            error!("{}: 未设置回调", self.name);
            return Err(CodecError::Unknown);
        };
        if self.state != CodecState::Running {
            error!("{}: 状态 {} 下不能提交输入", self.name, self.state);
            return Err(CodecError::InvalidState);
        }
        let Some(pools) = self.pools.as_ref() else {
            return Err(CodecError::Unknown);
        };
        let Some(slot) = pools.input.buffer(index) else {
            error!("{}: 无效的输入索引 {index}", self.name);
            callback.on_error(CodecError::NoMemory);
            return Err(CodecError::NoMemory);
        };
        {
            let mut input = lock(&slot);
            if input.status() != BufferStatus::OwnedByClient {
                error!("{}: 输入槽位 {index} 不属于客户端", self.name);
                callback.on_error(CodecError::InvalidState);
                return Err(CodecError::InvalidState);
            }
            input.set_buffer_attr(attr);
            if flag == BufferFlag::Eos {
                input.set_eos(true);
            }
        }

        self.pending_inputs.push_back(index);
        self.send_pending_inputs(callback.as_ref());
        Ok(())
    }

    /// 归还一个输出槽位, 该槽位带 EOS 时进入 Flushed
    ///
    /// 其余情况下用腾出的槽位继续取出插件中积压的数据, 并重新送入待送输入.
    pub fn release_output_buffer(&mut self, index: u32) -> CodecResult<()> {
        let Some(callback) = self.callback.clone() else {
            error!("{}: 未设置回调", self.name);
            return Err(CodecError::Unknown);
        };
        let Some(pools) = self.pools.as_ref() else {
            return Err(CodecError::Unknown);
        };
        let Some(slot) = pools.output.buffer(index) else {
            error!("{}: 无效的输出索引 {index}", self.name);
            self.report_error(CodecError::NoMemory);
            return Err(CodecError::NoMemory);
        };
        let is_eos = lock(&slot).check_is_eos();
        pools.output.release_buffer(index);
        if is_eos {
            info!("{}: 输出 EOS 已归还", self.name);
            return self.flush();
        }
        if self.state == CodecState::Running {
            self.drain_output(false, callback.as_ref());
            self.send_pending_inputs(callback.as_ref());
        }
        Ok(())
    }

    /// 按提交顺序送入待送输入, 插件仍返回 `Again` 时停下等待输出槽位
    fn send_pending_inputs(&mut self, callback: &dyn CodecCallback) {
        while let Some(&index) = self.pending_inputs.front() {
            let slot = self.pools.as_ref().and_then(|pools| pools.input.buffer(index));
            let Some(slot) = slot else {
                self.pending_inputs.pop_front();
                continue;
            };
            if !self.process_input(index, &slot, callback) {
                debug!(
                    "{}: 输入 {index} 等待输出槽位, 待送 {} 个",
                    self.name,
                    self.pending_inputs.len()
                );
                return;
            }
            self.pending_inputs.pop_front();
        }
    }

    /// 一步同步处理: 送入输入, 取空输出, 归还并重新提供输入槽位
    ///
    /// 插件暂不接收时返回 false, 输入槽位保持占用.
    fn process_input(
        &mut self,
        index: u32,
        slot: &SharedBufferInfo,
        callback: &dyn CodecCallback,
    ) -> bool {
        let eos = lock(slot).check_is_eos();
        let mut sent = self.codec.process_send_data(&lock(slot));
        if sent == Err(CodecError::Again) {
            // 引擎要求先取出已编码数据
            self.drain_output(false, callback);
            sent = self.codec.process_send_data(&lock(slot));
        }

        match sent {
            Ok(()) | Err(CodecError::EndOfStream) => self.drain_output(eos, callback),
            Err(CodecError::Again) => return false,
            Err(CodecError::NotEnoughData) => {
                warn!("{}: 输入 {index} 数据不足, 跳过", self.name);
            }
            Err(err) => {
                error!("{}: 处理输入 {index} 失败: {err}", self.name);
                callback.on_error(err);
            }
        }

        if let Some(pools) = self.pools.as_ref() {
            pools.input.release_buffer(index);
            if let Some(next) = pools.input.try_request_available_index() {
                callback.on_input_buffer_available(next);
            }
        }
        true
    }

    /// 把能取出的数据全部写入输出槽位
    fn drain_output(&mut self, eos: bool, callback: &dyn CodecCallback) {
        if self.output_eos {
            return;
        }
        let Some(pools) = self.pools.as_ref() else {
            return;
        };
        loop {
            let Some(out_index) = pools.output.try_request_available_index() else {
                debug!("{}: 输出槽位已用尽", self.name);
                return;
            };
            let Some(slot) = pools.output.buffer(out_index) else {
                return;
            };
            let mut output = lock(&slot);
            match self.codec.process_receive_data(&mut output) {
                Ok(()) => {
                    if self.first_frame {
                        output.set_first_frame();
                        self.first_frame = false;
                    }
                    callback.on_output_buffer_available(
                        out_index,
                        output.buffer_attr(),
                        output.flag(),
                    );
                }
                Err(CodecError::NotEnoughData | CodecError::Again) => {
                    drop(output);
                    pools.output.release_buffer(out_index);
                    return;
                }
                Err(CodecError::EndOfStream) => {
                    debug!("{}: 输出 EOS, 槽位 {out_index}", self.name);
                    output.set_eos(true);
                    let attr = BufferAttr {
                        size: 0,
                        ..output.buffer_attr()
                    };
                    output.set_buffer_attr(attr);
                    self.output_eos = true;
                    callback.on_output_buffer_available(out_index, attr, BufferFlag::Eos);
                    return;
                }
                Err(err) => {
                    error!("{}: 取出数据失败: {err}, eos={eos}", self.name);
                    drop(output);
                    pools.output.release_buffer(out_index);
                    callback.on_error(err);
                    return;
                }
            }
        }
    }

    fn client_buffer(
        &self,
        pool: Option<&BuffersManager>,
        index: u32,
    ) -> CodecResult<SharedBufferInfo> {
        let Some(slot) = pool.and_then(|pool| pool.buffer(index)) else {
            error!("{}: 无效的缓冲索引 {index}", self.name);
            self.report_error(CodecError::NoMemory);
            return Err(CodecError::NoMemory);
        };
        if lock(&slot).is_available() {
            error!("{}: 缓冲 {index} 未交给客户端", self.name);
            self.report_error(CodecError::InvalidState);
            return Err(CodecError::InvalidState);
        }
        Ok(slot)
    }

    fn drop_pools(&mut self) {
        self.pending_inputs.clear();
        if let Some(pools) = self.pools.take() {
            pools.release_all();
        }
    }

    fn report_error(&self, err: CodecError) {
        if let Some(callback) = self.callback.as_ref() {
            callback.on_error(err);
        }
    }

    fn transition(&mut self, next: CodecState) {
        info!("{}: 状态 {} -> {next}", self.name, self.state);
        self.state = next;
    }
}

impl Drop for CodecAdapter {
    fn drop(&mut self) {
        if self.state != CodecState::Released {
            let _ = self.codec.release();
            self.drop_pools();
        }
    }
}

impl fmt::Debug for CodecAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecAdapter")
            .field("name", &self.name)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use yin_engine::EngineRegistry;

    use super::*;
    use crate::buffer_info::CodecBufferInfo;
    use crate::registry::PluginKind;

    /// 把每个输入原样输出的插件
    ///
    /// 积压数据达到 `capacity` 时拒收输入 (`Again`), 负载为 `[0xDD]` 的输入被吞掉.
    struct LoopbackCodec {
        pending: Mutex<VecDeque<(Vec<u8>, i64)>>,
        eos: Mutex<bool>,
        flushes: Mutex<u32>,
        capacity: usize,
    }

    impl LoopbackCodec {
        fn with_capacity(capacity: usize) -> Box<dyn AudioCodec> {
            Box::new(Self {
                pending: Mutex::new(VecDeque::new()),
                eos: Mutex::new(false),
                flushes: Mutex::new(0),
                capacity,
            })
        }

        fn create(_engine: Arc<EngineRegistry>) -> Box<dyn AudioCodec> {
            Self::with_capacity(usize::MAX)
        }

        fn create_bounded(_engine: Arc<EngineRegistry>) -> Box<dyn AudioCodec> {
            Self::with_capacity(1)
        }
    }

    impl AudioCodec for LoopbackCodec {
        fn codec_name(&self) -> &str {
            "loopback"
        }

        fn init(&mut self, format: &Format) -> CodecResult<()> {
            match format.get_int(keys::SAMPLE_RATE) {
                Some(rate) if rate > 0 => Ok(()),
                _ => Err(CodecError::MismatchSampleRate),
            }
        }

        fn process_send_data(&self, buffer: &CodecBufferInfo) -> CodecResult<()> {
            if buffer.check_is_eos() {
                *lock(&self.eos) = true;
                return Ok(());
            }
            if buffer.payload() == [0xEE] {
                return Err(CodecError::Unknown);
            }
            if buffer.payload() == [0xDD] {
                return Ok(());
            }
            let mut pending = lock(&self.pending);
            if pending.len() >= self.capacity {
                return Err(CodecError::Again);
            }
            pending.push_back((
                buffer.payload().to_vec(),
                buffer.buffer_attr().presentation_time_us,
            ));
            Ok(())
        }

        fn process_receive_data(&self, buffer: &mut CodecBufferInfo) -> CodecResult<()> {
            let Some((data, pts)) = lock(&self.pending).pop_front() else {
                if *lock(&self.eos) {
                    buffer.set_eos(true);
                    return Err(CodecError::EndOfStream);
                }
                return Err(CodecError::NotEnoughData);
            };
            let memory = buffer.buffer_mut().ok_or(CodecError::NoMemory)?;
            memory.write(&data, Some(0));
            buffer.set_buffer_attr(BufferAttr {
                presentation_time_us: pts,
                size: data.len() as i32,
                offset: 0,
            });
            Ok(())
        }

        fn reset(&mut self) -> CodecResult<()> {
            lock(&self.pending).clear();
            Ok(())
        }

        fn release(&mut self) -> CodecResult<()> {
            lock(&self.pending).clear();
            Ok(())
        }

        fn flush(&mut self) -> CodecResult<()> {
            lock(&self.pending).clear();
            *lock(&self.eos) = false;
            *lock(&self.flushes) += 1;
            Ok(())
        }

        fn input_buffer_size(&self) -> usize {
            256
        }

        fn output_buffer_size(&self) -> usize {
            256
        }

        fn format(&self) -> Format {
            let mut format = Format::new();
            format.put_int(keys::SAMPLE_RATE, 8000);
            format
        }
    }

    #[derive(Default)]
    struct Recorder {
        inputs: Mutex<Vec<u32>>,
        outputs: Mutex<Vec<(u32, BufferAttr, BufferFlag)>>,
        errors: Mutex<Vec<CodecError>>,
    }

    impl CodecCallback for Recorder {
        fn on_input_buffer_available(&self, index: u32) {
            lock(&self.inputs).push(index);
        }

        fn on_output_buffer_available(&self, index: u32, attr: BufferAttr, flag: BufferFlag) {
            lock(&self.outputs).push((index, attr, flag));
        }

        fn on_error(&self, error: CodecError) {
            lock(&self.errors).push(error);
        }
    }

    fn loopback_registry() -> PluginRegistry {
        let mut registry = PluginRegistry::new(Arc::new(EngineRegistry::new()));
        registry.register("loopback", PluginKind::Decoder, LoopbackCodec::create);
        registry.register(
            "bounded_loopback",
            PluginKind::Decoder,
            LoopbackCodec::create_bounded,
        );
        registry
    }

    fn basic_format() -> Format {
        let mut format = Format::new();
        format
            .put_int(keys::CHANNEL_COUNT, 1)
            .put_int(keys::SAMPLE_RATE, 8000)
            .put_long(keys::BITRATE, 64_000);
        format
    }

    fn running_adapter() -> (CodecAdapter, Arc<Recorder>) {
        running_named("loopback")
    }

    fn running_named(name: &str) -> (CodecAdapter, Arc<Recorder>) {
        let _ = env_logger::builder().is_test(true).try_init();
        let registry = loopback_registry();
        let mut adapter = CodecAdapter::new(name, &registry).unwrap();
        let recorder = Arc::new(Recorder::default());
        adapter.set_callback(recorder.clone()).unwrap();
        adapter.configure(&basic_format()).unwrap();
        adapter.start().unwrap();
        (adapter, recorder)
    }

    fn queue(adapter: &mut CodecAdapter, index: u32, data: &[u8], pts: i64) {
        let slot = adapter.input_buffer(index).unwrap();
        lock(&slot).buffer_mut().unwrap().write(data, Some(0));
        let attr = BufferAttr {
            presentation_time_us: pts,
            size: data.len() as i32,
            offset: 0,
        };
        adapter
            .queue_input_buffer(index, attr, BufferFlag::None)
            .unwrap();
    }

    #[test]
    fn test_未注册的插件() {
        let registry = loopback_registry();
        assert!(matches!(
            CodecAdapter::new("avdec_aac", &registry),
            Err(CodecError::UnsupportProtocolType)
        ));
    }

    #[test]
    fn test_configure_requires_keys() {
        let registry = loopback_registry();
        let mut adapter = CodecAdapter::new("loopback", &registry).unwrap();
        let mut format = basic_format();
        format.remove(keys::BITRATE);
        assert_eq!(adapter.configure(&format), Err(CodecError::MismatchBitRate));
        format.remove(keys::SAMPLE_RATE);
        assert_eq!(adapter.configure(&format), Err(CodecError::MismatchSampleRate));
        format.remove(keys::CHANNEL_COUNT);
        assert_eq!(
            adapter.configure(&format),
            Err(CodecError::ConfigureMismatchChannelCount)
        );
        assert_eq!(adapter.state(), CodecState::Released);
    }

    #[test]
    fn test_插件初始化失败回到_released() {
        let registry = loopback_registry();
        let mut adapter = CodecAdapter::new("loopback", &registry).unwrap();
        let mut format = basic_format();
        format.put_int(keys::SAMPLE_RATE, 0);
        assert_eq!(adapter.configure(&format), Err(CodecError::MismatchSampleRate));
        assert_eq!(adapter.state(), CodecState::Released);
    }

    #[test]
    fn test_configure_only_from_released() {
        let registry = loopback_registry();
        let mut adapter = CodecAdapter::new("loopback", &registry).unwrap();
        adapter.configure(&basic_format()).unwrap();
        assert_eq!(adapter.state(), CodecState::Initialized);
        assert_eq!(
            adapter.configure(&basic_format()),
            Err(CodecError::InvalidState)
        );
    }

    #[test]
    fn test_启动需要回调() {
        let registry = loopback_registry();
        let mut adapter = CodecAdapter::new("loopback", &registry).unwrap();
        adapter.configure(&basic_format()).unwrap();
        assert_eq!(adapter.start(), Err(CodecError::Unknown));
    }

    #[test]
    fn test_start_offers_all_inputs() {
        let (adapter, recorder) = running_adapter();
        assert_eq!(adapter.state(), CodecState::Running);
        assert_eq!(*lock(&recorder.inputs), (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_同步处理一步() {
        let (mut adapter, recorder) = running_adapter();
        queue(&mut adapter, 0, &[1, 2, 3], 1000);

        let outputs = lock(&recorder.outputs).clone();
        assert_eq!(outputs.len(), 1);
        let (out_index, attr, flag) = outputs[0];
        assert_eq!(attr.presentation_time_us, 1000);
        assert_eq!(attr.size, 3);
        assert_eq!(flag, BufferFlag::None);

        let slot = adapter.output_buffer(out_index).unwrap();
        {
            let output = lock(&slot);
            assert_eq!(output.payload(), &[1, 2, 3]);
            assert!(output.check_is_first_frame());
        }
        // 输入槽位被归还后重新提供
        assert_eq!(lock(&recorder.inputs).last(), Some(&0));

        adapter.release_output_buffer(out_index).unwrap();
        assert!(adapter.output_buffer(out_index).is_err());
        assert_eq!(lock(&recorder.errors).as_slice(), &[CodecError::InvalidState]);
    }

    #[test]
    fn test_eos_输出后归还进入_flushed() {
        let (mut adapter, recorder) = running_adapter();
        queue(&mut adapter, 0, &[9], 0);
        adapter
            .queue_input_buffer(1, BufferAttr::default(), BufferFlag::Eos)
            .unwrap();

        let outputs = lock(&recorder.outputs).clone();
        assert_eq!(outputs.len(), 2);
        let (eos_index, attr, flag) = outputs[1];
        assert_eq!(flag, BufferFlag::Eos);
        assert_eq!(attr.size, 0);

        adapter.release_output_buffer(eos_index).unwrap();
        assert_eq!(adapter.state(), CodecState::Flushed);

        // 恢复后重新提供输入
        lock(&recorder.inputs).clear();
        adapter.start().unwrap();
        assert_eq!(adapter.state(), CodecState::Running);
        assert_eq!(lock(&recorder.inputs).len(), 8);
    }

    #[test]
    fn test_插件错误通过回调上报() {
        let (mut adapter, recorder) = running_adapter();
        queue(&mut adapter, 2, &[0xEE], 0);
        assert_eq!(lock(&recorder.errors).as_slice(), &[CodecError::Unknown]);
        assert!(lock(&recorder.outputs).is_empty());
        assert_eq!(adapter.state(), CodecState::Running);
    }

    #[test]
    fn test_queue_requires_client_ownership() {
        let (mut adapter, recorder) = running_adapter();
        queue(&mut adapter, 0, &[1], 0);
        // 槽位 0 已归还并重新交给客户端, 提交一个越界索引
        assert_eq!(
            adapter.queue_input_buffer(42, BufferAttr::default(), BufferFlag::None),
            Err(CodecError::NoMemory)
        );
        assert_eq!(lock(&recorder.errors).as_slice(), &[CodecError::NoMemory]);
    }

    #[test]
    fn test_flush_only_from_running() {
        let registry = loopback_registry();
        let mut adapter = CodecAdapter::new("loopback", &registry).unwrap();
        let recorder = Arc::new(Recorder::default());
        adapter.set_callback(recorder.clone()).unwrap();
        adapter.configure(&basic_format()).unwrap();
        assert_eq!(adapter.flush(), Err(CodecError::InvalidState));
        assert_eq!(lock(&recorder.errors).as_slice(), &[CodecError::InvalidState]);

        adapter.start().unwrap();
        adapter.flush().unwrap();
        assert_eq!(adapter.state(), CodecState::Flushed);
        assert_eq!(
            adapter.queue_input_buffer(0, BufferAttr::default(), BufferFlag::None),
            Err(CodecError::InvalidState)
        );
        // 重复 flush 无副作用
        adapter.flush().unwrap();
    }

    #[test]
    fn test_stop_回到_initialized() {
        let (mut adapter, recorder) = running_adapter();
        queue(&mut adapter, 0, &[1, 2], 0);
        adapter.stop().unwrap();
        assert_eq!(adapter.state(), CodecState::Initialized);
        assert!(adapter.input_buffer(0).is_err());

        lock(&recorder.inputs).clear();
        adapter.start().unwrap();
        assert_eq!(*lock(&recorder.inputs), (0..8).collect::<Vec<_>>());
        adapter.stop().unwrap();
        adapter.stop().unwrap();
    }

    #[test]
    fn test_release_与_reset() {
        let (mut adapter, _) = running_adapter();
        adapter.release().unwrap();
        assert_eq!(adapter.state(), CodecState::Released);
        adapter.release().unwrap();

        adapter.configure(&basic_format()).unwrap();
        adapter.start().unwrap();
        adapter.reset().unwrap();
        assert_eq!(adapter.state(), CodecState::Released);
        assert_eq!(adapter.input_buffer(0).err(), Some(CodecError::NoMemory));
    }

    #[test]
    fn test_output_format_adds_codec_name() {
        let (adapter, _) = running_adapter();
        let format = adapter.output_format();
        assert_eq!(format.get_string(keys::CODEC_NAME), Some("loopback"));
        assert_eq!(format.get_int(keys::SAMPLE_RATE), Some(8000));
    }

    #[test]
    fn test_首帧标记落在第一个输出上() {
        let (mut adapter, recorder) = running_adapter();
        // 被吞掉的输入让第一次取数据返回 NotEnoughData
        queue(&mut adapter, 0, &[0xDD], 0);
        assert!(lock(&recorder.outputs).is_empty());

        queue(&mut adapter, 1, &[1], 1000);
        queue(&mut adapter, 2, &[2], 2000);
        let outputs = lock(&recorder.outputs).clone();
        assert_eq!(outputs.len(), 2);
        assert!(lock(&adapter.output_buffer(outputs[0].0).unwrap()).check_is_first_frame());
        assert!(!lock(&adapter.output_buffer(outputs[1].0).unwrap()).check_is_first_frame());
    }

    #[test]
    fn test_输出槽位占满时输入延后送入() {
        let (mut adapter, recorder) = running_named("bounded_loopback");
        for i in 0..12u8 {
            let index = lock(&recorder.inputs).remove(0);
            queue(&mut adapter, index, &[i], i64::from(i) * 1000);
        }
        // 8 个输出槽位全部被客户端持有, 插件积压 1 个, 其余 3 个输入待送
        assert_eq!(lock(&recorder.outputs).len(), 8);
        assert!(lock(&recorder.errors).is_empty());

        let mut released = 0;
        loop {
            let next = lock(&recorder.outputs).get(released).map(|output| output.0);
            let Some(index) = next else {
                break;
            };
            adapter.release_output_buffer(index).unwrap();
            released += 1;
        }

        let index = lock(&recorder.inputs).remove(0);
        adapter
            .queue_input_buffer(index, BufferAttr::default(), BufferFlag::Eos)
            .unwrap();

        let outputs = lock(&recorder.outputs).clone();
        assert_eq!(outputs.len(), 13);
        let pts: Vec<i64> = outputs[..12]
            .iter()
            .map(|(_, attr, _)| attr.presentation_time_us)
            .collect();
        assert_eq!(pts, (0..12).map(|i| i * 1000).collect::<Vec<_>>());
        assert_eq!(outputs[12].2, BufferFlag::Eos);
        assert!(lock(&recorder.errors).is_empty());
    }

    #[test]
    fn test_flush_丢弃待送输入() {
        let (mut adapter, recorder) = running_named("bounded_loopback");
        for i in 0..10u8 {
            let index = lock(&recorder.inputs).remove(0);
            queue(&mut adapter, index, &[i], 0);
        }
        assert_eq!(adapter.pending_inputs.len(), 1);

        adapter.flush().unwrap();
        assert!(adapter.pending_inputs.is_empty());
        lock(&recorder.inputs).clear();
        adapter.start().unwrap();
        assert_eq!(lock(&recorder.inputs).len(), 8);
    }

    #[test]
    fn test_set_callback_rejected_while_running() {
        let (mut adapter, recorder) = running_adapter();
        assert_eq!(
            adapter.set_callback(recorder),
            Err(CodecError::InvalidState)
        );
    }
}
