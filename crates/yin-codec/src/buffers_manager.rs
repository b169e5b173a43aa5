//! 编解码缓冲池.
//!
//! 固定数量的 [`CodecBufferInfo`] 槽位加一个空闲索引队列.
//! 客户端取出空闲索引后持有对应槽位, 用完后调用 [`BuffersManager::release_buffer`] 归还.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use log::{debug, warn};

use crate::buffer_info::CodecBufferInfo;
use crate::session::lock;

/// 默认槽位数
pub const DEFAULT_BUFFER_COUNT: usize = 8;
/// 单次等待时长
const WAIT_TIMEOUT: Duration = Duration::from_millis(500);
/// 最大等待次数
const MAX_WAIT_TIMES: u32 = 20;

/// 共享的缓冲槽位
pub type SharedBufferInfo = Arc<Mutex<CodecBufferInfo>>;

struct PoolState {
    buffers: Vec<SharedBufferInfo>,
    queue: VecDeque<u32>,
    /// 索引是否在空闲队列中
    queued: Vec<bool>,
}

impl PoolState {
    fn push_idle(&mut self, index: u32) {
        if let Some(queued) = self.queued.get_mut(index as usize) {
            if !*queued {
                *queued = true;
                self.queue.push_back(index);
            }
        }
    }

    fn pop_idle(&mut self) -> Option<u32> {
        let index = self.queue.pop_front()?;
        self.queued[index as usize] = false;
        Some(index)
    }
}

/// 缓冲池
pub struct BuffersManager {
    name: String,
    buffer_size: usize,
    meta_size: usize,
    align: usize,
    state: Mutex<PoolState>,
    available: Condvar,
    running: AtomicBool,
}

impl BuffersManager {
    /// 创建缓冲池, 初始含 [`DEFAULT_BUFFER_COUNT`] 个空闲槽位
    pub fn new(buffer_size: usize, name: &str, meta_size: usize, align: usize) -> Self {
        let buffers: Vec<_> = (0..DEFAULT_BUFFER_COUNT)
            .map(|i| {
                Arc::new(Mutex::new(CodecBufferInfo::new(
                    buffer_size,
                    &format!("{name}_{i}"),
                    meta_size,
                    align,
                )))
            })
            .collect();
        let count = buffers.len();
        debug!("{name}: 创建缓冲池, {count} 个槽位, 每个 {buffer_size} 字节");

        Self {
            name: name.to_string(),
            buffer_size,
            meta_size,
            align,
            state: Mutex::new(PoolState {
                buffers,
                queue: (0..count as u32).collect(),
                queued: vec![true; count],
            }),
            available: Condvar::new(),
            running: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 单个槽位的负载大小
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// 槽位总数
    pub fn len(&self) -> usize {
        lock(&self.state).buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 当前空闲槽位数
    pub fn idle_count(&self) -> usize {
        lock(&self.state).queue.len()
    }

    pub fn set_running(&self, running: bool) {
        let _state = lock(&self.state);
        self.running.store(running, Ordering::Release);
        self.available.notify_all();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// 取出一个空闲槽位, 无空闲槽位时阻塞等待
    ///
    /// 每次最多等待 500 ms, 共等待 20 次. 池已停止或等待超时时返回 None.
    pub fn request_available_index(&self) -> Option<u32> {
        let mut state = lock(&self.state);
        let mut waits = 0;
        loop {
            if !self.is_running() {
                return None;
            }
            if let Some(index) = state.pop_idle() {
                lock(&state.buffers[index as usize]).set_buffer_owned();
                return Some(index);
            }
            if waits >= MAX_WAIT_TIMES {
                warn!("{}: 等待空闲缓冲超时", self.name);
                return None;
            }
            waits += 1;
            state = self
                .available
                .wait_timeout(state, WAIT_TIMEOUT)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// 取出一个空闲槽位, 不等待
    pub fn try_request_available_index(&self) -> Option<u32> {
        if !self.is_running() {
            return None;
        }
        let mut state = lock(&self.state);
        let index = state.pop_idle()?;
        lock(&state.buffers[index as usize]).set_buffer_owned();
        Some(index)
    }

    /// 按索引获取槽位
    pub fn buffer(&self, index: u32) -> Option<SharedBufferInfo> {
        lock(&self.state).buffers.get(index as usize).cloned()
    }

    /// 复位并归还一个槽位, 已在空闲队列中时忽略
    pub fn release_buffer(&self, index: u32) -> bool {
        let Some(buffer) = self.buffer(index) else {
            warn!("{}: 无效的缓冲索引 {index}", self.name);
            return false;
        };
        lock(&buffer).reset_buffer();
        lock(&self.state).push_idle(index);
        self.available.notify_one();
        true
    }

    /// 追加一个新槽位并交给调用方, 负载分配失败时返回 None
    pub fn request_new_buffer(&self) -> Option<u32> {
        let mut state = lock(&self.state);
        let index = state.buffers.len() as u32;
        let info = CodecBufferInfo::new(
            self.buffer_size,
            &format!("{}_{index}", self.name),
            self.meta_size,
            self.align,
        );
        if !info.set_buffer_owned() {
            warn!("{}: 新缓冲分配失败", self.name);
            return None;
        }
        state.buffers.push(Arc::new(Mutex::new(info)));
        state.queued.push(false);
        debug!("{}: 追加槽位 {index}", self.name);
        Some(index)
    }

    /// 复位全部槽位并放回空闲队列
    pub fn reset_all(&self) {
        let mut state = lock(&self.state);
        for buffer in &state.buffers {
            lock(buffer).reset_buffer();
        }
        let count = state.buffers.len() as u32;
        state.queue.clear();
        state.queued.iter_mut().for_each(|queued| *queued = false);
        for index in 0..count {
            state.push_idle(index);
        }
        drop(state);
        self.available.notify_all();
    }

    /// 复位全部槽位并停止, 唤醒所有等待者
    pub fn release_all(&self) {
        self.reset_all();
        self.set_running(false);
    }
}

impl std::fmt::Debug for BuffersManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuffersManager")
            .field("name", &self.name)
            .field("buffer_size", &self.buffer_size)
            .field("running", &self.is_running())
            .finish()
    }
}
