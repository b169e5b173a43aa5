//! 编解码会话的公共状态.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// 会话状态
///
/// `Unallocated → ContextAllocated → ContextOpened → Running ⇄ Flushed → Closed`.
/// `reset()` 回到 `Unallocated`, 之后可以重新分配.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unallocated,
    ContextAllocated,
    ContextOpened,
    Running,
    Flushed,
    Closed,
}

impl SessionState {
    /// 引擎是否已打开, 可以收发数据
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::ContextOpened | Self::Running | Self::Flushed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unallocated => "unallocated",
            Self::ContextAllocated => "context_allocated",
            Self::ContextOpened => "context_opened",
            Self::Running => "running",
            Self::Flushed => "flushed",
            Self::Closed => "closed",
        };
        write!(f, "{name}")
    }
}

/// 获取会话锁, 持锁线程 panic 后仍继续使用内部状态
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
