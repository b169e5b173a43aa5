//! 编解码缓冲描述 (CodecBufferInfo).
//!
//! 包装一个负载 SharedBuffer 和可选的只读元数据 SharedBuffer,
//! 附带归属状态、EOS 标记、首帧标记以及时间戳/长度属性.

use std::sync::atomic::{AtomicU8, Ordering};

use log::error;

use crate::shared_buffer::{MemoryFlags, SharedBuffer};

/// 缓冲归属状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BufferStatus {
    /// 空闲, 位于缓冲池中
    Idle = 0,
    /// 已交给客户端
    OwnedByClient = 1,
}

impl BufferStatus {
    const fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Self::OwnedByClient,
            _ => Self::Idle,
        }
    }
}

/// 缓冲标志
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferFlag {
    #[default]
    None,
    /// 流结束
    Eos,
    /// 同步帧
    SyncFrame,
}

/// 缓冲属性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferAttr {
    /// 显示时间戳 (微秒)
    pub presentation_time_us: i64,
    /// 有效数据长度
    pub size: i32,
    /// 有效数据起始偏移
    pub offset: i32,
}

/// 编解码缓冲描述
#[derive(Debug)]
pub struct CodecBufferInfo {
    name: String,
    buffer: Option<SharedBuffer>,
    metadata: Option<SharedBuffer>,
    status: AtomicU8,
    eos: bool,
    first_frame: bool,
    attr: BufferAttr,
    flag: BufferFlag,
}

impl CodecBufferInfo {
    /// 创建缓冲描述
    ///
    /// 负载缓冲可读写, `meta_size > 0` 时额外创建只读的元数据缓冲.
    /// 负载分配失败时不持有负载, `set_buffer_owned()` 将返回 false.
    pub fn new(buffer_size: usize, name: &str, meta_size: usize, align: usize) -> Self {
        let buffer = SharedBuffer::new(buffer_size, name, MemoryFlags::ReadWrite, align);
        let buffer = if buffer.is_valid() {
            Some(buffer)
        } else {
            error!("{name}: 负载缓冲不可用");
            None
        };
        let metadata = (meta_size > 0).then(|| {
            SharedBuffer::new(meta_size, &format!("{name}_meta"), MemoryFlags::ReadOnly, 0)
        });

        Self {
            name: name.to_string(),
            buffer,
            metadata,
            status: AtomicU8::new(BufferStatus::Idle as u8),
            eos: false,
            first_frame: false,
            attr: BufferAttr::default(),
            flag: BufferFlag::None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 负载缓冲
    pub fn buffer(&self) -> Option<&SharedBuffer> {
        self.buffer.as_ref()
    }

    pub fn buffer_mut(&mut self) -> Option<&mut SharedBuffer> {
        self.buffer.as_mut()
    }

    /// 元数据缓冲
    pub fn metadata(&self) -> Option<&SharedBuffer> {
        self.metadata.as_ref()
    }

    pub fn has_metadata(&self) -> bool {
        self.metadata.is_some()
    }

    /// 标记为客户端持有, 无可用负载时返回 false
    pub fn set_buffer_owned(&self) -> bool {
        if self.buffer.is_none() {
            return false;
        }
        self.status
            .store(BufferStatus::OwnedByClient as u8, Ordering::Release);
        true
    }

    pub fn status(&self) -> BufferStatus {
        BufferStatus::from_raw(self.status.load(Ordering::Acquire))
    }

    /// 是否空闲
    pub fn is_available(&self) -> bool {
        self.status() == BufferStatus::Idle
    }

    /// 设置 EOS, 同步设置或清除缓冲标志
    pub fn set_eos(&mut self, eos: bool) {
        self.eos = eos;
        self.flag = if eos { BufferFlag::Eos } else { BufferFlag::None };
    }

    pub fn check_is_eos(&self) -> bool {
        self.eos
    }

    pub fn set_first_frame(&mut self) {
        self.first_frame = true;
    }

    pub fn check_is_first_frame(&self) -> bool {
        self.first_frame
    }

    pub fn set_buffer_attr(&mut self, attr: BufferAttr) {
        self.attr = attr;
    }

    pub fn buffer_attr(&self) -> BufferAttr {
        self.attr
    }

    pub fn flag(&self) -> BufferFlag {
        self.flag
    }

    /// 有效负载
    ///
    /// 属性长度为正时取属性描述的区间 (截断到容量), 否则取已写入的数据.
    pub fn payload(&self) -> &[u8] {
        let Some(buffer) = self.buffer.as_ref() else {
            return &[];
        };
        if self.attr.size <= 0 {
            return buffer.data();
        }
        let base = buffer.base();
        let start = usize::try_from(self.attr.offset)
            .unwrap_or(0)
            .min(base.len());
        let end = start
            .saturating_add(self.attr.size as usize)
            .min(base.len());
        &base[start..end]
    }

    /// 复位为空闲状态
    ///
    /// 清除 EOS、首帧、标志和归属状态, 清空负载已用长度, 不影响元数据.
    /// 无负载时返回 false.
    pub fn reset_buffer(&mut self) -> bool {
        self.eos = false;
        self.first_frame = false;
        self.flag = BufferFlag::None;
        self.status.store(BufferStatus::Idle as u8, Ordering::Release);
        match self.buffer.as_mut() {
            Some(buffer) => {
                buffer.reset();
                true
            }
            None => false,
        }
    }
}
