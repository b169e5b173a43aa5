//! 共享内存缓冲 (SharedBuffer).
//!
//! 容量固定、可按字节对齐的内存区域, 维护一个已用长度游标.
//! 写入超出容量时只拷贝能容纳的部分 (短写), 返回实际拷贝的字节数.

use std::fmt;

use log::{debug, error};

/// 内存访问标志
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryFlags {
    /// 只读
    ReadOnly,
    /// 只写
    WriteOnly,
    /// 读写
    ReadWrite,
}

impl MemoryFlags {
    /// 原始标志位取值
    pub const fn as_raw(&self) -> u32 {
        match self {
            Self::ReadWrite => 0x1,
            Self::ReadOnly => 0x2,
            Self::WriteOnly => 0x4,
        }
    }
}

impl fmt::Display for MemoryFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ReadOnly => "read_only",
            Self::WriteOnly => "write_only",
            Self::ReadWrite => "read_write",
        };
        write!(f, "{name}")
    }
}

/// 共享内存缓冲
///
/// 请求对齐时容量扩大 `align - 1` 字节, 对外暴露的 `base()` 从对齐地址开始,
/// 长度恒为 `capacity()`. 分配失败时容量为 0 且 `is_valid()` 为 false.
pub struct SharedBuffer {
    name: String,
    flags: MemoryFlags,
    /// 底层分配, 长度为 capacity + 对齐偏移余量
    region: Vec<u8>,
    /// 对齐偏移
    offset: usize,
    capacity: usize,
    size: usize,
    valid: bool,
}

impl SharedBuffer {
    /// 创建共享缓冲
    ///
    /// # 参数
    /// - `capacity`: 请求的容量 (字节)
    /// - `name`: 缓冲名称, 仅用于日志
    /// - `flags`: 访问标志
    /// - `align`: 对齐字节数, 0 表示不对齐
    pub fn new(capacity: usize, name: &str, flags: MemoryFlags, align: usize) -> Self {
        let mut buffer = Self {
            name: name.to_string(),
            flags,
            region: Vec::new(),
            offset: 0,
            capacity: 0,
            size: 0,
            valid: false,
        };

        let padded = if align > 0 {
            capacity.checked_add(align - 1)
        } else {
            Some(capacity)
        };
        // 对齐偏移最多 align - 1, 底层分配再预留同样的余量
        let total = padded.and_then(|cap| cap.checked_add(align.saturating_sub(1)));
        let (Some(padded), Some(total)) = (padded, total) else {
            error!("{name}: 共享缓冲容量溢出, capacity={capacity}, align={align}");
            return buffer;
        };

        if let Err(err) = buffer.region.try_reserve_exact(total) {
            error!("{name}: 共享缓冲分配失败 ({total} 字节): {err}");
            return buffer;
        }
        buffer.region.resize(total, 0);

        if align > 1 {
            let base = buffer.region.as_ptr() as usize;
            buffer.offset = base.next_multiple_of(align) - base;
        }
        buffer.capacity = padded;
        buffer.valid = true;
        debug!(
            "{name}: 创建共享缓冲, 容量={padded}, 对齐={align}, 偏移={}, 标志={flags}",
            buffer.offset
        );
        buffer
    }

    /// 写入数据
    ///
    /// `position` 为 None 时从当前已用长度处追加, 否则从 `min(position, capacity)` 处写入.
    /// 写入后已用长度为起点加实际拷贝长度. 返回实际拷贝的字节数.
    pub fn write(&mut self, data: &[u8], position: Option<usize>) -> usize {
        if !self.valid {
            return 0;
        }
        let start = match position {
            Some(pos) => pos.min(self.capacity),
            None => self.size,
        };
        let length = data.len().min(self.capacity - start);
        let begin = self.offset + start;
        self.region[begin..begin + length].copy_from_slice(&data[..length]);
        self.size = start + length;
        length
    }

    /// 读取数据
    ///
    /// `position` 为 None 时从头读取, 否则从 `min(position, size)` 处读取.
    /// 返回实际拷贝的字节数, 失败时返回 0.
    pub fn read(&self, out: &mut [u8], position: Option<usize>) -> usize {
        if !self.valid {
            return 0;
        }
        let start = position.map_or(0, |pos| pos.min(self.size));
        let length = out.len().min(self.size - start);
        let begin = self.offset + start;
        out[..length].copy_from_slice(&self.region[begin..begin + length]);
        length
    }

    /// 清空已用长度
    pub fn reset(&mut self) {
        self.size = 0;
    }

    /// 对齐后的完整区域 (长度为 `capacity()`)
    pub fn base(&self) -> &[u8] {
        &self.region[self.offset..self.offset + self.capacity]
    }

    /// 对齐后的完整区域 (可写)
    pub fn base_mut(&mut self) -> &mut [u8] {
        &mut self.region[self.offset..self.offset + self.capacity]
    }

    /// 已写入的数据
    pub fn data(&self) -> &[u8] {
        &self.base()[..self.size]
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 已用长度
    pub fn size(&self) -> usize {
        self.size
    }

    /// 设置已用长度 (截断到容量), 配合 `base_mut()` 直接写入使用
    pub fn set_size(&mut self, size: usize) {
        self.size = size.min(self.capacity);
    }

    pub fn flags(&self) -> MemoryFlags {
        self.flags
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 底层分配是否成功
    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

impl fmt::Debug for SharedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedBuffer")
            .field("name", &self.name)
            .field("flags", &self.flags)
            .field("capacity", &self.capacity)
            .field("size", &self.size)
            .field("offset", &self.offset)
            .field("valid", &self.valid)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_短写不超过容量() {
        let mut buffer = SharedBuffer::new(8, "test", MemoryFlags::ReadWrite, 0);
        assert_eq!(buffer.write(&[1, 2, 3, 4, 5], None), 5);
        assert_eq!(buffer.write(&[6, 7, 8, 9, 10], None), 3);
        assert_eq!(buffer.size(), 8);
        assert_eq!(buffer.data(), &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(buffer.write(&[0xAA], None), 0);
        assert_eq!(buffer.size(), 8);
    }

    #[test]
    fn test_write_at_position_sets_size() {
        let mut buffer = SharedBuffer::new(16, "test", MemoryFlags::ReadWrite, 0);
        buffer.write(&[9; 10], None);
        assert_eq!(buffer.write(&[1, 2], Some(4)), 2);
        assert_eq!(buffer.size(), 6);
        assert_eq!(buffer.data(), &[9, 9, 9, 9, 1, 2]);

        // 起点越界时截断到容量, 不再拷贝
        assert_eq!(buffer.write(&[3], Some(100)), 0);
        assert_eq!(buffer.size(), 16);
    }

    #[test]
    fn test_read() {
        let mut buffer = SharedBuffer::new(16, "test", MemoryFlags::ReadWrite, 0);
        buffer.write(b"abcdef", None);

        let mut out = [0u8; 4];
        assert_eq!(buffer.read(&mut out, None), 4);
        assert_eq!(&out, b"abcd");
        assert_eq!(buffer.read(&mut out, Some(4)), 2);
        assert_eq!(&out[..2], b"ef");
        assert_eq!(buffer.read(&mut out, Some(64)), 0);
    }

    #[test]
    fn test_对齐() {
        let mut buffer = SharedBuffer::new(100, "aligned", MemoryFlags::ReadWrite, 64);
        assert!(buffer.is_valid());
        assert_eq!(buffer.capacity(), 163);
        assert_eq!(buffer.base().as_ptr() as usize % 64, 0);
        assert_eq!(buffer.base().len(), 163);

        let data = vec![0x5A; 200];
        assert_eq!(buffer.write(&data, None), 163);
        assert!(buffer.base_mut().iter().all(|&b| b == 0x5A));
    }

    #[test]
    fn test_reset_and_set_size() {
        let mut buffer = SharedBuffer::new(4, "test", MemoryFlags::WriteOnly, 0);
        buffer.write(&[1, 2, 3], None);
        buffer.reset();
        assert_eq!(buffer.size(), 0);
        buffer.reset();
        assert_eq!(buffer.size(), 0);

        buffer.base_mut()[..2].copy_from_slice(&[7, 8]);
        buffer.set_size(2);
        assert_eq!(buffer.data(), &[7, 8]);
        buffer.set_size(99);
        assert_eq!(buffer.size(), 4);
        assert_eq!(buffer.flags(), MemoryFlags::WriteOnly);
        assert_eq!(buffer.name(), "test");
    }

    #[test]
    fn test_分配失败() {
        let mut buffer = SharedBuffer::new(usize::MAX, "huge", MemoryFlags::ReadWrite, 0);
        assert!(!buffer.is_valid());
        assert_eq!(buffer.capacity(), 0);
        assert_eq!(buffer.write(&[1, 2, 3], None), 0);
        assert_eq!(buffer.read(&mut [0u8; 3], None), 0);
        assert!(buffer.base().is_empty());

        let overflow = SharedBuffer::new(usize::MAX, "overflow", MemoryFlags::ReadWrite, 16);
        assert!(!overflow.is_valid());
    }
}
