//! 常量缓冲区环形分配
//!
//! 上传堆中的常量缓冲区被切分为固定数量的槽位，每个槽位按 256 字节对齐
//! （CBV 的硬件要求）。每帧开始时游标归零，每次绘制占用一个槽位。
//! 分配器只负责偏移计算和越界检查，实际内存由后端提供。

use bytemuck::Pod;
use std::marker::PhantomData;

use crate::core::error::{GraphicsError, Result};

/// 常量缓冲区槽位数量
pub const CONSTANT_BUFFER_SLOTS: usize = 256;

/// CBV 的对齐要求
pub const CONSTANT_BUFFER_ALIGNMENT: usize = 256;

/// 向上对齐到 256 字节
#[inline]
pub const fn align_constant_buffer_size(size: usize) -> usize {
    (size + CONSTANT_BUFFER_ALIGNMENT - 1) & !(CONSTANT_BUFFER_ALIGNMENT - 1)
}

/// 环形常量缓冲区
///
/// # 示例
///
/// ```rust
/// use dx_practice::geometry::Transform;
/// use dx_practice::renderer::constant_buffer::ConstantBufferRing;
///
/// let mut ring = ConstantBufferRing::<Transform>::new(4);
/// let mut memory = vec![0u8; ring.byte_size()];
///
/// let slot = ring.push(&mut memory, &Transform::new(0.25, 0.0, 0.0))?;
/// assert_eq!(ring.read(&memory, slot)?, Transform::new(0.25, 0.0, 0.0));
/// # Ok::<(), dx_practice::core::DxPracticeError>(())
/// ```
#[derive(Debug)]
pub struct ConstantBufferRing<T: Pod> {
    slot_size: usize,
    capacity: usize,
    cursor: usize,
    _marker: PhantomData<T>,
}

impl<T: Pod> ConstantBufferRing<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            slot_size: align_constant_buffer_size(std::mem::size_of::<T>()),
            capacity,
            cursor: 0,
            _marker: PhantomData,
        }
    }

    /// 单个槽位字节数
    #[inline]
    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 整个缓冲区需要的字节数
    #[inline]
    pub fn byte_size(&self) -> usize {
        self.slot_size * self.capacity
    }

    /// 下一个将被写入的槽位
    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity - self.cursor
    }

    /// 槽位在缓冲区中的字节偏移
    #[inline]
    pub fn slot_offset(&self, slot: usize) -> usize {
        slot * self.slot_size
    }

    /// 帧开始时归零
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// 写入下一个槽位，返回槽位编号
    ///
    /// 槽位用尽时返回 `RingBufferOverrun`，不会回绕覆盖本帧已写入的数据。
    pub fn push(&mut self, memory: &mut [u8], value: &T) -> Result<usize> {
        if self.cursor >= self.capacity {
            return Err(GraphicsError::RingBufferOverrun {
                requested: self.cursor + 1,
                capacity: self.capacity,
            }
            .into());
        }

        let slot = self.cursor;
        let range = self.slot_range(slot, memory.len())?;
        memory[range].copy_from_slice(bytemuck::bytes_of(value));

        self.cursor += 1;
        Ok(slot)
    }

    /// 读回某个槽位
    pub fn read(&self, memory: &[u8], slot: usize) -> Result<T> {
        if slot >= self.capacity {
            return Err(GraphicsError::RingBufferOverrun {
                requested: slot + 1,
                capacity: self.capacity,
            }
            .into());
        }

        let range = self.slot_range(slot, memory.len())?;
        Ok(bytemuck::pod_read_unaligned(&memory[range]))
    }

    fn slot_range(&self, slot: usize, memory_len: usize) -> Result<std::ops::Range<usize>> {
        let start = self.slot_offset(slot);
        let end = start + std::mem::size_of::<T>();
        if end > memory_len {
            return Err(GraphicsError::ResourceCreation(format!(
                "Constant buffer too small: slot {} needs {} bytes, mapped {}",
                slot, end, memory_len
            ))
            .into());
        }
        Ok(start..end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Transform;

    #[test]
    fn test_alignment() {
        assert_eq!(align_constant_buffer_size(16), 256);
        assert_eq!(align_constant_buffer_size(256), 256);
        assert_eq!(align_constant_buffer_size(257), 512);

        let ring = ConstantBufferRing::<Transform>::new(CONSTANT_BUFFER_SLOTS);
        assert_eq!(ring.slot_size(), 256);
        assert_eq!(ring.byte_size(), 256 * 256);
    }

    #[test]
    fn test_push_and_read_back() {
        let mut ring = ConstantBufferRing::<Transform>::new(3);
        let mut memory = vec![0u8; ring.byte_size()];

        let a = Transform::new(0.25, 0.0, 0.0);
        let b = Transform::new(-0.5, 0.5, 0.3);
        assert_eq!(ring.push(&mut memory, &a).unwrap(), 0);
        assert_eq!(ring.push(&mut memory, &b).unwrap(), 1);
        assert_eq!(ring.cursor(), 2);

        assert_eq!(ring.read(&memory, 0).unwrap(), a);
        assert_eq!(ring.read(&memory, 1).unwrap(), b);
        assert_eq!(&memory[256..272], bytemuck::bytes_of(&b));
    }

    #[test]
    fn test_overrun_is_rejected() {
        let mut ring = ConstantBufferRing::<Transform>::new(2);
        let mut memory = vec![0u8; ring.byte_size()];
        let t = Transform::new(1.0, 2.0, 3.0);

        ring.push(&mut memory, &t).unwrap();
        ring.push(&mut memory, &t).unwrap();
        let err = ring.push(&mut memory, &t).unwrap_err();
        assert!(!err.is_fatal());
        assert_eq!(ring.cursor(), 2);

        ring.reset();
        assert_eq!(ring.push(&mut memory, &t).unwrap(), 0);
    }

    #[test]
    fn test_small_memory_rejected() {
        let mut ring = ConstantBufferRing::<Transform>::new(2);
        let mut memory = vec![0u8; 8];
        assert!(ring.push(&mut memory, &Transform::default()).is_err());
        assert_eq!(ring.cursor(), 0);
    }
}
