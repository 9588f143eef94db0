//! 描述符表分配
//!
//! 着色器可见的 CBV/SRV 堆被划分为 `GROUP_COUNT` 组，每组 `REGISTER_COUNT` 个
//! 连续描述符，与根签名中的唯一描述符表一一对应：
//!
//! | 偏移 | 寄存器 |
//! |------|--------|
//! | 0-4  | b0-b4 (CBV) |
//! | 5-9  | t0-t4 (SRV) |
//!
//! 每次绘制先把视图暂存到当前组，再 `commit` 生成复制命令并绑定该组，
//! 随后游标前进到下一组。每帧开始时游标归零。

use crate::core::error::{GraphicsError, Result};
use super::backend::TextureHandle;
use super::command::{Command, CommandList, ViewRef};

/// 描述符组数量
pub const GROUP_COUNT: usize = 256;

/// 每组描述符数量
pub const REGISTER_COUNT: usize = 10;

/// CBV 寄存器数量（b0-b4）
pub const CBV_REGISTER_COUNT: usize = 5;

/// SRV 寄存器数量（t0-t4）
pub const SRV_REGISTER_COUNT: usize = 5;

/// b0 在组内的偏移
pub const CBV_REGISTER: usize = 0;

/// t0 在组内的偏移
pub const SRV_REGISTER: usize = CBV_REGISTER_COUNT;

/// 描述符表分配器
#[derive(Debug)]
pub struct DescriptorTable {
    group_count: usize,
    cursor: usize,
    staged: [Option<ViewRef>; REGISTER_COUNT],
}

impl DescriptorTable {
    pub fn new(group_count: usize) -> Self {
        Self {
            group_count,
            cursor: 0,
            staged: [None; REGISTER_COUNT],
        }
    }

    #[inline]
    pub fn group_count(&self) -> usize {
        self.group_count
    }

    /// 下一个将被提交的组
    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// 帧开始时归零
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.staged = [None; REGISTER_COUNT];
    }

    /// 暂存常量缓冲区槽位到 b`register`
    pub fn set_cbv(&mut self, slot: usize, register: usize) -> Result<()> {
        if register >= CBV_REGISTER_COUNT {
            return Err(GraphicsError::CommandExecution(format!(
                "CBV register b{} out of range",
                register
            ))
            .into());
        }
        self.staged[CBV_REGISTER + register] = Some(ViewRef::Cbv(slot));
        Ok(())
    }

    /// 暂存纹理 SRV 到 t`register`
    pub fn set_srv(&mut self, texture: TextureHandle, register: usize) -> Result<()> {
        if register >= SRV_REGISTER_COUNT {
            return Err(GraphicsError::CommandExecution(format!(
                "SRV register t{} out of range",
                register
            ))
            .into());
        }
        self.staged[SRV_REGISTER + register] = Some(ViewRef::Srv(texture));
        Ok(())
    }

    /// 提交当前组：记录复制命令与表绑定，返回组编号
    pub fn commit(&mut self, list: &mut CommandList) -> Result<usize> {
        if self.cursor >= self.group_count {
            return Err(GraphicsError::RingBufferOverrun {
                requested: self.cursor + 1,
                capacity: self.group_count,
            }
            .into());
        }

        let group = self.cursor;
        for (register, view) in self.staged.iter_mut().enumerate() {
            if let Some(src) = view.take() {
                list.record(Command::CopyDescriptor { src, group, register })?;
            }
        }
        list.record(Command::SetDescriptorTable { group })?;

        self.cursor += 1;
        Ok(group)
    }
}

/// 组内描述符在整个堆中的索引
#[inline]
pub fn heap_index(group: usize, register: usize) -> usize {
    group * REGISTER_COUNT + register
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_records_copies() {
        let mut table = DescriptorTable::new(GROUP_COUNT);
        let mut list = CommandList::new();
        list.begin().unwrap();

        table.set_cbv(7, 0).unwrap();
        table.set_srv(TextureHandle(1), 0).unwrap();
        assert_eq!(table.commit(&mut list).unwrap(), 0);
        assert_eq!(table.cursor(), 1);

        assert_eq!(
            list.commands(),
            &[
                Command::CopyDescriptor { src: ViewRef::Cbv(7), group: 0, register: 0 },
                Command::CopyDescriptor { src: ViewRef::Srv(TextureHandle(1)), group: 0, register: 5 },
                Command::SetDescriptorTable { group: 0 },
            ]
        );

        // 已提交的视图不会带到下一组
        assert_eq!(table.commit(&mut list).unwrap(), 1);
        assert_eq!(list.commands().last(), Some(&Command::SetDescriptorTable { group: 1 }));
        assert_eq!(list.commands().len(), 4);
    }

    #[test]
    fn test_register_bounds() {
        let mut table = DescriptorTable::new(1);
        assert!(table.set_cbv(0, 5).is_err());
        assert!(table.set_srv(TextureHandle(0), 5).is_err());
        assert!(table.set_cbv(0, 4).is_ok());
    }

    #[test]
    fn test_group_overrun() {
        let mut table = DescriptorTable::new(1);
        let mut list = CommandList::new();
        list.begin().unwrap();

        table.commit(&mut list).unwrap();
        let err = table.commit(&mut list).unwrap_err();
        assert!(!err.is_fatal());

        table.reset();
        assert_eq!(table.commit(&mut list).unwrap(), 0);
    }

    #[test]
    fn test_heap_index() {
        assert_eq!(heap_index(0, SRV_REGISTER), 5);
        assert_eq!(heap_index(3, CBV_REGISTER), 30);
    }
}
