//! 帧状态
//!
//! 交换链固定为双缓冲，每次 present 之后当前后台缓冲索引按 2 取模前进。

/// 交换链缓冲数量
pub const SWAP_CHAIN_BUFFER_COUNT: usize = 2;

/// 一帧开始或结束时的簿记快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameState {
    /// 当前后台缓冲索引（0 或 1）
    pub back_buffer_index: usize,
    /// 常量缓冲区写游标
    pub constant_buffer_cursor: usize,
    /// 描述符表写游标
    pub descriptor_table_cursor: usize,
}

/// 后台缓冲轮转与帧计数
#[derive(Debug, Default)]
pub struct FrameCounter {
    back_buffer_index: usize,
    frame_number: u64,
}

impl FrameCounter {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn back_buffer_index(&self) -> usize {
        self.back_buffer_index
    }

    /// 已完成的帧数
    #[inline]
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// present 之后调用
    pub fn advance(&mut self) {
        self.back_buffer_index = (self.back_buffer_index + 1) % SWAP_CHAIN_BUFFER_COUNT;
        self.frame_number += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_back_buffer_alternates() {
        let mut counter = FrameCounter::new();
        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(counter.back_buffer_index());
            counter.advance();
        }
        assert_eq!(seen, vec![0, 1, 0, 1, 0]);
        assert_eq!(counter.frame_number(), 5);
    }
}
