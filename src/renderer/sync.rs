//! GPU 同步模块
//!
//! 每次提交后在命令队列上 signal 一个单调递增的 Fence 值，
//! CPU 阻塞直到 GPU 报告该值已完成。整个程序只有这一种同步方式。

use std::fmt;

/// Fence 值
///
/// 每次提交 signal `上一次的值 + 1`，从 0 开始。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FenceValue(u64);

impl FenceValue {
    pub const ZERO: FenceValue = FenceValue(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// 获取内部值
    pub fn value(&self) -> u64 {
        self.0
    }

    /// 下一个 Fence 值
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// 递增并返回新值
    pub fn increment(&mut self) -> Self {
        self.0 += 1;
        *self
    }
}

impl fmt::Display for FenceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fence_value() {
        let mut fence = FenceValue::ZERO;
        assert_eq!(fence.next(), FenceValue::new(1));
        assert_eq!(fence.value(), 0);

        assert_eq!(fence.increment(), FenceValue::new(1));
        assert_eq!(fence.increment().value(), 2);
        assert!(FenceValue::new(1) < fence);
    }
}
