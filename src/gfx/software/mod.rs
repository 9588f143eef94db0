//! CPU 参考后端
//!
//! 在没有 GPU 的环境下执行 Engine 记录的命令列表：校验资源状态转换、
//! 清除、绑定描述符表、光栅化索引三角形（带深度测试）、在两个 RGBA8
//! 后台缓冲之间 present，并推进 Fence。无头运行模式与集成测试都基于它。

pub mod backend;
pub mod raster;

pub use backend::{BarrierRecord, SoftwareBackend};
pub use raster::DepthBuffer;
