//! DirectX 12 图形 API 实现模块
//!
//! - backend: 按初始化阶段创建设备、命令队列、交换链等，并翻译命令列表
//! - descriptor: 描述符堆与句柄计算
//! - pipeline: 根签名、着色器编译、管线状态
//! - resource: 缓冲区、纹理与资源屏障辅助函数

pub mod backend;
pub mod descriptor;
pub mod pipeline;
pub mod resource;

pub use backend::Dx12Backend;
