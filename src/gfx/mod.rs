//! 图形后端模块
//!
//! 两个后端都实现 `renderer::RenderBackend`：
//! - software：CPU 光栅化，无需 GPU，任何平台可用
//! - DirectX 12：仅 Windows

pub mod software;
#[cfg(target_os = "windows")]
pub mod dx12;

pub use software::SoftwareBackend;
#[cfg(target_os = "windows")]
pub use dx12::Dx12Backend;
