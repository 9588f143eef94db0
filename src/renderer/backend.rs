//! 渲染后端接口
//!
//! Engine 只通过 `RenderBackend` 与图形 API 交互。后端负责按阶段创建子系统、
//! 上传资源、执行 Engine 记录好的命令列表、present 以及等待 Fence。
//! 帧状态、常量缓冲区游标、描述符表游标等簿记都留在 Engine 中。

use raw_window_handle::RawWindowHandle;
use std::fmt;

use crate::core::error::{GraphicsError, Result};
use crate::geometry::{MeshData, TextureData};
use super::command::CommandList;
use super::sync::FenceValue;

/// 已上传网格的句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub(crate) usize);

/// 已上传纹理的句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub(crate) usize);

impl MeshHandle {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl TextureHandle {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// 窗口信息
///
/// 无头运行时 `handle` 为 `None`。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowInfo {
    pub handle: Option<RawWindowHandle>,
    pub width: u32,
    pub height: u32,
}

impl WindowInfo {
    pub fn new(handle: Option<RawWindowHandle>, width: u32, height: u32) -> Self {
        Self { handle, width, height }
    }

    pub fn headless(width: u32, height: u32) -> Self {
        Self::new(None, width, height)
    }
}

impl Default for WindowInfo {
    fn default() -> Self {
        Self::headless(600, 600)
    }
}

/// 初始化阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InitStage {
    Device,
    CommandQueue,
    SwapChain,
    RenderTargetViews,
    RootSignature,
    ConstantBuffer,
    DescriptorHeap,
    DepthStencilView,
}

impl InitStage {
    /// 初始化顺序
    pub const ORDER: [InitStage; 8] = [
        InitStage::Device,
        InitStage::CommandQueue,
        InitStage::SwapChain,
        InitStage::RenderTargetViews,
        InitStage::RootSignature,
        InitStage::ConstantBuffer,
        InitStage::DescriptorHeap,
        InitStage::DepthStencilView,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            InitStage::Device => "device",
            InitStage::CommandQueue => "command queue",
            InitStage::SwapChain => "swap chain",
            InitStage::RenderTargetViews => "render target views",
            InitStage::RootSignature => "root signature",
            InitStage::ConstantBuffer => "constant buffer",
            InitStage::DescriptorHeap => "descriptor heap",
            InitStage::DepthStencilView => "depth stencil view",
        }
    }

    /// 该阶段依赖的阶段
    pub fn prerequisites(&self) -> &'static [InitStage] {
        match self {
            InitStage::Device => &[],
            InitStage::CommandQueue => &[InitStage::Device],
            InitStage::SwapChain => &[InitStage::Device, InitStage::CommandQueue],
            InitStage::RenderTargetViews => &[InitStage::Device, InitStage::SwapChain],
            InitStage::RootSignature
            | InitStage::ConstantBuffer
            | InitStage::DescriptorHeap
            | InitStage::DepthStencilView => &[InitStage::Device],
        }
    }
}

impl fmt::Display for InitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 统一的渲染后端接口
///
/// # 方法说明
///
/// - `run_init_stage()`: 创建一个子系统，依赖未就绪时返回 `MissingDependency`
/// - `create_pipeline_state()`: 所有阶段完成后创建唯一的管线状态
/// - `constant_buffer_memory()`: 常量缓冲区的 CPU 可写映射
/// - `execute()`: 执行一个已关闭的命令列表
/// - `present()` / `wait_for_gpu()`: 呈现并阻塞到 GPU 完成
pub trait RenderBackend {
    /// 后端名称，用于日志
    fn name(&self) -> &'static str;

    /// 某个初始化阶段是否已完成
    fn is_stage_complete(&self, stage: InitStage) -> bool;

    /// 执行一个初始化阶段
    fn run_init_stage(&mut self, stage: InitStage, window: &WindowInfo) -> Result<()>;

    /// 创建管线状态（需要根签名和深度格式）
    fn create_pipeline_state(&mut self) -> Result<()>;

    /// 常量缓冲区的映射内存，长度为 `槽位大小 * 槽位数量`
    fn constant_buffer_memory(&mut self) -> Result<&mut [u8]>;

    /// 创建顶点/索引缓冲区
    fn upload_mesh(&mut self, mesh: &MeshData) -> Result<MeshHandle>;

    /// 创建纹理资源和 SRV，返回前等待复制完成
    fn upload_texture(&mut self, texture: &TextureData) -> Result<TextureHandle>;

    /// 重置命令分配器与命令列表
    fn reset_commands(&mut self) -> Result<()>;

    /// 翻译并提交命令列表
    fn execute(&mut self, list: &CommandList) -> Result<()>;

    /// 呈现当前后台缓冲
    fn present(&mut self, vsync: bool) -> Result<()>;

    /// signal 下一个 Fence 值并阻塞到 GPU 完成
    fn wait_for_gpu(&mut self) -> Result<FenceValue>;

    /// 检查某阶段的依赖是否都已完成
    fn ensure_prerequisites(&self, stage: InitStage) -> Result<()> {
        match stage
            .prerequisites()
            .iter()
            .find(|required| !self.is_stage_complete(**required))
        {
            Some(required) => Err(GraphicsError::MissingDependency {
                stage: stage.name(),
                requires: required.name(),
            }
            .into()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_respects_prerequisites() {
        for (i, stage) in InitStage::ORDER.iter().enumerate() {
            for required in stage.prerequisites() {
                let pos = InitStage::ORDER.iter().position(|s| s == required).unwrap();
                assert!(pos < i, "{} must come after {}", stage, required);
            }
        }
    }

    #[test]
    fn test_default_window() {
        let window = WindowInfo::default();
        assert_eq!((window.width, window.height), (600, 600));
        assert!(window.handle.is_none());
    }
}
