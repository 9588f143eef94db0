//! 软件后端实现
//!
//! 每个子系统都是一个 `Option` 字段，按初始化阶段依次填充；
//! 阶段依赖未就绪时返回 `MissingDependency`。

use image::RgbaImage;
use std::path::Path;
use tracing::{debug, trace};

use crate::core::error::{DxPracticeError, GraphicsError, Result};
use crate::geometry::{MeshData, TextureData, Transform};
use crate::renderer::backend::{InitStage, MeshHandle, RenderBackend, TextureHandle, WindowInfo};
use crate::renderer::command::{Command, CommandList, ResourceState, ScissorRect, ViewRef, Viewport};
use crate::renderer::constant_buffer::{align_constant_buffer_size, CONSTANT_BUFFER_SLOTS};
use crate::renderer::descriptor::{heap_index, CBV_REGISTER, GROUP_COUNT, REGISTER_COUNT, SRV_REGISTER};
use crate::renderer::frame::SWAP_CHAIN_BUFFER_COUNT;
use crate::renderer::sync::FenceValue;
use super::raster::{self, DepthBuffer, DrawCall};

/// 一次资源状态转换
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierRecord {
    pub back_buffer: usize,
    pub before: ResourceState,
    pub after: ResourceState,
}

#[derive(Debug)]
struct Device {
    adapter: &'static str,
}

#[derive(Debug, Default)]
struct CommandQueue {
    fence: FenceValue,
    /// 已提交但尚未等待完成
    in_flight: bool,
    allocator_resets: u64,
}

#[derive(Debug)]
struct SwapChain {
    buffers: Vec<RgbaImage>,
    states: Vec<ResourceState>,
    current: usize,
    presents: u64,
    last_presented: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
struct RootSignature {
    cbv_count: usize,
    srv_count: usize,
}

#[derive(Debug, Clone, Copy)]
struct PipelineState {
    depth_test: bool,
}

/// 执行一个命令列表时的绑定状态
#[derive(Debug, Default)]
struct BindState {
    root_signature: bool,
    descriptor_heap: bool,
    pipeline: bool,
    topology: bool,
    viewport: Option<Viewport>,
    scissor: Option<ScissorRect>,
    render_target: Option<usize>,
    depth: bool,
    table: Option<usize>,
    vertex_buffer: Option<MeshHandle>,
    index_buffer: Option<MeshHandle>,
}

/// CPU 参考后端
#[derive(Debug, Default)]
pub struct SoftwareBackend {
    device: Option<Device>,
    queue: Option<CommandQueue>,
    swap_chain: Option<SwapChain>,
    render_target_views: Option<usize>,
    root_signature: Option<RootSignature>,
    constant_buffer: Option<Vec<u8>>,
    descriptor_heap: Option<Vec<Option<ViewRef>>>,
    depth_buffer: Option<DepthBuffer>,
    pipeline: Option<PipelineState>,

    meshes: Vec<MeshData>,
    textures: Vec<TextureData>,

    barrier_log: Vec<BarrierRecord>,
    draw_calls: u64,
    device_removed: Option<String>,
}

impl SoftwareBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn create_stage(&mut self, stage: InitStage, window: &WindowInfo) -> Result<()> {
        match stage {
            InitStage::Device => {
                self.device = Some(Device { adapter: "Software Rasterizer" });
            }
            InitStage::CommandQueue => {
                self.queue = Some(CommandQueue::default());
            }
            InitStage::SwapChain => {
                self.swap_chain = Some(SwapChain {
                    buffers: (0..SWAP_CHAIN_BUFFER_COUNT)
                        .map(|_| RgbaImage::new(window.width, window.height))
                        .collect(),
                    states: vec![ResourceState::Present; SWAP_CHAIN_BUFFER_COUNT],
                    current: 0,
                    presents: 0,
                    last_presented: None,
                });
            }
            InitStage::RenderTargetViews => {
                let count = self.swap_chain.as_ref().map_or(0, |sc| sc.buffers.len());
                self.render_target_views = Some(count);
            }
            InitStage::RootSignature => {
                self.root_signature = Some(RootSignature {
                    cbv_count: SRV_REGISTER - CBV_REGISTER,
                    srv_count: REGISTER_COUNT - SRV_REGISTER,
                });
            }
            InitStage::ConstantBuffer => {
                let slot_size = align_constant_buffer_size(std::mem::size_of::<Transform>());
                self.constant_buffer = Some(vec![0; slot_size * CONSTANT_BUFFER_SLOTS]);
            }
            InitStage::DescriptorHeap => {
                self.descriptor_heap = Some(vec![None; GROUP_COUNT * REGISTER_COUNT]);
            }
            InitStage::DepthStencilView => {
                self.depth_buffer = Some(DepthBuffer::new(window.width, window.height));
            }
        }
        Ok(())
    }

    fn check_device(&self) -> Result<()> {
        match &self.device_removed {
            Some(reason) => Err(GraphicsError::DeviceRemoved(reason.clone()).into()),
            None => Ok(()),
        }
    }

    fn missing(what: &str) -> DxPracticeError {
        GraphicsError::CommandExecution(format!("{} has not been created", what)).into()
    }

    fn transition(&mut self, back_buffer: usize, before: ResourceState, after: ResourceState) -> Result<()> {
        let swap_chain = self.swap_chain.as_mut().ok_or_else(|| Self::missing("swap chain"))?;
        let state = swap_chain.states.get_mut(back_buffer).ok_or_else(|| {
            DxPracticeError::from(GraphicsError::CommandExecution(format!(
                "Back buffer {} does not exist",
                back_buffer
            )))
        })?;

        if *state != before {
            return Err(GraphicsError::InvalidResourceState {
                resource: format!("back buffer {}", back_buffer),
                expected: before.name().to_string(),
                actual: state.name().to_string(),
            }
            .into());
        }

        *state = after;
        self.barrier_log.push(BarrierRecord { back_buffer, before, after });
        trace!(back_buffer, from = before.name(), to = after.name(), "Resource barrier");
        Ok(())
    }

    fn require_render_target(&self, back_buffer: usize) -> Result<()> {
        let swap_chain = self.swap_chain.as_ref().ok_or_else(|| Self::missing("swap chain"))?;
        if self.render_target_views.is_none() {
            return Err(Self::missing("render target view"));
        }
        if back_buffer != swap_chain.current {
            return Err(GraphicsError::CommandExecution(format!(
                "Back buffer {} is not the current buffer {}",
                back_buffer, swap_chain.current
            ))
            .into());
        }

        let actual = swap_chain.states[back_buffer];
        if actual != ResourceState::RenderTarget {
            return Err(GraphicsError::InvalidResourceState {
                resource: format!("back buffer {}", back_buffer),
                expected: ResourceState::RenderTarget.name().to_string(),
                actual: actual.name().to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn execute_command(&mut self, command: &Command, bind: &mut BindState) -> Result<()> {
        match *command {
            Command::SetRootSignature => {
                self.root_signature.ok_or_else(|| Self::missing("root signature"))?;
                bind.root_signature = true;
            }
            Command::SetDescriptorHeap => {
                if self.descriptor_heap.is_none() {
                    return Err(Self::missing("descriptor heap"));
                }
                bind.descriptor_heap = true;
            }
            Command::ResourceBarrier { back_buffer, before, after } => {
                self.transition(back_buffer, before, after)?;
            }
            Command::SetViewport(viewport) => bind.viewport = Some(viewport),
            Command::SetScissor(scissor) => bind.scissor = Some(scissor),
            Command::ClearRenderTarget { back_buffer, color } => {
                self.require_render_target(back_buffer)?;
                if let Some(swap_chain) = self.swap_chain.as_mut() {
                    raster::clear(&mut swap_chain.buffers[back_buffer], color);
                }
            }
            Command::ClearDepth(value) => {
                self.depth_buffer
                    .as_mut()
                    .ok_or_else(|| Self::missing("depth stencil view"))?
                    .clear(value);
            }
            Command::SetRenderTargets { back_buffer, depth } => {
                self.require_render_target(back_buffer)?;
                if depth && self.depth_buffer.is_none() {
                    return Err(Self::missing("depth stencil view"));
                }
                bind.render_target = Some(back_buffer);
                bind.depth = depth;
            }
            Command::SetPipelineState => {
                self.pipeline.ok_or_else(|| Self::missing("pipeline state"))?;
                bind.pipeline = true;
            }
            Command::SetPrimitiveTopology => bind.topology = true,
            Command::SetVertexBuffer(mesh) => {
                self.mesh(mesh)?;
                bind.vertex_buffer = Some(mesh);
            }
            Command::SetIndexBuffer(mesh) => {
                self.mesh(mesh)?;
                bind.index_buffer = Some(mesh);
            }
            Command::CopyDescriptor { src, group, register } => {
                if let ViewRef::Srv(texture) = src {
                    self.texture(texture)?;
                }
                let heap = self
                    .descriptor_heap
                    .as_mut()
                    .ok_or_else(|| Self::missing("descriptor heap"))?;
                let index = heap_index(group, register);
                let slot = heap.get_mut(index).ok_or_else(|| {
                    DxPracticeError::from(GraphicsError::RingBufferOverrun {
                        requested: index + 1,
                        capacity: GROUP_COUNT * REGISTER_COUNT,
                    })
                })?;
                *slot = Some(src);
            }
            Command::SetDescriptorTable { group } => {
                if !bind.root_signature || !bind.descriptor_heap {
                    return Err(GraphicsError::CommandExecution(
                        "Descriptor table set before root signature and heap".to_string(),
                    )
                    .into());
                }
                bind.table = Some(group);
            }
            Command::DrawIndexed { index_count, start_index, base_vertex } => {
                self.draw(bind, index_count, start_index, base_vertex)?;
            }
        }
        Ok(())
    }

    fn draw(&mut self, bind: &BindState, index_count: u32, start_index: u32, base_vertex: i32) -> Result<()> {
        let not_bound = |what: &str| -> DxPracticeError {
            GraphicsError::CommandExecution(format!("DrawIndexed without {}", what)).into()
        };

        if !bind.pipeline {
            return Err(not_bound("pipeline state"));
        }
        if !bind.topology {
            return Err(not_bound("primitive topology"));
        }
        let back_buffer = bind.render_target.ok_or_else(|| not_bound("render target"))?;
        let group = bind.table.ok_or_else(|| not_bound("descriptor table"))?;
        let vb = bind.vertex_buffer.ok_or_else(|| not_bound("vertex buffer"))?;
        let ib = bind.index_buffer.ok_or_else(|| not_bound("index buffer"))?;
        let viewport = bind.viewport.ok_or_else(|| not_bound("viewport"))?;
        let scissor = bind.scissor.ok_or_else(|| not_bound("scissor rect"))?;
        if vb != ib {
            return Err(GraphicsError::CommandExecution(
                "Vertex and index buffers belong to different meshes".to_string(),
            )
            .into());
        }
        self.require_render_target(back_buffer)?;

        let heap = self
            .descriptor_heap
            .as_ref()
            .ok_or_else(|| Self::missing("descriptor heap"))?;
        let cbv = heap[heap_index(group, CBV_REGISTER)];
        let srv = heap[heap_index(group, SRV_REGISTER)];

        let slot = match cbv {
            Some(ViewRef::Cbv(slot)) => slot,
            _ => return Err(not_bound("constant buffer view in b0")),
        };
        let transform = self.read_transform(slot)?;
        let depth_test = self.pipeline.map_or(false, |p| p.depth_test) && bind.depth;

        // 以下只借用互不相交的字段
        let texture = match srv {
            Some(ViewRef::Srv(texture)) => Some(lookup_texture(&self.textures, texture)?),
            _ => None,
        };

        let call = DrawCall {
            mesh: lookup_mesh(&self.meshes, vb)?,
            transform,
            texture,
            viewport,
            scissor,
            index_count,
            start_index,
            base_vertex,
        };

        let swap_chain = self.swap_chain.as_mut().ok_or_else(|| Self::missing("swap chain"))?;
        let target = &mut swap_chain.buffers[back_buffer];
        let depth = if depth_test { self.depth_buffer.as_mut() } else { None };

        let written = raster::draw_indexed(target, depth, &call)?;
        self.draw_calls += 1;
        trace!(mesh = vb.index(), slot, written, "DrawIndexed");
        Ok(())
    }

    fn read_transform(&self, slot: usize) -> Result<Transform> {
        let memory = self
            .constant_buffer
            .as_ref()
            .ok_or_else(|| Self::missing("constant buffer"))?;
        let slot_size = align_constant_buffer_size(std::mem::size_of::<Transform>());
        let start = slot * slot_size;
        let bytes = memory
            .get(start..start + std::mem::size_of::<Transform>())
            .ok_or_else(|| {
                DxPracticeError::from(GraphicsError::RingBufferOverrun {
                    requested: slot + 1,
                    capacity: CONSTANT_BUFFER_SLOTS,
                })
            })?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    fn mesh(&self, handle: MeshHandle) -> Result<&MeshData> {
        lookup_mesh(&self.meshes, handle)
    }

    fn texture(&self, handle: TextureHandle) -> Result<&TextureData> {
        lookup_texture(&self.textures, handle)
    }

    /// 模拟设备移除，之后的提交、present 与等待都会失败
    pub fn simulate_device_removed(&mut self, reason: impl Into<String>) {
        self.device_removed = Some(reason.into());
    }

    /// 所有资源状态转换记录
    pub fn barrier_log(&self) -> &[BarrierRecord] {
        &self.barrier_log
    }

    pub fn clear_barrier_log(&mut self) {
        self.barrier_log.clear();
    }

    /// 累计执行的 DrawIndexed 数量
    pub fn draw_calls(&self) -> u64 {
        self.draw_calls
    }

    pub fn present_count(&self) -> u64 {
        self.swap_chain.as_ref().map_or(0, |sc| sc.presents)
    }

    /// 最近一次 signal 的 Fence 值
    pub fn fence_value(&self) -> FenceValue {
        self.queue.as_ref().map_or(FenceValue::ZERO, |q| q.fence)
    }

    pub fn allocator_resets(&self) -> u64 {
        self.queue.as_ref().map_or(0, |q| q.allocator_resets)
    }

    /// 交换链当前后台缓冲索引
    pub fn current_back_buffer(&self) -> Option<usize> {
        self.swap_chain.as_ref().map(|sc| sc.current)
    }

    pub fn back_buffer_state(&self, index: usize) -> Option<ResourceState> {
        self.swap_chain.as_ref().and_then(|sc| sc.states.get(index).copied())
    }

    pub fn back_buffer(&self, index: usize) -> Option<&RgbaImage> {
        self.swap_chain.as_ref().and_then(|sc| sc.buffers.get(index))
    }

    /// 最近一次 present 的画面
    pub fn presented_frame(&self) -> Option<&RgbaImage> {
        let swap_chain = self.swap_chain.as_ref()?;
        swap_chain.last_presented.and_then(|i| swap_chain.buffers.get(i))
    }

    pub fn depth_buffer(&self) -> Option<&DepthBuffer> {
        self.depth_buffer.as_ref()
    }

    pub fn adapter_name(&self) -> Option<&'static str> {
        self.device.as_ref().map(|d| d.adapter)
    }

    /// 把最近一次 present 的画面保存为图片
    pub fn save_presented_frame(&self, path: &Path) -> Result<()> {
        let frame = self
            .presented_frame()
            .ok_or_else(|| DxPracticeError::Runtime("No frame has been presented".to_string()))?;
        frame.save(path)?;
        Ok(())
    }
}

fn lookup_mesh(meshes: &[MeshData], handle: MeshHandle) -> Result<&MeshData> {
    meshes.get(handle.index()).ok_or_else(|| {
        GraphicsError::CommandExecution(format!("Unknown mesh handle {}", handle.index())).into()
    })
}

fn lookup_texture(textures: &[TextureData], handle: TextureHandle) -> Result<&TextureData> {
    textures.get(handle.index()).ok_or_else(|| {
        GraphicsError::CommandExecution(format!("Unknown texture handle {}", handle.index())).into()
    })
}

impl RenderBackend for SoftwareBackend {
    fn name(&self) -> &'static str {
        "Software"
    }

    fn is_stage_complete(&self, stage: InitStage) -> bool {
        match stage {
            InitStage::Device => self.device.is_some(),
            InitStage::CommandQueue => self.queue.is_some(),
            InitStage::SwapChain => self.swap_chain.is_some(),
            InitStage::RenderTargetViews => self.render_target_views.is_some(),
            InitStage::RootSignature => self.root_signature.is_some(),
            InitStage::ConstantBuffer => self.constant_buffer.is_some(),
            InitStage::DescriptorHeap => self.descriptor_heap.is_some(),
            InitStage::DepthStencilView => self.depth_buffer.is_some(),
        }
    }

    fn run_init_stage(&mut self, stage: InitStage, window: &WindowInfo) -> Result<()> {
        self.ensure_prerequisites(stage)?;
        self.create_stage(stage, window)?;
        debug!("Software {} created", stage);
        Ok(())
    }

    fn create_pipeline_state(&mut self) -> Result<()> {
        let root_signature = self.root_signature.ok_or_else(|| {
            DxPracticeError::from(GraphicsError::MissingDependency {
                stage: "pipeline state",
                requires: InitStage::RootSignature.name(),
            })
        })?;
        if self.depth_buffer.is_none() {
            return Err(GraphicsError::MissingDependency {
                stage: "pipeline state",
                requires: InitStage::DepthStencilView.name(),
            }
            .into());
        }

        debug!(
            cbvs = root_signature.cbv_count,
            srvs = root_signature.srv_count,
            "Software pipeline state created"
        );
        self.pipeline = Some(PipelineState { depth_test: true });
        Ok(())
    }

    fn constant_buffer_memory(&mut self) -> Result<&mut [u8]> {
        self.constant_buffer
            .as_deref_mut()
            .ok_or_else(|| Self::missing("constant buffer"))
    }

    fn upload_mesh(&mut self, mesh: &MeshData) -> Result<MeshHandle> {
        if self.device.is_none() {
            return Err(Self::missing("device"));
        }
        self.meshes.push(mesh.clone());
        Ok(MeshHandle(self.meshes.len() - 1))
    }

    fn upload_texture(&mut self, texture: &TextureData) -> Result<TextureHandle> {
        if self.device.is_none() || self.queue.is_none() {
            return Err(Self::missing("command queue"));
        }
        self.textures.push(texture.clone());
        // 复制完成后等待，与 GPU 后端的上传路径一致
        self.wait_for_gpu()?;
        Ok(TextureHandle(self.textures.len() - 1))
    }

    fn reset_commands(&mut self) -> Result<()> {
        let queue = self.queue.as_mut().ok_or_else(|| Self::missing("command queue"))?;
        if queue.in_flight {
            return Err(GraphicsError::CommandExecution(
                "Command allocator reset while GPU work is in flight".to_string(),
            )
            .into());
        }
        queue.allocator_resets += 1;
        Ok(())
    }

    fn execute(&mut self, list: &CommandList) -> Result<()> {
        self.check_device()?;
        if !list.is_closed() {
            return Err(GraphicsError::CommandExecution(
                "Command list submitted before close".to_string(),
            )
            .into());
        }

        let mut bind = BindState::default();
        for command in list.commands() {
            self.execute_command(command, &mut bind)?;
        }

        if let Some(queue) = self.queue.as_mut() {
            queue.in_flight = true;
        }
        Ok(())
    }

    fn present(&mut self, _vsync: bool) -> Result<()> {
        self.check_device()?;
        let swap_chain = self.swap_chain.as_mut().ok_or_else(|| Self::missing("swap chain"))?;

        let current = swap_chain.current;
        let state = swap_chain.states[current];
        if state != ResourceState::Present {
            return Err(GraphicsError::InvalidResourceState {
                resource: format!("back buffer {}", current),
                expected: ResourceState::Present.name().to_string(),
                actual: state.name().to_string(),
            }
            .into());
        }

        swap_chain.last_presented = Some(current);
        swap_chain.current = (current + 1) % swap_chain.buffers.len();
        swap_chain.presents += 1;
        Ok(())
    }

    fn wait_for_gpu(&mut self) -> Result<FenceValue> {
        self.check_device()?;
        let queue = self.queue.as_mut().ok_or_else(|| Self::missing("command queue"))?;
        let value = queue.fence.increment();
        queue.in_flight = false;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn initialized() -> SoftwareBackend {
        let mut backend = SoftwareBackend::new();
        let window = WindowInfo::headless(16, 16);
        for stage in InitStage::ORDER {
            backend.run_init_stage(stage, &window).unwrap();
        }
        backend.create_pipeline_state().unwrap();
        backend
    }

    #[test]
    fn test_stage_before_prerequisite() {
        let mut backend = SoftwareBackend::new();
        let err = backend
            .run_init_stage(InitStage::SwapChain, &WindowInfo::default())
            .unwrap_err();
        assert!(matches!(
            err,
            DxPracticeError::Graphics(GraphicsError::MissingDependency { stage: "swap chain", requires: "device" })
        ));
        assert!(err.is_fatal());
        assert!(!backend.is_stage_complete(InitStage::SwapChain));
    }

    #[test]
    fn test_pipeline_needs_depth() {
        let mut backend = SoftwareBackend::new();
        let window = WindowInfo::default();
        for stage in &InitStage::ORDER[..5] {
            backend.run_init_stage(*stage, &window).unwrap();
        }
        assert!(backend.create_pipeline_state().is_err());
    }

    #[test]
    fn test_barrier_mismatch_is_fatal() {
        let mut backend = initialized();
        let mut list = CommandList::new();
        list.begin().unwrap();
        list.record(Command::ResourceBarrier {
            back_buffer: 0,
            before: ResourceState::RenderTarget,
            after: ResourceState::Present,
        })
        .unwrap();
        list.close().unwrap();

        let err = backend.execute(&list).unwrap_err();
        assert!(matches!(
            err,
            DxPracticeError::Graphics(GraphicsError::InvalidResourceState { .. })
        ));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_open_list_rejected() {
        let mut backend = initialized();
        let mut list = CommandList::new();
        list.begin().unwrap();
        assert!(backend.execute(&list).is_err());
    }

    #[test]
    fn test_present_requires_present_state() {
        let mut backend = initialized();
        let mut list = CommandList::new();
        list.begin().unwrap();
        list.record(Command::ResourceBarrier {
            back_buffer: 0,
            before: ResourceState::Present,
            after: ResourceState::RenderTarget,
        })
        .unwrap();
        list.close().unwrap();

        backend.execute(&list).unwrap();
        assert!(backend.present(false).is_err());
    }

    #[test]
    fn test_device_removed() {
        let mut backend = initialized();
        backend.simulate_device_removed("DXGI_ERROR_DEVICE_HUNG");
        let err = backend.wait_for_gpu().unwrap_err();
        assert!(matches!(err, DxPracticeError::Graphics(GraphicsError::DeviceRemoved(_))));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_reset_while_in_flight() {
        let mut backend = initialized();
        let mut list = CommandList::new();
        list.begin().unwrap();
        list.close().unwrap();

        backend.reset_commands().unwrap();
        backend.execute(&list).unwrap();
        assert!(backend.reset_commands().is_err());
        backend.wait_for_gpu().unwrap();
        assert!(backend.reset_commands().is_ok());
        assert_eq!(backend.allocator_resets(), 2);
    }
}
