//! DirectX 12 后端
//!
//! 每个子系统是一个 `Option` 字段，`run_init_stage` 按阶段填充，
//! 后续阶段借用前面阶段创建的对象。Engine 记录的命令列表在 `execute`
//! 中被逐条翻译为 `ID3D12GraphicsCommandList` 调用。

use std::ffi::c_void;
use raw_window_handle::RawWindowHandle;
use tracing::{debug, info, trace, warn};
use windows::core::Interface;
use windows::Win32::Foundation::{CloseHandle, HANDLE, HWND, RECT};
use windows::Win32::Graphics::Direct3D::*;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;
use windows::Win32::Graphics::Dxgi::*;
use windows::Win32::System::Threading::{CreateEventA, WaitForSingleObject, INFINITE};

use crate::core::error::{DxPracticeError, GraphicsError, Result};
use crate::geometry::{MeshData, TextureData, Transform, Vertex};
use crate::renderer::backend::{InitStage, MeshHandle, RenderBackend, TextureHandle, WindowInfo};
use crate::renderer::command::{Command, CommandList, ResourceState, ViewRef};
use crate::renderer::constant_buffer::{align_constant_buffer_size, CONSTANT_BUFFER_SLOTS};
use crate::renderer::descriptor::{heap_index, GROUP_COUNT, REGISTER_COUNT};
use crate::renderer::frame::SWAP_CHAIN_BUFFER_COUNT;
use crate::renderer::sync::FenceValue;
use super::descriptor::Dx12DescriptorHeap;
use super::pipeline::{self, DEPTH_FORMAT, RENDER_TARGET_FORMAT};
use super::resource::{
    aligned_row_pitch, create_buffer_with_data, create_texture_2d, create_upload_buffer,
    d3d12_state, transition_barrier,
};

/// CPU 侧 SRV 堆容量
const MAX_TEXTURES: usize = 64;

struct Device {
    factory: IDXGIFactory4,
    device: ID3D12Device,
}

struct CommandContext {
    queue: ID3D12CommandQueue,
    allocator: ID3D12CommandAllocator,
    list: ID3D12GraphicsCommandList,
    fence: ID3D12Fence,
    fence_value: FenceValue,
    fence_event: HANDLE,
}

struct SwapChain {
    swap_chain: IDXGISwapChain3,
    buffers: Vec<ID3D12Resource>,
}

struct ConstantBuffer {
    resource: ID3D12Resource,
    mapped: *mut u8,
    size: usize,
    /// 每个槽位一个 CBV（CPU 堆）
    views: Dx12DescriptorHeap,
}

struct DepthStencil {
    _resource: ID3D12Resource,
    heap: Dx12DescriptorHeap,
}

struct MeshBuffers {
    _vertex_buffer: ID3D12Resource,
    vertex_view: D3D12_VERTEX_BUFFER_VIEW,
    _index_buffer: ID3D12Resource,
    index_view: D3D12_INDEX_BUFFER_VIEW,
}

/// DirectX 12 后端
pub struct Dx12Backend {
    device: Option<Device>,
    commands: Option<CommandContext>,
    swap_chain: Option<SwapChain>,
    render_targets: Option<Dx12DescriptorHeap>,
    root_signature: Option<ID3D12RootSignature>,
    constant_buffer: Option<ConstantBuffer>,
    /// 着色器可见的 CBV/SRV 堆
    descriptor_heap: Option<Dx12DescriptorHeap>,
    /// 纹理 SRV（CPU 堆）
    texture_views: Option<Dx12DescriptorHeap>,
    depth_stencil: Option<DepthStencil>,
    pipeline: Option<ID3D12PipelineState>,

    meshes: Vec<MeshBuffers>,
    textures: Vec<ID3D12Resource>,
}

fn missing(what: &str) -> DxPracticeError {
    GraphicsError::CommandExecution(format!("{} has not been created", what)).into()
}

/// 设备被移除时返回移除原因
fn check_device_removed(device: &ID3D12Device) -> Result<()> {
    unsafe {
        match device.GetDeviceRemovedReason() {
            Ok(()) => Ok(()),
            Err(e) => Err(GraphicsError::DeviceRemoved(format!("{:?}", e)).into()),
        }
    }
}

impl Dx12Backend {
    pub fn new() -> Self {
        Self {
            device: None,
            commands: None,
            swap_chain: None,
            render_targets: None,
            root_signature: None,
            constant_buffer: None,
            descriptor_heap: None,
            texture_views: None,
            depth_stencil: None,
            pipeline: None,
            meshes: Vec::new(),
            textures: Vec::new(),
        }
    }

    fn device(&self) -> Result<&ID3D12Device> {
        self.device.as_ref().map(|d| &d.device).ok_or_else(|| missing("device"))
    }

    fn command_context(&self) -> Result<&CommandContext> {
        self.commands.as_ref().ok_or_else(|| missing("command queue"))
    }

    fn create_device(&mut self) -> Result<()> {
        unsafe {
            #[cfg(debug_assertions)]
            {
                let mut debug: Option<ID3D12Debug> = None;
                match D3D12GetDebugInterface(&mut debug) {
                    Ok(()) => {
                        if let Some(debug) = debug {
                            debug.EnableDebugLayer();
                            debug!("DX12 Debug Layer enabled");
                        }
                    }
                    Err(_) => warn!("Failed to enable DX12 Debug Layer"),
                }
            }

            let flags = if cfg!(debug_assertions) {
                DXGI_CREATE_FACTORY_DEBUG
            } else {
                DXGI_CREATE_FACTORY_FLAGS(0)
            };
            let factory: IDXGIFactory4 = CreateDXGIFactory2(flags).map_err(|e| {
                GraphicsError::DeviceCreation(format!("Failed to create DXGI factory: {:?}", e))
            })?;

            let mut device: Option<ID3D12Device> = None;
            D3D12CreateDevice(None, D3D_FEATURE_LEVEL_11_0, &mut device).map_err(|e| {
                GraphicsError::DeviceCreation(format!("Failed to create D3D12 device: {:?}", e))
            })?;
            let device = device.ok_or_else(|| GraphicsError::DeviceCreation("D3D12 device is null".to_string()))?;

            self.device = Some(Device { factory, device });
        }
        Ok(())
    }

    fn create_command_queue(&mut self) -> Result<()> {
        let device = self.device()?;
        unsafe {
            let queue_desc = D3D12_COMMAND_QUEUE_DESC {
                Type: D3D12_COMMAND_LIST_TYPE_DIRECT,
                Flags: D3D12_COMMAND_QUEUE_FLAG_NONE,
                ..Default::default()
            };
            let queue: ID3D12CommandQueue = device.CreateCommandQueue(&queue_desc)?;
            let allocator: ID3D12CommandAllocator =
                device.CreateCommandAllocator(D3D12_COMMAND_LIST_TYPE_DIRECT)?;
            let list: ID3D12GraphicsCommandList = device.CreateCommandList(
                0,
                D3D12_COMMAND_LIST_TYPE_DIRECT,
                &allocator,
                None,
            )?;
            // 命令列表创建后处于打开状态，每帧 reset 前必须是关闭的
            list.Close()?;

            let fence: ID3D12Fence = device.CreateFence(0, D3D12_FENCE_FLAG_NONE)?;
            let fence_event = CreateEventA(None, false, false, None)?;

            self.commands = Some(CommandContext {
                queue,
                allocator,
                list,
                fence,
                fence_value: FenceValue::ZERO,
                fence_event,
            });
        }
        Ok(())
    }

    fn create_swap_chain(&mut self, window: &WindowInfo) -> Result<()> {
        let hwnd = match window.handle {
            Some(RawWindowHandle::Win32(handle)) => HWND(handle.hwnd.get() as *mut c_void),
            _ => {
                return Err(GraphicsError::SwapchainError(
                    "DX12 backend requires a Win32 window handle".to_string(),
                )
                .into())
            }
        };

        let factory = &self.device.as_ref().ok_or_else(|| missing("device"))?.factory;
        let queue = &self.command_context()?.queue;

        let desc = DXGI_SWAP_CHAIN_DESC1 {
            Width: window.width,
            Height: window.height,
            Format: RENDER_TARGET_FORMAT,
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                ..Default::default()
            },
            BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
            BufferCount: SWAP_CHAIN_BUFFER_COUNT as u32,
            SwapEffect: DXGI_SWAP_EFFECT_FLIP_DISCARD,
            ..Default::default()
        };

        unsafe {
            let swap_chain: IDXGISwapChain1 = factory
                .CreateSwapChainForHwnd(queue, hwnd, &desc, None, None)
                .map_err(|e| GraphicsError::SwapchainError(format!("Failed to create swap chain: {:?}", e)))?;
            let swap_chain: IDXGISwapChain3 = swap_chain.cast()?;

            let buffers = (0..SWAP_CHAIN_BUFFER_COUNT as u32)
                .map(|i| swap_chain.GetBuffer::<ID3D12Resource>(i))
                .collect::<windows::core::Result<Vec<_>>>()?;

            #[cfg(debug_assertions)]
            info!(width = window.width, height = window.height, buffers = SWAP_CHAIN_BUFFER_COUNT, "Swap chain created");

            self.swap_chain = Some(SwapChain { swap_chain, buffers });
        }
        Ok(())
    }

    fn create_render_target_views(&mut self) -> Result<()> {
        let device = self.device()?;
        let swap_chain = self.swap_chain.as_ref().ok_or_else(|| missing("swap chain"))?;

        let heap = Dx12DescriptorHeap::new(
            device,
            D3D12_DESCRIPTOR_HEAP_TYPE_RTV,
            SWAP_CHAIN_BUFFER_COUNT,
            false,
        )?;
        for (i, buffer) in swap_chain.buffers.iter().enumerate() {
            unsafe { device.CreateRenderTargetView(buffer, None, heap.cpu_handle(i)?) };
        }

        self.render_targets = Some(heap);
        Ok(())
    }

    fn create_constant_buffer(&mut self) -> Result<()> {
        let device = self.device()?;
        let slot_size = align_constant_buffer_size(std::mem::size_of::<Transform>());
        let size = slot_size * CONSTANT_BUFFER_SLOTS;

        let resource = create_upload_buffer(device, size as u64, "constant buffer")?;
        let views = Dx12DescriptorHeap::new(
            device,
            D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV,
            CONSTANT_BUFFER_SLOTS,
            false,
        )?;

        unsafe {
            let base = resource.GetGPUVirtualAddress();
            for slot in 0..CONSTANT_BUFFER_SLOTS {
                let desc = D3D12_CONSTANT_BUFFER_VIEW_DESC {
                    BufferLocation: base + (slot * slot_size) as u64,
                    SizeInBytes: slot_size as u32,
                };
                device.CreateConstantBufferView(Some(&desc), views.cpu_handle(slot)?);
            }

            // 上传堆保持映射直到销毁
            let mut mapped = std::ptr::null_mut();
            resource.Map(0, None, Some(&mut mapped))?;

            self.constant_buffer = Some(ConstantBuffer {
                resource,
                mapped: mapped as *mut u8,
                size,
                views,
            });
        }

        #[cfg(debug_assertions)]
        debug!(slots = CONSTANT_BUFFER_SLOTS, slot_size, "Constant buffer created and mapped");
        Ok(())
    }

    fn create_descriptor_heaps(&mut self) -> Result<()> {
        let device = self.device()?;
        let shader_visible = Dx12DescriptorHeap::new(
            device,
            D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV,
            GROUP_COUNT * REGISTER_COUNT,
            true,
        )?;
        let texture_views = Dx12DescriptorHeap::new(
            device,
            D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV,
            MAX_TEXTURES,
            false,
        )?;

        self.descriptor_heap = Some(shader_visible);
        self.texture_views = Some(texture_views);
        Ok(())
    }

    fn create_depth_stencil(&mut self, window: &WindowInfo) -> Result<()> {
        let device = self.device()?;

        let clear_value = D3D12_CLEAR_VALUE {
            Format: DEPTH_FORMAT,
            Anonymous: D3D12_CLEAR_VALUE_0 {
                DepthStencil: D3D12_DEPTH_STENCIL_VALUE { Depth: 1.0, Stencil: 0 },
            },
        };
        let resource = create_texture_2d(
            device,
            window.width,
            window.height,
            DEPTH_FORMAT,
            D3D12_RESOURCE_FLAG_ALLOW_DEPTH_STENCIL,
            D3D12_RESOURCE_STATE_DEPTH_WRITE,
            Some(&clear_value),
        )?;

        let heap = Dx12DescriptorHeap::new(device, D3D12_DESCRIPTOR_HEAP_TYPE_DSV, 1, false)?;
        unsafe { device.CreateDepthStencilView(&resource, None, heap.cpu_handle(0)?) };

        #[cfg(debug_assertions)]
        info!("Depth stencil buffer created: {}x{}", window.width, window.height);

        self.depth_stencil = Some(DepthStencil { _resource: resource, heap });
        Ok(())
    }

    /// 在命令队列上 signal 下一个值并阻塞到完成
    fn signal_and_wait(&mut self) -> Result<FenceValue> {
        let ctx = self.commands.as_mut().ok_or_else(|| missing("command queue"))?;
        let value = ctx.fence_value.increment();

        unsafe {
            ctx.queue.Signal(&ctx.fence, value.value())?;
            if ctx.fence.GetCompletedValue() < value.value() {
                ctx.fence.SetEventOnCompletion(value.value(), ctx.fence_event)?;
                WaitForSingleObject(ctx.fence_event, INFINITE);
            }
        }

        trace!(fence = value.value(), "GPU work complete");
        Ok(value)
    }

    fn translate(&self, command: &Command) -> Result<()> {
        let ctx = self.command_context()?;
        let list = &ctx.list;

        unsafe {
            match *command {
                Command::SetRootSignature => {
                    let root_signature = self.root_signature.as_ref().ok_or_else(|| missing("root signature"))?;
                    list.SetGraphicsRootSignature(root_signature);
                }
                Command::SetDescriptorHeap => {
                    let heap = self.descriptor_heap.as_ref().ok_or_else(|| missing("descriptor heap"))?;
                    list.SetDescriptorHeaps(&[Some(heap.heap().clone())]);
                }
                Command::ResourceBarrier { back_buffer, before, after } => {
                    let buffer = self.back_buffer(back_buffer)?;
                    list.ResourceBarrier(&[transition_barrier(buffer, d3d12_state(before), d3d12_state(after))]);
                }
                Command::SetViewport(vp) => {
                    list.RSSetViewports(&[D3D12_VIEWPORT {
                        TopLeftX: vp.x,
                        TopLeftY: vp.y,
                        Width: vp.width,
                        Height: vp.height,
                        MinDepth: vp.min_depth,
                        MaxDepth: vp.max_depth,
                    }]);
                }
                Command::SetScissor(rect) => {
                    list.RSSetScissorRects(&[RECT {
                        left: rect.left,
                        top: rect.top,
                        right: rect.right,
                        bottom: rect.bottom,
                    }]);
                }
                Command::ClearRenderTarget { back_buffer, color } => {
                    let rtv = self.rtv_handle(back_buffer)?;
                    list.ClearRenderTargetView(rtv, &color, None);
                }
                Command::ClearDepth(depth) => {
                    let dsv = self.dsv_handle()?;
                    list.ClearDepthStencilView(dsv, D3D12_CLEAR_FLAG_DEPTH, depth, 0, None);
                }
                Command::SetRenderTargets { back_buffer, depth } => {
                    let rtv = self.rtv_handle(back_buffer)?;
                    if depth {
                        let dsv = self.dsv_handle()?;
                        list.OMSetRenderTargets(1, Some(&rtv), false, Some(&dsv));
                    } else {
                        list.OMSetRenderTargets(1, Some(&rtv), false, None);
                    }
                }
                Command::SetPipelineState => {
                    let pso = self.pipeline.as_ref().ok_or_else(|| missing("pipeline state"))?;
                    list.SetPipelineState(pso);
                }
                Command::SetPrimitiveTopology => {
                    list.IASetPrimitiveTopology(D3D_PRIMITIVE_TOPOLOGY_TRIANGLELIST);
                }
                Command::SetVertexBuffer(mesh) => {
                    list.IASetVertexBuffers(0, Some(&[self.mesh(mesh)?.vertex_view]));
                }
                Command::SetIndexBuffer(mesh) => {
                    list.IASetIndexBuffer(Some(&self.mesh(mesh)?.index_view));
                }
                Command::CopyDescriptor { src, group, register } => {
                    let src = match src {
                        ViewRef::Cbv(slot) => self
                            .constant_buffer
                            .as_ref()
                            .ok_or_else(|| missing("constant buffer"))?
                            .views
                            .cpu_handle(slot)?,
                        ViewRef::Srv(texture) => self
                            .texture_views
                            .as_ref()
                            .ok_or_else(|| missing("texture view heap"))?
                            .cpu_handle(texture.index())?,
                    };
                    let dst = self
                        .descriptor_heap
                        .as_ref()
                        .ok_or_else(|| missing("descriptor heap"))?
                        .cpu_handle(heap_index(group, register))?;
                    self.device()?
                        .CopyDescriptorsSimple(1, dst, src, D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV);
                }
                Command::SetDescriptorTable { group } => {
                    let handle = self
                        .descriptor_heap
                        .as_ref()
                        .ok_or_else(|| missing("descriptor heap"))?
                        .gpu_handle(heap_index(group, 0))?;
                    list.SetGraphicsRootDescriptorTable(0, handle);
                }
                Command::DrawIndexed { index_count, start_index, base_vertex } => {
                    list.DrawIndexedInstanced(index_count, 1, start_index, base_vertex, 0);
                }
            }
        }
        Ok(())
    }

    fn back_buffer(&self, index: usize) -> Result<&ID3D12Resource> {
        let swap_chain = self.swap_chain.as_ref().ok_or_else(|| missing("swap chain"))?;
        let current = unsafe { swap_chain.swap_chain.GetCurrentBackBufferIndex() } as usize;
        if index != current {
            return Err(GraphicsError::CommandExecution(format!(
                "Back buffer {} is not the current buffer {}",
                index, current
            ))
            .into());
        }
        swap_chain.buffers.get(index).ok_or_else(|| missing("back buffer"))
    }

    fn rtv_handle(&self, back_buffer: usize) -> Result<D3D12_CPU_DESCRIPTOR_HANDLE> {
        self.render_targets
            .as_ref()
            .ok_or_else(|| missing("render target view"))?
            .cpu_handle(back_buffer)
    }

    fn dsv_handle(&self) -> Result<D3D12_CPU_DESCRIPTOR_HANDLE> {
        self.depth_stencil
            .as_ref()
            .ok_or_else(|| missing("depth stencil view"))?
            .heap
            .cpu_handle(0)
    }

    fn mesh(&self, handle: MeshHandle) -> Result<&MeshBuffers> {
        self.meshes.get(handle.index()).ok_or_else(|| {
            GraphicsError::CommandExecution(format!("Unknown mesh handle {}", handle.index())).into()
        })
    }
}

impl Default for Dx12Backend {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderBackend for Dx12Backend {
    fn name(&self) -> &'static str {
        "DirectX 12"
    }

    fn is_stage_complete(&self, stage: InitStage) -> bool {
        match stage {
            InitStage::Device => self.device.is_some(),
            InitStage::CommandQueue => self.commands.is_some(),
            InitStage::SwapChain => self.swap_chain.is_some(),
            InitStage::RenderTargetViews => self.render_targets.is_some(),
            InitStage::RootSignature => self.root_signature.is_some(),
            InitStage::ConstantBuffer => self.constant_buffer.is_some(),
            InitStage::DescriptorHeap => self.descriptor_heap.is_some(),
            InitStage::DepthStencilView => self.depth_stencil.is_some(),
        }
    }

    fn run_init_stage(&mut self, stage: InitStage, window: &WindowInfo) -> Result<()> {
        self.ensure_prerequisites(stage)?;

        match stage {
            InitStage::Device => self.create_device()?,
            InitStage::CommandQueue => self.create_command_queue()?,
            InitStage::SwapChain => self.create_swap_chain(window)?,
            InitStage::RenderTargetViews => self.create_render_target_views()?,
            InitStage::RootSignature => {
                self.root_signature = Some(pipeline::create_root_signature(self.device()?)?);
            }
            InitStage::ConstantBuffer => self.create_constant_buffer()?,
            InitStage::DescriptorHeap => self.create_descriptor_heaps()?,
            InitStage::DepthStencilView => self.create_depth_stencil(window)?,
        }

        #[cfg(debug_assertions)]
        debug!("DX12 {} created", stage);
        Ok(())
    }

    fn create_pipeline_state(&mut self) -> Result<()> {
        let root_signature = self.root_signature.as_ref().ok_or_else(|| {
            DxPracticeError::from(GraphicsError::MissingDependency {
                stage: "pipeline state",
                requires: InitStage::RootSignature.name(),
            })
        })?;
        if self.depth_stencil.is_none() {
            return Err(GraphicsError::MissingDependency {
                stage: "pipeline state",
                requires: InitStage::DepthStencilView.name(),
            }
            .into());
        }

        let pso = pipeline::create_pipeline_state(self.device()?, root_signature)?;
        self.pipeline = Some(pso);
        Ok(())
    }

    fn constant_buffer_memory(&mut self) -> Result<&mut [u8]> {
        let cb = self.constant_buffer.as_mut().ok_or_else(|| missing("constant buffer"))?;
        // 映射在 ConstantBuffer 存活期间一直有效
        Ok(unsafe { std::slice::from_raw_parts_mut(cb.mapped, cb.size) })
    }

    fn upload_mesh(&mut self, mesh: &MeshData) -> Result<MeshHandle> {
        let device = self.device()?;

        let vertex_bytes: &[u8] = bytemuck::cast_slice(&mesh.vertices);
        let index_bytes: &[u8] = bytemuck::cast_slice(&mesh.indices);
        let vertex_buffer = create_buffer_with_data(device, vertex_bytes, "vertex buffer")?;
        let index_buffer = create_buffer_with_data(device, index_bytes, "index buffer")?;

        let (vertex_view, index_view) = unsafe {
            (
                D3D12_VERTEX_BUFFER_VIEW {
                    BufferLocation: vertex_buffer.GetGPUVirtualAddress(),
                    SizeInBytes: vertex_bytes.len() as u32,
                    StrideInBytes: std::mem::size_of::<Vertex>() as u32,
                },
                D3D12_INDEX_BUFFER_VIEW {
                    BufferLocation: index_buffer.GetGPUVirtualAddress(),
                    SizeInBytes: index_bytes.len() as u32,
                    Format: DXGI_FORMAT_R32_UINT,
                },
            )
        };

        self.meshes.push(MeshBuffers {
            _vertex_buffer: vertex_buffer,
            vertex_view,
            _index_buffer: index_buffer,
            index_view,
        });
        Ok(MeshHandle(self.meshes.len() - 1))
    }

    fn upload_texture(&mut self, texture: &TextureData) -> Result<TextureHandle> {
        let index = self.textures.len();
        if index >= MAX_TEXTURES {
            return Err(GraphicsError::ResourceCreation(format!(
                "Texture limit {} reached",
                MAX_TEXTURES
            ))
            .into());
        }

        let device = self.device()?.clone();
        let resource = create_texture_2d(
            &device,
            texture.width,
            texture.height,
            DXGI_FORMAT_R8G8B8A8_UNORM,
            D3D12_RESOURCE_FLAG_NONE,
            D3D12_RESOURCE_STATE_COPY_DEST,
            None,
        )?;

        let row_pitch = aligned_row_pitch(texture.width);
        let upload = create_upload_buffer(
            &device,
            row_pitch as u64 * texture.height as u64,
            "texture upload buffer",
        )?;

        unsafe {
            let mut data = std::ptr::null_mut();
            upload.Map(0, None, Some(&mut data))?;
            let dst = data as *mut u8;
            for (y, row) in texture.pixels.chunks_exact(texture.row_pitch()).enumerate() {
                std::ptr::copy_nonoverlapping(row.as_ptr(), dst.add(y * row_pitch as usize), row.len());
            }
            upload.Unmap(0, None);

            let ctx = self.command_context()?;
            ctx.allocator.Reset()?;
            ctx.list.Reset(&ctx.allocator, None)?;

            let dst_location = D3D12_TEXTURE_COPY_LOCATION {
                pResource: std::mem::transmute_copy(&resource),
                Type: D3D12_TEXTURE_COPY_TYPE_SUBRESOURCE_INDEX,
                Anonymous: D3D12_TEXTURE_COPY_LOCATION_0 { SubresourceIndex: 0 },
            };
            let src_location = D3D12_TEXTURE_COPY_LOCATION {
                pResource: std::mem::transmute_copy(&upload),
                Type: D3D12_TEXTURE_COPY_TYPE_PLACED_FOOTPRINT,
                Anonymous: D3D12_TEXTURE_COPY_LOCATION_0 {
                    PlacedFootprint: D3D12_PLACED_SUBRESOURCE_FOOTPRINT {
                        Offset: 0,
                        Footprint: D3D12_SUBRESOURCE_FOOTPRINT {
                            Format: DXGI_FORMAT_R8G8B8A8_UNORM,
                            Width: texture.width,
                            Height: texture.height,
                            Depth: 1,
                            RowPitch: row_pitch,
                        },
                    },
                },
            };
            ctx.list.CopyTextureRegion(&dst_location, 0, 0, 0, &src_location, None);
            ctx.list.ResourceBarrier(&[transition_barrier(
                &resource,
                d3d12_state(ResourceState::CopyDest),
                d3d12_state(ResourceState::PixelShaderResource),
            )]);
            ctx.list.Close()?;
            ctx.queue.ExecuteCommandLists(&[Some(ctx.list.clone().into())]);
        }

        // 上传缓冲区在复制完成前必须存活
        self.signal_and_wait()?;
        drop(upload);

        let srv_desc = D3D12_SHADER_RESOURCE_VIEW_DESC {
            Format: DXGI_FORMAT_R8G8B8A8_UNORM,
            ViewDimension: D3D12_SRV_DIMENSION_TEXTURE2D,
            Shader4ComponentMapping: D3D12_DEFAULT_SHADER_4_COMPONENT_MAPPING,
            Anonymous: D3D12_SHADER_RESOURCE_VIEW_DESC_0 {
                Texture2D: D3D12_TEX2D_SRV {
                    MipLevels: 1,
                    ..Default::default()
                },
            },
        };
        let handle = self
            .texture_views
            .as_ref()
            .ok_or_else(|| missing("texture view heap"))?
            .cpu_handle(index)?;
        unsafe { device.CreateShaderResourceView(&resource, Some(&srv_desc), handle) };

        self.textures.push(resource);
        Ok(TextureHandle(index))
    }

    fn reset_commands(&mut self) -> Result<()> {
        let ctx = self.command_context()?;
        let pso = self.pipeline.as_ref().ok_or_else(|| missing("pipeline state"))?;
        unsafe {
            ctx.allocator.Reset()?;
            ctx.list.Reset(&ctx.allocator, Some(pso))?;
        }
        Ok(())
    }

    fn execute(&mut self, list: &CommandList) -> Result<()> {
        if !list.is_closed() {
            return Err(GraphicsError::CommandExecution(
                "Command list submitted before close".to_string(),
            )
            .into());
        }

        for command in list.commands() {
            if let Err(e) = self.translate(command) {
                // 原生命令列表不能停留在录制状态
                if let Ok(ctx) = self.command_context() {
                    unsafe {
                        let _ = ctx.list.Close();
                    }
                }
                return Err(e);
            }
        }

        let ctx = self.command_context()?;
        unsafe {
            ctx.list.Close()?;
            ctx.queue.ExecuteCommandLists(&[Some(ctx.list.clone().into())]);
        }

        check_device_removed(self.device()?)
    }

    fn present(&mut self, vsync: bool) -> Result<()> {
        let swap_chain = self.swap_chain.as_ref().ok_or_else(|| missing("swap chain"))?;
        let hr = unsafe { swap_chain.swap_chain.Present(u32::from(vsync), DXGI_PRESENT(0)) };

        if hr == DXGI_ERROR_DEVICE_REMOVED || hr == DXGI_ERROR_DEVICE_RESET {
            check_device_removed(self.device()?)?;
            return Err(GraphicsError::DeviceRemoved(format!("{:?}", hr)).into());
        }
        hr.ok()?;
        Ok(())
    }

    fn wait_for_gpu(&mut self) -> Result<FenceValue> {
        check_device_removed(self.device()?)?;
        let value = self.signal_and_wait()?;
        check_device_removed(self.device()?)?;
        Ok(value)
    }
}

impl Drop for Dx12Backend {
    fn drop(&mut self) {
        if self.commands.is_some() {
            if let Err(e) = self.signal_and_wait() {
                warn!("Failed to flush GPU before shutdown: {}", e);
            }
        }

        if let Some(cb) = &self.constant_buffer {
            unsafe { cb.resource.Unmap(0, None) };
        }

        if let Some(ctx) = &self.commands {
            unsafe {
                let _ = CloseHandle(ctx.fence_event);
            }
        }
    }
}
