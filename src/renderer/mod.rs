//! 渲染器模块
//!
//! `Engine` 是整个程序的组合根：独占一个 `RenderBackend`，并持有与图形 API
//! 无关的簿记（帧状态、常量缓冲区环、描述符表、视口与裁剪矩形）。
//!
//! # 架构设计
//!
//! - `Engine::init`：按 `InitStage::ORDER` 逐阶段创建子系统，最后创建管线状态
//! - `Engine::draw`：记录一帧命令、提交、present、阻塞等待 Fence、轮转后台缓冲
//! - 底层实现在 `gfx` 模块中，按后端分类组织
//!
//! # 使用示例
//!
//! ```rust
//! use dx_practice::core::config::GraphicsConfig;
//! use dx_practice::geometry::{MeshData, TextureData, Transform};
//! use dx_practice::gfx::software::SoftwareBackend;
//! use dx_practice::renderer::{DrawItem, Engine, WindowInfo};
//!
//! let mut engine = Engine::new(SoftwareBackend::new(), &GraphicsConfig::default());
//! engine.init(WindowInfo::headless(64, 64))?;
//!
//! let mesh = engine.upload_mesh(&MeshData::default_quad())?;
//! let texture = engine.upload_texture(&TextureData::checkerboard(8, 2))?;
//! let stats = engine.draw(&[DrawItem::new(mesh, texture, Transform::new(0.25, 0.0, 0.0))])?;
//! assert_eq!(stats.draw_calls, 1);
//! # Ok::<(), dx_practice::core::DxPracticeError>(())
//! ```

use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

use crate::core::config::GraphicsConfig;
use crate::core::error::{GraphicsError, Result};
use crate::core::input::InputSystem;
use crate::core::math::{Vector3, Vector4};
use crate::geometry::{MeshData, TextureData, Transform};

pub mod backend;
pub mod command;
pub mod constant_buffer;
pub mod descriptor;
pub mod frame;
pub mod sync;

pub use backend::{InitStage, MeshHandle, RenderBackend, TextureHandle, WindowInfo};
pub use command::{Command, CommandList, ResourceState, ScissorRect, Viewport};
pub use frame::{FrameState, SWAP_CHAIN_BUFFER_COUNT};
pub use sync::FenceValue;

use constant_buffer::{ConstantBufferRing, CONSTANT_BUFFER_SLOTS};
use descriptor::{DescriptorTable, GROUP_COUNT};
use frame::FrameCounter;

/// 深度缓冲清除值
pub const DEPTH_CLEAR_VALUE: f32 = 1.0;

/// 一次绘制
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawItem {
    pub mesh: MeshHandle,
    pub texture: TextureHandle,
    pub transform: Transform,
}

impl DrawItem {
    pub fn new(mesh: MeshHandle, texture: TextureHandle, transform: Transform) -> Self {
        Self { mesh, texture, transform }
    }
}

/// 一帧的统计信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    /// 已完成的帧数（从 1 开始）
    pub frame_number: u64,
    /// 本帧绘制到的后台缓冲
    pub back_buffer: usize,
    /// 本帧的 DrawIndexed 数量
    pub draw_calls: usize,
    /// 本帧提交 signal 的 Fence 值
    pub fence_value: FenceValue,
}

/// 由键盘控制的绘制项
#[derive(Debug, Clone, Copy)]
struct PlayerControl {
    item: usize,
    base: Transform,
}

/// 渲染引擎
pub struct Engine<B: RenderBackend> {
    backend: B,
    window: WindowInfo,
    frame: FrameCounter,
    constants: ConstantBufferRing<Transform>,
    table: DescriptorTable,
    commands: CommandList,
    viewport: Viewport,
    scissor: ScissorRect,
    clear_color: [f32; 4],
    vsync: bool,
    initialized: bool,
    /// 网格句柄 -> 索引数量
    meshes: HashMap<MeshHandle, u32>,
    textures: HashSet<TextureHandle>,
    player: Vector3,
    control: Option<PlayerControl>,
}

impl<B: RenderBackend> Engine<B> {
    pub fn new(backend: B, config: &GraphicsConfig) -> Self {
        let window = WindowInfo::default();
        Self {
            backend,
            window,
            frame: FrameCounter::new(),
            constants: ConstantBufferRing::new(CONSTANT_BUFFER_SLOTS),
            table: DescriptorTable::new(GROUP_COUNT),
            commands: CommandList::new(),
            viewport: Viewport::full(window.width, window.height),
            scissor: ScissorRect::full(window.width, window.height),
            clear_color: config.clear_color,
            vsync: config.vsync,
            initialized: false,
            meshes: HashMap::new(),
            textures: HashSet::new(),
            player: Vector3::zeros(),
            control: None,
        }
    }

    /// 按固定顺序初始化所有子系统
    ///
    /// 任何一步失败都是致命错误，Engine 保持未初始化状态。
    pub fn init(&mut self, window: WindowInfo) -> Result<()> {
        if window.width == 0 || window.height == 0 {
            return Err(GraphicsError::SwapchainError(format!(
                "Invalid window size {}x{}",
                window.width, window.height
            ))
            .into());
        }

        for stage in InitStage::ORDER {
            debug!(backend = self.backend.name(), "Creating {}", stage);
            if let Err(e) = self.backend.run_init_stage(stage, &window) {
                crate::engine_error!("{} failed: {}", stage, e);
                return Err(e);
            }
        }
        self.backend.create_pipeline_state()?;

        let mapped = self.backend.constant_buffer_memory()?.len();
        if mapped < self.constants.byte_size() {
            return Err(GraphicsError::ResourceCreation(format!(
                "Constant buffer maps {} bytes, ring needs {}",
                mapped,
                self.constants.byte_size()
            ))
            .into());
        }

        self.window = window;
        self.viewport = Viewport::full(window.width, window.height);
        self.scissor = ScissorRect::full(window.width, window.height);
        self.initialized = true;

        crate::engine_info!(
            "Engine initialized: backend={}, {}x{}",
            self.backend.name(),
            window.width,
            window.height
        );
        Ok(())
    }

    /// 上传网格
    pub fn upload_mesh(&mut self, mesh: &MeshData) -> Result<MeshHandle> {
        self.ensure_initialized()?;
        mesh.validate()?;

        let handle = self.backend.upload_mesh(mesh)?;
        self.meshes.insert(handle, mesh.index_count() as u32);
        debug!(
            mesh = mesh.name.as_deref().unwrap_or("Unnamed"),
            vertices = mesh.vertex_count(),
            indices = mesh.index_count(),
            "Mesh uploaded"
        );
        Ok(handle)
    }

    /// 上传纹理
    pub fn upload_texture(&mut self, texture: &TextureData) -> Result<TextureHandle> {
        self.ensure_initialized()?;
        texture.validate()?;

        let handle = self.backend.upload_texture(texture)?;
        self.textures.insert(handle);
        debug!(width = texture.width, height = texture.height, "Texture uploaded");
        Ok(handle)
    }

    /// 指定由键盘控制的绘制项及其基础变换
    pub fn set_controlled_item(&mut self, item: usize, base: Transform) {
        self.control = Some(PlayerControl { item, base });
    }

    /// 推进输入状态，把玩家位移叠加到受控绘制项上
    pub fn update(&mut self, input: &mut InputSystem, delta_time: f32, items: &mut [DrawItem]) {
        input.update_player(&mut self.player, delta_time);

        if let Some(control) = self.control {
            if let Some(item) = items.get_mut(control.item) {
                item.transform = control
                    .base
                    .translated(Vector4::new(self.player.x, self.player.y, self.player.z, 0.0));
            }
        }
    }

    /// 绘制一帧
    ///
    /// 记录并提交命令，present 之后阻塞到 GPU 完成，再轮转后台缓冲。
    /// 绘制项超过常量缓冲区容量时在记录前拒绝本帧（可恢复错误）。
    pub fn draw(&mut self, items: &[DrawItem]) -> Result<FrameStats> {
        self.draw_frame(items).map_err(|e| {
            if e.is_fatal() {
                crate::engine_error!("Frame failed: {}", e);
            } else {
                crate::engine_warn!("Frame rejected: {}", e);
            }
            e
        })
    }

    fn draw_frame(&mut self, items: &[DrawItem]) -> Result<FrameStats> {
        self.ensure_initialized()?;
        self.check_items(items)?;

        self.backend.reset_commands()?;
        self.commands.begin()?;
        self.constants.reset();
        self.table.reset();

        if let Err(e) = self.record_frame(items) {
            self.commands.reset();
            return Err(e);
        }

        self.backend.execute(&self.commands)?;
        self.backend.present(self.vsync)?;
        let fence_value = self.backend.wait_for_gpu()?;

        let back_buffer = self.frame.back_buffer_index();
        self.frame.advance();

        let stats = FrameStats {
            frame_number: self.frame.frame_number(),
            back_buffer,
            draw_calls: self.commands.draw_count(),
            fence_value,
        };
        trace!(?stats, "Frame complete");
        Ok(stats)
    }

    fn check_items(&self, items: &[DrawItem]) -> Result<()> {
        let capacity = self.constants.capacity().min(self.table.group_count());
        if items.len() > capacity {
            return Err(GraphicsError::RingBufferOverrun {
                requested: items.len(),
                capacity,
            }
            .into());
        }

        for item in items {
            if !self.meshes.contains_key(&item.mesh) {
                return Err(GraphicsError::CommandExecution(format!(
                    "Unknown mesh handle {}",
                    item.mesh.index()
                ))
                .into());
            }
            if !self.textures.contains(&item.texture) {
                return Err(GraphicsError::CommandExecution(format!(
                    "Unknown texture handle {}",
                    item.texture.index()
                ))
                .into());
            }
        }
        Ok(())
    }

    fn record_frame(&mut self, items: &[DrawItem]) -> Result<()> {
        let back_buffer = self.frame.back_buffer_index();
        let list = &mut self.commands;

        list.record(Command::SetRootSignature)?;
        list.record(Command::SetDescriptorHeap)?;

        list.record(Command::ResourceBarrier {
            back_buffer,
            before: ResourceState::Present,
            after: ResourceState::RenderTarget,
        })?;

        list.record(Command::SetViewport(self.viewport))?;
        list.record(Command::SetScissor(self.scissor))?;

        list.record(Command::ClearRenderTarget {
            back_buffer,
            color: self.clear_color,
        })?;
        list.record(Command::ClearDepth(DEPTH_CLEAR_VALUE))?;
        list.record(Command::SetRenderTargets { back_buffer, depth: true })?;

        let memory = self.backend.constant_buffer_memory()?;
        for item in items {
            list.record(Command::SetPipelineState)?;

            let slot = self.constants.push(memory, &item.transform)?;
            self.table.set_cbv(slot, 0)?;
            self.table.set_srv(item.texture, 0)?;
            self.table.commit(list)?;

            let index_count = self.meshes.get(&item.mesh).copied().unwrap_or(0);
            list.record(Command::SetPrimitiveTopology)?;
            list.record(Command::SetVertexBuffer(item.mesh))?;
            list.record(Command::SetIndexBuffer(item.mesh))?;
            list.record(Command::DrawIndexed {
                index_count,
                start_index: 0,
                base_vertex: 0,
            })?;
        }

        list.record(Command::ResourceBarrier {
            back_buffer,
            before: ResourceState::RenderTarget,
            after: ResourceState::Present,
        })?;

        list.close()
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(GraphicsError::CommandExecution("Engine used before init".to_string()).into())
        }
    }

    /// 当前帧状态
    pub fn frame_state(&self) -> FrameState {
        FrameState {
            back_buffer_index: self.frame.back_buffer_index(),
            constant_buffer_cursor: self.constants.cursor(),
            descriptor_table_cursor: self.table.cursor(),
        }
    }

    pub fn frame_number(&self) -> u64 {
        self.frame.frame_number()
    }

    /// 读回本帧某个常量缓冲区槽位
    pub fn read_constant(&mut self, slot: usize) -> Result<Transform> {
        let memory = self.backend.constant_buffer_memory()?;
        self.constants.read(memory, slot)
    }

    /// 最近一次记录的命令列表
    pub fn commands(&self) -> &CommandList {
        &self.commands
    }

    pub fn window(&self) -> &WindowInfo {
        &self.window
    }

    pub fn player_position(&self) -> Vector3 {
        self.player
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}
