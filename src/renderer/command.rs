//! 命令列表模块
//!
//! Engine 每帧把绘制序列记录为一个与图形 API 无关的命令列表，
//! 再交给后端翻译执行（D3D12 后端翻译为 `ID3D12GraphicsCommandList` 调用，
//! 软件后端直接解释执行）。
//!
//! # 状态机
//!
//! ```text
//! Initial --begin--> Recording --close--> Closed --begin--> Recording ...
//! ```
//!
//! 只有处于 `Closed` 的列表可以提交；处于 `Recording` 时不能再次 `begin`。

use crate::core::error::{GraphicsError, Result};
use super::backend::{MeshHandle, TextureHandle};

/// 资源状态（对应 D3D12_RESOURCE_STATES 的子集）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceState {
    Present,
    RenderTarget,
    DepthWrite,
    CopyDest,
    PixelShaderResource,
}

impl ResourceState {
    pub fn name(&self) -> &'static str {
        match self {
            ResourceState::Present => "PRESENT",
            ResourceState::RenderTarget => "RENDER_TARGET",
            ResourceState::DepthWrite => "DEPTH_WRITE",
            ResourceState::CopyDest => "COPY_DEST",
            ResourceState::PixelShaderResource => "PIXEL_SHADER_RESOURCE",
        }
    }
}

/// 视口
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// 覆盖整个窗口的视口
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// 裁剪矩形
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScissorRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl ScissorRect {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            left: 0,
            top: 0,
            right: width as i32,
            bottom: height as i32,
        }
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }
}

/// 被复制进描述符表的视图
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewRef {
    /// 常量缓冲区槽位的 CBV
    Cbv(usize),
    /// 纹理的 SRV
    Srv(TextureHandle),
}

/// 记录的命令
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetRootSignature,
    SetDescriptorHeap,
    ResourceBarrier {
        back_buffer: usize,
        before: ResourceState,
        after: ResourceState,
    },
    SetViewport(Viewport),
    SetScissor(ScissorRect),
    ClearRenderTarget {
        back_buffer: usize,
        color: [f32; 4],
    },
    ClearDepth(f32),
    SetRenderTargets {
        back_buffer: usize,
        depth: bool,
    },
    SetPipelineState,
    SetPrimitiveTopology,
    SetVertexBuffer(MeshHandle),
    SetIndexBuffer(MeshHandle),
    /// 把 CPU 侧视图复制到着色器可见堆的 `group * REGISTER_COUNT + register`
    CopyDescriptor {
        src: ViewRef,
        group: usize,
        register: usize,
    },
    /// 绑定描述符表（根参数 0）到某一组
    SetDescriptorTable {
        group: usize,
    },
    DrawIndexed {
        index_count: u32,
        start_index: u32,
        base_vertex: i32,
    },
}

/// 命令列表状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandListState {
    Initial,
    Recording,
    Closed,
}

/// 命令列表
#[derive(Debug)]
pub struct CommandList {
    state: CommandListState,
    commands: Vec<Command>,
}

impl CommandList {
    pub fn new() -> Self {
        Self {
            state: CommandListState::Initial,
            commands: Vec::new(),
        }
    }

    /// 开始记录，清空上一帧的命令
    pub fn begin(&mut self) -> Result<()> {
        match self.state {
            CommandListState::Initial | CommandListState::Closed => {
                self.commands.clear();
                self.state = CommandListState::Recording;
                Ok(())
            }
            CommandListState::Recording => Err(GraphicsError::CommandExecution(
                "Command list reset while still recording".to_string(),
            )
            .into()),
        }
    }

    /// 追加一条命令
    pub fn record(&mut self, command: Command) -> Result<()> {
        if self.state != CommandListState::Recording {
            return Err(GraphicsError::CommandExecution(format!(
                "Cannot record {:?} in state {:?}",
                command, self.state
            ))
            .into());
        }
        self.commands.push(command);
        Ok(())
    }

    /// 结束记录
    pub fn close(&mut self) -> Result<()> {
        if self.state != CommandListState::Recording {
            return Err(GraphicsError::CommandExecution(
                "Command list closed without recording".to_string(),
            )
            .into());
        }
        self.state = CommandListState::Closed;
        Ok(())
    }

    /// 丢弃未完成的记录
    pub fn reset(&mut self) {
        self.commands.clear();
        self.state = CommandListState::Initial;
    }

    pub fn state(&self) -> CommandListState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == CommandListState::Closed
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// 统计某一方向的资源转换次数
    pub fn barrier_count(&self, from: ResourceState, to: ResourceState) -> usize {
        self.commands
            .iter()
            .filter(|c| {
                matches!(c, Command::ResourceBarrier { before, after, .. } if *before == from && *after == to)
            })
            .count()
    }

    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::DrawIndexed { .. }))
            .count()
    }
}

impl Default for CommandList {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_list_state_machine() {
        let mut list = CommandList::new();
        assert_eq!(list.state(), CommandListState::Initial);

        // 未开始记录不能追加命令
        assert!(list.record(Command::SetRootSignature).is_err());
        assert!(list.close().is_err());

        list.begin().unwrap();
        assert!(list.begin().is_err());
        list.record(Command::SetRootSignature).unwrap();
        list.close().unwrap();
        assert!(list.is_closed());

        // 关闭后不能继续追加
        assert!(list.record(Command::SetDescriptorHeap).is_err());

        list.begin().unwrap();
        assert!(list.commands().is_empty());
    }

    #[test]
    fn test_counts() {
        let mut list = CommandList::new();
        list.begin().unwrap();
        list.record(Command::ResourceBarrier {
            back_buffer: 0,
            before: ResourceState::Present,
            after: ResourceState::RenderTarget,
        })
        .unwrap();
        list.record(Command::DrawIndexed { index_count: 6, start_index: 0, base_vertex: 0 })
            .unwrap();
        list.record(Command::ResourceBarrier {
            back_buffer: 0,
            before: ResourceState::RenderTarget,
            after: ResourceState::Present,
        })
        .unwrap();
        list.close().unwrap();

        assert_eq!(list.barrier_count(ResourceState::Present, ResourceState::RenderTarget), 1);
        assert_eq!(list.barrier_count(ResourceState::RenderTarget, ResourceState::Present), 1);
        assert_eq!(list.barrier_count(ResourceState::CopyDest, ResourceState::Present), 0);
        assert_eq!(list.draw_count(), 1);
    }

    #[test]
    fn test_scissor_contains() {
        let rect = ScissorRect::full(600, 600);
        assert!(rect.contains(0, 0));
        assert!(rect.contains(599, 599));
        assert!(!rect.contains(600, 10));
    }
}
