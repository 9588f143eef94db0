//! DXPractice 程序入口
//!
//! 可以通过配置文件或命令行参数选择图形后端。
//!
//! # 使用方法
//!
//! ```bash
//! # 使用配置文件
//! cargo run
//!
//! # DirectX 12 窗口模式（仅 Windows）
//! cargo run -- --dx12
//!
//! # 软件后端，渲染 4 帧并保存最后一帧
//! cargo run -- --software --frames 4 --output frame.png
//! ```
//!
//! # 架构概览
//!
//! ```text
//! ┌─────────────┐
//! │   main.rs   │  配置、日志、窗口与消息循环
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │   Engine    │  init 顺序 + 每帧命令序列
//! └──────┬──────┘
//!        │
//!   ┌────┴─────┐
//!   │          │
//! ┌─▼──┐   ┌───▼────┐
//! │DX12│   │Software│  RenderBackend 实现
//! └────┘   └────────┘
//! ```

use std::path::Path;

use anyhow::Context;
use tracing::{debug, info};

use dx_practice::core::config::GraphicsBackend;
use dx_practice::core::{log, Config};
use dx_practice::geometry::loaders::load_mesh_or_default;
use dx_practice::geometry::{TextureData, Transform};
use dx_practice::gfx::SoftwareBackend;
use dx_practice::renderer::{DrawItem, Engine, RenderBackend, WindowInfo};

/// 受键盘控制的绘制项
const PLAYER_ITEM: usize = 0;

/// 上传网格与纹理，搭建两项绘制的场景
///
/// 第 0 项由键盘控制，第 1 项在其后方作为参照。
fn build_scene<B: RenderBackend>(
    engine: &mut Engine<B>,
    config: &Config,
) -> dx_practice::core::Result<Vec<DrawItem>> {
    let mesh = load_mesh_or_default(Path::new(&config.assets.mesh));
    let texture = TextureData::load_or_checkerboard(Path::new(&config.assets.texture));

    let mesh = engine.upload_mesh(&mesh)?;
    let texture = engine.upload_texture(&texture)?;

    let player = Transform::new(0.25, 0.0, -0.3);
    let backdrop = Transform::new(-0.25, 0.0, -0.2);
    engine.set_controlled_item(PLAYER_ITEM, player);

    Ok(vec![
        DrawItem::new(mesh, texture, player),
        DrawItem::new(mesh, texture, backdrop),
    ])
}

/// 软件后端：渲染固定帧数并保存最后一帧
fn run_headless(config: &Config) -> anyhow::Result<()> {
    let mut engine = Engine::new(SoftwareBackend::new(), &config.graphics);
    engine
        .init(WindowInfo::headless(config.window.width, config.window.height))
        .context("Failed to initialize software backend")?;

    let items = build_scene(&mut engine, config).context("Failed to build scene")?;

    for _ in 0..config.headless.frames {
        let stats = engine.draw(&items).context("Draw failed")?;
        debug!(
            frame = stats.frame_number,
            back_buffer = stats.back_buffer,
            draw_calls = stats.draw_calls,
            fence = %stats.fence_value,
            "Frame presented"
        );
    }

    let output = Path::new(&config.headless.output);
    engine
        .backend()
        .save_presented_frame(output)
        .with_context(|| format!("Failed to save {}", output.display()))?;

    dx_practice::app_info!(
        "Rendered {} frames, saved {}",
        engine.frame_number(),
        output.display()
    );
    Ok(())
}

#[cfg(target_os = "windows")]
fn run_windowed(config: Config) -> anyhow::Result<()> {
    use dx_practice::core::{InputSystem, Timer};
    use dx_practice::gfx::Dx12Backend;
    use winit::dpi::PhysicalSize;
    use winit::event::{Event, KeyEvent, WindowEvent};
    use winit::event_loop::{ControlFlow, EventLoop};
    use winit::keyboard::PhysicalKey;
    use winit::raw_window_handle::HasWindowHandle;
    use winit::window::WindowBuilder;

    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    let window = WindowBuilder::new()
        .with_title(config.window.title.clone())
        .with_inner_size(PhysicalSize::new(config.window.width, config.window.height))
        .with_resizable(false)
        .build(&event_loop)
        .context("Failed to create window")?;

    let size = window.inner_size();
    let handle = window
        .window_handle()
        .map_err(|e| anyhow::anyhow!("Failed to get window handle: {}", e))?
        .as_raw();

    let mut engine = Engine::new(Dx12Backend::new(), &config.graphics);
    engine
        .init(WindowInfo::new(Some(handle), size.width, size.height))
        .context("Failed to initialize DirectX 12")?;
    let mut items = build_scene(&mut engine, &config).context("Failed to build scene")?;

    let mut input = InputSystem::new();
    let mut timer = Timer::new();

    info!("Entering main loop...");
    event_loop.set_control_flow(ControlFlow::Poll);
    event_loop.run(move |event, elwt| match event {
        Event::WindowEvent {
            event: WindowEvent::CloseRequested,
            ..
        } => {
            info!("Close requested, shutting down...");
            elwt.exit();
        }
        Event::WindowEvent {
            event:
                WindowEvent::KeyboardInput {
                    event:
                        KeyEvent {
                            physical_key: PhysicalKey::Code(code),
                            state,
                            ..
                        },
                    ..
                },
            ..
        } => input.on_keyboard_input(code, state),
        Event::AboutToWait => {
            // 窗口随闭包一起存活，交换链引用的 HWND 始终有效
            let _ = &window;

            let delta_time = timer.tick();
            engine.update(&mut input, delta_time, &mut items);

            if let Err(e) = engine.draw(&items) {
                if e.is_fatal() {
                    dx_practice::app_error!("Draw failed: {}", e);
                    elwt.exit();
                } else {
                    dx_practice::app_warn!("Frame skipped: {}", e);
                }
            }
        }
        _ => (),
    })?;

    Ok(())
}

fn main() -> anyhow::Result<()> {
    // 1. 加载配置（在初始化日志之前）
    let mut config = Config::from_file_or_default("config.toml");

    // 2. 应用命令行参数
    config.apply_args(std::env::args());

    // 3. 验证配置
    config.validate().context("Invalid configuration")?;

    // 4. 初始化日志系统
    let log_file = config
        .logging
        .file_output
        .then_some(config.logging.log_file.as_str());
    log::init_logger(config.logging.level, config.logging.file_output, log_file);

    info!("DXPractice starting...");
    info!(
        version = env!("CARGO_PKG_VERSION"),
        backend = config.graphics.backend.name(),
        width = config.window.width,
        height = config.window.height,
        "Graphics configuration"
    );

    let backend = config.graphics.backend;
    match backend {
        GraphicsBackend::Software => run_headless(&config),
        #[cfg(target_os = "windows")]
        GraphicsBackend::Dx12 => run_windowed(config),
        #[cfg(not(target_os = "windows"))]
        GraphicsBackend::Dx12 => anyhow::bail!("DirectX 12 is only available on Windows"),
    }
}
