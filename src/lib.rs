//! DXPractice - Direct3D 12 渲染练习框架
//!
//! 按固定顺序初始化设备、命令队列、交换链等子系统，每帧记录一次带深度缓冲的
//! 索引绘制，提交后 present 并阻塞等待 GPU 完成。除 DirectX 12 后端外还提供
//! 一个 CPU 光栅化的软件后端，用于无 GPU 环境下的运行与测试。
//!
//! # 模块结构
//!
//! - `core`: 核心功能模块（数学、日志、配置、错误处理、输入、计时）
//! - `geometry`: 顶点、网格、纹理数据与 OBJ 加载器
//! - `renderer`: 与图形 API 无关的 `Engine` 与命令列表
//! - `gfx`: 图形后端实现（software、DirectX 12）
//!
//! # 使用示例
//!
//! ```no_run
//! use dx_practice::core::Config;
//! use dx_practice::gfx::SoftwareBackend;
//! use dx_practice::renderer::{Engine, WindowInfo};
//!
//! let config = Config::from_file_or_default("config.toml");
//! let mut engine = Engine::new(SoftwareBackend::new(), &config.graphics);
//! engine.init(WindowInfo::headless(config.window.width, config.window.height))?;
//! # Ok::<(), dx_practice::core::DxPracticeError>(())
//! ```

pub mod core;
pub mod geometry;
pub mod gfx;
pub mod renderer;
