//! 核心功能模块
//!
//! 本模块提供了渲染框架的基础功能，包括数学类型、日志系统、配置管理、
//! 错误处理、键盘输入与帧计时。这些模块独立于具体的图形 API。
//!
//! # 模块组织
//!
//! - `math`：数学类型（基于 nalgebra）
//! - `log`：日志系统，提供结构化的日志记录功能
//! - `config`：配置管理，支持从配置文件加载引擎设置
//! - `error`：错误处理，定义统一的错误类型
//! - `input`：键盘输入状态机与玩家移动
//! - `timer`：帧间隔计时

pub mod math;
pub mod log;
pub mod config;
pub mod error;
pub mod input;
pub mod timer;

// 重新导出常用类型，方便使用
pub use math::{Vector2, Vector3, Vector4, Color};
pub use error::{Result, DxPracticeError, ErrorSeverity, GraphicsError};
pub use config::Config;
pub use input::InputSystem;
pub use timer::Timer;
