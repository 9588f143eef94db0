//! 错误处理模块
//!
//! 定义了引擎中使用的统一错误类型。每个原生调用都返回 `Result`，
//! 错误再按严重程度分为致命（终止启动或主循环）与可恢复（跳过当前帧）两类。
//!
//! # 设计原则
//!
//! - 为每种错误类型提供清晰的上下文信息
//! - 支持错误链（error source）
//! - 易于模式匹配和错误处理

use std::fmt;
use std::path::PathBuf;

/// 引擎统一的 Result 类型
///
/// 所有可能返回错误的函数都应该使用这个类型。
pub type Result<T> = std::result::Result<T, DxPracticeError>;

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// 无法继续：启动失败或设备丢失，主循环应当退出
    Fatal,
    /// 仅影响当前帧，主循环可以继续
    Recoverable,
}

/// DXPractice 引擎的错误类型
#[derive(Debug)]
pub enum DxPracticeError {
    /// 配置错误
    Config(ConfigError),

    /// 图形 API 错误
    Graphics(GraphicsError),

    /// 网格加载错误
    MeshLoading(MeshLoadError),

    /// 纹理加载错误
    TextureLoading(String),

    /// IO 错误
    Io(std::io::Error),

    /// 初始化错误
    Initialization(String),

    /// 运行时错误
    Runtime(String),
}

/// 配置相关的错误
#[derive(Debug)]
pub enum ConfigError {
    /// 配置文件未找到
    FileNotFound(String),

    /// 配置文件解析失败
    ParseError(String),

    /// 配置值无效
    InvalidValue { field: String, reason: String },
}

/// 图形 API 相关的错误
#[derive(Debug)]
pub enum GraphicsError {
    /// 设备创建失败
    DeviceCreation(String),

    /// 交换链错误
    SwapchainError(String),

    /// 着色器编译失败
    ShaderCompilation(String),

    /// 资源创建失败
    ResourceCreation(String),

    /// 渲染命令执行失败
    CommandExecution(String),

    /// 设备被移除（驱动重置、显卡拔出等）
    DeviceRemoved(String),

    /// 初始化步骤的前置资源尚未创建
    MissingDependency {
        stage: &'static str,
        requires: &'static str,
    },

    /// 资源屏障声明的状态与资源实际状态不符
    InvalidResourceState {
        resource: String,
        expected: String,
        actual: String,
    },

    /// 单帧绘制数量超出环形缓冲区的槽位预算
    RingBufferOverrun { requested: usize, capacity: usize },
}

/// 网格加载相关的错误
#[derive(Debug)]
pub enum MeshLoadError {
    /// 文件不存在
    FileNotFound(PathBuf),

    /// 不支持的文件格式
    UnsupportedFormat(String),

    /// 解析失败
    ParseError(String),

    /// 几何数据无效
    InvalidGeometry(String),
}

impl DxPracticeError {
    /// 错误的严重程度
    ///
    /// 只有环形缓冲区溢出是可恢复的：该帧被拒绝，不会写入任何数据。
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            DxPracticeError::Graphics(GraphicsError::RingBufferOverrun { .. }) => {
                ErrorSeverity::Recoverable
            }
            _ => ErrorSeverity::Fatal,
        }
    }

    /// 是否为致命错误
    pub fn is_fatal(&self) -> bool {
        self.severity() == ErrorSeverity::Fatal
    }
}

impl fmt::Display for DxPracticeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DxPracticeError::Config(e) => write!(f, "Configuration error: {}", e),
            DxPracticeError::Graphics(e) => write!(f, "Graphics error: {}", e),
            DxPracticeError::MeshLoading(e) => write!(f, "Mesh loading error: {}", e),
            DxPracticeError::TextureLoading(msg) => write!(f, "Texture loading error: {}", msg),
            DxPracticeError::Io(e) => write!(f, "IO error: {}", e),
            DxPracticeError::Initialization(msg) => write!(f, "Initialization error: {}", msg),
            DxPracticeError::Runtime(msg) => write!(f, "Runtime error: {}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {}", path),
            ConfigError::ParseError(msg) => write!(f, "Failed to parse config: {}", msg),
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "Invalid value for '{}': {}", field, reason)
            }
        }
    }
}

impl fmt::Display for GraphicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphicsError::DeviceCreation(msg) => write!(f, "Device creation failed: {}", msg),
            GraphicsError::SwapchainError(msg) => write!(f, "Swapchain error: {}", msg),
            GraphicsError::ShaderCompilation(msg) => write!(f, "Shader compilation failed: {}", msg),
            GraphicsError::ResourceCreation(msg) => write!(f, "Resource creation failed: {}", msg),
            GraphicsError::CommandExecution(msg) => write!(f, "Command execution failed: {}", msg),
            GraphicsError::DeviceRemoved(reason) => write!(f, "Device removed: {}", reason),
            GraphicsError::MissingDependency { stage, requires } => {
                write!(f, "Cannot create {} before {}", stage, requires)
            }
            GraphicsError::InvalidResourceState { resource, expected, actual } => write!(
                f,
                "Barrier on {} expects state {} but resource is in {}",
                resource, expected, actual
            ),
            GraphicsError::RingBufferOverrun { requested, capacity } => write!(
                f,
                "Frame requested {} constant buffer slots, ring holds {}",
                requested, capacity
            ),
        }
    }
}

impl fmt::Display for MeshLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeshLoadError::FileNotFound(path) => write!(f, "Mesh file not found: {}", path.display()),
            MeshLoadError::UnsupportedFormat(msg) => write!(f, "Unsupported mesh format: {}", msg),
            MeshLoadError::ParseError(msg) => write!(f, "Failed to parse mesh: {}", msg),
            MeshLoadError::InvalidGeometry(msg) => write!(f, "Invalid geometry data: {}", msg),
        }
    }
}

impl std::error::Error for DxPracticeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DxPracticeError::Io(e) => Some(e),
            DxPracticeError::Config(e) => Some(e),
            DxPracticeError::Graphics(e) => Some(e),
            DxPracticeError::MeshLoading(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for GraphicsError {}
impl std::error::Error for MeshLoadError {}

// 实现 From trait 以便于错误转换
impl From<std::io::Error> for DxPracticeError {
    fn from(err: std::io::Error) -> Self {
        DxPracticeError::Io(err)
    }
}

impl From<ConfigError> for DxPracticeError {
    fn from(err: ConfigError) -> Self {
        DxPracticeError::Config(err)
    }
}

impl From<GraphicsError> for DxPracticeError {
    fn from(err: GraphicsError) -> Self {
        DxPracticeError::Graphics(err)
    }
}

impl From<MeshLoadError> for DxPracticeError {
    fn from(err: MeshLoadError) -> Self {
        DxPracticeError::MeshLoading(err)
    }
}

impl From<image::ImageError> for DxPracticeError {
    fn from(err: image::ImageError) -> Self {
        DxPracticeError::TextureLoading(err.to_string())
    }
}

#[cfg(target_os = "windows")]
impl From<windows::core::Error> for DxPracticeError {
    fn from(err: windows::core::Error) -> Self {
        DxPracticeError::Graphics(GraphicsError::CommandExecution(format!("{:?}", err)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_overrun_is_recoverable() {
        let err: DxPracticeError = GraphicsError::RingBufferOverrun {
            requested: 300,
            capacity: 256,
        }
        .into();
        assert_eq!(err.severity(), ErrorSeverity::Recoverable);
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_device_errors_are_fatal() {
        let removed: DxPracticeError = GraphicsError::DeviceRemoved("DXGI_ERROR_DEVICE_HUNG".into()).into();
        assert!(removed.is_fatal());

        let missing: DxPracticeError = GraphicsError::MissingDependency {
            stage: "swap chain",
            requires: "command queue",
        }
        .into();
        assert!(missing.is_fatal());
        assert_eq!(
            missing.to_string(),
            "Graphics error: Cannot create swap chain before command queue"
        );
    }
}
