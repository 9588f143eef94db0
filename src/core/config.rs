//! 配置管理模块
//!
//! 提供引擎配置的加载、解析和管理功能。
//! 支持从 TOML 配置文件加载，也支持命令行参数覆盖。
//!
//! # 配置文件格式 (config.toml)
//!
//! ```toml
//! [window]
//! width = 600
//! height = 600
//! title = "DXPractice"
//!
//! [graphics]
//! backend = "dx12"    # 或 "software"
//! vsync = false
//! clear_color = [0.690196, 0.768627, 0.870588, 1.0]
//!
//! [assets]
//! mesh = "resources/mesh/cube.obj"
//! texture = "resources/texture/bricks.dds"
//!
//! [headless]
//! frames = 2
//! output = "frame.png"
//!
//! [logging]
//! level = "info"      # trace, debug, info, warn, error
//! file_output = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::{ConfigError, Result};

/// 引擎配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// 窗口配置
    #[serde(default)]
    pub window: WindowConfig,

    /// 图形配置
    #[serde(default)]
    pub graphics: GraphicsConfig,

    /// 资源路径
    #[serde(default)]
    pub assets: AssetConfig,

    /// 无窗口运行（软件后端）配置
    #[serde(default)]
    pub headless: HeadlessConfig,

    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 窗口配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// 窗口宽度
    #[serde(default = "default_width")]
    pub width: u32,

    /// 窗口高度
    #[serde(default = "default_height")]
    pub height: u32,

    /// 窗口标题
    #[serde(default = "default_title")]
    pub title: String,
}

/// 图形配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphicsConfig {
    /// 图形后端选择
    #[serde(default = "default_backend")]
    pub backend: GraphicsBackend,

    /// 垂直同步
    #[serde(default = "default_vsync")]
    pub vsync: bool,

    /// 渲染目标清除颜色（RGBA）
    #[serde(default = "default_clear_color")]
    pub clear_color: [f32; 4],
}

/// 图形后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphicsBackend {
    /// DirectX 12 后端（仅 Windows）
    Dx12,
    /// CPU 参考后端（全平台，无窗口）
    Software,
}

/// 资源路径配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetConfig {
    /// 网格文件（OBJ）
    #[serde(default = "default_mesh_path")]
    pub mesh: String,

    /// 纹理文件
    #[serde(default = "default_texture_path")]
    pub texture: String,
}

/// 无窗口运行配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadlessConfig {
    /// 渲染帧数
    #[serde(default = "default_frames")]
    pub frames: u32,

    /// 最后一帧的截图路径
    #[serde(default = "default_output")]
    pub output: String,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// 是否输出到文件
    #[serde(default = "default_file_output")]
    pub file_output: bool,

    /// 日志文件路径
    #[serde(default = "default_log_file")]
    pub log_file: String,
}

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// DirectX Colors::LightSteelBlue
pub const LIGHT_STEEL_BLUE: [f32; 4] = [0.690_196_1, 0.768_627_5, 0.870_588_3, 1.0];

// 默认值函数
fn default_width() -> u32 { 600 }
fn default_height() -> u32 { 600 }
fn default_title() -> String { "DXPractice".to_string() }
fn default_backend() -> GraphicsBackend {
    if cfg!(target_os = "windows") {
        GraphicsBackend::Dx12
    } else {
        GraphicsBackend::Software
    }
}
fn default_vsync() -> bool { false }
fn default_clear_color() -> [f32; 4] { LIGHT_STEEL_BLUE }
fn default_mesh_path() -> String { "resources/mesh/cube.obj".to_string() }
fn default_texture_path() -> String { "resources/texture/bricks.dds".to_string() }
fn default_frames() -> u32 { 2 }
fn default_output() -> String { "frame.png".to_string() }
fn default_log_level() -> LogLevel { LogLevel::Info }
fn default_file_output() -> bool { false }
fn default_log_file() -> String { "dx_practice.log".to_string() }

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            title: default_title(),
        }
    }
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            vsync: default_vsync(),
            clear_color: default_clear_color(),
        }
    }
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            mesh: default_mesh_path(),
            texture: default_texture_path(),
        }
    }
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            frames: default_frames(),
            output: default_output(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_output: default_file_output(),
            log_file: default_log_file(),
        }
    }
}

impl Config {
    /// 从配置文件加载
    ///
    /// # 示例
    ///
    /// ```no_run
    /// use dx_practice::core::Config;
    ///
    /// let config = Config::from_file("config.toml")?;
    /// # Ok::<(), dx_practice::core::DxPracticeError>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let contents = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path_str.clone()))?;

        Self::from_toml_str(&contents)
    }

    /// 从 TOML 字符串解析
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()).into())
    }

    /// 从配置文件加载，如果文件不存在则使用默认配置
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::from_file(path).unwrap_or_default()
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// 从命令行参数覆盖配置
    ///
    /// 支持的参数：
    /// - `--dx12`: 使用 DirectX 12 后端
    /// - `--software`: 使用 CPU 参考后端
    /// - `--width <value>` / `--height <value>`: 设置窗口尺寸
    /// - `--frames <value>`: 无窗口模式下渲染的帧数
    /// - `--output <path>`: 无窗口模式下的截图路径
    pub fn apply_args<I>(&mut self, args: I)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|s| s.as_ref().to_string()).collect();

        if args.iter().any(|a| a == "--dx12") {
            self.graphics.backend = GraphicsBackend::Dx12;
        }

        if args.iter().any(|a| a == "--software") {
            self.graphics.backend = GraphicsBackend::Software;
        }

        let value_of = |flag: &str| {
            args.iter()
                .position(|a| a == flag)
                .and_then(|idx| args.get(idx + 1))
        };

        if let Some(width) = value_of("--width").and_then(|v| v.parse().ok()) {
            self.window.width = width;
        }

        if let Some(height) = value_of("--height").and_then(|v| v.parse().ok()) {
            self.window.height = height;
        }

        if let Some(frames) = value_of("--frames").and_then(|v| v.parse().ok()) {
            self.headless.frames = frames;
        }

        if let Some(output) = value_of("--output") {
            self.headless.output = output.clone();
        }
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> Result<()> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::InvalidValue {
                field: "window.width/height".to_string(),
                reason: "Window dimensions must be greater than 0".to_string(),
            }.into());
        }

        if self.graphics.clear_color.iter().any(|c| !(0.0..=1.0).contains(c)) {
            return Err(ConfigError::InvalidValue {
                field: "graphics.clear_color".to_string(),
                reason: "Color channels must be within [0, 1]".to_string(),
            }.into());
        }

        if cfg!(not(target_os = "windows")) && self.graphics.backend == GraphicsBackend::Dx12 {
            return Err(ConfigError::InvalidValue {
                field: "graphics.backend".to_string(),
                reason: "DirectX 12 is only available on Windows".to_string(),
            }.into());
        }

        Ok(())
    }
}

impl GraphicsBackend {
    /// 获取后端名称
    pub fn name(&self) -> &'static str {
        match self {
            GraphicsBackend::Dx12 => "DirectX 12",
            GraphicsBackend::Software => "Software",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.window.width, 600);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.assets.texture, "resources/texture/bricks.dds");
        assert_eq!(config.graphics.clear_color, LIGHT_STEEL_BLUE);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = Config::from_toml_str(
            r#"
            [window]
            width = 1024

            [graphics]
            backend = "software"
            "#,
        )
        .unwrap();

        assert_eq!(config.window.width, 1024);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.graphics.backend, GraphicsBackend::Software);
        assert_eq!(config.headless.frames, 2);
    }

    #[test]
    fn test_apply_args() {
        let mut config = Config::default();
        config.apply_args(["dx_practice", "--software", "--width", "320", "--frames", "5", "--output", "out.png"]);

        assert_eq!(config.graphics.backend, GraphicsBackend::Software);
        assert_eq!(config.window.width, 320);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.headless.frames, 5);
        assert_eq!(config.headless.output, "out.png");
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.graphics.backend = GraphicsBackend::Software;
        assert!(config.validate().is_ok());

        config.window.width = 0;
        assert!(config.validate().is_err());

        config.window.width = 600;
        config.graphics.clear_color = [2.0, 0.0, 0.0, 1.0];
        assert!(config.validate().is_err());
    }
}
