//! 配置管理模块
//!
//! 提供框架配置的加载、解析和管理功能。
//! 支持从 TOML 配置文件加载，也支持命令行参数覆盖。
//!
//! # 配置文件格式 (config.toml)
//!
//! ```toml
//! [window]
//! width = 800
//! height = 600
//! title = "FrameworkDX11"
//! resizable = false
//!
//! [graphics]
//! render_mode = "pbr"     # 或 "skinned"
//! debug_layer = true
//! clear_color = [0.2, 0.2, 1.0, 1.0]
//! shader_dir = "src/gfx/d3d11/shaders"
//!
//! [input]
//! move_step = 0.02
//! look_sensitivity = 0.005
//!
//! [logging]
//! level = "info"      # trace, debug, info, warn, error
//! file_output = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::error::{ConfigError, Result};

/// 框架配置
///
/// 包含了运行所需的所有配置项。缺失的段落使用默认值。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// 窗口配置
    #[serde(default)]
    pub window: WindowConfig,

    /// 图形配置
    #[serde(default)]
    pub graphics: GraphicsConfig,

    /// 输入配置
    #[serde(default)]
    pub input: InputConfig,

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

    /// 是否可调整大小（交换链不支持重建，默认关闭）
    #[serde(default = "default_resizable")]
    pub resizable: bool,
}

/// 图形配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphicsConfig {
    /// 着色器组合
    #[serde(default = "default_render_mode")]
    pub render_mode: RenderMode,

    /// 是否启用 D3D11 调试层
    #[serde(default = "default_debug_layer")]
    pub debug_layer: bool,

    /// 渲染目标的清屏颜色
    #[serde(default = "default_clear_color")]
    pub clear_color: [f32; 4],

    /// HLSL 源文件目录，相对路径基于 crate 根目录
    #[serde(default = "default_shader_dir")]
    pub shader_dir: PathBuf,
}

/// 着色器组合
///
/// 启动时决定一次，运行期间不可切换。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// 基于物理的材质着色（法线贴图 + 金属度/粗糙度）
    Pbr,
    /// 骨骼蒙皮
    Skinned,
}

/// 输入配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// 每帧按键移动的固定步长（世界单位）
    #[serde(default = "default_move_step")]
    pub move_step: f32,

    /// 鼠标视角灵敏度（弧度 / 像素）
    #[serde(default = "default_look_sensitivity")]
    pub look_sensitivity: f32,
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

// 默认值函数
fn default_width() -> u32 { 800 }
fn default_height() -> u32 { 600 }
fn default_title() -> String { "FrameworkDX11".to_string() }
fn default_resizable() -> bool { false }
fn default_render_mode() -> RenderMode { RenderMode::Pbr }
fn default_debug_layer() -> bool { cfg!(debug_assertions) }
fn default_clear_color() -> [f32; 4] { [0.2, 0.2, 1.0, 1.0] }
fn default_shader_dir() -> PathBuf { PathBuf::from("src/gfx/d3d11/shaders") }
fn default_move_step() -> f32 { 0.02 }
fn default_look_sensitivity() -> f32 { 0.005 }
fn default_log_level() -> LogLevel { LogLevel::Info }
fn default_file_output() -> bool { false }
fn default_log_file() -> String { "framework_dx11.log".to_string() }

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            title: default_title(),
            resizable: default_resizable(),
        }
    }
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            render_mode: default_render_mode(),
            debug_layer: default_debug_layer(),
            clear_color: default_clear_color(),
            shader_dir: default_shader_dir(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            move_step: default_move_step(),
            look_sensitivity: default_look_sensitivity(),
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
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let contents = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path_str.clone()))?;

        Self::from_toml_str(&contents)
    }

    /// 从 TOML 文本解析
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()).into())
    }

    /// 从配置文件加载，文件不存在时使用默认配置
    ///
    /// 文件存在但无法读取或解析时返回错误，不会静默回退到默认值。
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let config = Self::from_file(path)?;
        tracing::info!("Loaded config from: {}", path.display());
        Ok(config)
    }

    /// 从命令行参数覆盖配置
    ///
    /// 支持的参数：
    /// - `--pbr` / `--skinned`: 选择着色器组合
    /// - `--debug-layer`: 强制开启 D3D11 调试层
    /// - `--width <value>`: 设置窗口宽度
    /// - `--height <value>`: 设置窗口高度
    pub fn apply_args<I>(&mut self, args: I)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|s| s.as_ref().to_string()).collect();

        if args.iter().any(|a| a == "--pbr") {
            self.graphics.render_mode = RenderMode::Pbr;
        }

        if args.iter().any(|a| a == "--skinned") {
            self.graphics.render_mode = RenderMode::Skinned;
        }

        if args.iter().any(|a| a == "--debug-layer") {
            self.graphics.debug_layer = true;
        }

        if let Some(idx) = args.iter().position(|a| a == "--width") {
            if let Some(width_str) = args.get(idx + 1) {
                if let Ok(width) = width_str.parse() {
                    self.window.width = width;
                }
            }
        }

        if let Some(idx) = args.iter().position(|a| a == "--height") {
            if let Some(height_str) = args.get(idx + 1) {
                if let Ok(height) = height_str.parse() {
                    self.window.height = height;
                }
            }
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

        if !(self.input.move_step > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "input.move_step".to_string(),
                reason: "Movement step must be positive".to_string(),
            }.into());
        }

        if !(self.input.look_sensitivity > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "input.look_sensitivity".to_string(),
                reason: "Look sensitivity must be positive".to_string(),
            }.into());
        }

        Ok(())
    }

    /// 解析着色器目录：绝对路径原样返回，相对路径基于 crate 根目录
    pub fn resolved_shader_dir(&self) -> PathBuf {
        let dir = &self.graphics.shader_dir;
        if dir.is_absolute() {
            dir.clone()
        } else {
            Path::new(env!("CARGO_MANIFEST_DIR")).join(dir)
        }
    }
}

impl RenderMode {
    /// 获取着色器组合名称
    pub fn name(&self) -> &'static str {
        match self {
            RenderMode::Pbr => "PBR",
            RenderMode::Skinned => "Skinned",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.graphics.render_mode, RenderMode::Pbr);
        assert_eq!(config.graphics.clear_color, [0.2, 0.2, 1.0, 1.0]);
        assert!((config.input.move_step - 0.02).abs() < f32::EPSILON);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.window.width = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.input.move_step = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = Config::from_toml_str(
            r#"
            [graphics]
            render_mode = "skinned"
            "#,
        )
        .unwrap();
        assert_eq!(config.graphics.render_mode, RenderMode::Skinned);
        assert_eq!(config.window.width, 800);
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn test_apply_args() {
        let mut config = Config::default();
        config.apply_args(["app", "--skinned", "--width", "1024", "--height", "768"]);
        assert_eq!(config.graphics.render_mode, RenderMode::Skinned);
        assert_eq!(config.window.width, 1024);
        assert_eq!(config.window.height, 768);
    }

    #[test]
    fn test_shader_dir_resolves_against_manifest() {
        let config = Config::default();
        let dir = config.resolved_shader_dir();
        assert!(dir.is_absolute());
        assert!(dir.ends_with("src/gfx/d3d11/shaders"));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_file_or_default(dir.path().join("config.toml")).unwrap();
        assert_eq!(config.window.width, 800);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[window]\nwidth = \"wide\"\n").unwrap();
        assert!(Config::from_file_or_default(&path).is_err());
    }
}
