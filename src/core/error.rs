//! 错误处理模块
//!
//! 定义了框架中使用的统一错误类型。所有失败路径都是致命的：错误沿调用栈返回，
//! 最终由入口处展示给用户（Windows 下弹出对话框）。
//!
//! # 设计原则
//!
//! - 手写 `Display` / `Error` / `From`，不依赖派生宏
//! - 着色器错误保留编译器的完整诊断文本
//! - 易于模式匹配和错误处理

use std::fmt;
use std::path::PathBuf;

/// 框架统一的 Result 类型
pub type Result<T> = std::result::Result<T, FrameworkError>;

/// FrameworkDX11 的错误类型
#[derive(Debug)]
pub enum FrameworkError {
    /// 配置错误
    Config(ConfigError),

    /// 图形 API 错误
    Graphics(GraphicsError),

    /// 资源（glTF / 纹理）加载错误
    Asset(AssetLoadError),

    /// IO 错误
    Io(std::io::Error),

    /// 日志系统错误
    Log(String),

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
    /// 设备创建失败（所有驱动类型都已尝试）
    DeviceCreation(String),

    /// 交换链错误
    SwapchainError(String),

    /// 着色器编译失败，`diagnostics` 为编译器原始输出
    ShaderCompilation {
        source: String,
        entry_point: String,
        diagnostics: String,
    },

    /// 资源创建失败
    ResourceCreation(String),

    /// 渲染命令执行失败
    CommandExecution(String),

    /// CPU 侧常量缓冲区结构与着色器布局不一致
    LayoutMismatch {
        name: &'static str,
        cpu_size: usize,
        shader_size: usize,
    },

    /// 句柄不存在或已释放
    InvalidHandle(String),
}

/// 资源加载相关的错误
#[derive(Debug)]
pub enum AssetLoadError {
    /// 文件不存在
    FileNotFound(PathBuf),

    /// 不支持的文件格式
    UnsupportedFormat(String),

    /// 解析失败
    ParseError(String),

    /// 数据验证失败（例如节点层级有环）
    ValidationError(String),

    /// 几何数据无效
    InvalidGeometry(String),

    /// 场景对象加载失败，视为致命
    SceneObject { name: String, path: PathBuf },
}

impl fmt::Display for FrameworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameworkError::Config(e) => write!(f, "Configuration error: {}", e),
            FrameworkError::Graphics(e) => write!(f, "Graphics error: {}", e),
            FrameworkError::Asset(e) => write!(f, "Asset loading error: {}", e),
            FrameworkError::Io(e) => write!(f, "IO error: {}", e),
            FrameworkError::Log(msg) => write!(f, "Log error: {}", msg),
            FrameworkError::Initialization(msg) => write!(f, "Initialization error: {}", msg),
            FrameworkError::Runtime(msg) => write!(f, "Runtime error: {}", msg),
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
            GraphicsError::ShaderCompilation {
                source,
                entry_point,
                diagnostics,
            } => write!(
                f,
                "Shader compilation failed ({} @ {}):\n{}",
                source, entry_point, diagnostics
            ),
            GraphicsError::ResourceCreation(msg) => write!(f, "Resource creation failed: {}", msg),
            GraphicsError::CommandExecution(msg) => write!(f, "Command execution failed: {}", msg),
            GraphicsError::LayoutMismatch {
                name,
                cpu_size,
                shader_size,
            } => write!(
                f,
                "Constant buffer '{}' is {} bytes on the CPU but {} bytes in HLSL",
                name, cpu_size, shader_size
            ),
            GraphicsError::InvalidHandle(msg) => write!(f, "Invalid resource handle: {}", msg),
        }
    }
}

impl fmt::Display for AssetLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetLoadError::FileNotFound(path) => write!(f, "Asset file not found: {}", path.display()),
            AssetLoadError::UnsupportedFormat(msg) => write!(f, "Unsupported asset format: {}", msg),
            AssetLoadError::ParseError(msg) => write!(f, "Failed to parse asset: {}", msg),
            AssetLoadError::ValidationError(msg) => write!(f, "Asset validation failed: {}", msg),
            AssetLoadError::InvalidGeometry(msg) => write!(f, "Invalid geometry data: {}", msg),
            AssetLoadError::SceneObject { name, path } => write!(
                f,
                "Scene object '{}' could not be loaded from {}",
                name,
                path.display()
            ),
        }
    }
}

impl std::error::Error for FrameworkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FrameworkError::Io(e) => Some(e),
            FrameworkError::Config(e) => Some(e),
            FrameworkError::Graphics(e) => Some(e),
            FrameworkError::Asset(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for GraphicsError {}
impl std::error::Error for AssetLoadError {}

impl From<std::io::Error> for FrameworkError {
    fn from(err: std::io::Error) -> Self {
        FrameworkError::Io(err)
    }
}

impl From<ConfigError> for FrameworkError {
    fn from(err: ConfigError) -> Self {
        FrameworkError::Config(err)
    }
}

impl From<GraphicsError> for FrameworkError {
    fn from(err: GraphicsError) -> Self {
        FrameworkError::Graphics(err)
    }
}

impl From<AssetLoadError> for FrameworkError {
    fn from(err: AssetLoadError) -> Self {
        FrameworkError::Asset(err)
    }
}

impl From<gltf::Error> for AssetLoadError {
    fn from(err: gltf::Error) -> Self {
        match err {
            gltf::Error::Io(e) => AssetLoadError::ParseError(format!("io: {}", e)),
            other => AssetLoadError::ParseError(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shader_error_keeps_diagnostics() {
        let err: FrameworkError = GraphicsError::ShaderCompilation {
            source: "pbr.hlsl".into(),
            entry_point: "VS".into(),
            diagnostics: "error X3000: syntax error".into(),
        }
        .into();
        let text = err.to_string();
        assert!(text.contains("pbr.hlsl"));
        assert!(text.contains("error X3000"));
    }

    #[test]
    fn test_layout_mismatch_message() {
        let err = GraphicsError::LayoutMismatch {
            name: "PerDrawConstants",
            cpu_size: 208,
            shader_size: 224,
        };
        assert!(err.to_string().contains("208"));
        assert!(err.to_string().contains("224"));
    }
}
