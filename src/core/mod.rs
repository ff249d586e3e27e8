//! 核心功能模块
//!
//! 与图形 API 无关的基础设施。
//!
//! # 模块组织
//!
//! - `log`：基于 tracing 的日志初始化（控制台 + 可选文件）
//! - `config`：应用配置（`config.toml`）和命令行覆盖
//! - `scene`：场景描述（`scene.toml`）
//! - `error`：统一的错误类型
//! - `input`：窗口事件到相机命令的转换

pub mod config;
pub mod error;
pub mod input;
pub mod log;
pub mod scene;

pub use config::{Config, RenderMode};
pub use error::{FrameworkError, Result};
pub use input::InputSystem;
pub use scene::SceneConfig;
