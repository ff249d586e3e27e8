//! 图形后端模块
//!
//! - `backend`：与平台无关的设备协商（驱动类型 × 特性级别）
//! - `d3d11`：Direct3D 11 实现，仅在 Windows 下编译
//!
//! 渲染逻辑只依赖 `renderer` 中的 `RenderContext` / `FrameTarget`，
//! 这里负责把它们落到具体的图形 API 上。

pub mod backend;
#[cfg(target_os = "windows")]
pub mod d3d11;

pub use backend::{negotiate, DeviceFactory, DriverType, FeatureLevel, NegotiatedDevice};
