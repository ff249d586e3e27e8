//! GUI 系统模块
//!
//! 基于 egui 的调试叠加层。UI 构建与图形后端无关，由 D3D11 后端负责绘制。

mod state;
mod metrics;
mod overlay;
pub mod panels;

pub use metrics::FrameStats;
pub use overlay::{DebugOverlay, OverlayFrame};
pub use state::OverlayState;
