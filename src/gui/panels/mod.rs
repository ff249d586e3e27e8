//! GUI 面板模块
//!
//! 包含调试叠加层窗口中的各个面板。

pub mod performance;
pub mod scene;
