//! 叠加层状态
//!
//! OverlayState 是每帧从帧编排器收集的只读快照，与具体的图形后端无关。

use crate::core::config::RenderMode;

/// 调试叠加层显示的数据
#[derive(Debug, Clone)]
pub struct OverlayState {
    // 性能监控
    pub fps: u32,
    pub frame_time_ms: f32,

    // 场景
    pub scene_time: f32,
    pub texture_select: u32,
    pub object_count: usize,
    pub triangle_count: usize,
    pub camera_position: [f32; 3],

    // 设备信息
    pub render_mode: RenderMode,
    pub feature_level: String,
}

impl OverlayState {
    pub fn new(render_mode: RenderMode, feature_level: impl Into<String>) -> Self {
        Self {
            fps: 0,
            frame_time_ms: 0.0,
            scene_time: 0.0,
            texture_select: 0,
            object_count: 0,
            triangle_count: 0,
            camera_position: [0.0; 3],
            render_mode,
            feature_level: feature_level.into(),
        }
    }

    /// 更新性能统计
    pub fn update_performance(&mut self, fps: u32, frame_time_ms: f32) {
        self.fps = fps;
        self.frame_time_ms = frame_time_ms;
    }
}
