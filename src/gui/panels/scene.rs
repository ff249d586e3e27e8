//! 场景信息面板
//!
//! 显示场景时间、纹理选择器、相机位置和设备信息。

use egui;
use crate::gui::state::OverlayState;

/// 渲染场景信息面板
pub fn render(ui: &mut egui::Ui, state: &OverlayState) {
    ui.collapsing("场景", |ui| {
        ui.label(format!("{:.6}", state.scene_time));
        ui.label(format!("纹理选择: {}", state.texture_select));
        ui.label(format!(
            "对象: {}  三角形: {}",
            state.object_count, state.triangle_count
        ));
        let [x, y, z] = state.camera_position;
        ui.label(format!("相机: ({:.2}, {:.2}, {:.2})", x, y, z));
    });

    ui.collapsing("设备", |ui| {
        ui.label(format!("渲染模式: {}", state.render_mode.name()));
        ui.label(format!("特性级别: {}", state.feature_level));
    });
}
