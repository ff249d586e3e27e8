//! 调试叠加层
//!
//! DebugOverlay 持有 egui 上下文，每帧构建一个小窗口（FPS、操作提示、场景时间等），
//! 输出与后端无关的 [`OverlayFrame`]：细分后的三角形和纹理更新。
//! 实际绘制由后端的 `FrameTarget::paint_overlay` 完成。
//!
//! 窗口事件到 `egui::RawInput` 的转换由 egui-winit 在主循环中完成。

use egui;

use crate::gui::panels;
use crate::gui::state::OverlayState;

/// 一帧叠加层的绘制数据
#[derive(Default)]
pub struct OverlayFrame {
    pub primitives: Vec<egui::ClippedPrimitive>,
    pub textures_delta: egui::TexturesDelta,
    pub pixels_per_point: f32,
}

impl OverlayFrame {
    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
            && self.textures_delta.set.is_empty()
            && self.textures_delta.free.is_empty()
    }

    /// 所有网格的索引总数
    pub fn index_count(&self) -> usize {
        self.primitives
            .iter()
            .map(|p| match &p.primitive {
                egui::epaint::Primitive::Mesh(mesh) => mesh.indices.len(),
                egui::epaint::Primitive::Callback(_) => 0,
            })
            .sum()
    }
}

/// 调试叠加层
pub struct DebugOverlay {
    context: egui::Context,
    state: OverlayState,
}

impl DebugOverlay {
    pub fn new(state: OverlayState) -> Self {
        Self {
            context: egui::Context::default(),
            state,
        }
    }

    /// egui 上下文（供 egui-winit 转换事件）
    pub fn context(&self) -> &egui::Context {
        &self.context
    }

    pub fn state(&self) -> &OverlayState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut OverlayState {
        &mut self.state
    }

    /// 构建 UI 并细分
    ///
    /// 返回绘制数据和平台输出（光标形状、剪贴板等，交给 egui-winit 处理）。
    pub fn run(&mut self, raw_input: egui::RawInput) -> (OverlayFrame, egui::PlatformOutput) {
        let state = &self.state;
        let full_output = self.context.run(raw_input, |ctx| {
            egui::Window::new("Debug")
                .default_pos([10.0, 10.0])
                .resizable(false)
                .show(ctx, |ui| {
                    panels::performance::render(ui, state);
                    ui.separator();
                    panels::scene::render(ui, state);
                });
        });

        let pixels_per_point = full_output.pixels_per_point;
        let primitives = self.context.tessellate(full_output.shapes, pixels_per_point);

        (
            OverlayFrame {
                primitives,
                textures_delta: full_output.textures_delta,
                pixels_per_point,
            },
            full_output.platform_output,
        )
    }
}
