//! 帧编排器
//!
//! FrameOrchestrator 拥有设备、着色器、场景、帧率统计和调试叠加层，
//! 固定每帧的执行顺序：
//!
//! 1. 记录帧率统计
//! 2. 清除渲染目标和深度缓冲
//! 3. 绑定顶点着色器（含输入布局）和默认像素着色器
//! 4. `Scene::update`
//! 5. 构建并绘制调试叠加层
//! 6. 呈现
//!
//! 关闭时先释放场景和着色器，再释放设备，最后返回存活资源报告。

use tracing::{info, warn};

use crate::core::config::{Config, RenderMode};
use crate::core::error::{FrameworkError, Result};
use crate::core::scene::SceneConfig;
use crate::gui::{DebugOverlay, FrameStats, OverlayState};
use crate::renderer::backend_trait::FrameTarget;
use crate::renderer::resource::{LiveObjectReport, ResourceTable, VertexShaderHandle};
use crate::renderer::scene::Scene;
use crate::renderer::shaders::{ShaderCompiler, ShaderProgram};

/// 清除深度缓冲使用的值
pub const CLEAR_DEPTH: f32 = 1.0;

/// 帧编排器
pub struct FrameOrchestrator<D: FrameTarget> {
    device: D,
    vertex_shader: VertexShaderHandle,
    resources: ResourceTable,
    scene: Scene,
    stats: FrameStats,
    overlay: DebugOverlay,
    clear_color: [f32; 4],
    render_mode: RenderMode,
}

impl<D: FrameTarget> FrameOrchestrator<D> {
    /// 编译着色器、创建场景
    ///
    /// 任何一步失败都会释放已经创建的资源并把设备交还给 `shutdown`，
    /// 因此错误路径上也能得到存活资源报告。
    pub fn initialize<C: ShaderCompiler + ?Sized>(
        mut device: D,
        config: &Config,
        scene_config: &SceneConfig,
        compiler: &C,
    ) -> std::result::Result<Self, (FrameworkError, D)> {
        let mode = config.graphics.render_mode;
        let program = match ShaderProgram::load(compiler, &config.resolved_shader_dir(), mode) {
            Ok(program) => program,
            Err(e) => return Err((e, device)),
        };

        let vertex_shader = match device.create_vertex_shader(&program.vertex) {
            Ok(shader) => shader,
            Err(e) => return Err((e, device)),
        };
        let textured_ps = match device.create_pixel_shader(&program.textured_pixel) {
            Ok(shader) => shader,
            Err(e) => {
                device.release_vertex_shader(vertex_shader);
                return Err((e, device));
            }
        };
        let solid_ps = match device.create_pixel_shader(&program.solid_pixel) {
            Ok(shader) => shader,
            Err(e) => {
                device.release_pixel_shader(textured_ps);
                device.release_vertex_shader(vertex_shader);
                return Err((e, device));
            }
        };
        let resources = ResourceTable { textured_ps, solid_ps };

        let size = device.size();
        let scene = match Scene::initialize(size, &mut device, resources, scene_config) {
            Ok(scene) => scene,
            Err(e) => {
                device.release_pixel_shader(solid_ps);
                device.release_pixel_shader(textured_ps);
                device.release_vertex_shader(vertex_shader);
                return Err((e, device));
            }
        };

        let overlay = DebugOverlay::new(OverlayState::new(mode, device.feature_level_name()));
        info!(
            mode = mode.name(),
            width = size.0,
            height = size.1,
            feature_level = %device.feature_level_name(),
            "Frame orchestrator initialized"
        );

        Ok(Self {
            device,
            vertex_shader,
            resources,
            scene,
            stats: FrameStats::new(),
            overlay,
            clear_color: config.graphics.clear_color,
            render_mode: mode,
        })
    }

    /// 执行一帧
    ///
    /// 返回 egui 的平台输出（光标形状等），由主循环交给 egui-winit。
    pub fn on_frame(&mut self, delta_time: f32, overlay_input: egui::RawInput) -> Result<egui::PlatformOutput> {
        self.stats.record_frame(delta_time);

        self.device.clear(self.clear_color, CLEAR_DEPTH);
        self.device.set_vertex_shader(self.vertex_shader)?;
        self.device.set_pixel_shader(self.resources.textured_ps)?;

        self.scene.update(&mut self.device, delta_time)?;

        let state = self.overlay.state_mut();
        state.update_performance(self.stats.fps(), self.stats.frame_time_ms());
        state.scene_time = self.scene.time();
        state.texture_select = self.scene.texture_select();
        state.object_count = self.scene.object_count();
        state.triangle_count = self.scene.triangle_count();
        state.camera_position = self.scene.camera().position().into();

        let (frame, platform_output) = self.overlay.run(overlay_input);
        self.device.paint_overlay(&frame)?;

        self.device.present()?;
        Ok(platform_output)
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    pub fn render_mode(&self) -> RenderMode {
        self.render_mode
    }

    /// egui 上下文（供主循环中的 egui-winit 使用）
    pub fn overlay_context(&self) -> &egui::Context {
        self.overlay.context()
    }

    /// 按依赖逆序释放：场景、着色器，最后是设备
    pub fn shutdown(mut self) -> LiveObjectReport {
        self.scene.release(&mut self.device);
        self.device.release_pixel_shader(self.resources.solid_ps);
        self.device.release_pixel_shader(self.resources.textured_ps);
        self.device.release_vertex_shader(self.vertex_shader);

        let report = self.device.shutdown();
        if report.is_clean() {
            info!("Shutdown complete, no live objects");
        } else {
            warn!(
                buffers = report.buffers,
                textures = report.textures,
                samplers = report.samplers,
                shaders = report.shaders,
                "Live objects remain after shutdown"
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use crate::renderer::testing::{fixtures, Call, MockCompiler, MockContext};

    fn config() -> Config {
        let mut config = Config::default();
        config.graphics.shader_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("src/gfx/d3d11/shaders");
        config
    }

    fn orchestrator(dir: &Path) -> FrameOrchestrator<MockContext> {
        let scene_config = fixtures::scene_config(dir);
        FrameOrchestrator::initialize(
            MockContext::new(800, 600),
            &config(),
            &scene_config,
            &MockCompiler::default(),
        )
        .map_err(|(e, _)| e)
        .unwrap()
    }

    fn raw_input() -> egui::RawInput {
        egui::RawInput {
            screen_rect: Some(egui::Rect::from_min_size(egui::Pos2::ZERO, egui::vec2(800.0, 600.0))),
            ..Default::default()
        }
    }

    #[test]
    fn test_frame_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut frame = orchestrator(dir.path());

        frame.on_frame(0.016, raw_input()).unwrap();
        let calls = &frame.device().calls;

        assert_eq!(calls[0], Call::Clear([0.2, 0.2, 1.0, 1.0]));
        assert!(matches!(calls[1], Call::SetVertexShader(_)));
        assert!(matches!(calls[2], Call::SetPixelShader(_)));

        let first_draw = calls.iter().position(|c| matches!(c, Call::Draw(_))).unwrap();
        let overlay = calls.iter().position(|c| *c == Call::PaintOverlay).unwrap();
        assert!(first_draw < overlay);
        assert_eq!(calls.last(), Some(&Call::Present));
        assert_eq!(
            frame.device().pixel_shader_entry(frame.resources.textured_ps),
            Some("PS_Normal")
        );
    }

    #[test]
    fn test_skinned_mode_uses_skinned_entry() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config();
        config.graphics.render_mode = RenderMode::Skinned;

        let frame = FrameOrchestrator::initialize(
            MockContext::new(800, 600),
            &config,
            &fixtures::scene_config(dir.path()),
            &MockCompiler::default(),
        )
        .map_err(|(e, _)| e)
        .unwrap();
        assert_eq!(frame.device().pixel_shader_entry(frame.resources.textured_ps), Some("PS"));
        assert_eq!(frame.render_mode(), RenderMode::Skinned);
    }

    #[test]
    fn test_fps_reported_after_one_second() {
        let dir = tempfile::tempdir().unwrap();
        let mut frame = orchestrator(dir.path());
        for _ in 0..5 {
            frame.on_frame(0.25, raw_input()).unwrap();
        }
        assert_eq!(frame.stats().fps(), 5);
        assert_eq!(frame.scene().texture_select(), 1);
    }

    #[test]
    fn test_shutdown_reports_no_live_objects() {
        let dir = tempfile::tempdir().unwrap();
        let mut frame = orchestrator(dir.path());
        frame.on_frame(0.016, raw_input()).unwrap();

        let report = frame.shutdown();
        assert!(report.is_clean(), "{:?}", report);
    }

    #[test]
    fn test_shader_failure_returns_device() {
        let dir = tempfile::tempdir().unwrap();
        let mut compiler = MockCompiler::default();
        compiler
            .failures
            .insert("PS_SolidColor".to_string(), "pbr.hlsl(1,1): error X3000: syntax error".to_string());

        let result = FrameOrchestrator::initialize(
            MockContext::new(800, 600),
            &config(),
            &fixtures::scene_config(dir.path()),
            &compiler,
        );
        let (err, mut device) = match result {
            Ok(_) => panic!("expected shader failure"),
            Err(pair) => pair,
        };
        assert!(err.to_string().contains("X3000"));
        assert!(device.shutdown().is_clean());
    }

    #[test]
    fn test_scene_failure_releases_shaders() {
        let dir = tempfile::tempdir().unwrap();
        let mut scene_config = fixtures::scene_config(dir.path());
        scene_config.objects[0].path = dir.path().join("missing.gltf");

        let result = FrameOrchestrator::initialize(
            MockContext::new(800, 600),
            &config(),
            &scene_config,
            &MockCompiler::default(),
        );
        let Err((_, mut device)) = result else {
            panic!("expected scene failure");
        };
        assert!(device.shutdown().is_clean());
    }
}
