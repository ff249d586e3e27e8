//! FrameworkDX11 - Direct3D 11 渲染演示
//!
//! # 使用方法
//!
//! ```bash
//! # 使用配置文件（config.toml / scene.toml）
//! cargo run
//!
//! # 命令行覆盖
//! cargo run -- --skinned --width 1280 --height 720 --debug-layer
//! ```
//!
//! # 启动流程
//!
//! 1. 加载配置并应用命令行参数
//! 2. 初始化日志
//! 3. 加载场景描述
//! 4. 创建窗口，协商 D3D11 设备
//! 5. 初始化帧编排器（着色器、场景、叠加层）
//! 6. 进入事件循环，每次重绘执行一帧
//! 7. 退出时按逆序释放资源并报告存活对象
//!
//! 任何初始化或运行时错误都是致命的：写入日志和 stderr，Windows 下再弹出对话框。

use anyhow::Context;
use tracing::{error, info};

use framework_dx11::core::{log, Config, SceneConfig};

fn main() {
    if let Err(e) = run() {
        let message = format!("{:#}", e);
        error!("{}", message);
        eprintln!("Error: {}", message);
        #[cfg(target_os = "windows")]
        framework_dx11::gfx::d3d11::show_error("FrameworkDX11", &message);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let mut config = Config::from_file_or_default("config.toml").context("failed to load config.toml")?;
    config.apply_args(std::env::args());
    config.validate().context("invalid configuration")?;

    let log_file = config
        .logging
        .file_output
        .then_some(config.logging.log_file.as_str());
    log::init_logger(config.logging.level, config.logging.file_output, log_file)
        .context("failed to initialize logging")?;
    info!(version = env!("CARGO_PKG_VERSION"), "FrameworkDX11 starting");

    let scene = SceneConfig::from_file_or_default("scene.toml").context("failed to load scene.toml")?;
    info!(
        mode = config.graphics.render_mode.name(),
        width = config.window.width,
        height = config.window.height,
        objects = scene.objects.len(),
        "Configuration loaded"
    );

    platform::run(config, scene)
}

#[cfg(target_os = "windows")]
mod platform {
    use std::ffi::c_void;
    use std::time::Instant;

    use anyhow::{anyhow, bail, Context};
    use raw_window_handle::{HasWindowHandle, RawWindowHandle};
    use tracing::{debug, error, info, warn};
    use windows::Win32::Foundation::HWND;
    use winit::dpi::{PhysicalPosition, PhysicalSize};
    use winit::event::{Event, WindowEvent};
    use winit::event_loop::{ControlFlow, EventLoop};
    use winit::window::{Window, WindowBuilder};

    use framework_dx11::core::{Config, InputSystem, SceneConfig};
    use framework_dx11::gfx::d3d11::{D3D11Device, D3D11Factory, D3DCompiler};
    use framework_dx11::gfx::negotiate;
    use framework_dx11::renderer::{FrameOrchestrator, FrameTarget};

    fn window_hwnd(window: &Window) -> anyhow::Result<HWND> {
        let handle = window
            .window_handle()
            .map_err(|e| anyhow!("window handle unavailable: {}", e))?;
        match handle.as_raw() {
            RawWindowHandle::Win32(h) => Ok(HWND(h.hwnd.get() as *mut c_void)),
            _ => bail!("window is not a Win32 window"),
        }
    }

    fn window_centre(window: &Window) -> (f64, f64) {
        let size = window.inner_size();
        (size.width as f64 / 2.0, size.height as f64 / 2.0)
    }

    pub fn run(config: Config, scene: SceneConfig) -> anyhow::Result<()> {
        let event_loop = EventLoop::new().context("failed to create event loop")?;
        let window = WindowBuilder::new()
            .with_title(config.window.title.as_str())
            .with_inner_size(PhysicalSize::new(config.window.width, config.window.height))
            .with_resizable(config.window.resizable)
            .build(&event_loop)
            .context("failed to create window")?;
        let hwnd = window_hwnd(&window)?;
        let size = window.inner_size();

        let mut factory = D3D11Factory::new(config.graphics.debug_layer);
        let negotiated = negotiate(&mut factory).context("failed to create a Direct3D 11 device")?;
        for attempt in &negotiated.attempts {
            debug!(%attempt, "Device creation attempt");
        }
        let device = D3D11Device::new(negotiated, hwnd, (size.width, size.height), factory.debug_layer())
            .context("failed to create the swap chain")?;

        let orchestrator = match FrameOrchestrator::initialize(device, &config, &scene, &D3DCompiler::new()) {
            Ok(orchestrator) => orchestrator,
            Err((e, mut device)) => {
                let report = device.shutdown();
                debug!(?report, "Device released after failed initialization");
                return Err(anyhow::Error::new(e).context("failed to initialize the renderer"));
            }
        };

        let mut egui_state = egui_winit::State::new(
            orchestrator.overlay_context().clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
        );
        let mut input = InputSystem::new(&config.input);
        let mut orchestrator = Some(orchestrator);
        let mut cursor_hidden = false;
        let mut last_frame = Instant::now();
        let mut failure: Option<anyhow::Error> = None;

        info!("Entering main loop");
        event_loop.run(|event, elwt| {
            elwt.set_control_flow(ControlFlow::Poll);

            match event {
                Event::WindowEvent { event, .. } => match event {
                    WindowEvent::CloseRequested => {
                        info!("Close requested, shutting down");
                        elwt.exit();
                    }
                    WindowEvent::RedrawRequested => {
                        let Some(frame) = orchestrator.as_mut() else {
                            return;
                        };
                        let now = Instant::now();
                        let delta_time = now.duration_since(last_frame).as_secs_f32();
                        last_frame = now;

                        input.update_camera(frame.scene_mut().camera_mut());
                        let overlay_input = egui_state.take_egui_input(&window);
                        match frame.on_frame(delta_time, overlay_input) {
                            Ok(platform_output) => egui_state.handle_platform_output(&window, platform_output),
                            Err(e) => {
                                error!("Frame failed: {}", e);
                                failure = Some(anyhow::Error::new(e).context("frame failed"));
                                elwt.exit();
                            }
                        }
                    }
                    other => {
                        let response = egui_state.on_window_event(&window, &other);
                        input.handle_window_event(&other, response.consumed, window_centre(&window));

                        if input.take_recentre_request() {
                            let (x, y) = window_centre(&window);
                            if let Err(e) = window.set_cursor_position(PhysicalPosition::new(x, y)) {
                                warn!("Failed to re-centre cursor: {}", e);
                            }
                        }
                        if input.is_looking() != cursor_hidden {
                            cursor_hidden = input.is_looking();
                            window.set_cursor_visible(!cursor_hidden);
                        }
                        if input.quit_requested() {
                            info!("Quit requested");
                            elwt.exit();
                        }
                    }
                },
                Event::AboutToWait => window.request_redraw(),
                Event::LoopExiting => {
                    if let Some(frame) = orchestrator.take() {
                        let report = frame.shutdown();
                        info!(live_objects = report.total(), "Renderer shut down");
                    }
                }
                _ => {}
            }
        })?;

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(not(target_os = "windows"))]
mod platform {
    use framework_dx11::core::{Config, SceneConfig};

    pub fn run(_config: Config, _scene: SceneConfig) -> anyhow::Result<()> {
        anyhow::bail!("FrameworkDX11 renders with Direct3D 11 and only runs on Windows")
    }
}
