//! FrameworkDX11 - 一个小型 Direct3D 11 渲染框架
//!
//! 初始化图形设备和交换链，编译着色器，加载 glTF 场景，
//! 每帧渲染场景并在上面绘制 egui 调试叠加层。
//!
//! # 模块结构
//!
//! - `core`: 配置、日志、错误处理、场景描述、输入
//! - `math`: nalgebra 类型别名和矩阵工具
//! - `geometry`: 顶点格式、网格、节点层级、蒙皮、动画和 glTF 加载
//! - `component`: 相机、光源、变换
//! - `renderer`: 与图形 API 无关的渲染逻辑（Scene、FrameOrchestrator）
//! - `gfx`: 设备协商和 Direct3D 11 后端
//! - `gui`: 调试叠加层
//!
//! 除 `gfx::d3d11` 外的所有模块都可以在任何平台上编译和测试。

pub mod component;
pub mod core;
pub mod geometry;
pub mod gfx;
pub mod gui;
pub mod math;
pub mod renderer;
