//! 渲染器模块
//!
//! 与图形 API 无关的渲染逻辑。所有 GPU 访问都经过 [`RenderContext`] /
//! [`FrameTarget`]，Windows 下由 `gfx::d3d11` 实现，测试中由
//! `testing::MockContext` 实现。
//!
//! # 组成
//!
//! - `shaders`：着色器编译（[`ShaderProgram`]、[`ShaderCompiler`]）
//! - `constant_buffer` / `layout`：常量缓冲区结构及其 HLSL 布局校验
//! - `scene_object`：一个 glTF 资源的 GPU 表示
//! - `scene`：场景（相机、光源、纹理、对象）
//! - `orchestrator`：每帧的执行顺序和关闭顺序

pub mod backend_trait;
pub mod constant_buffer;
pub mod layout;
pub mod orchestrator;
pub mod resource;
pub mod scene;
pub mod scene_object;
pub mod shaders;

#[cfg(test)]
pub mod testing;

pub use backend_trait::{FrameTarget, RenderContext};
pub use orchestrator::FrameOrchestrator;
pub use resource::LiveObjectReport;
pub use scene::Scene;
pub use scene_object::SceneObject;
pub use shaders::{ShaderCompiler, ShaderProgram};
