//! 渲染后端接口
//!
//! 与平台无关的渲染逻辑（Scene、SceneObject、FrameOrchestrator）只通过这里的
//! trait 访问 GPU。Windows 下由 D3D11 设备封装实现；测试中使用
//! `renderer::testing::MockContext`。
//!
//! - [`RenderContext`]：资源创建、更新、绑定和绘制，Scene 每帧使用
//! - [`FrameTarget`]：在此基础上增加帧级操作（清屏、着色器、叠加层、呈现、关闭）

use crate::core::error::Result;
use crate::gui::OverlayFrame;
use crate::renderer::resource::{
    BufferDescriptor, BufferHandle, LiveObjectReport, PixelShaderHandle, SamplerDescriptor,
    SamplerHandle, ShaderStage, TextureDescriptor, TextureHandle, VertexShaderHandle,
};
use crate::renderer::shaders::CompiledStage;

/// 资源与绘制接口
///
/// 所有创建类方法失败时返回 `GraphicsError::ResourceCreation`，
/// 传入已释放的句柄返回 `GraphicsError::InvalidHandle`。
pub trait RenderContext {
    /// 创建缓冲区，`initial_data` 为空时内容未定义
    fn create_buffer(&mut self, desc: &BufferDescriptor, initial_data: Option<&[u8]>) -> Result<BufferHandle>;

    /// 用 `data` 覆盖整个缓冲区
    fn update_buffer(&mut self, buffer: BufferHandle, data: &[u8]) -> Result<()>;

    /// 创建 RGBA8 纹理及其着色器资源视图
    fn create_texture(&mut self, desc: &TextureDescriptor, pixels: &[u8]) -> Result<TextureHandle>;

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> Result<SamplerHandle>;

    /// 绑定常量缓冲区到指定阶段的寄存器
    fn bind_constant_buffer(&mut self, stage: ShaderStage, slot: u32, buffer: BufferHandle) -> Result<()>;

    /// 绑定像素着色器纹理槽位，`None` 表示解绑
    fn bind_texture(&mut self, slot: u32, texture: Option<TextureHandle>) -> Result<()>;

    fn bind_sampler(&mut self, slot: u32, sampler: SamplerHandle) -> Result<()>;

    fn set_pixel_shader(&mut self, shader: PixelShaderHandle) -> Result<()>;

    /// 以三角形列表绘制 32 位索引的网格
    fn draw_indexed(
        &mut self,
        vertex_buffer: BufferHandle,
        stride: u32,
        index_buffer: BufferHandle,
        index_count: u32,
    ) -> Result<()>;

    fn release_buffer(&mut self, buffer: BufferHandle);

    fn release_texture(&mut self, texture: TextureHandle);

    fn release_sampler(&mut self, sampler: SamplerHandle);
}

/// 帧级接口：拥有交换链和默认渲染目标的设备
pub trait FrameTarget: RenderContext {
    /// 后台缓冲区尺寸
    fn size(&self) -> (u32, u32);

    /// 协商得到的特性级别（用于显示）
    fn feature_level_name(&self) -> String;

    /// 清除渲染目标和深度缓冲
    fn clear(&mut self, color: [f32; 4], depth: f32);

    /// 创建顶点着色器以及与 `SkinnedVertex` 对应的输入布局
    fn create_vertex_shader(&mut self, stage: &CompiledStage) -> Result<VertexShaderHandle>;

    fn create_pixel_shader(&mut self, stage: &CompiledStage) -> Result<PixelShaderHandle>;

    /// 绑定顶点着色器和它的输入布局
    fn set_vertex_shader(&mut self, shader: VertexShaderHandle) -> Result<()>;

    fn release_vertex_shader(&mut self, shader: VertexShaderHandle);

    fn release_pixel_shader(&mut self, shader: PixelShaderHandle);

    /// 在当前渲染目标上绘制调试叠加层
    fn paint_overlay(&mut self, frame: &OverlayFrame) -> Result<()>;

    /// 呈现（同步间隔 0）
    fn present(&mut self) -> Result<()>;

    /// 按依赖逆序释放设备：解绑渲染目标、清空状态、刷新上下文、释放设备
    ///
    /// 返回释放前仍被跟踪的资源数量。调用后设备不可再使用。
    fn shutdown(&mut self) -> LiveObjectReport;
}
