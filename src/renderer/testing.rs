//! 测试用的模拟设备和编译器
//!
//! MockContext 实现 [`RenderContext`] 和 [`FrameTarget`]，在资源表中跟踪所有创建的
//! 资源并记录每一次调用，用来检查帧顺序和资源释放。MockCompiler 只检查入口点
//! 是否出现在源码中。

use std::collections::HashMap;

use crate::core::error::{GraphicsError, Result};
use crate::gui::OverlayFrame;
use crate::renderer::backend_trait::{FrameTarget, RenderContext};
use crate::renderer::resource::{
    invalid_handle, BufferDescriptor, BufferHandle, LiveObjectReport, PixelShaderHandle,
    ResourceSlab, SamplerDescriptor, SamplerHandle, ShaderStage, TextureDescriptor, TextureHandle,
    VertexShaderHandle,
};
use crate::renderer::shaders::{CompiledStage, ShaderCompiler};

/// 记录的调用
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Clear([f32; 4]),
    SetVertexShader(VertexShaderHandle),
    SetPixelShader(PixelShaderHandle),
    BindConstantBuffer(ShaderStage, u32, BufferHandle),
    BindTexture(u32, Option<TextureHandle>),
    BindSampler(u32, SamplerHandle),
    UpdateBuffer(BufferHandle),
    Draw(u32),
    PaintOverlay,
    Present,
}

#[derive(Debug)]
struct MockBuffer {
    name: Option<String>,
    data: Vec<u8>,
}

/// 记录型模拟设备
#[derive(Debug)]
pub struct MockContext {
    width: u32,
    height: u32,
    buffers: ResourceSlab<MockBuffer>,
    textures: ResourceSlab<(u32, u32)>,
    samplers: ResourceSlab<()>,
    vertex_shaders: ResourceSlab<String>,
    pixel_shaders: ResourceSlab<String>,
    pub calls: Vec<Call>,
    /// 设置后，第 N 次资源创建失败（从 0 开始）
    pub fail_creation_at: Option<usize>,
    creations: usize,
    shut_down: bool,
}

impl MockContext {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            buffers: ResourceSlab::new(),
            textures: ResourceSlab::new(),
            samplers: ResourceSlab::new(),
            vertex_shaders: ResourceSlab::new(),
            pixel_shaders: ResourceSlab::new(),
            calls: Vec::new(),
            fail_creation_at: None,
            creations: 0,
            shut_down: false,
        }
    }

    fn creation(&mut self, what: &str) -> Result<()> {
        let index = self.creations;
        self.creations += 1;
        if self.fail_creation_at == Some(index) {
            return Err(GraphicsError::ResourceCreation(format!("mock failure creating {}", what)).into());
        }
        Ok(())
    }

    /// 当前存活资源统计
    pub fn live(&self) -> LiveObjectReport {
        LiveObjectReport {
            buffers: self.buffers.live_count(),
            textures: self.textures.live_count(),
            samplers: self.samplers.live_count(),
            shaders: self.vertex_shaders.live_count() + self.pixel_shaders.live_count(),
        }
    }

    /// 缓冲区的最新内容
    pub fn buffer_data(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(buffer.0).map(|b| b.data.as_slice())
    }

    /// 按调试名称查找缓冲区
    pub fn find_buffer(&self, name: &str) -> Option<BufferHandle> {
        self.buffers
            .iter()
            .find(|(_, b)| b.name.as_deref() == Some(name))
            .map(|(i, _)| BufferHandle(i))
    }

    pub fn pixel_shader_entry(&self, shader: PixelShaderHandle) -> Option<&str> {
        self.pixel_shaders.get(shader.0).map(String::as_str)
    }

    /// 记录的绘制次数
    pub fn draw_count(&self) -> usize {
        self.calls.iter().filter(|c| matches!(c, Call::Draw(_))).count()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }
}

impl RenderContext for MockContext {
    fn create_buffer(&mut self, desc: &BufferDescriptor, initial_data: Option<&[u8]>) -> Result<BufferHandle> {
        self.creation("buffer")?;
        let size = desc.aligned_size() as usize;
        let mut data = vec![0u8; size];
        if let Some(initial) = initial_data {
            let n = initial.len().min(size);
            data[..n].copy_from_slice(&initial[..n]);
        }
        let index = self.buffers.insert(MockBuffer {
            name: desc.name.clone(),
            data,
        });
        Ok(BufferHandle(index))
    }

    fn update_buffer(&mut self, buffer: BufferHandle, data: &[u8]) -> Result<()> {
        let slot = self
            .buffers
            .get_mut(buffer.0)
            .ok_or_else(|| invalid_handle("buffer", buffer.0))?;
        if data.len() > slot.data.len() {
            return Err(GraphicsError::CommandExecution(format!(
                "update of {} bytes exceeds buffer size {}",
                data.len(),
                slot.data.len()
            ))
            .into());
        }
        slot.data[..data.len()].copy_from_slice(data);
        self.calls.push(Call::UpdateBuffer(buffer));
        Ok(())
    }

    fn create_texture(&mut self, desc: &TextureDescriptor, pixels: &[u8]) -> Result<TextureHandle> {
        desc.validate(pixels)?;
        self.creation("texture")?;
        Ok(TextureHandle(self.textures.insert((desc.width, desc.height))))
    }

    fn create_sampler(&mut self, _desc: &SamplerDescriptor) -> Result<SamplerHandle> {
        self.creation("sampler")?;
        Ok(SamplerHandle(self.samplers.insert(())))
    }

    fn bind_constant_buffer(&mut self, stage: ShaderStage, slot: u32, buffer: BufferHandle) -> Result<()> {
        self.buffers.get(buffer.0).ok_or_else(|| invalid_handle("buffer", buffer.0))?;
        self.calls.push(Call::BindConstantBuffer(stage, slot, buffer));
        Ok(())
    }

    fn bind_texture(&mut self, slot: u32, texture: Option<TextureHandle>) -> Result<()> {
        if let Some(t) = texture {
            self.textures.get(t.0).ok_or_else(|| invalid_handle("texture", t.0))?;
        }
        self.calls.push(Call::BindTexture(slot, texture));
        Ok(())
    }

    fn bind_sampler(&mut self, slot: u32, sampler: SamplerHandle) -> Result<()> {
        self.samplers.get(sampler.0).ok_or_else(|| invalid_handle("sampler", sampler.0))?;
        self.calls.push(Call::BindSampler(slot, sampler));
        Ok(())
    }

    fn set_pixel_shader(&mut self, shader: PixelShaderHandle) -> Result<()> {
        self.pixel_shaders.get(shader.0).ok_or_else(|| invalid_handle("pixel shader", shader.0))?;
        self.calls.push(Call::SetPixelShader(shader));
        Ok(())
    }

    fn draw_indexed(
        &mut self,
        vertex_buffer: BufferHandle,
        _stride: u32,
        index_buffer: BufferHandle,
        index_count: u32,
    ) -> Result<()> {
        self.buffers.get(vertex_buffer.0).ok_or_else(|| invalid_handle("buffer", vertex_buffer.0))?;
        self.buffers.get(index_buffer.0).ok_or_else(|| invalid_handle("buffer", index_buffer.0))?;
        self.calls.push(Call::Draw(index_count));
        Ok(())
    }

    fn release_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(buffer.0);
    }

    fn release_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(texture.0);
    }

    fn release_sampler(&mut self, sampler: SamplerHandle) {
        self.samplers.remove(sampler.0);
    }
}

impl FrameTarget for MockContext {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn feature_level_name(&self) -> String {
        "mock".to_string()
    }

    fn clear(&mut self, color: [f32; 4], _depth: f32) {
        self.calls.push(Call::Clear(color));
    }

    fn create_vertex_shader(&mut self, stage: &CompiledStage) -> Result<VertexShaderHandle> {
        self.creation("vertex shader")?;
        Ok(VertexShaderHandle(self.vertex_shaders.insert(stage.entry_point.clone())))
    }

    fn create_pixel_shader(&mut self, stage: &CompiledStage) -> Result<PixelShaderHandle> {
        self.creation("pixel shader")?;
        Ok(PixelShaderHandle(self.pixel_shaders.insert(stage.entry_point.clone())))
    }

    fn set_vertex_shader(&mut self, shader: VertexShaderHandle) -> Result<()> {
        self.vertex_shaders.get(shader.0).ok_or_else(|| invalid_handle("vertex shader", shader.0))?;
        self.calls.push(Call::SetVertexShader(shader));
        Ok(())
    }

    fn release_vertex_shader(&mut self, shader: VertexShaderHandle) {
        self.vertex_shaders.remove(shader.0);
    }

    fn release_pixel_shader(&mut self, shader: PixelShaderHandle) {
        self.pixel_shaders.remove(shader.0);
    }

    fn paint_overlay(&mut self, _frame: &OverlayFrame) -> Result<()> {
        self.calls.push(Call::PaintOverlay);
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        self.calls.push(Call::Present);
        Ok(())
    }

    fn shutdown(&mut self) -> LiveObjectReport {
        let report = self.live();
        self.shut_down = true;
        report
    }
}

/// 模拟编译器
///
/// 入口点必须以 `名称(` 的形式出现在源码中，字节码为入口点名称的字节。
#[derive(Debug, Default)]
pub struct MockCompiler {
    /// 成功但返回空字节码
    pub empty_output: bool,
    /// 失败但不给出诊断
    pub silent_failure: bool,
    /// 按入口点覆盖的诊断（模拟语法错误）
    pub failures: HashMap<String, String>,
}

impl ShaderCompiler for MockCompiler {
    fn compile_source(
        &self,
        source: &str,
        source_name: &str,
        entry_point: &str,
        profile: &str,
    ) -> std::result::Result<Vec<u8>, String> {
        if self.silent_failure {
            return Err(String::new());
        }
        if let Some(diagnostics) = self.failures.get(entry_point) {
            return Err(diagnostics.clone());
        }
        if !source.contains(&format!("{}(", entry_point)) {
            return Err(format!(
                "{}: error X3501: '{}': entrypoint not found ({})",
                source_name, entry_point, profile
            ));
        }
        if self.empty_output {
            return Ok(Vec::new());
        }
        Ok(entry_point.as_bytes().to_vec())
    }
}

/// 测试场景：一个三角形 glTF 文件和 2x2 的纹理
pub mod fixtures {
    use std::path::{Path, PathBuf};

    use crate::core::scene::{SceneConfig, SceneObjectConfig, TextureSetConfig};

    /// 挂在子节点上的三角形，根节点带 1 秒平移动画
    pub const TRIANGLE_GLTF: &str = r#"{
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [ { "nodes": [0] } ],
        "nodes": [
            { "name": "root", "children": [1] },
            { "name": "body", "mesh": 0, "translation": [0.0, 1.0, 0.0] }
        ],
        "meshes": [ { "name": "tri", "primitives": [ { "attributes": { "POSITION": 0 } } ] } ],
        "animations": [ {
            "name": "slide",
            "channels": [ { "sampler": 0, "target": { "node": 0, "path": "translation" } } ],
            "samplers": [ { "input": 1, "output": 2, "interpolation": "LINEAR" } ]
        } ],
        "buffers": [ {
            "byteLength": 68,
            "uri": "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAAAAAAAAAAgD8AAAAAAAAAAAAAAAAAAIA/AAAAAAAAAAA="
        } ],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
            { "buffer": 0, "byteOffset": 36, "byteLength": 8 },
            { "buffer": 0, "byteOffset": 44, "byteLength": 24 }
        ],
        "accessors": [
            { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
              "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] },
            { "bufferView": 1, "componentType": 5126, "count": 2, "type": "SCALAR",
              "min": [0.0], "max": [1.0] },
            { "bufferView": 2, "componentType": 5126, "count": 2, "type": "VEC3" }
        ]
    }"#;

    pub fn write_gltf(dir: &Path) -> PathBuf {
        let path = dir.join("triangle.gltf");
        std::fs::write(&path, TRIANGLE_GLTF).expect("write glTF fixture");
        path
    }

    pub fn write_texture(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        image::RgbaImage::from_pixel(2, 2, image::Rgba([255, 128, 0, 255]))
            .save(&path)
            .expect("write texture fixture");
        path
    }

    /// 两个对象：带动画的纹理三角形和公转的纯色三角形，灯光跟随后者
    pub fn scene_config(dir: &Path) -> SceneConfig {
        let gltf = write_gltf(dir);
        let diffuse = write_texture(dir, "diffuse.png");
        let roughness = write_texture(dir, "rough.png");

        let mut config = SceneConfig {
            textures: TextureSetConfig {
                diffuse: diffuse.clone(),
                normal: None,
                metallic: diffuse,
                roughness,
            },
            objects: vec![
                SceneObjectConfig {
                    name: "textured".into(),
                    path: gltf.clone(),
                    ..Default::default()
                },
                SceneObjectConfig {
                    name: "moon".into(),
                    path: gltf,
                    material: crate::core::scene::MaterialConfig::Solid {
                        color: [1.0, 0.0, 0.0, 1.0],
                    },
                    orbit: Some(crate::core::scene::OrbitConfig {
                        center: [0.0, 0.0, 0.0],
                        radius: 2.0,
                        speed: 90.0,
                    }),
                    animation: None,
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        config.light.attach_to = Some("moon".into());
        config
    }
}
