//! 场景对象
//!
//! 一个 SceneObject 对应一个 glTF 文件：持有节点层级、上传到 GPU 的图元、
//! 蒙皮和动画状态，以及整个对象的根变换。
//!
//! 每帧的调用顺序：
//!
//! 1. [`SceneObject::animate_frame`]：推进动画、计算世界矩阵、上传骨骼矩阵
//! 2. [`SceneObject::render_frame`]：为每个图元写入世界矩阵并绘制

use std::path::Path;

use tracing::{debug, error, info, warn};

use crate::core::error::Result;
use crate::geometry::animation::{AnimationClip, AnimationPlayer};
use crate::geometry::hierarchy::NodeHierarchy;
use crate::geometry::loaders::load_asset;
use crate::geometry::skin::Skin;
use crate::geometry::vertex::SkinnedVertex;
use crate::math::Matrix4;
use crate::renderer::backend_trait::RenderContext;
use crate::renderer::constant_buffer::{BoneConstants, PerDrawConstants, MAX_BONES};
use crate::renderer::resource::{BufferDescriptor, BufferHandle, BufferUsageType, ShaderStage};

/// 骨骼矩阵使用的顶点着色器寄存器
pub const BONE_SLOT: u32 = 3;
/// 每次绘制的常量缓冲区寄存器
pub const PER_DRAW_SLOT: u32 = 0;

/// 上传到 GPU 的图元
#[derive(Debug, Clone, Copy)]
struct GpuPrimitive {
    vertex_buffer: BufferHandle,
    index_buffer: BufferHandle,
    index_count: u32,
    skinned: bool,
}

/// 一个 skin 在 GPU 上的骨骼矩阵
#[derive(Debug, Clone)]
struct GpuSkin {
    skin: Skin,
    buffer: BufferHandle,
    /// 使用该 skin 的网格节点（骨骼矩阵相对于它计算）
    mesh_node: Option<usize>,
}

/// Scene 每帧共享给所有对象的绘制状态
#[derive(Debug, Clone)]
pub struct DrawState {
    /// 每次绘制的常量缓冲区
    pub per_draw_buffer: BufferHandle,
    /// 本帧已经填好的 view / projection / 颜色 / 纹理选择器
    pub constants: PerDrawConstants,
}

/// glTF 场景对象
#[derive(Debug)]
pub struct SceneObject {
    name: String,
    hierarchy: NodeHierarchy,
    primitives: Vec<GpuPrimitive>,
    skins: Vec<GpuSkin>,
    animations: Vec<AnimationClip>,
    player: AnimationPlayer,
    root_transform: Matrix4,
    palette: Vec<Matrix4>,
}

impl SceneObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hierarchy: NodeHierarchy::default(),
            primitives: Vec::new(),
            skins: Vec::new(),
            animations: Vec::new(),
            player: AnimationPlayer::default(),
            root_transform: Matrix4::identity(),
            palette: vec![Matrix4::identity(); MAX_BONES],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 加载 glTF 文件并创建 GPU 资源
    ///
    /// # 返回值
    ///
    /// - `Ok(true)`：加载成功
    /// - `Ok(false)`：文件缺失或解析失败（已记录日志）
    /// - `Err(..)`：GPU 资源创建失败
    pub fn load(&mut self, ctx: &mut dyn RenderContext, path: &Path) -> Result<bool> {
        let asset = match load_asset(path) {
            Ok(asset) => asset,
            Err(e) => {
                error!(object = %self.name, path = %path.display(), "Failed to load scene object: {}", e);
                return Ok(false);
            }
        };

        self.release(ctx);

        for (i, mesh) in asset.primitives.iter().enumerate() {
            let vertex_bytes: &[u8] = bytemuck::cast_slice(&mesh.vertices);
            let index_bytes: &[u8] = bytemuck::cast_slice(&mesh.indices);
            let label = mesh.name.clone().unwrap_or_else(|| format!("{}#{}", self.name, i));

            let vertex_buffer = ctx.create_buffer(
                &BufferDescriptor::new(vertex_bytes.len() as u64, BufferUsageType::Vertex)
                    .with_name(format!("{} vertices", label)),
                Some(vertex_bytes),
            )?;
            let index_buffer = match ctx.create_buffer(
                &BufferDescriptor::new(index_bytes.len() as u64, BufferUsageType::Index)
                    .with_name(format!("{} indices", label)),
                Some(index_bytes),
            ) {
                Ok(buffer) => buffer,
                Err(e) => {
                    ctx.release_buffer(vertex_buffer);
                    return Err(e);
                }
            };

            self.primitives.push(GpuPrimitive {
                vertex_buffer,
                index_buffer,
                index_count: mesh.indices.len() as u32,
                skinned: mesh.is_skinned(),
            });
        }

        for skin in asset.skins {
            if skin.joint_count() > MAX_BONES {
                warn!(
                    object = %self.name,
                    skin = %skin.name,
                    joints = skin.joint_count(),
                    "Skin has more joints than the shader supports; extra joints ignored"
                );
            }
            let buffer = ctx.create_buffer(
                &BufferDescriptor::constant::<BoneConstants>().with_name(format!("{} bones", skin.name)),
                Some(bytemuck::bytes_of(&BoneConstants::default())),
            )?;
            self.skins.push(GpuSkin {
                skin,
                buffer,
                mesh_node: None,
            });
        }

        self.hierarchy = asset.hierarchy;
        for (index, node) in self.hierarchy.nodes().iter().enumerate() {
            if let Some(gpu_skin) = node.skin.and_then(|s| self.skins.get_mut(s)) {
                gpu_skin.mesh_node.get_or_insert(index);
            }
        }

        self.animations = asset.animations;
        self.player = AnimationPlayer::new(if self.animations.is_empty() { None } else { Some(0) });
        self.hierarchy.update_world_transforms(&self.root_transform);

        info!(
            object = %self.name,
            path = %path.display(),
            nodes = self.hierarchy.len(),
            primitives = self.primitives.len(),
            skins = self.skins.len(),
            animations = self.animations.len(),
            "Scene object loaded"
        );
        Ok(true)
    }

    /// 选择播放的动画片段，`None` 停止播放
    pub fn set_animation(&mut self, clip: Option<usize>) {
        let clip = clip.filter(|&i| i < self.animations.len());
        self.player = AnimationPlayer::new(clip);
    }

    pub fn animation_count(&self) -> usize {
        self.animations.len()
    }

    pub fn hierarchy(&self) -> &NodeHierarchy {
        &self.hierarchy
    }

    pub fn root_transform(&self) -> &Matrix4 {
        &self.root_transform
    }

    /// 替换整个对象的根变换
    pub fn set_root_transform(&mut self, transform: Matrix4) {
        self.root_transform = transform;
        self.hierarchy.update_world_transforms(&self.root_transform);
    }

    /// 所有顶层节点的局部缩放乘以 `factor`
    pub fn add_scale_to_roots(&mut self, factor: f32) {
        self.hierarchy.scale_roots(factor);
        self.hierarchy.update_world_transforms(&self.root_transform);
    }

    /// 图元的三角形总数
    pub fn triangle_count(&self) -> usize {
        self.primitives.iter().map(|p| p.index_count as usize / 3).sum()
    }

    /// 推进动画并上传骨骼矩阵
    pub fn animate_frame(&mut self, ctx: &mut dyn RenderContext, delta_time: f32) -> Result<()> {
        self.player.advance(delta_time, &self.animations, &mut self.hierarchy);
        self.hierarchy.update_world_transforms(&self.root_transform);

        for gpu_skin in &self.skins {
            let Some(mesh_node) = gpu_skin.mesh_node else {
                continue;
            };
            let written = gpu_skin
                .skin
                .compute_palette(&self.hierarchy, mesh_node, &mut self.palette);
            let bones = BoneConstants::from_palette(&self.palette[..written]);
            ctx.update_buffer(gpu_skin.buffer, bytemuck::bytes_of(&bones))?;
        }
        Ok(())
    }

    /// 每个图元一次绘制
    ///
    /// 世界矩阵为根变换乘以节点链上的局部变换。蒙皮图元在绘制前绑定其 skin 的骨骼矩阵。
    pub fn render_frame(&self, ctx: &mut dyn RenderContext, state: &mut DrawState) -> Result<()> {
        let stride = std::mem::size_of::<SkinnedVertex>() as u32;

        for (index, node) in self.hierarchy.nodes().iter().enumerate() {
            if node.primitives.is_empty() {
                continue;
            }

            state.constants.set_world(&self.hierarchy.world_transform(index));
            ctx.update_buffer(state.per_draw_buffer, bytemuck::bytes_of(&state.constants))?;
            ctx.bind_constant_buffer(ShaderStage::Vertex, PER_DRAW_SLOT, state.per_draw_buffer)?;
            ctx.bind_constant_buffer(ShaderStage::Pixel, PER_DRAW_SLOT, state.per_draw_buffer)?;

            let skin_buffer = node.skin.and_then(|s| self.skins.get(s)).map(|s| s.buffer);

            for &primitive_index in &node.primitives {
                let Some(primitive) = self.primitives.get(primitive_index) else {
                    continue;
                };
                if primitive.skinned {
                    if let Some(buffer) = skin_buffer {
                        ctx.bind_constant_buffer(ShaderStage::Vertex, BONE_SLOT, buffer)?;
                    }
                }
                ctx.draw_indexed(
                    primitive.vertex_buffer,
                    stride,
                    primitive.index_buffer,
                    primitive.index_count,
                )?;
            }
        }
        Ok(())
    }

    /// 释放所有 GPU 资源
    pub fn release(&mut self, ctx: &mut dyn RenderContext) {
        let released = self.primitives.len() * 2 + self.skins.len();
        for primitive in self.primitives.drain(..) {
            ctx.release_buffer(primitive.vertex_buffer);
            ctx.release_buffer(primitive.index_buffer);
        }
        for gpu_skin in self.skins.drain(..) {
            ctx.release_buffer(gpu_skin.buffer);
        }
        if released > 0 {
            debug!(object = %self.name, buffers = released, "Scene object released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{Vector3, Vector4};
    use crate::renderer::testing::{fixtures, Call, MockContext};

    fn loaded(ctx: &mut MockContext) -> (SceneObject, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::write_gltf(dir.path());
        let mut object = SceneObject::new("triangle");
        assert!(object.load(ctx, &path).unwrap());
        (object, dir)
    }

    fn draw_state(ctx: &mut MockContext) -> DrawState {
        let per_draw_buffer = ctx
            .create_buffer(&BufferDescriptor::constant::<PerDrawConstants>(), None)
            .unwrap();
        DrawState {
            per_draw_buffer,
            constants: PerDrawConstants::default(),
        }
    }

    #[test]
    fn test_load_creates_buffers() {
        let mut ctx = MockContext::new(800, 600);
        let (object, _dir) = loaded(&mut ctx);

        assert_eq!(object.triangle_count(), 1);
        assert_eq!(object.animation_count(), 1);
        assert_eq!(ctx.live().buffers, 2);
    }

    #[test]
    fn test_missing_file_returns_false() {
        let mut ctx = MockContext::new(800, 600);
        let mut object = SceneObject::new("ghost");
        assert!(!object.load(&mut ctx, Path::new("missing/ghost.gltf")).unwrap());
        assert_eq!(ctx.live().buffers, 0);
    }

    #[test]
    fn test_malformed_file_returns_false() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.gltf");
        std::fs::write(&path, "{ \"asset\": ").unwrap();

        let mut ctx = MockContext::new(800, 600);
        let mut object = SceneObject::new("broken");
        assert!(!object.load(&mut ctx, &path).unwrap());
    }

    #[test]
    fn test_gpu_failure_is_error() {
        let mut ctx = MockContext::new(800, 600);
        // 第二次创建（索引缓冲区）失败
        ctx.fail_creation_at = Some(1);
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::write_gltf(dir.path());

        let mut object = SceneObject::new("triangle");
        assert!(object.load(&mut ctx, &path).is_err());
        assert_eq!(ctx.live().buffers, 0);
    }

    #[test]
    fn test_render_uses_root_and_node_transforms() {
        let mut ctx = MockContext::new(800, 600);
        let (mut object, _dir) = loaded(&mut ctx);
        let mut state = draw_state(&mut ctx);

        object.set_root_transform(Matrix4::new_translation(&Vector3::new(10.0, 0.0, 0.0)));
        object.render_frame(&mut ctx, &mut state).unwrap();

        assert_eq!(ctx.draw_count(), 1);
        assert!(ctx.calls.contains(&Call::Draw(3)));

        // body 节点在根变换之上再平移 (0, 1, 0)
        let body = object.hierarchy().find("body").unwrap();
        let p = object.hierarchy().world_transform(body) * Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert!((p.x - 10.0).abs() < 1e-6);
        assert!((p.y - 1.0).abs() < 1e-6);
        assert_eq!(state.constants.world[0][3], 10.0);
    }

    #[test]
    fn test_animation_moves_root_node() {
        let mut ctx = MockContext::new(800, 600);
        let (mut object, _dir) = loaded(&mut ctx);

        object.animate_frame(&mut ctx, 0.5).unwrap();
        let root = object.hierarchy().find("root").unwrap();
        let p = object.hierarchy().world_transform(root) * Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert!((p.x - 0.5).abs() < 1e-5);

        object.set_animation(None);
        object.animate_frame(&mut ctx, 0.25).unwrap();
        let p = object.hierarchy().world_transform(root) * Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert!((p.x - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_add_scale_to_roots() {
        let mut ctx = MockContext::new(800, 600);
        let (mut object, _dir) = loaded(&mut ctx);

        object.add_scale_to_roots(2.0);
        let body = object.hierarchy().find("body").unwrap();
        let p = object.hierarchy().world_transform(body) * Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert!((p.y - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_release_frees_everything() {
        let mut ctx = MockContext::new(800, 600);
        let (mut object, _dir) = loaded(&mut ctx);
        object.release(&mut ctx);
        assert!(ctx.live().is_clean());
        assert_eq!(object.triangle_count(), 0);
    }
}
