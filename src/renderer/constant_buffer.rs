//! 常量缓冲区结构
//!
//! 每个结构都与着色器中的一个 cbuffer 逐字节对应（字段顺序、填充、16 字节对齐）。
//! 对应关系由 [`super::layout`] 中声明的 HLSL 布局在初始化时校验。
//!
//! | 结构 | 着色器 | 寄存器 |
//! |------|--------|--------|
//! | [`PerDrawConstants`] | `cbuffer ConstantBuffer` | VS/PS b0 |
//! | `LightProperties` | `cbuffer LightProperties` | PS b1 |
//! | [`MaterialConstants`] | `cbuffer MaterialProperties` | PS b2 |
//! | [`BoneConstants`] | `cbuffer BoneTransforms` | VS b3 |

use bytemuck::{Pod, Zeroable};

use crate::math::{matrix, GpuMatrix, Matrix4};

/// 每次绘制的常量（224 字节）
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PerDrawConstants {
    pub world: GpuMatrix,
    pub view: GpuMatrix,
    pub projection: GpuMatrix,
    pub output_color: [f32; 4],
    /// 纹理选择器（0..=3），像素着色器据此切换调试视图
    pub texture_select: f32,
    _padding: [f32; 3],
}

impl Default for PerDrawConstants {
    fn default() -> Self {
        let identity = matrix::to_gpu(&Matrix4::identity());
        Self {
            world: identity,
            view: identity,
            projection: identity,
            output_color: [1.0, 1.0, 1.0, 1.0],
            texture_select: 0.0,
            _padding: [0.0; 3],
        }
    }
}

impl PerDrawConstants {
    /// 单位矩阵 + 指定输出颜色与纹理选择器
    pub fn new(output_color: [f32; 4], texture_select: u32) -> Self {
        Self {
            output_color,
            texture_select: texture_select as f32,
            ..Self::default()
        }
    }

    pub fn set_world(&mut self, world: &Matrix4) {
        self.world = matrix::to_gpu(world);
    }

    pub fn set_view_projection(&mut self, view: &Matrix4, projection: &Matrix4) {
        self.view = matrix::to_gpu(view);
        self.projection = matrix::to_gpu(projection);
    }
}

/// 材质常量（32 字节）
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MaterialConstants {
    pub base_color: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
    _padding: [f32; 2],
}

impl MaterialConstants {
    pub fn new(base_color: [f32; 4], metallic: f32, roughness: f32) -> Self {
        Self {
            base_color,
            metallic,
            roughness,
            _padding: [0.0; 2],
        }
    }
}

impl Default for MaterialConstants {
    fn default() -> Self {
        Self::new([1.0, 1.0, 1.0, 1.0], 1.0, 1.0)
    }
}

/// 骨骼矩阵数组的容量
pub const MAX_BONES: usize = 64;

/// 骨骼矩阵（64 x 64 字节）
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct BoneConstants {
    pub bones: [GpuMatrix; MAX_BONES],
}

impl Default for BoneConstants {
    fn default() -> Self {
        Self {
            bones: [matrix::to_gpu(&Matrix4::identity()); MAX_BONES],
        }
    }
}

impl BoneConstants {
    /// 由骨骼调色板填充，超出容量的骨骼被忽略，剩余槽位为单位矩阵
    pub fn from_palette(palette: &[Matrix4]) -> Self {
        let mut constants = Self::default();
        for (slot, bone) in constants.bones.iter_mut().zip(palette) {
            *slot = matrix::to_gpu(bone);
        }
        constants
    }
}
