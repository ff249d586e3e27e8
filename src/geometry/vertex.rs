/// 几何体顶点定义模块
///
/// 定义带蒙皮信息的顶点结构，以及与之一一对应的输入布局描述。

use bytemuck::{Pod, Zeroable};

/// 带蒙皮信息的顶点结构
///
/// PBR 与蒙皮两套着色器共享同一个顶点格式；PBR 着色器忽略骨骼字段。
/// 内存布局与 GPU 输入布局一致，使用 `#[repr(C)]` 保证顺序和对齐。
///
/// # 内存布局
///
/// - position: 12 bytes (3 * f32)
/// - normal: 12 bytes (3 * f32)
/// - tangent: 16 bytes (4 * f32，w 为副切线方向)
/// - texcoord: 8 bytes (2 * f32)
/// - bone_indices: 16 bytes (4 * u32)
/// - bone_weights: 16 bytes (4 * f32)
/// - **总计**: 80 bytes
#[repr(C)]
#[derive(Default, Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct SkinnedVertex {
    /// 顶点位置 (x, y, z)
    pub position: [f32; 3],

    /// 法线向量，应该是归一化的单位向量
    pub normal: [f32; 3],

    /// 切线向量 (tx, ty, tz, handedness)
    pub tangent: [f32; 4],

    /// 纹理坐标 (u, v)
    pub texcoord: [f32; 2],

    /// 影响该顶点的骨骼下标（最多 4 个）
    pub bone_indices: [u32; 4],

    /// 骨骼权重，和为 1；全为 0 表示不受蒙皮影响
    pub bone_weights: [f32; 4],
}

impl SkinnedVertex {
    /// 创建一个不带蒙皮信息的顶点
    #[inline]
    pub fn new(position: [f32; 3], normal: [f32; 3], texcoord: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            texcoord,
            tangent: [1.0, 0.0, 0.0, 1.0],
            ..Default::default()
        }
    }

    /// 附加骨骼下标和权重
    #[inline]
    pub fn with_bones(mut self, indices: [u32; 4], weights: [f32; 4]) -> Self {
        self.bone_indices = indices;
        self.bone_weights = weights;
        self
    }

    /// 是否受骨骼影响
    pub fn is_skinned(&self) -> bool {
        self.bone_weights.iter().any(|w| *w > 0.0)
    }
}

/// 顶点属性的数据格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeFormat {
    Float2,
    Float3,
    Float4,
    Uint4,
}

impl AttributeFormat {
    /// 该格式占用的字节数
    pub const fn size(&self) -> usize {
        match self {
            AttributeFormat::Float2 => 8,
            AttributeFormat::Float3 => 12,
            AttributeFormat::Float4 | AttributeFormat::Uint4 => 16,
        }
    }
}

/// 顶点属性语义
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Semantic {
    Position,
    Normal,
    Tangent,
    TexCoord,
    BlendIndices,
    BlendWeight,
}

impl Semantic {
    /// HLSL 语义名
    pub const fn name(&self) -> &'static str {
        match self {
            Semantic::Position => "POSITION",
            Semantic::Normal => "NORMAL",
            Semantic::Tangent => "TANGENT",
            Semantic::TexCoord => "TEXCOORD",
            Semantic::BlendIndices => "BLENDINDICES",
            Semantic::BlendWeight => "BLENDWEIGHT",
        }
    }
}

/// 一个顶点属性（语义下标恒为 0，偏移按顺序紧密排列）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub semantic: Semantic,
    pub format: AttributeFormat,
}

/// 着色器输入布局，顺序与 [`SkinnedVertex`] 字段一致
pub const VERTEX_ATTRIBUTES: [VertexAttribute; 6] = [
    VertexAttribute { semantic: Semantic::Position, format: AttributeFormat::Float3 },
    VertexAttribute { semantic: Semantic::Normal, format: AttributeFormat::Float3 },
    VertexAttribute { semantic: Semantic::Tangent, format: AttributeFormat::Float4 },
    VertexAttribute { semantic: Semantic::TexCoord, format: AttributeFormat::Float2 },
    VertexAttribute { semantic: Semantic::BlendIndices, format: AttributeFormat::Uint4 },
    VertexAttribute { semantic: Semantic::BlendWeight, format: AttributeFormat::Float4 },
];

/// 输入布局的总步长
pub const fn layout_stride(attributes: &[VertexAttribute]) -> usize {
    let mut total = 0;
    let mut i = 0;
    while i < attributes.len() {
        total += attributes[i].format.size();
        i += 1;
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{offset_of, size_of};

    #[test]
    fn test_vertex_size() {
        // 12 + 12 + 16 + 8 + 16 + 16 = 80 bytes
        assert_eq!(size_of::<SkinnedVertex>(), 80);
    }

    #[test]
    fn test_vertex_alignment() {
        assert_eq!(std::mem::align_of::<SkinnedVertex>(), 4);
    }

    #[test]
    fn test_input_layout_matches_vertex() {
        assert_eq!(layout_stride(&VERTEX_ATTRIBUTES), size_of::<SkinnedVertex>());

        // 按顺序累加的偏移必须与字段偏移一致
        let expected = [
            offset_of!(SkinnedVertex, position),
            offset_of!(SkinnedVertex, normal),
            offset_of!(SkinnedVertex, tangent),
            offset_of!(SkinnedVertex, texcoord),
            offset_of!(SkinnedVertex, bone_indices),
            offset_of!(SkinnedVertex, bone_weights),
        ];
        let mut offset = 0;
        for (attribute, field_offset) in VERTEX_ATTRIBUTES.iter().zip(expected) {
            assert_eq!(offset, field_offset, "{:?}", attribute.semantic);
            offset += attribute.format.size();
        }
    }

    #[test]
    fn test_vertex_creation() {
        let vertex = SkinnedVertex::new([1.0, 2.0, 3.0], [0.0, 1.0, 0.0], [0.5, 0.5]);

        assert_eq!(vertex.position, [1.0, 2.0, 3.0]);
        assert_eq!(vertex.tangent, [1.0, 0.0, 0.0, 1.0]);
        assert!(!vertex.is_skinned());

        let skinned = vertex.with_bones([2, 0, 0, 0], [1.0, 0.0, 0.0, 0.0]);
        assert!(skinned.is_skinned());
    }
}
