//! HLSL 常量缓冲区打包计算
//!
//! HLSL 把 cbuffer 按 16 字节寄存器打包：
//!
//! - 标量和向量不能跨越寄存器边界，放不下时移到下一个寄存器
//! - 数组的每个元素、结构体、矩阵总是从新的寄存器开始
//! - 数组最后一个元素之后不补齐，cbuffer 的总大小向上取整到 16 字节
//!
//! 这里声明了着色器中每个 cbuffer 的字段列表，并按上述规则计算偏移和大小，
//! 用来校验 CPU 侧结构（[`verify`]）。

use crate::core::error::GraphicsError;

const REGISTER: usize = 16;

fn align_register(offset: usize) -> usize {
    (offset + REGISTER - 1) / REGISTER * REGISTER
}

/// HLSL 类型
#[derive(Debug, Clone, PartialEq)]
pub enum HlslType {
    Float,
    Int,
    Uint,
    /// cbuffer 中的 `bool` 占 4 字节
    Bool,
    Float2,
    Float3,
    Float4,
    Int2,
    Uint4,
    Float4x4,
    Array(Box<HlslType>, usize),
    Struct(Vec<HlslField>),
}

impl HlslType {
    pub fn array(element: HlslType, count: usize) -> Self {
        HlslType::Array(Box::new(element), count)
    }

    /// 是否必须从新寄存器开始
    fn starts_register(&self) -> bool {
        matches!(self, HlslType::Float4x4 | HlslType::Array(..) | HlslType::Struct(_))
    }

    /// 打包后占用的字节数（不含末尾补齐）
    pub fn packed_size(&self) -> usize {
        match self {
            HlslType::Float | HlslType::Int | HlslType::Uint | HlslType::Bool => 4,
            HlslType::Float2 | HlslType::Int2 => 8,
            HlslType::Float3 => 12,
            HlslType::Float4 | HlslType::Uint4 => 16,
            HlslType::Float4x4 => 64,
            HlslType::Array(_, 0) => 0,
            HlslType::Array(element, count) => {
                let element_size = element.packed_size();
                align_register(element_size) * (count - 1) + element_size
            }
            HlslType::Struct(fields) => pack(fields).1,
        }
    }
}

/// 结构体或 cbuffer 中的一个字段
#[derive(Debug, Clone, PartialEq)]
pub struct HlslField {
    pub name: &'static str,
    pub ty: HlslType,
}

impl HlslField {
    pub fn new(name: &'static str, ty: HlslType) -> Self {
        Self { name, ty }
    }
}

/// 返回每个字段的偏移和结束位置
fn pack(fields: &[HlslField]) -> (Vec<usize>, usize) {
    let mut offsets = Vec::with_capacity(fields.len());
    let mut offset = 0;
    for field in fields {
        let size = field.ty.packed_size();
        let crosses = offset % REGISTER + size > REGISTER;
        if field.ty.starts_register() || crosses {
            offset = align_register(offset);
        }
        offsets.push(offset);
        offset += size;
    }
    (offsets, offset)
}

/// 一个 cbuffer 的声明
#[derive(Debug, Clone, PartialEq)]
pub struct CbufferLayout {
    pub name: &'static str,
    pub fields: Vec<HlslField>,
}

impl CbufferLayout {
    pub fn new(name: &'static str, fields: Vec<HlslField>) -> Self {
        Self { name, fields }
    }

    /// 各字段的字节偏移
    pub fn offsets(&self) -> Vec<usize> {
        pack(&self.fields).0
    }

    /// cbuffer 的大小（向上取整到 16 字节）
    pub fn size(&self) -> usize {
        align_register(pack(&self.fields).1)
    }

    /// 与另一个声明比较，返回第一处差异
    pub fn difference(&self, other: &CbufferLayout) -> Option<String> {
        let (a, b) = (self.offsets(), other.offsets());
        for (i, (x, y)) in a.iter().zip(&b).enumerate() {
            if x != y {
                return Some(format!(
                    "field {} ('{}' vs '{}') at offset {} vs {}",
                    i, self.fields[i].name, other.fields[i].name, x, y
                ));
            }
        }
        if a.len() != b.len() || self.size() != other.size() {
            return Some(format!(
                "{} fields / {} bytes vs {} fields / {} bytes",
                a.len(),
                self.size(),
                b.len(),
                other.size()
            ));
        }
        None
    }
}

/// 检查 CPU 结构 `T` 的大小是否等于 cbuffer 的打包大小
pub fn verify<T>(layout: &CbufferLayout) -> Result<(), GraphicsError> {
    let cpu_size = std::mem::size_of::<T>();
    let shader_size = layout.size();
    if cpu_size != shader_size {
        return Err(GraphicsError::LayoutMismatch {
            name: layout.name,
            cpu_size,
            shader_size,
        });
    }
    Ok(())
}

/// `cbuffer ConstantBuffer : register(b0)`
pub fn per_draw_layout() -> CbufferLayout {
    CbufferLayout::new(
        "ConstantBuffer",
        vec![
            HlslField::new("World", HlslType::Float4x4),
            HlslField::new("View", HlslType::Float4x4),
            HlslField::new("Projection", HlslType::Float4x4),
            HlslField::new("vOutputColor", HlslType::Float4),
            HlslField::new("TextureSelect", HlslType::Float),
        ],
    )
}

/// `struct Light`
pub fn light_struct() -> HlslType {
    HlslType::Struct(vec![
        HlslField::new("Position", HlslType::Float4),
        HlslField::new("Direction", HlslType::Float4),
        HlslField::new("Color", HlslType::Float4),
        HlslField::new("SpotAngle", HlslType::Float),
        HlslField::new("ConstantAttenuation", HlslType::Float),
        HlslField::new("LinearAttenuation", HlslType::Float),
        HlslField::new("QuadraticAttenuation", HlslType::Float),
        HlslField::new("LightType", HlslType::Int),
        HlslField::new("Enabled", HlslType::Bool),
        HlslField::new("Padding", HlslType::Int2),
    ])
}

/// `cbuffer LightProperties : register(b1)`
pub fn light_properties_layout(max_lights: usize) -> CbufferLayout {
    CbufferLayout::new(
        "LightProperties",
        vec![
            HlslField::new("EyePosition", HlslType::Float4),
            HlslField::new("GlobalAmbient", HlslType::Float4),
            HlslField::new("Lights", HlslType::array(light_struct(), max_lights)),
        ],
    )
}

/// `cbuffer MaterialProperties : register(b2)`
pub fn material_layout() -> CbufferLayout {
    CbufferLayout::new(
        "MaterialProperties",
        vec![
            HlslField::new("BaseColor", HlslType::Float4),
            HlslField::new("Metallic", HlslType::Float),
            HlslField::new("Roughness", HlslType::Float),
        ],
    )
}

/// `cbuffer BoneTransforms : register(b3)`
pub fn bones_layout(max_bones: usize) -> CbufferLayout {
    CbufferLayout::new(
        "BoneTransforms",
        vec![HlslField::new("Bones", HlslType::array(HlslType::Float4x4, max_bones))],
    )
}
