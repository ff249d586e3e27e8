//! 资源管理模块
//!
//! GPU 资源对上层只暴露句柄。句柄是设备封装内部资源表（[`ResourceSlab`]）
//! 的下标，释放后的槽位可以复用。Scene / SceneObject 通过句柄创建、更新、
//! 绑定和释放资源，不直接接触图形 API 对象。
//!
//! # 常量缓冲区对齐
//!
//! D3D11 要求常量缓冲区的 `ByteWidth` 是 16 的倍数，
//! [`BufferDescriptor::aligned_size`] 负责这一点。

use crate::core::error::{GraphicsError, Result};

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

define_handle!(
    /// 缓冲区句柄（顶点 / 索引 / 常量）
    BufferHandle
);
define_handle!(
    /// 2D 纹理及其着色器资源视图
    TextureHandle
);
define_handle!(
    /// 采样器句柄
    SamplerHandle
);
define_handle!(
    /// 顶点着色器句柄（附带与顶点格式匹配的输入布局）
    VertexShaderHandle
);
define_handle!(
    /// 像素着色器句柄
    PixelShaderHandle
);

/// 缓冲区使用类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsageType {
    /// 顶点缓冲区
    Vertex,
    /// 索引缓冲区（32 位索引）
    Index,
    /// 常量缓冲区
    Constant,
}

/// 缓冲区描述信息
#[derive(Debug, Clone)]
pub struct BufferDescriptor {
    /// 缓冲区大小（字节）
    pub size: u64,
    /// 使用类型
    pub usage: BufferUsageType,
    /// 调试名称（可选）
    pub name: Option<String>,
}

impl BufferDescriptor {
    /// 创建新的缓冲区描述符
    pub fn new(size: u64, usage: BufferUsageType) -> Self {
        Self {
            size,
            usage,
            name: None,
        }
    }

    /// 按类型 `T` 的大小创建常量缓冲区描述符
    pub fn constant<T>() -> Self {
        Self::new(std::mem::size_of::<T>() as u64, BufferUsageType::Constant)
    }

    /// 设置调试名称
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// 计算对齐后的大小（常量缓冲区对齐到 16 字节）
    pub fn aligned_size(&self) -> u64 {
        if self.usage == BufferUsageType::Constant {
            (self.size + 15) & !15
        } else {
            self.size
        }
    }
}

/// 纹理描述信息
///
/// 纹理数据统一为 RGBA8，每行 `width * 4` 字节。
#[derive(Debug, Clone)]
pub struct TextureDescriptor {
    pub width: u32,
    pub height: u32,
    /// 调试名称
    pub name: Option<String>,
}

impl TextureDescriptor {
    pub fn rgba8(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// 每行字节数
    pub fn row_pitch(&self) -> u32 {
        self.width * 4
    }

    /// 检查像素数据长度
    pub fn validate(&self, pixels: &[u8]) -> Result<()> {
        let expected = self.row_pitch() as usize * self.height as usize;
        if self.width == 0 || self.height == 0 || pixels.len() != expected {
            return Err(GraphicsError::ResourceCreation(format!(
                "Texture {:?}: {}x{} expects {} bytes of RGBA8 data, got {}",
                self.name,
                self.width,
                self.height,
                expected,
                pixels.len()
            ))
            .into());
        }
        Ok(())
    }
}

/// 纹理寻址模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressMode {
    Wrap,
    Clamp,
}

/// 采样器描述信息
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerDescriptor {
    /// 各向异性等级，0 表示使用三线性过滤
    pub max_anisotropy: u32,
    pub address_mode: AddressMode,
    pub min_lod: f32,
    pub max_lod: f32,
}

impl SamplerDescriptor {
    /// 场景纹理使用的采样器：各向异性过滤，重复寻址，不限制 mip 范围
    pub fn anisotropic_wrap() -> Self {
        Self {
            max_anisotropy: 16,
            address_mode: AddressMode::Wrap,
            min_lod: 0.0,
            max_lod: f32::MAX,
        }
    }
}

/// 着色器阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Pixel,
}

/// 场景共享的着色器句柄
///
/// 由帧编排器创建并持有，Scene 只借用句柄来为每个对象选择像素着色器。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceTable {
    /// 使用纹理组的像素着色器
    pub textured_ps: PixelShaderHandle,
    /// 纯色像素着色器
    pub solid_ps: PixelShaderHandle,
}

/// 关闭设备时仍然存活的资源统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiveObjectReport {
    pub buffers: usize,
    pub textures: usize,
    pub samplers: usize,
    pub shaders: usize,
}

impl LiveObjectReport {
    pub fn total(&self) -> usize {
        self.buffers + self.textures + self.samplers + self.shaders
    }

    /// 没有任何泄漏的资源
    pub fn is_clean(&self) -> bool {
        self.total() == 0
    }
}

/// 以下标为句柄的资源表
///
/// 释放的槽位进入空闲列表，下次创建时复用。
#[derive(Debug)]
pub struct ResourceSlab<T> {
    slots: Vec<Option<T>>,
    free: Vec<u32>,
}

impl<T> Default for ResourceSlab<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }
}

impl<T> ResourceSlab<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入资源，返回槽位下标
    pub fn insert(&mut self, value: T) -> u32 {
        match self.free.pop() {
            Some(index) => {
                self.slots[index as usize] = Some(value);
                index
            }
            None => {
                self.slots.push(Some(value));
                (self.slots.len() - 1) as u32
            }
        }
    }

    pub fn get(&self, index: u32) -> Option<&T> {
        self.slots.get(index as usize).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, index: u32) -> Option<&mut T> {
        self.slots.get_mut(index as usize).and_then(Option::as_mut)
    }

    /// 移除资源；下标无效时返回 `None`
    pub fn remove(&mut self, index: u32) -> Option<T> {
        let value = self.slots.get_mut(index as usize)?.take()?;
        self.free.push(index);
        Some(value)
    }

    /// 遍历存活的资源及其下标
    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (i as u32, v)))
    }

    /// 当前存活的资源数量
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// 取出所有存活资源
    pub fn drain(&mut self) -> Vec<T> {
        self.free.clear();
        self.slots.drain(..).flatten().collect()
    }
}

/// 句柄无效时的统一错误
pub fn invalid_handle(kind: &str, index: u32) -> crate::core::error::FrameworkError {
    GraphicsError::InvalidHandle(format!("{} #{}", kind, index)).into()
}
