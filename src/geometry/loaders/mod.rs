/// 模型加载器模块
///
/// 提供统一的场景资源加载接口。目前只支持 glTF 2.0（`.gltf` / `.glb`）。
///
/// # 使用示例
///
/// ```rust,no_run
/// use framework_dx11::geometry::loaders::load_asset;
/// use std::path::Path;
///
/// let asset = load_asset(Path::new("Resources/sphere.gltf"))?;
/// println!("节点数: {}", asset.hierarchy.len());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
use crate::core::error::{AssetLoadError, Result};
use crate::geometry::animation::AnimationClip;
use crate::geometry::hierarchy::NodeHierarchy;
use crate::geometry::mesh::MeshData;
use crate::geometry::skin::Skin;
use std::path::Path;

pub mod gltf_loader;

pub use gltf_loader::GltfLoader;

/// CPU 侧的完整场景资源
///
/// 节点通过下标引用 `primitives` 和 `skins`，动画通道通过下标引用节点。
#[derive(Debug, Clone, Default)]
pub struct SceneAsset {
    pub hierarchy: NodeHierarchy,
    pub primitives: Vec<MeshData>,
    pub skins: Vec<Skin>,
    pub animations: Vec<AnimationClip>,
}

impl SceneAsset {
    /// 所有图元的三角形总数
    pub fn triangle_count(&self) -> usize {
        self.primitives.iter().map(MeshData::triangle_count).sum()
    }
}

/// 资源加载器 trait
///
/// 加载器是无状态的，只返回 CPU 侧数据，不涉及 GPU 资源。
pub trait AssetLoader {
    /// 从文件路径加载
    fn load_from_file(path: &Path) -> Result<SceneAsset>;

    /// 从内存数据加载（外部缓冲区无法解析）
    fn load_from_memory(data: &[u8]) -> Result<SceneAsset>;

    /// 支持的文件扩展名列表（小写，不含点号）
    fn supported_extensions() -> &'static [&'static str];
}

/// 根据文件扩展名选择合适的加载器
pub fn load_asset(path: &Path) -> Result<SceneAsset> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .ok_or_else(|| AssetLoadError::UnsupportedFormat("无法确定文件扩展名".to_string()))?;

    if GltfLoader::supported_extensions().contains(&extension.as_str()) {
        GltfLoader::load_from_file(path)
    } else {
        Err(AssetLoadError::UnsupportedFormat(format!("不支持的文件格式: .{}", extension)).into())
    }
}
