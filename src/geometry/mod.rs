/// 几何体加载和处理模块
///
/// 负责 glTF 场景资源的 CPU 侧表示：顶点格式、网格、节点层级、蒙皮与动画。
///
/// # 模块结构
///
/// - `vertex`: 蒙皮顶点格式及其输入布局描述
/// - `mesh`: 单个三角形图元的网格数据
/// - `hierarchy`: 以数组存储的节点树与世界矩阵
/// - `animation`: 关键帧通道、动画片段和循环播放
/// - `skin`: 关节与骨骼矩阵计算
/// - `loaders`: 资源加载器（glTF）
///
/// # 数据流
///
/// ```text
/// 文件 (.gltf/.glb)
///     ↓
/// GltfLoader
///     ↓
/// SceneAsset (层级 + 图元 + 蒙皮 + 动画)
///     ↓
/// SceneObject (上传到 GPU)
/// ```

pub mod vertex;
pub mod mesh;
pub mod hierarchy;
pub mod animation;
pub mod skin;
pub mod loaders;

// 重新导出常用类型
pub use vertex::SkinnedVertex;
pub use mesh::MeshData;
pub use hierarchy::NodeHierarchy;
pub use loaders::SceneAsset;
