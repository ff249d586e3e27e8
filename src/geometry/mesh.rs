/// 网格数据结构模块
///
/// 定义CPU侧的网格数据容器，用于存储从 glTF 图元中读取的原始几何数据。

use super::vertex::SkinnedVertex;

/// CPU侧网格数据
///
/// 一个 `MeshData` 对应 glTF 中的一个三角形图元，由渲染器上传到 GPU
/// 后以句柄形式保存在场景对象中。
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    /// 顶点数组
    pub vertices: Vec<SkinnedVertex>,

    /// 三角形顶点索引，每3个索引定义一个三角形
    pub indices: Vec<u32>,

    /// 网格名称（可选），用于调试和识别
    pub name: Option<String>,
}

impl MeshData {
    /// 创建一个空的网格数据
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建一个指定名称的空网格数据
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// 获取顶点数量
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// 获取索引数量
    #[inline]
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// 获取三角形数量
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// 没有可绘制的三角形（无顶点或无索引）
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.indices.is_empty()
    }

    /// 是否包含蒙皮顶点
    pub fn is_skinned(&self) -> bool {
        self.vertices.iter().any(SkinnedVertex::is_skinned)
    }

    /// 最大的骨骼下标（无蒙皮时为 None）
    pub fn max_bone_index(&self) -> Option<u32> {
        self.vertices
            .iter()
            .filter(|v| v.is_skinned())
            .flat_map(|v| {
                v.bone_indices
                    .iter()
                    .zip(v.bone_weights.iter())
                    .filter(|(_, w)| **w > 0.0)
                    .map(|(i, _)| *i)
            })
            .max()
    }

    /// 验证网格数据的有效性
    ///
    /// 检查：
    /// - 索引数量是3的倍数（每个三角形3个顶点）
    /// - 所有索引都在有效范围内
    pub fn validate(&self) -> Result<(), String> {
        if self.indices.len() % 3 != 0 {
            return Err(format!(
                "索引数量必须是3的倍数，当前为: {}",
                self.indices.len()
            ));
        }

        let vertex_count = self.vertices.len() as u32;
        for (i, &index) in self.indices.iter().enumerate() {
            if index >= vertex_count {
                return Err(format!(
                    "索引 {} 处的值 {} 超出顶点范围 (0-{})",
                    i,
                    index,
                    vertex_count.saturating_sub(1)
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> MeshData {
        let mut mesh = MeshData::with_name("Triangle");
        mesh.vertices.push(SkinnedVertex::default());
        mesh.vertices.push(SkinnedVertex::default());
        mesh.vertices.push(SkinnedVertex::default());
        mesh.indices.extend_from_slice(&[0, 1, 2]);
        mesh
    }

    #[test]
    fn test_empty_mesh() {
        assert!(MeshData::new().is_empty());
        let mut no_indices = triangle();
        no_indices.indices.clear();
        assert!(no_indices.is_empty());
        assert!(!triangle().is_empty());
    }

    #[test]
    fn test_mesh_data_creation() {
        let mesh = MeshData::new();

        assert_eq!(mesh.vertex_count(), 0);
        assert_eq!(mesh.index_count(), 0);
        assert_eq!(mesh.triangle_count(), 0);
        assert!(mesh.name.is_none());
    }

    #[test]
    fn test_mesh_data_counts() {
        let mesh = triangle();

        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.index_count(), 3);
        assert_eq!(mesh.triangle_count(), 1);
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_mesh_data_validation_invalid_index_count() {
        let mut mesh = triangle();
        mesh.indices.push(0); // 不是3的倍数

        assert!(mesh.validate().is_err());
    }

    #[test]
    fn test_mesh_data_validation_invalid_index_range() {
        let mut mesh = triangle();
        mesh.indices[2] = 5; // 索引5超出范围

        let result = mesh.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("超出顶点范围"));
    }

    #[test]
    fn test_max_bone_index_ignores_zero_weights() {
        let mut mesh = triangle();
        assert_eq!(mesh.max_bone_index(), None);

        mesh.vertices[0] = mesh.vertices[0].with_bones([3, 9, 0, 0], [1.0, 0.0, 0.0, 0.0]);
        mesh.vertices[1] = mesh.vertices[1].with_bones([1, 4, 0, 0], [0.5, 0.5, 0.0, 0.0]);
        assert!(mesh.is_skinned());
        assert_eq!(mesh.max_bone_index(), Some(4));
    }
}
