/// 蒙皮模块
///
/// 一个 skin 由关节节点和对应的逆绑定矩阵组成。骨骼矩阵按 glTF 的定义计算：
/// `inverse(world(mesh_node)) * world(joint) * inverse_bind`，
/// 因此顶点着色器在蒙皮之后仍然乘以网格节点自身的世界矩阵。

use crate::geometry::hierarchy::NodeHierarchy;
use crate::math::Matrix4;

#[derive(Debug, Clone, Default)]
pub struct Skin {
    pub name: String,
    /// 关节节点（层级中的下标），`None` 表示关节不在场景中
    pub joints: Vec<Option<usize>>,
    pub inverse_bind: Vec<Matrix4>,
}

impl Skin {
    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    /// 为挂在 `mesh_node` 上的网格计算骨骼矩阵
    ///
    /// 结果写入 `palette` 的前 `min(joint_count, palette.len())` 项，
    /// 返回实际写入的数量。
    pub fn compute_palette(
        &self,
        hierarchy: &NodeHierarchy,
        mesh_node: usize,
        palette: &mut [Matrix4],
    ) -> usize {
        let mesh_world_inverse = hierarchy
            .world_transform(mesh_node)
            .try_inverse()
            .unwrap_or_else(Matrix4::identity);

        let count = self.joints.len().min(palette.len());
        for (i, slot) in palette.iter_mut().enumerate().take(count) {
            *slot = match self.joints[i] {
                Some(joint) => {
                    let inverse_bind = self
                        .inverse_bind
                        .get(i)
                        .copied()
                        .unwrap_or_else(Matrix4::identity);
                    mesh_world_inverse * hierarchy.world_transform(joint) * inverse_bind
                }
                None => Matrix4::identity(),
            };
        }
        count
    }
}
