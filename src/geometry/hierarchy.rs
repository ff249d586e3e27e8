/// 节点层级模块
///
/// 以数组（arena）形式存储场景对象的节点树。节点按前序遍历存放，
/// 父节点的下标总是小于子节点，因此一次顺序遍历即可算出所有世界矩阵。

use crate::component::Transform;
use crate::core::error::AssetLoadError;
use crate::math::Matrix4;

/// 构建层级时的节点描述（下标指向描述数组本身）
#[derive(Debug, Clone, Default)]
pub struct NodeDesc {
    pub name: String,
    pub children: Vec<usize>,
    pub transform: Transform,
    /// 该节点绘制的图元（指向资源中的图元数组）
    pub primitives: Vec<usize>,
    pub skin: Option<usize>,
}

/// 层级中的一个节点
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub transform: Transform,
    pub primitives: Vec<usize>,
    pub skin: Option<usize>,
}

/// 无环、有根的节点树
#[derive(Debug, Clone, Default)]
pub struct NodeHierarchy {
    nodes: Vec<Node>,
    roots: Vec<usize>,
    world: Vec<Matrix4>,
}

impl NodeHierarchy {
    /// 从描述数组构建层级
    ///
    /// 只保留从 `roots` 可达的节点；返回的映射表把描述下标映射到新下标
    /// （不可达的节点为 `None`）。
    ///
    /// # 错误
    ///
    /// - 下标越界
    /// - 某个节点被访问两次（存在环或多个父节点）
    pub fn build(
        descs: Vec<NodeDesc>,
        roots: &[usize],
    ) -> Result<(Self, Vec<Option<usize>>), AssetLoadError> {
        let count = descs.len();
        let mut remap: Vec<Option<usize>> = vec![None; count];
        let mut order: Vec<(usize, Option<usize>)> = Vec::with_capacity(count);

        // 前序 DFS，栈中保存 (描述下标, 新父节点下标)
        let mut stack: Vec<(usize, Option<usize>)> = roots.iter().rev().map(|&r| (r, None)).collect();
        while let Some((index, parent)) = stack.pop() {
            let desc = descs.get(index).ok_or_else(|| {
                AssetLoadError::ValidationError(format!(
                    "Node index {} out of range ({} nodes)",
                    index, count
                ))
            })?;

            if remap[index].is_some() {
                return Err(AssetLoadError::ValidationError(format!(
                    "Node {} ('{}') is reachable more than once; hierarchy must be an acyclic tree",
                    index, desc.name
                )));
            }

            let new_index = order.len();
            remap[index] = Some(new_index);
            order.push((index, parent));

            for &child in desc.children.iter().rev() {
                stack.push((child, Some(new_index)));
            }
        }

        let mut slots: Vec<Option<NodeDesc>> = descs.into_iter().map(Some).collect();
        let mut nodes: Vec<Node> = Vec::with_capacity(order.len());
        for (old_index, parent) in order {
            let desc = slots[old_index].take().ok_or_else(|| {
                AssetLoadError::ValidationError(format!("Node {} visited twice", old_index))
            })?;
            nodes.push(Node {
                name: desc.name,
                parent,
                children: Vec::new(),
                transform: desc.transform,
                primitives: desc.primitives,
                skin: desc.skin,
            });
        }

        for i in 0..nodes.len() {
            if let Some(parent) = nodes[i].parent {
                nodes[parent].children.push(i);
            }
        }

        let roots = nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.parent.is_none())
            .map(|(i, _)| i)
            .collect();

        let world = vec![Matrix4::identity(); nodes.len()];
        Ok((Self { nodes, roots, world }, remap))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub fn node_mut(&mut self, index: usize) -> Option<&mut Node> {
        self.nodes.get_mut(index)
    }

    /// 顶层节点
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// 按名称查找节点
    pub fn find(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.name == name)
    }

    /// 所有顶层节点的缩放乘以 `factor`
    pub fn scale_roots(&mut self, factor: f32) {
        for &root in &self.roots {
            self.nodes[root].transform.multiply_scale(factor);
        }
    }

    /// 计算所有节点的世界矩阵（`root` 为整个对象的根变换）
    pub fn update_world_transforms(&mut self, root: &Matrix4) {
        for i in 0..self.nodes.len() {
            let local = self.nodes[i].transform.local_matrix();
            let parent = match self.nodes[i].parent {
                Some(p) => self.world[p],
                None => *root,
            };
            self.world[i] = parent * local;
        }
    }

    /// 最近一次计算的世界矩阵
    pub fn world_transform(&self, index: usize) -> Matrix4 {
        self.world.get(index).copied().unwrap_or_else(Matrix4::identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{Quaternion, Vector3, Vector4};

    fn desc(name: &str, children: Vec<usize>, offset: f32) -> NodeDesc {
        NodeDesc {
            name: name.to_string(),
            children,
            transform: Transform::from_trs(
                Vector3::new(offset, 0.0, 0.0),
                Quaternion::identity(),
                Vector3::new(1.0, 1.0, 1.0),
            ),
            ..Default::default()
        }
    }

    #[test]
    fn test_parents_precede_children() {
        // 描述顺序打乱：2 是根，子节点 0，孙节点 1
        let descs = vec![desc("child", vec![1], 1.0), desc("grandchild", vec![], 1.0), desc("root", vec![0], 1.0)];
        let (hierarchy, remap) = NodeHierarchy::build(descs, &[2]).unwrap();

        assert_eq!(hierarchy.len(), 3);
        assert_eq!(remap, vec![Some(1), Some(2), Some(0)]);
        for (i, node) in hierarchy.nodes().iter().enumerate() {
            if let Some(parent) = node.parent {
                assert!(parent < i);
            }
        }
        assert_eq!(hierarchy.roots(), &[0]);
    }

    #[test]
    fn test_world_transforms_compose() {
        let descs = vec![desc("root", vec![1], 1.0), desc("child", vec![2], 1.0), desc("leaf", vec![], 1.0)];
        let (mut hierarchy, _) = NodeHierarchy::build(descs, &[0]).unwrap();

        let root = Matrix4::new_translation(&Vector3::new(0.0, 5.0, 0.0));
        hierarchy.update_world_transforms(&root);

        let p = hierarchy.world_transform(2) * Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert!((p.x - 3.0).abs() < 1e-6);
        assert!((p.y - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let descs = vec![desc("a", vec![1], 0.0), desc("b", vec![0], 0.0)];
        assert!(NodeHierarchy::build(descs, &[0]).is_err());
    }

    #[test]
    fn test_shared_child_is_rejected() {
        let descs = vec![desc("a", vec![2], 0.0), desc("b", vec![2], 0.0), desc("c", vec![], 0.0)];
        assert!(NodeHierarchy::build(descs, &[0, 1]).is_err());
    }

    #[test]
    fn test_unreachable_nodes_dropped() {
        let descs = vec![desc("root", vec![], 0.0), desc("orphan", vec![], 0.0)];
        let (hierarchy, remap) = NodeHierarchy::build(descs, &[0]).unwrap();
        assert_eq!(hierarchy.len(), 1);
        assert_eq!(remap[1], None);
        assert_eq!(hierarchy.find("root"), Some(0));
    }

    #[test]
    fn test_scale_roots() {
        let descs = vec![desc("root", vec![1], 0.0), desc("child", vec![], 1.0)];
        let (mut hierarchy, _) = NodeHierarchy::build(descs, &[0]).unwrap();
        hierarchy.scale_roots(2.0);
        hierarchy.update_world_transforms(&Matrix4::identity());

        let p = hierarchy.world_transform(1) * Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert!((p.x - 2.0).abs() < 1e-6);
    }
}
