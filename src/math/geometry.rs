//! 几何数学工具模块
//!
//! 提供网格处理相关的数学函数，用于补全 glTF 中缺失的顶点属性：
//! - 法线重建（从三角形面计算顶点法线）
//! - 切线空间计算（用于法线贴图，包含副切线方向）

use crate::geometry::vertex::SkinnedVertex;

/// 从三角形面重建顶点法线
///
/// 遍历所有三角形，把未归一化的面法线（长度与面积成正比）累加到三个顶点上，
/// 最后归一化所有顶点的法线向量。
///
/// # 参数
///
/// - `vertices`: 顶点数组（法线字段将被更新）
/// - `indices`: 索引数组（每3个索引定义一个三角形）
pub fn reconstruct_normals(vertices: &mut [SkinnedVertex], indices: &[u32]) {
    for vertex in vertices.iter_mut() {
        vertex.normal = [0.0, 0.0, 0.0];
    }

    for triangle in indices.chunks_exact(3) {
        let i0 = triangle[0] as usize;
        let i1 = triangle[1] as usize;
        let i2 = triangle[2] as usize;

        let p0 = vertices[i0].position;
        let p1 = vertices[i1].position;
        let p2 = vertices[i2].position;

        let edge1 = sub(p1, p0);
        let edge2 = sub(p2, p0);
        let face_normal = cross(edge1, edge2);

        for i in [i0, i1, i2] {
            vertices[i].normal = add(vertices[i].normal, face_normal);
        }
    }

    for vertex in vertices.iter_mut() {
        vertex.normal = normalize(vertex.normal);
    }
}

/// 计算顶点的切线空间向量
///
/// 使用UV坐标导数计算每个顶点的切线向量，切线指向 U 增加的方向，
/// `w` 分量记录副切线相对 `normal × tangent` 的方向（±1）。
///
/// # 前置条件
///
/// - 顶点必须已经有有效的法线向量（可通过 `reconstruct_normals` 生成）
/// - 顶点必须有UV坐标
pub fn compute_tangent_space(vertices: &mut [SkinnedVertex], indices: &[u32]) {
    let mut tangents = vec![[0.0f32; 3]; vertices.len()];
    let mut bitangents = vec![[0.0f32; 3]; vertices.len()];

    for triangle in indices.chunks_exact(3) {
        let i0 = triangle[0] as usize;
        let i1 = triangle[1] as usize;
        let i2 = triangle[2] as usize;

        let v0 = &vertices[i0];
        let v1 = &vertices[i1];
        let v2 = &vertices[i2];

        let dp1 = sub(v1.position, v0.position);
        let dp2 = sub(v2.position, v0.position);

        let duv1 = [
            v1.texcoord[0] - v0.texcoord[0],
            v1.texcoord[1] - v0.texcoord[1],
        ];
        let duv2 = [
            v2.texcoord[0] - v0.texcoord[0],
            v2.texcoord[1] - v0.texcoord[1],
        ];

        let det = duv1[0] * duv2[1] - duv1[1] * duv2[0];

        // UV 退化的三角形不贡献切线
        if det.abs() < 1e-6 {
            continue;
        }

        let r = 1.0 / det;

        let tangent = scale(sub(scale(dp1, duv2[1]), scale(dp2, duv1[1])), r);
        let bitangent = scale(sub(scale(dp2, duv1[0]), scale(dp1, duv2[0])), r);

        for i in [i0, i1, i2] {
            tangents[i] = add(tangents[i], tangent);
            bitangents[i] = add(bitangents[i], bitangent);
        }
    }

    // Gram-Schmidt 正交化并归一化
    for (i, vertex) in vertices.iter_mut().enumerate() {
        let normal = vertex.normal;
        let tangent = tangents[i];

        let dot_nt = dot(normal, tangent);
        let orthogonal = normalize(sub(tangent, scale(normal, dot_nt)));

        let handedness = if dot(cross(normal, orthogonal), bitangents[i]) < 0.0 {
            -1.0
        } else {
            1.0
        };

        vertex.tangent = [orthogonal[0], orthogonal[1], orthogonal[2], handedness];
    }
}

// ============================================================================
// 辅助函数
// ============================================================================

#[inline]
fn add(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

#[inline]
fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
fn scale(a: [f32; 3], s: f32) -> [f32; 3] {
    [a[0] * s, a[1] * s, a[2] * s]
}

/// 计算两个3D向量的叉乘
#[inline]
fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// 计算两个3D向量的点乘
#[inline]
fn dot(a: [f32; 3], b: [f32; 3]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// 归一化3D向量，长度为零时返回零向量
#[inline]
fn normalize(v: [f32; 3]) -> [f32; 3] {
    let length = dot(v, v).sqrt();

    if length < 1e-6 {
        [0.0, 0.0, 0.0]
    } else {
        scale(v, 1.0 / length)
    }
}

// ============================================================================
// 测试
// ============================================================================
