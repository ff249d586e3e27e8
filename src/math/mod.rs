//! 统一的数学库模块
//!
//! 提供图形编程常用的数学类型和函数，基于 `nalgebra`。
//!
//! # 约定
//!
//! - CPU 侧所有矩阵都使用列向量约定（`v' = M * v`），组合顺序为 `T * R * S`
//! - 投影和视图矩阵使用 Direct3D 的左手坐标系，深度范围 [0, 1]
//! - 上传到 HLSL 之前经过 [`matrix::to_gpu`]：HLSL 默认按列主序读取 cbuffer，
//!   着色器中使用 `mul(v, M)`，因此上传的是转置后的矩阵
//!
//! # 模块组织
//!
//! - **基础类型**：Vector2/3/4, Matrix4, Quaternion, Color
//! - **常量 / 工具函数**：角度转换、近似比较
//! - **矩阵辅助函数**：左手透视投影、look-to 视图矩阵、GPU 上传布局
//! - **几何处理**：法线重建、切线空间计算（见 geometry 子模块）

pub use nalgebra::{
    Matrix4 as Mat4, Point3, UnitQuaternion,
    Vector2 as Vec2, Vector3 as Vec3, Vector4 as Vec4,
};

// 类型别名，使用更简洁的名称
pub type Vector2 = Vec2<f32>;
pub type Vector3 = Vec3<f32>;
pub type Vector4 = Vec4<f32>;
pub type Matrix4 = Mat4<f32>;
pub type Quaternion = UnitQuaternion<f32>;

/// 上传给 HLSL 的 4x4 矩阵布局
pub type GpuMatrix = [[f32; 4]; 4];

/// 颜色类型（RGBA，范围 0.0-1.0）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    /// 创建新的颜色
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// 创建 RGB 颜色（alpha = 1.0）
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self::new(r, g, b, 1.0)
    }

    /// 转换为 float4 数组
    pub fn to_array(&self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub const WHITE: Color = Color { r: 1.0, g: 1.0, b: 1.0, a: 1.0 };
    pub const BLACK: Color = Color { r: 0.0, g: 0.0, b: 0.0, a: 1.0 };
}

impl From<[f32; 4]> for Color {
    fn from(v: [f32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

/// 数学常量
pub mod constants {
    /// π
    pub const PI: f32 = std::f32::consts::PI;

    /// 角度转弧度的系数
    pub const DEG_TO_RAD: f32 = PI / 180.0;

    /// 弧度转角度的系数
    pub const RAD_TO_DEG: f32 = 180.0 / PI;

    /// 浮点数比较的 epsilon
    pub const EPSILON: f32 = 1e-6;
}

/// 数学工具函数
pub mod utils {
    use super::*;

    /// 角度转弧度
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }

    /// 弧度转角度
    pub fn rad_to_deg(radians: f32) -> f32 {
        radians * constants::RAD_TO_DEG
    }

    /// 检查两个浮点数是否近似相等
    pub fn approx_eq(a: f32, b: f32, epsilon: f32) -> bool {
        (a - b).abs() < epsilon
    }
}

/// 矩阵辅助函数
pub mod matrix {
    use super::*;

    /// 创建平移矩阵
    pub fn translation(x: f32, y: f32, z: f32) -> Matrix4 {
        Matrix4::new_translation(&Vector3::new(x, y, z))
    }

    /// 创建缩放矩阵
    pub fn scaling(x: f32, y: f32, z: f32) -> Matrix4 {
        Matrix4::new_nonuniform_scaling(&Vector3::new(x, y, z))
    }

    /// 由平移、旋转、缩放组合（T * R * S）
    pub fn compose(translation: &Vector3, rotation: &Quaternion, scale: &Vector3) -> Matrix4 {
        Matrix4::new_translation(translation)
            * rotation.to_homogeneous()
            * Matrix4::new_nonuniform_scaling(scale)
    }

    /// 左手透视投影（DirectXMath `XMMatrixPerspectiveFovLH` 的列向量形式）
    ///
    /// 深度映射到 [0, 1]：近平面为 0，远平面为 1。
    pub fn perspective_fov_lh(fov_y: f32, aspect: f32, near: f32, far: f32) -> Matrix4 {
        let y_scale = 1.0 / (fov_y * 0.5).tan();
        let x_scale = y_scale / aspect;
        let range = far / (far - near);

        Matrix4::new(
            x_scale, 0.0, 0.0, 0.0,
            0.0, y_scale, 0.0, 0.0,
            0.0, 0.0, range, -range * near,
            0.0, 0.0, 1.0, 0.0,
        )
    }

    /// 左手 look-to 视图矩阵
    ///
    /// `direction` 与 `up` 不能平行，调用方负责保证。
    pub fn look_to_lh(eye: &Vector3, direction: &Vector3, up: &Vector3) -> Matrix4 {
        let z = direction.normalize();
        let x = up.cross(&z).normalize();
        let y = z.cross(&x);

        Matrix4::new(
            x.x, x.y, x.z, -x.dot(eye),
            y.x, y.y, y.z, -y.dot(eye),
            z.x, z.y, z.z, -z.dot(eye),
            0.0, 0.0, 0.0, 1.0,
        )
    }

    /// 转成上传给 HLSL 的布局
    ///
    /// 每 16 字节为 `M` 的一行，也就是 `M^T` 的一列。HLSL 按列主序读取后
    /// 得到行向量约定的 `M^T`，与 `mul(v, M)` 配合。
    pub fn to_gpu(m: &Matrix4) -> GpuMatrix {
        let mut out = [[0.0f32; 4]; 4];
        for (r, row) in m.row_iter().enumerate() {
            out[r] = [row[0], row[1], row[2], row[3]];
        }
        out
    }
}

// 几何处理模块（网格法线、切线等）
pub mod geometry;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_translation() {
        let mat = matrix::translation(1.0, 2.0, 3.0);
        let point = Vector4::new(0.0, 0.0, 0.0, 1.0);
        let result = mat * point;

        assert!((result.x - 1.0).abs() < 1e-6);
        assert!((result.y - 2.0).abs() < 1e-6);
        assert!((result.z - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_perspective_depth_range() {
        let proj = matrix::perspective_fov_lh(utils::deg_to_rad(60.0), 4.0 / 3.0, 0.01, 100.0);

        let near = proj * Vector4::new(0.0, 0.0, 0.01, 1.0);
        let far = proj * Vector4::new(0.0, 0.0, 100.0, 1.0);
        assert!(utils::approx_eq(near.z / near.w, 0.0, 1e-4));
        assert!(utils::approx_eq(far.z / far.w, 1.0, 1e-4));
    }

    #[test]
    fn test_look_to_moves_eye_to_origin() {
        let eye = Vector3::new(0.0, 0.0, -6.0);
        let view = matrix::look_to_lh(&eye, &Vector3::z(), &Vector3::y());

        let origin = view * Vector4::new(0.0, 0.0, 0.0, 1.0);
        // 原点位于相机正前方 6 个单位
        assert!(utils::approx_eq(origin.z, 6.0, 1e-5));
        assert!(utils::approx_eq(origin.x, 0.0, 1e-5));
    }

    #[test]
    fn test_to_gpu_is_transpose() {
        let m = matrix::translation(1.0, 2.0, 3.0);
        let gpu = matrix::to_gpu(&m);
        // 每个寄存器是 CPU 矩阵的一行，平移位于各行的第 4 个分量
        assert_eq!(gpu[0], [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(gpu[2], [0.0, 0.0, 1.0, 3.0]);
        assert_eq!(gpu[3], [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_compose_order() {
        let m = matrix::compose(
            &Vector3::new(5.0, 0.0, 0.0),
            &Quaternion::identity(),
            &Vector3::new(2.0, 2.0, 2.0),
        );
        let p = m * Vector4::new(1.0, 0.0, 0.0, 1.0);
        // 先缩放再平移
        assert!(utils::approx_eq(p.x, 7.0, 1e-6));
    }
}
