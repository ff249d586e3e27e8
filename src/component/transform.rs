//! Transform 组件
//!
//! 管理层级节点的局部位置、旋转和缩放，并缓存局部矩阵。
//! 动画采样每帧写入这些分量，矩阵只在分量变化后重建。

use crate::math::{matrix, Matrix4, Quaternion, Vector3};

/// 节点的局部变换（平移 / 旋转 / 缩放）
#[derive(Debug, Clone)]
pub struct Transform {
    translation: Vector3,
    rotation: Quaternion,
    scale: Vector3,

    /// 局部矩阵缓存
    local_matrix: Matrix4,

    /// 局部矩阵是否需要更新
    dirty: bool,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    /// 单位变换
    pub fn identity() -> Self {
        Self {
            translation: Vector3::zeros(),
            rotation: Quaternion::identity(),
            scale: Vector3::new(1.0, 1.0, 1.0),
            local_matrix: Matrix4::identity(),
            dirty: false,
        }
    }

    /// 由平移、旋转、缩放创建
    pub fn from_trs(translation: Vector3, rotation: Quaternion, scale: Vector3) -> Self {
        Self {
            translation,
            rotation,
            scale,
            local_matrix: Matrix4::identity(),
            dirty: true,
        }
    }

    pub fn translation(&self) -> Vector3 {
        self.translation
    }

    pub fn rotation(&self) -> Quaternion {
        self.rotation
    }

    pub fn scale(&self) -> Vector3 {
        self.scale
    }

    /// 设置平移
    pub fn set_translation(&mut self, translation: Vector3) {
        self.translation = translation;
        self.dirty = true;
    }

    /// 设置旋转
    pub fn set_rotation(&mut self, rotation: Quaternion) {
        self.rotation = rotation;
        self.dirty = true;
    }

    /// 设置缩放
    pub fn set_scale(&mut self, scale: Vector3) {
        self.scale = scale;
        self.dirty = true;
    }

    /// 在当前缩放上再乘一个统一系数
    pub fn multiply_scale(&mut self, factor: f32) {
        self.scale *= factor;
        self.dirty = true;
    }

    /// 获取局部矩阵（T * R * S）
    pub fn local_matrix(&mut self) -> Matrix4 {
        if self.dirty {
            self.local_matrix = matrix::compose(&self.translation, &self.rotation, &self.scale);
            self.dirty = false;
        }
        self.local_matrix
    }

    /// 不使用缓存直接计算局部矩阵
    pub fn compute_matrix(&self) -> Matrix4 {
        if self.dirty {
            matrix::compose(&self.translation, &self.rotation, &self.scale)
        } else {
            self.local_matrix
        }
    }
}
