//! Camera 组件
//!
//! 第一人称相机：WASD 沿当前朝向移动，右键拖动改变偏航 / 俯仰。
//! 视图与投影都使用 Direct3D 的左手坐标系。

use crate::core::scene::CameraConfig;
use crate::math::{matrix, utils, Matrix4, Vector2, Vector3};

/// 默认垂直视场角（度数）
pub const DEFAULT_FOV_DEGREES: f32 = 60.0;
/// 默认近裁剪面
pub const DEFAULT_NEAR_Z: f32 = 0.01;
/// 默认远裁剪面
pub const DEFAULT_FAR_Z: f32 = 100.0;

/// 俯仰角上限，保证前向量永远不与世界上向量平行
const MAX_PITCH: f32 = 89.0 * std::f32::consts::PI / 180.0;

/// Camera 组件
///
/// 管理相机的视图和投影。偏航 / 俯仰角相对世界上向量定义：
/// 偏航绕上向量旋转，俯仰相对垂直于上向量的平面。
/// 右向量由世界上向量与前向量叉乘得到。
#[derive(Debug, Clone)]
pub struct Camera {
    position: Vector3,

    /// 世界上向量（单位长度）
    world_up: Vector3,

    /// 偏航 0 时的水平前向量，与 `world_up` 正交
    base_forward: Vector3,

    /// 偏航 90° 时的水平前向量
    base_right: Vector3,

    /// 绕世界上向量的偏航角（弧度），0 朝向 `base_forward`（Y 向上时为 +Z）
    yaw: f32,

    /// 俯仰角（弧度），正值向下看
    pitch: f32,

    /// 相机坐标系：右向量
    right: Vector3,

    /// 相机坐标系：前向量（Look）
    look: Vector3,

    near_z: f32,
    far_z: f32,
    aspect: f32,

    /// 垂直视场角（弧度）
    fov_y: f32,

    view_matrix: Matrix4,
    proj_matrix: Matrix4,

    /// 视图矩阵是否需要更新
    view_dirty: bool,
}

impl Camera {
    /// 创建新的 Camera
    ///
    /// # 参数
    /// - `position`: 相机位置
    /// - `target`: 初始观察点
    /// - `world_up`: 世界上向量（通常是 (0, 1, 0)），零向量按 +Y 处理
    /// - `width` / `height`: 视口尺寸，决定宽高比
    pub fn new(position: Vector3, target: Vector3, world_up: Vector3, width: u32, height: u32) -> Self {
        let world_up = world_up.try_normalize(1e-6).unwrap_or_else(Vector3::y);
        let (base_forward, base_right) = horizontal_frame(&world_up);
        let mut camera = Self {
            position,
            world_up,
            base_forward,
            base_right,
            yaw: 0.0,
            pitch: 0.0,
            right: Vector3::x(),
            look: Vector3::z(),
            near_z: DEFAULT_NEAR_Z,
            far_z: DEFAULT_FAR_Z,
            aspect: 1.0,
            fov_y: utils::deg_to_rad(DEFAULT_FOV_DEGREES),
            view_matrix: Matrix4::identity(),
            proj_matrix: Matrix4::identity(),
            view_dirty: true,
        };

        camera.look_at(target);
        camera.set_lens(
            utils::deg_to_rad(DEFAULT_FOV_DEGREES),
            aspect_ratio(width, height),
            DEFAULT_NEAR_Z,
            DEFAULT_FAR_Z,
        );
        camera
    }

    /// 从场景配置创建
    pub fn from_config(config: &CameraConfig, width: u32, height: u32) -> Self {
        let mut camera = Self::new(
            Vector3::from(config.position),
            Vector3::from(config.target),
            Vector3::from(config.up),
            width,
            height,
        );
        camera.set_lens(
            utils::deg_to_rad(config.fov),
            aspect_ratio(width, height),
            config.near_clip,
            config.far_clip,
        );
        camera
    }

    // ========== 位置 / 朝向 ==========

    /// 获取相机位置
    pub fn position(&self) -> Vector3 {
        self.position
    }

    /// 设置相机位置
    pub fn set_position(&mut self, position: Vector3) {
        self.position = position;
        self.view_dirty = true;
    }

    /// 获取前向量
    pub fn look(&self) -> Vector3 {
        self.look
    }

    /// 获取右向量
    pub fn right(&self) -> Vector3 {
        self.right
    }

    /// 偏航角（弧度）
    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    /// 俯仰角（弧度）
    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// 朝向目标点
    ///
    /// 目标与当前位置重合时保持原朝向；目标恰好在正上 / 正下方时俯仰取 ±89°。
    pub fn look_at(&mut self, target: Vector3) {
        let direction = target - self.position;
        if direction.norm_squared() < 1e-12 {
            return;
        }
        let direction = direction.normalize();

        self.yaw = direction.dot(&self.base_right).atan2(direction.dot(&self.base_forward));
        self.pitch = (-direction.dot(&self.world_up)).clamp(-1.0, 1.0).asin();
        self.update_basis();
    }

    /// 世界上向量
    pub fn world_up(&self) -> Vector3 {
        self.world_up
    }

    // ========== 投影 ==========

    /// 设置透视投影参数
    ///
    /// # 参数
    /// - `fov_y`: 垂直视场角（弧度）
    /// - `aspect`: 宽高比
    /// - `near_z`: 近裁剪面距离
    /// - `far_z`: 远裁剪面距离
    pub fn set_lens(&mut self, fov_y: f32, aspect: f32, near_z: f32, far_z: f32) {
        self.fov_y = fov_y;
        self.aspect = aspect;
        self.near_z = near_z;
        self.far_z = far_z;
        self.proj_matrix = matrix::perspective_fov_lh(fov_y, aspect, near_z, far_z);
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn fov_y(&self) -> f32 {
        self.fov_y
    }

    // ========== 获取矩阵 ==========

    /// 获取视图矩阵
    pub fn view_matrix(&mut self) -> Matrix4 {
        if self.view_dirty {
            self.view_matrix = matrix::look_to_lh(&self.position, &self.look, &self.world_up);
            self.view_dirty = false;
        }
        self.view_matrix
    }

    /// 获取投影矩阵
    pub fn projection_matrix(&self) -> Matrix4 {
        self.proj_matrix
    }

    // ========== 相机移动 ==========

    /// 沿前向量前进
    pub fn move_forward(&mut self, distance: f32) {
        self.position += self.look * distance;
        self.view_dirty = true;
    }

    /// 沿前向量后退
    pub fn move_backward(&mut self, distance: f32) {
        self.move_forward(-distance);
    }

    /// 向左平移
    pub fn strafe_left(&mut self, distance: f32) {
        self.strafe_right(-distance);
    }

    /// 向右平移
    pub fn strafe_right(&mut self, distance: f32) {
        self.position += self.right * distance;
        self.view_dirty = true;
    }

    // ========== 相机旋转 ==========

    /// 根据屏幕空间的角度增量更新朝向
    ///
    /// `delta.x` 为偏航增量，`delta.y` 为俯仰增量（弧度）。
    /// 俯仰角限制在 ±89°。
    pub fn update_look_at(&mut self, delta: Vector2) {
        self.yaw += delta.x;
        self.pitch = (self.pitch + delta.y).clamp(-MAX_PITCH, MAX_PITCH);
        self.update_basis();
    }

    /// 由偏航 / 俯仰重建相机坐标系
    fn update_basis(&mut self) {
        self.pitch = self.pitch.clamp(-MAX_PITCH, MAX_PITCH);

        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();

        let horizontal = self.base_forward * cos_yaw + self.base_right * sin_yaw;
        self.look = (horizontal * cos_pitch - self.world_up * sin_pitch).normalize();
        self.right = self.world_up.cross(&self.look).normalize();
        self.view_dirty = true;
    }
}

/// 与上向量正交的水平参考系 (forward, right)
///
/// forward 取 +Z 在水平面上的投影；上向量接近 ±Z 时改用 +X。
fn horizontal_frame(up: &Vector3) -> (Vector3, Vector3) {
    let forward = [Vector3::z(), Vector3::x()]
        .iter()
        .find_map(|axis| (axis - up * up.dot(axis)).try_normalize(1e-3))
        .unwrap_or_else(Vector3::z);
    let right = up.cross(&forward);
    (forward, right)
}

fn aspect_ratio(width: u32, height: u32) -> f32 {
    width.max(1) as f32 / height.max(1) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vector4;

    fn demo_camera() -> Camera {
        Camera::new(
            Vector3::new(0.0, 0.0, -6.0),
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(0.0, 1.0, 0.0),
            800,
            600,
        )
    }

    #[test]
    fn test_projection_scale_for_800x600() {
        let camera = demo_camera();
        let expected = 1.0 / (30.0f32).to_radians().tan() / (800.0 / 600.0);
        assert!((camera.projection_matrix()[(0, 0)] - expected).abs() < 1e-5);
    }

    #[test]
    fn test_initial_orientation() {
        let mut camera = demo_camera();
        assert!((camera.look() - Vector3::z()).norm() < 1e-6);
        assert!((camera.right() - Vector3::x()).norm() < 1e-6);

        let origin = camera.view_matrix() * Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert!((origin.z - 6.0).abs() < 1e-5);
    }

    #[test]
    fn test_movement_uses_basis() {
        let mut camera = demo_camera();
        camera.move_forward(0.02);
        assert!((camera.position().z + 5.98).abs() < 1e-6);

        camera.move_backward(0.02);
        camera.strafe_right(1.0);
        assert!((camera.position().x - 1.0).abs() < 1e-6);

        camera.strafe_left(2.0);
        assert!((camera.position().x + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_pitch_is_clamped() {
        let mut camera = demo_camera();
        camera.update_look_at(Vector2::new(0.0, 10.0));
        assert!(camera.pitch() <= MAX_PITCH + 1e-6);

        // 前向量不与上向量平行
        let cross = camera.look().cross(&Vector3::y());
        assert!(cross.norm() > 1e-3);

        camera.update_look_at(Vector2::new(0.0, -20.0));
        assert!(camera.pitch() >= -MAX_PITCH - 1e-6);
    }

    #[test]
    fn test_yaw_turns_right() {
        let mut camera = demo_camera();
        camera.update_look_at(Vector2::new(std::f32::consts::FRAC_PI_2, 0.0));
        // 向右转 90° 后朝向 +X
        assert!((camera.look() - Vector3::x()).norm() < 1e-5);
    }

    #[test]
    fn test_view_updates_after_move() {
        let mut camera = demo_camera();
        let before = camera.view_matrix();
        camera.move_forward(1.0);
        assert_ne!(before, camera.view_matrix());
    }

    fn assert_finite(matrix: &Matrix4) {
        assert!(matrix.iter().all(|v| v.is_finite()), "{:?}", matrix);
    }

    #[test]
    fn test_z_up_looking_along_up_stays_valid() {
        let mut camera = Camera::new(
            Vector3::new(0.0, 0.0, -6.0),
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(0.0, 0.0, 1.0),
            800,
            600,
        );
        assert!(camera.right().iter().all(|v| v.is_finite()));
        assert!(camera.look().cross(&camera.world_up()).norm() > 1e-3);
        assert_finite(&camera.view_matrix());
    }

    #[test]
    fn test_z_up_orientation() {
        let mut camera = Camera::new(
            Vector3::zeros(),
            Vector3::new(0.0, 5.0, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
            800,
            600,
        );
        assert!((camera.look() - Vector3::y()).norm() < 1e-5);
        assert!(camera.pitch().abs() < 1e-5);
        // 右向量垂直于上向量和前向量
        assert!(camera.right().dot(&Vector3::z()).abs() < 1e-5);
        assert!(camera.right().dot(&camera.look()).abs() < 1e-5);

        camera.update_look_at(Vector2::new(0.0, 0.3));
        assert!((camera.pitch() - 0.3).abs() < 1e-5);
        assert!(camera.look().z < 0.0);
        assert_finite(&camera.view_matrix());
    }

    #[test]
    fn test_zero_up_falls_back_to_y() {
        let mut camera = Camera::new(
            Vector3::new(0.0, 0.0, -6.0),
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::zeros(),
            800,
            600,
        );
        assert_eq!(camera.world_up(), Vector3::y());
        assert_finite(&camera.view_matrix());
    }
}
