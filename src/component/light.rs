//! 光照组件模块
//!
//! 光源直接以 GPU 常量缓冲区的布局存储：`Light` 与 HLSL 中的
//! `struct Light` 一一对应，`LightProperties` 对应像素着色器 b1 上的
//! `cbuffer LightProperties`。

use bytemuck::{Pod, Zeroable};

use crate::core::scene::LightConfig;
use crate::math::{utils, Color, Vector3};

/// 着色器中光源数组的容量
pub const MAX_LIGHTS: usize = 4;

/// 光源类型枚举（数值与着色器中的常量一致）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum LightType {
    /// 方向光
    Directional = 0,
    /// 点光源
    Point = 1,
    /// 聚光灯
    Spot = 2,
}

/// 单个光源（80 字节）
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Light {
    /// 世界空间位置（w = 1）
    pub position: [f32; 4],
    /// 方向（方向光 / 聚光灯使用）
    pub direction: [f32; 4],
    pub color: [f32; 4],

    /// 聚光角（弧度）
    pub spot_angle: f32,
    pub constant_attenuation: f32,
    pub linear_attenuation: f32,
    pub quadratic_attenuation: f32,

    /// [`LightType`] 的数值
    pub light_type: i32,
    /// HLSL `bool` 占 4 字节
    pub enabled: i32,
    _padding: [i32; 2],
}

impl Default for Light {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl Light {
    /// 创建一个启用的点光源
    pub fn point(position: Vector3, color: Color) -> Self {
        Self {
            position: [position.x, position.y, position.z, 1.0],
            direction: [0.0, 0.0, 1.0, 0.0],
            color: color.to_array(),
            spot_angle: utils::deg_to_rad(45.0),
            constant_attenuation: 1.0,
            linear_attenuation: 1.0,
            quadratic_attenuation: 1.0,
            light_type: LightType::Point as i32,
            enabled: 1,
            _padding: [0; 2],
        }
    }

    /// 由场景配置创建主光源（点光源）
    pub fn from_config(config: &LightConfig, position: Vector3) -> Self {
        let mut light = Self::point(position, Color::from(config.color));
        light.spot_angle = utils::deg_to_rad(config.spot_angle);
        light.constant_attenuation = config.attenuation[0];
        light.linear_attenuation = config.attenuation[1];
        light.quadratic_attenuation = config.attenuation[2];
        light
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled != 0
    }

    pub fn set_position(&mut self, position: Vector3) {
        self.position = [position.x, position.y, position.z, 1.0];
    }
}

/// 光照常量缓冲区（像素着色器 b1）
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightProperties {
    /// 相机位置（w = 1）
    pub eye_position: [f32; 4],
    pub global_ambient: [f32; 4],
    pub lights: [Light; MAX_LIGHTS],
}

impl Default for LightProperties {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl LightProperties {
    pub fn new(global_ambient: [f32; 4]) -> Self {
        Self {
            global_ambient,
            ..Self::default()
        }
    }

    /// 写入指定槽位；越界时忽略并返回 false
    pub fn set_light(&mut self, index: usize, light: Light) -> bool {
        match self.lights.get_mut(index) {
            Some(slot) => {
                *slot = light;
                true
            }
            None => false,
        }
    }

    /// 更新指定光源的位置；越界下标不做任何修改
    pub fn set_light_position(&mut self, index: usize, position: Vector3) {
        if let Some(light) = self.lights.get_mut(index) {
            light.set_position(position);
        }
    }

    pub fn set_eye_position(&mut self, position: Vector3) {
        self.eye_position = [position.x, position.y, position.z, 1.0];
    }

    /// 启用中的光源数量
    pub fn enabled_count(&self) -> usize {
        self.lights.iter().filter(|l| l.is_enabled()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn test_light_sizes() {
        assert_eq!(size_of::<Light>(), 80);
        assert_eq!(size_of::<LightProperties>(), 32 + 80 * MAX_LIGHTS);
    }

    #[test]
    fn test_point_light_defaults() {
        let light = Light::point(Vector3::new(0.0, 0.0, -6.0), Color::WHITE);
        assert!(light.is_enabled());
        assert_eq!(light.light_type, LightType::Point as i32);
        assert_eq!(light.position, [0.0, 0.0, -6.0, 1.0]);
        assert!((light.spot_angle - 45.0f32.to_radians()).abs() < 1e-6);
        assert_eq!(light.constant_attenuation, 1.0);
    }

    #[test]
    fn test_out_of_range_position_is_noop() {
        let mut props = LightProperties::new([0.1, 0.1, 0.1, 1.0]);
        props.set_light(0, Light::point(Vector3::zeros(), Color::WHITE));
        let before = props;

        props.set_light_position(MAX_LIGHTS, Vector3::new(5.0, 5.0, 5.0));
        props.set_light_position(usize::MAX, Vector3::new(5.0, 5.0, 5.0));
        assert_eq!(before, props);

        props.set_light_position(0, Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(props.lights[0].position, [1.0, 2.0, 3.0, 1.0]);
    }

    #[test]
    fn test_set_light_out_of_range() {
        let mut props = LightProperties::default();
        assert!(!props.set_light(MAX_LIGHTS, Light::default()));
        assert_eq!(props.enabled_count(), 0);
    }
}
