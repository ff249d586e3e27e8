//! 组件系统模块
//!
//! 场景中的基础组件：局部变换、第一人称相机和光源。

mod transform;
mod camera;
mod light;

pub use transform::Transform;
pub use camera::Camera;
pub use light::{Light, LightProperties, LightType, MAX_LIGHTS};
