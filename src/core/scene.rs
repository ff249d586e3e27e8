//! 场景配置模块
//!
//! 定义场景配置，包括相机、纹理、灯光以及场景对象（glTF 模型）的变换和材质。
//!
//! # 配置文件格式 (scene.toml)
//!
//! ```toml
//! texture_cycle_seconds = 1.0
//!
//! [camera]
//! position = [0.0, 0.0, -6.0]
//! target = [0.0, 0.0, 1.0]
//!
//! [textures]
//! diffuse = "Resources/PavingStones_Color.dds"
//! normal = "Resources/PavingStones_NormalDX.dds"
//!
//! [[objects]]
//! name = "sphere"
//! path = "Resources/sphere.gltf"
//! material = { kind = "textured" }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::fs;
use crate::core::error::{Result, FrameworkError, ConfigError};
use crate::math::{Vector3, Matrix4};

/// 3D 变换数据
///
/// 包含位置、旋转和缩放信息。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// 位置 (x, y, z)
    #[serde(default = "default_position")]
    pub position: [f32; 3],

    /// 旋转（欧拉角，度数）(pitch, yaw, roll)
    #[serde(default = "default_rotation")]
    pub rotation: [f32; 3],

    /// 缩放 (x, y, z)
    #[serde(default = "default_scale")]
    pub scale: [f32; 3],
}

fn default_position() -> [f32; 3] {
    [0.0, 0.0, 0.0]
}

fn default_rotation() -> [f32; 3] {
    [0.0, 0.0, 0.0]
}

fn default_scale() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: default_position(),
            rotation: default_rotation(),
            scale: default_scale(),
        }
    }
}

impl Transform {
    /// 创建模型矩阵
    ///
    /// 变换顺序：缩放 -> 旋转 -> 平移（列向量约定，T * R * S）
    pub fn to_matrix(&self) -> Matrix4 {
        use std::f32::consts::PI;

        let pitch = self.rotation[0] * PI / 180.0;
        let yaw = self.rotation[1] * PI / 180.0;
        let roll = self.rotation[2] * PI / 180.0;

        let translation = Matrix4::new_translation(&Vector3::new(
            self.position[0],
            self.position[1],
            self.position[2],
        ));

        let rotation_x = Matrix4::from_axis_angle(&Vector3::x_axis(), pitch);
        let rotation_y = Matrix4::from_axis_angle(&Vector3::y_axis(), yaw);
        let rotation_z = Matrix4::from_axis_angle(&Vector3::z_axis(), roll);
        let rotation = rotation_z * rotation_y * rotation_x;

        let scale = Matrix4::new_nonuniform_scaling(&Vector3::new(
            self.scale[0],
            self.scale[1],
            self.scale[2],
        ));

        translation * rotation * scale
    }
}

/// 相机配置
///
/// 定义相机的初始位置、观察目标和投影参数。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    #[serde(default = "default_camera_position")]
    pub position: [f32; 3],

    /// 初始观察点
    #[serde(default = "default_camera_target")]
    pub target: [f32; 3],

    #[serde(default = "default_camera_up")]
    pub up: [f32; 3],

    /// 垂直视野角度（度数）
    #[serde(default = "default_fov")]
    pub fov: f32,

    /// 近裁剪面距离
    #[serde(default = "default_near_clip")]
    pub near_clip: f32,

    /// 远裁剪面距离
    #[serde(default = "default_far_clip")]
    pub far_clip: f32,
}

fn default_camera_position() -> [f32; 3] { [0.0, 0.0, -6.0] }
fn default_camera_target() -> [f32; 3] { [0.0, 0.0, 1.0] }
fn default_camera_up() -> [f32; 3] { [0.0, 1.0, 0.0] }
fn default_fov() -> f32 { 60.0 }
fn default_near_clip() -> f32 { 0.01 }
fn default_far_clip() -> f32 { 100.0 }

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: default_camera_position(),
            target: default_camera_target(),
            up: default_camera_up(),
            fov: default_fov(),
            near_clip: default_near_clip(),
            far_clip: default_far_clip(),
        }
    }
}

/// PBR 纹理组（像素着色器槽位 0-3）
///
/// 法线贴图可以缺省，此时槽位 1 保持未绑定。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextureSetConfig {
    #[serde(default = "default_diffuse")]
    pub diffuse: PathBuf,

    #[serde(default = "default_normal")]
    pub normal: Option<PathBuf>,

    #[serde(default = "default_metallic")]
    pub metallic: PathBuf,

    #[serde(default = "default_roughness")]
    pub roughness: PathBuf,
}

fn default_diffuse() -> PathBuf { PathBuf::from("Resources/PavingStones_Color.dds") }
fn default_normal() -> Option<PathBuf> { Some(PathBuf::from("Resources/PavingStones_NormalDX.dds")) }
fn default_metallic() -> PathBuf { PathBuf::from("Resources/PavingStones_Color.dds") }
fn default_roughness() -> PathBuf { PathBuf::from("Resources/rusty_metal_04_rough.dds") }

impl Default for TextureSetConfig {
    fn default() -> Self {
        Self {
            diffuse: default_diffuse(),
            normal: default_normal(),
            metallic: default_metallic(),
            roughness: default_roughness(),
        }
    }
}

/// 主光源配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightConfig {
    #[serde(default = "default_light_color")]
    pub color: [f32; 4],

    /// 聚光角（度数）
    #[serde(default = "default_spot_angle")]
    pub spot_angle: f32,

    /// 常数 / 线性 / 二次衰减
    #[serde(default = "default_attenuation")]
    pub attenuation: [f32; 3],

    /// 跟随的场景对象名称；为空时跟随相机
    #[serde(default)]
    pub attach_to: Option<String>,

    #[serde(default = "default_global_ambient")]
    pub global_ambient: [f32; 4],
}

fn default_light_color() -> [f32; 4] { [1.0, 1.0, 1.0, 1.0] }
fn default_spot_angle() -> f32 { 45.0 }
fn default_attenuation() -> [f32; 3] { [1.0, 1.0, 1.0] }
fn default_global_ambient() -> [f32; 4] { [0.1, 0.1, 0.1, 1.0] }

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            color: default_light_color(),
            spot_angle: default_spot_angle(),
            attenuation: default_attenuation(),
            attach_to: None,
            global_ambient: default_global_ambient(),
        }
    }
}

/// 场景对象的材质
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MaterialConfig {
    /// 使用场景纹理组的 PBR 着色
    Textured {
        #[serde(default = "default_metallic_factor")]
        metallic: f32,
        #[serde(default = "default_roughness_factor")]
        roughness: f32,
    },
    /// 纯色着色
    Solid {
        color: [f32; 4],
    },
}

fn default_metallic_factor() -> f32 { 1.0 }
fn default_roughness_factor() -> f32 { 1.0 }

impl Default for MaterialConfig {
    fn default() -> Self {
        MaterialConfig::Textured {
            metallic: default_metallic_factor(),
            roughness: default_roughness_factor(),
        }
    }
}

/// 绕中心点公转
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrbitConfig {
    #[serde(default = "default_position")]
    pub center: [f32; 3],

    pub radius: f32,

    /// 角速度（度 / 秒）
    pub speed: f32,
}

/// 场景对象配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneObjectConfig {
    pub name: String,

    /// glTF 文件路径
    pub path: PathBuf,

    #[serde(default)]
    pub transform: Transform,

    /// 加载后叠加到顶层节点上的统一缩放
    #[serde(default)]
    pub root_scale: Option<f32>,

    #[serde(default)]
    pub material: MaterialConfig,

    #[serde(default)]
    pub orbit: Option<OrbitConfig>,

    /// 播放的动画片段下标
    #[serde(default)]
    pub animation: Option<usize>,
}

impl Default for SceneObjectConfig {
    fn default() -> Self {
        Self {
            name: "sphere".to_string(),
            path: PathBuf::from("Resources/sphere.gltf"),
            transform: Transform::default(),
            root_scale: None,
            material: MaterialConfig::default(),
            orbit: None,
            animation: Some(0),
        }
    }
}

/// 场景配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneConfig {
    #[serde(default)]
    pub camera: CameraConfig,

    #[serde(default)]
    pub textures: TextureSetConfig,

    #[serde(default)]
    pub light: LightConfig,

    /// 纹理选择器每次前进的间隔（秒）
    #[serde(default = "default_texture_cycle")]
    pub texture_cycle_seconds: f32,

    #[serde(default = "default_objects")]
    pub objects: Vec<SceneObjectConfig>,
}

fn default_texture_cycle() -> f32 { 1.0 }
fn default_objects() -> Vec<SceneObjectConfig> { vec![SceneObjectConfig::default()] }

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            textures: TextureSetConfig::default(),
            light: LightConfig::default(),
            texture_cycle_seconds: default_texture_cycle(),
            objects: default_objects(),
        }
    }
}

impl SceneConfig {
    /// 从文件加载场景配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| FrameworkError::Config(ConfigError::FileNotFound(format!(
                "Failed to read scene config file '{}': {}",
                path.display(),
                e
            ))))?;

        Self::from_toml_str(&contents)
    }

    /// 从 TOML 文本解析并校验
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| FrameworkError::Config(ConfigError::ParseError(format!(
                "Failed to parse scene config: {}",
                e
            ))))?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载，文件不存在时返回默认场景
    ///
    /// 文件存在但无法解析或校验失败时返回错误。
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("Scene config not found, using defaults");
            return Ok(Self::default());
        }
        let config = Self::from_file(path)?;
        tracing::info!("Loaded scene config from: {}", path.display());
        Ok(config)
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        if !(self.texture_cycle_seconds > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "texture_cycle_seconds".to_string(),
                reason: "Texture cycle period must be positive".to_string(),
            }.into());
        }

        let camera = &self.camera;
        if !(camera.near_clip > 0.0) || camera.far_clip <= camera.near_clip {
            return Err(ConfigError::InvalidValue {
                field: "camera.near_clip/far_clip".to_string(),
                reason: "Clip planes must satisfy 0 < near < far".to_string(),
            }.into());
        }

        let up = Vector3::from(camera.up);
        let Some(up) = up.try_normalize(1e-6) else {
            return Err(ConfigError::InvalidValue {
                field: "camera.up".to_string(),
                reason: "Up vector must be non-zero".to_string(),
            }.into());
        };
        if let Some(forward) = (Vector3::from(camera.target) - Vector3::from(camera.position)).try_normalize(1e-6) {
            if up.cross(&forward).norm() < 1e-3 {
                return Err(ConfigError::InvalidValue {
                    field: "camera.up".to_string(),
                    reason: "Up vector must not be parallel to the view direction".to_string(),
                }.into());
            }
        }

        if let Some(name) = &self.light.attach_to {
            if !self.objects.iter().any(|o| &o.name == name) {
                return Err(ConfigError::InvalidValue {
                    field: "light.attach_to".to_string(),
                    reason: format!("No scene object named '{}'", name),
                }.into());
            }
        }

        Ok(())
    }
}
