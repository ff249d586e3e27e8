//! 场景
//!
//! Scene 持有相机、光照、PBR 纹理组、采样器以及所有 SceneObject，
//! 负责每帧的时间驱动状态和常量缓冲区上传。
//!
//! # 每帧顺序
//!
//! 1. 推进场景时间、纹理选择器、公转对象、灯光位置
//! 2. 绑定纹理槽位 0-3 和采样器 0
//! 3. 上传并绑定每次绘制的常量（VS/PS b0）
//! 4. 上传并绑定光照常量（PS b1）
//! 5. 按声明顺序：选择像素着色器、上传材质（PS b2）、推进动画、绘制

use std::path::Path;

use tracing::{debug, error, info};

use crate::component::{Camera, Light, LightProperties, MAX_LIGHTS};
use crate::core::error::{AssetLoadError, Result};
use crate::core::scene::{MaterialConfig, OrbitConfig, SceneConfig};
use crate::math::{utils, Matrix4, Vector3};
use crate::renderer::backend_trait::RenderContext;
use crate::renderer::constant_buffer::{BoneConstants, MaterialConstants, PerDrawConstants, MAX_BONES};
use crate::renderer::layout;
use crate::renderer::resource::{
    BufferDescriptor, BufferHandle, PixelShaderHandle, ResourceTable, SamplerDescriptor,
    SamplerHandle, ShaderStage, TextureDescriptor, TextureHandle,
};
use crate::renderer::scene_object::{DrawState, SceneObject, PER_DRAW_SLOT};

/// 光照常量缓冲区寄存器（PS）
pub const LIGHT_SLOT: u32 = 1;
/// 材质常量缓冲区寄存器（PS）
pub const MATERIAL_SLOT: u32 = 2;
/// 纹理选择器的取值个数
pub const TEXTURE_SELECT_COUNT: u32 = 4;

/// 纹理选择器
///
/// 每经过 `period` 秒前进一次，取值 0, 1, 2, 3, 0, ...
#[derive(Debug, Clone)]
pub struct TextureSelector {
    period: f32,
    accumulator: f32,
    value: u32,
}

impl TextureSelector {
    pub fn new(period: f32) -> Self {
        Self {
            period,
            accumulator: 0.0,
            value: 0,
        }
    }

    pub fn advance(&mut self, delta_time: f32) {
        if !(self.period > 0.0) {
            return;
        }
        self.accumulator += delta_time.max(0.0);
        while self.accumulator >= self.period {
            self.accumulator -= self.period;
            self.value = (self.value + 1) % TEXTURE_SELECT_COUNT;
        }
    }

    pub fn value(&self) -> u32 {
        self.value
    }
}

/// PBR 纹理组，槽位顺序即着色器寄存器 t0-t3
#[derive(Debug, Clone, Copy)]
struct TextureSet {
    diffuse: TextureHandle,
    normal: Option<TextureHandle>,
    metallic: TextureHandle,
    roughness: TextureHandle,
}

impl TextureSet {
    fn slots(&self) -> [Option<TextureHandle>; 4] {
        [Some(self.diffuse), self.normal, Some(self.metallic), Some(self.roughness)]
    }
}

/// 场景中的一个对象及其材质 / 公转参数
#[derive(Debug)]
struct SceneEntry {
    object: SceneObject,
    /// 配置中的模型变换，公转在它之前平移
    base_transform: Matrix4,
    pixel_shader: PixelShaderHandle,
    material: MaterialConstants,
    orbit: Option<OrbitConfig>,
}

/// 灯光跟随的目标
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LightAnchor {
    Camera,
    Object(usize),
}

/// 场景
pub struct Scene {
    camera: Camera,
    light_properties: LightProperties,
    light_anchor: LightAnchor,
    entries: Vec<SceneEntry>,
    textures: TextureSet,
    sampler: SamplerHandle,
    per_draw_buffer: BufferHandle,
    light_buffer: BufferHandle,
    material_buffer: BufferHandle,
    output_color: [f32; 4],
    selector: TextureSelector,
    time: f32,
}

/// 初始化过程中已经创建的资源，失败时统一释放
#[derive(Default)]
struct Created {
    buffers: Vec<BufferHandle>,
    textures: Vec<TextureHandle>,
    samplers: Vec<SamplerHandle>,
    entries: Vec<SceneEntry>,
}

impl Created {
    fn release(mut self, ctx: &mut dyn RenderContext) {
        for entry in &mut self.entries {
            entry.object.release(ctx);
        }
        for buffer in self.buffers {
            ctx.release_buffer(buffer);
        }
        for texture in self.textures {
            ctx.release_texture(texture);
        }
        for sampler in self.samplers {
            ctx.release_sampler(sampler);
        }
    }
}

/// 检查所有常量缓冲区结构与着色器布局一致
pub fn verify_constant_layouts() -> Result<()> {
    layout::verify::<PerDrawConstants>(&layout::per_draw_layout())?;
    layout::verify::<LightProperties>(&layout::light_properties_layout(MAX_LIGHTS))?;
    layout::verify::<MaterialConstants>(&layout::material_layout())?;
    layout::verify::<BoneConstants>(&layout::bones_layout(MAX_BONES))?;
    Ok(())
}

fn translation_of(m: &Matrix4) -> Vector3 {
    Vector3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)])
}

/// 读取图片文件并上传为 RGBA8 纹理
fn load_texture(ctx: &mut dyn RenderContext, path: &Path) -> Result<TextureHandle> {
    if !path.exists() {
        return Err(AssetLoadError::FileNotFound(path.to_path_buf()).into());
    }
    let image = image::open(path)
        .map_err(|e| AssetLoadError::ParseError(format!("{}: {}", path.display(), e)))?
        .to_rgba8();
    let (width, height) = image.dimensions();
    let desc = TextureDescriptor::rgba8(width, height).with_name(path.display().to_string());
    let texture = ctx.create_texture(&desc, image.as_raw())?;
    debug!(path = %path.display(), width, height, "Texture loaded");
    Ok(texture)
}

impl Scene {
    /// 创建场景的全部资源
    ///
    /// 任何资源创建或资源加载失败都会返回错误，已经创建的资源在返回前释放。
    pub fn initialize(
        window_size: (u32, u32),
        ctx: &mut dyn RenderContext,
        resources: ResourceTable,
        config: &SceneConfig,
    ) -> Result<Self> {
        verify_constant_layouts()?;

        let mut created = Created::default();
        match Self::create(window_size, ctx, resources, config, &mut created) {
            Ok(scene) => Ok(scene),
            Err(e) => {
                error!("Scene initialization failed: {}", e);
                created.release(ctx);
                Err(e)
            }
        }
    }

    fn create(
        (width, height): (u32, u32),
        ctx: &mut dyn RenderContext,
        resources: ResourceTable,
        config: &SceneConfig,
        created: &mut Created,
    ) -> Result<Self> {
        let per_draw_buffer = ctx.create_buffer(
            &BufferDescriptor::constant::<PerDrawConstants>().with_name("per-draw constants"),
            None,
        )?;
        created.buffers.push(per_draw_buffer);
        let light_buffer = ctx.create_buffer(
            &BufferDescriptor::constant::<LightProperties>().with_name("light properties"),
            None,
        )?;
        created.buffers.push(light_buffer);
        let material_buffer = ctx.create_buffer(
            &BufferDescriptor::constant::<MaterialConstants>().with_name("material"),
            None,
        )?;
        created.buffers.push(material_buffer);

        let diffuse = load_texture(ctx, &config.textures.diffuse)?;
        created.textures.push(diffuse);
        let normal = match &config.textures.normal {
            Some(path) => {
                let texture = load_texture(ctx, path)?;
                created.textures.push(texture);
                Some(texture)
            }
            None => None,
        };
        let metallic = load_texture(ctx, &config.textures.metallic)?;
        created.textures.push(metallic);
        let roughness = load_texture(ctx, &config.textures.roughness)?;
        created.textures.push(roughness);

        let sampler = ctx.create_sampler(&SamplerDescriptor::anisotropic_wrap())?;
        created.samplers.push(sampler);

        for object_config in &config.objects {
            let mut object = SceneObject::new(object_config.name.clone());
            let loaded = match object.load(ctx, &object_config.path) {
                Ok(loaded) => loaded,
                Err(e) => {
                    object.release(ctx);
                    return Err(e);
                }
            };
            if !loaded {
                return Err(AssetLoadError::SceneObject {
                    name: object_config.name.clone(),
                    path: object_config.path.clone(),
                }
                .into());
            }

            let base_transform = object_config.transform.to_matrix();
            object.set_root_transform(base_transform);
            if let Some(factor) = object_config.root_scale {
                object.add_scale_to_roots(factor);
            }
            object.set_animation(object_config.animation);

            let (pixel_shader, material) = match object_config.material {
                MaterialConfig::Textured { metallic, roughness } => (
                    resources.textured_ps,
                    MaterialConstants::new([1.0, 1.0, 1.0, 1.0], metallic, roughness),
                ),
                MaterialConfig::Solid { color } => {
                    (resources.solid_ps, MaterialConstants::new(color, 0.0, 1.0))
                }
            };

            created.entries.push(SceneEntry {
                object,
                base_transform,
                pixel_shader,
                material,
                orbit: object_config.orbit.clone(),
            });
        }

        let entries = std::mem::take(&mut created.entries);
        let camera = Camera::from_config(&config.camera, width, height);

        let light_anchor = match &config.light.attach_to {
            Some(name) => entries
                .iter()
                .position(|e| e.object.name() == name.as_str())
                .map(LightAnchor::Object)
                .unwrap_or(LightAnchor::Camera),
            None => LightAnchor::Camera,
        };
        let mut light_properties = LightProperties::new(config.light.global_ambient);
        light_properties.set_light(0, Light::from_config(&config.light, camera.position()));
        light_properties.set_eye_position(camera.position());

        info!(
            objects = entries.len(),
            width,
            height,
            normal_map = normal.is_some(),
            "Scene initialized"
        );

        // 之后由 Scene 自己负责释放
        created.buffers.clear();
        created.textures.clear();
        created.samplers.clear();

        let mut scene = Self {
            camera,
            light_properties,
            light_anchor,
            entries,
            textures: TextureSet {
                diffuse,
                normal,
                metallic,
                roughness,
            },
            sampler,
            per_draw_buffer,
            light_buffer,
            material_buffer,
            output_color: [0.0, 0.0, 0.0, 0.0],
            selector: TextureSelector::new(config.texture_cycle_seconds),
            time: 0.0,
        };
        scene.update_orbits();
        scene.update_light_anchor();
        Ok(scene)
    }

    /// 推进一帧并绘制所有对象
    pub fn update(&mut self, ctx: &mut dyn RenderContext, delta_time: f32) -> Result<()> {
        let delta_time = delta_time.max(0.0);
        self.time += delta_time;
        self.selector.advance(delta_time);
        self.update_orbits();
        self.update_light_anchor();

        for (slot, texture) in self.textures.slots().into_iter().enumerate() {
            if texture.is_some() {
                ctx.bind_texture(slot as u32, texture)?;
            }
        }
        ctx.bind_sampler(0, self.sampler)?;

        let mut constants = PerDrawConstants::new(self.output_color, self.selector.value());
        let view = self.camera.view_matrix();
        constants.set_view_projection(&view, &self.camera.projection_matrix());
        ctx.update_buffer(self.per_draw_buffer, bytemuck::bytes_of(&constants))?;
        ctx.bind_constant_buffer(ShaderStage::Vertex, PER_DRAW_SLOT, self.per_draw_buffer)?;
        ctx.bind_constant_buffer(ShaderStage::Pixel, PER_DRAW_SLOT, self.per_draw_buffer)?;

        self.light_properties.set_eye_position(self.camera.position());
        ctx.update_buffer(self.light_buffer, bytemuck::bytes_of(&self.light_properties))?;
        ctx.bind_constant_buffer(ShaderStage::Pixel, LIGHT_SLOT, self.light_buffer)?;

        let mut state = DrawState {
            per_draw_buffer: self.per_draw_buffer,
            constants,
        };
        for entry in &mut self.entries {
            ctx.set_pixel_shader(entry.pixel_shader)?;
            ctx.update_buffer(self.material_buffer, bytemuck::bytes_of(&entry.material))?;
            ctx.bind_constant_buffer(ShaderStage::Pixel, MATERIAL_SLOT, self.material_buffer)?;

            entry.object.animate_frame(ctx, delta_time)?;
            entry.object.render_frame(ctx, &mut state)?;
        }
        Ok(())
    }

    /// 公转对象：绕中心在 XZ 平面上旋转，角度 = 时间 × 角速度
    fn update_orbits(&mut self) {
        let time = self.time;
        for entry in &mut self.entries {
            let Some(orbit) = &entry.orbit else {
                continue;
            };
            let angle = utils::deg_to_rad(orbit.speed * time);
            let offset = Vector3::new(
                orbit.center[0] + orbit.radius * angle.cos(),
                orbit.center[1],
                orbit.center[2] + orbit.radius * angle.sin(),
            );
            entry
                .object
                .set_root_transform(Matrix4::new_translation(&offset) * entry.base_transform);
        }
    }

    fn update_light_anchor(&mut self) {
        let position = match self.light_anchor {
            LightAnchor::Camera => self.camera.position(),
            LightAnchor::Object(index) => match self.entries.get(index) {
                Some(entry) => translation_of(entry.object.root_transform()),
                None => self.camera.position(),
            },
        };
        self.light_properties.set_light_position(0, position);
    }

    /// 设置光源位置；下标越界时不做任何修改
    ///
    /// 跟随对象或相机的主光源（下标 0）会在下一帧被覆盖。
    pub fn set_light_position(&mut self, index: usize, position: Vector3) {
        self.light_properties.set_light_position(index, position);
    }

    pub fn light_properties(&self) -> &LightProperties {
        &self.light_properties
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    /// 场景时间（秒）
    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn texture_select(&self) -> u32 {
        self.selector.value()
    }

    pub fn object_count(&self) -> usize {
        self.entries.len()
    }

    pub fn object(&self, name: &str) -> Option<&SceneObject> {
        self.entries.iter().map(|e| &e.object).find(|o| o.name() == name)
    }

    pub fn triangle_count(&self) -> usize {
        self.entries.iter().map(|e| e.object.triangle_count()).sum()
    }

    /// 释放场景创建的所有资源（必须在设备释放之前调用）
    pub fn release(&mut self, ctx: &mut dyn RenderContext) {
        for entry in &mut self.entries {
            entry.object.release(ctx);
        }
        self.entries.clear();

        for texture in self.textures.slots().into_iter().flatten() {
            ctx.release_texture(texture);
        }
        ctx.release_sampler(self.sampler);
        ctx.release_buffer(self.per_draw_buffer);
        ctx.release_buffer(self.light_buffer);
        ctx.release_buffer(self.material_buffer);
        info!("Scene released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::backend_trait::FrameTarget;
    use crate::renderer::shaders::CompiledStage;
    use crate::renderer::testing::{fixtures, Call, MockContext};

    fn resource_table(ctx: &mut MockContext) -> ResourceTable {
        let stage = |entry: &str| CompiledStage {
            source: "test.hlsl".into(),
            entry_point: entry.to_string(),
            profile: "ps_4_0".to_string(),
            bytecode: vec![1],
        };
        ResourceTable {
            textured_ps: ctx.create_pixel_shader(&stage("PS_Normal")).unwrap(),
            solid_ps: ctx.create_pixel_shader(&stage("PS_SolidColor")).unwrap(),
        }
    }

    fn scene(ctx: &mut MockContext) -> (Scene, ResourceTable, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = fixtures::scene_config(dir.path());
        let table = resource_table(ctx);
        let scene = Scene::initialize((800, 600), ctx, table, &config).unwrap();
        (scene, table, dir)
    }

    #[test]
    fn test_texture_selector_cycles() {
        let mut selector = TextureSelector::new(1.0);
        for seconds in 1..=9u32 {
            selector.advance(0.5);
            selector.advance(0.5);
            assert_eq!(selector.value(), seconds % 4);
        }
    }

    #[test]
    fn test_texture_selector_with_custom_period() {
        let mut selector = TextureSelector::new(0.25);
        selector.advance(0.75);
        assert_eq!(selector.value(), 3);
        selector.advance(0.25);
        assert_eq!(selector.value(), 0);
    }

    #[test]
    fn test_constant_layouts_match_shaders() {
        assert!(verify_constant_layouts().is_ok());
    }

    #[test]
    fn test_initialize_creates_resources() {
        let mut ctx = MockContext::new(800, 600);
        let (scene, _, _dir) = scene(&mut ctx);

        assert_eq!(scene.object_count(), 2);
        assert_eq!(scene.triangle_count(), 2);
        // 3 个常量缓冲区 + 每个对象的顶点 / 索引缓冲区
        let live = ctx.live();
        assert_eq!(live.buffers, 3 + 4);
        assert_eq!(live.textures, 3);
        assert_eq!(live.samplers, 1);
    }

    #[test]
    fn test_update_order() {
        let mut ctx = MockContext::new(800, 600);
        let (mut scene, table, _dir) = scene(&mut ctx);
        ctx.calls.clear();

        scene.update(&mut ctx, 0.016).unwrap();

        let per_draw = ctx.find_buffer("per-draw constants").unwrap();
        let light = ctx.find_buffer("light properties").unwrap();
        let material = ctx.find_buffer("material").unwrap();

        let position = |call: &Call| ctx.calls.iter().position(|c| c == call).unwrap();
        let sampler = position(&Call::BindSampler(0, scene.sampler));
        let per_draw_bind = position(&Call::BindConstantBuffer(ShaderStage::Vertex, 0, per_draw));
        let light_bind = position(&Call::BindConstantBuffer(ShaderStage::Pixel, 1, light));
        let textured = position(&Call::SetPixelShader(table.textured_ps));
        let solid = position(&Call::SetPixelShader(table.solid_ps));
        let first_draw = ctx.calls.iter().position(|c| matches!(c, Call::Draw(_))).unwrap();

        assert!(matches!(ctx.calls[0], Call::BindTexture(0, Some(_))));
        assert!(sampler < per_draw_bind);
        assert!(per_draw_bind < light_bind);
        assert!(light_bind < textured);
        assert!(textured < first_draw);
        assert!(first_draw < solid);
        assert!(ctx
            .calls
            .contains(&Call::BindConstantBuffer(ShaderStage::Pixel, MATERIAL_SLOT, material)));
        assert_eq!(ctx.draw_count(), 2);
    }

    #[test]
    fn test_missing_normal_map_leaves_slot_unbound() {
        let mut ctx = MockContext::new(800, 600);
        let (mut scene, _, _dir) = scene(&mut ctx);
        ctx.calls.clear();
        scene.update(&mut ctx, 0.0).unwrap();

        let bound: Vec<u32> = ctx
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::BindTexture(slot, Some(_)) => Some(*slot),
                _ => None,
            })
            .collect();
        assert_eq!(bound, vec![0, 2, 3]);
    }

    #[test]
    fn test_texture_select_reaches_constants() {
        let mut ctx = MockContext::new(800, 600);
        let (mut scene, _, _dir) = scene(&mut ctx);

        for _ in 0..3 {
            scene.update(&mut ctx, 0.5).unwrap();
        }
        assert_eq!(scene.texture_select(), 1);
        assert!((scene.time() - 1.5).abs() < 1e-6);

        // 每次绘制都会重写 world，view / projection / 选择器保持本帧的值
        let per_draw = ctx.find_buffer("per-draw constants").unwrap();
        let data = ctx.buffer_data(per_draw).unwrap();
        let constants: PerDrawConstants =
            bytemuck::pod_read_unaligned(&data[..std::mem::size_of::<PerDrawConstants>()]);
        assert_eq!(constants.texture_select, 1.0);
        assert_eq!(constants.output_color, [0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_orbit_and_attached_light() {
        let mut ctx = MockContext::new(800, 600);
        let (mut scene, _, _dir) = scene(&mut ctx);

        // 90 度 / 秒，1 秒后位于 (0, 0, 2)
        scene.update(&mut ctx, 1.0).unwrap();
        let moon = scene.object("moon").unwrap();
        let p = translation_of(moon.root_transform());
        assert!(p.x.abs() < 1e-5);
        assert!((p.z - 2.0).abs() < 1e-5);

        let light = scene.light_properties().lights[0];
        assert!((light.position[2] - 2.0).abs() < 1e-5);
        assert_eq!(scene.light_properties().eye_position, [0.0, 0.0, -6.0, 1.0]);
    }

    #[test]
    fn test_light_follows_camera_without_anchor() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = fixtures::scene_config(dir.path());
        config.light.attach_to = None;

        let mut ctx = MockContext::new(800, 600);
        let table = resource_table(&mut ctx);
        let mut scene = Scene::initialize((800, 600), &mut ctx, table, &config).unwrap();

        scene.camera_mut().move_forward(1.0);
        scene.update(&mut ctx, 0.1).unwrap();
        let light = scene.light_properties().lights[0];
        assert!((light.position[2] - (-5.0)).abs() < 1e-5);
    }

    #[test]
    fn test_set_light_position_out_of_range_is_noop() {
        let mut ctx = MockContext::new(800, 600);
        let (mut scene, _, _dir) = scene(&mut ctx);

        let before = *scene.light_properties();
        scene.set_light_position(MAX_LIGHTS, Vector3::new(9.0, 9.0, 9.0));
        assert_eq!(*scene.light_properties(), before);

        scene.set_light_position(1, Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(scene.light_properties().lights[1].position, [1.0, 2.0, 3.0, 1.0]);
    }

    #[test]
    fn test_missing_object_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = fixtures::scene_config(dir.path());
        config.objects[1].path = dir.path().join("missing.gltf");

        let mut ctx = MockContext::new(800, 600);
        let table = resource_table(&mut ctx);
        let err = Scene::initialize((800, 600), &mut ctx, table, &config).err().unwrap();
        assert!(err.to_string().contains("moon"));

        // 失败前创建的资源全部释放，只剩共享的像素着色器
        let live = ctx.live();
        assert_eq!(live.buffers + live.textures + live.samplers, 0);
    }

    #[test]
    fn test_missing_texture_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = fixtures::scene_config(dir.path());
        config.textures.roughness = dir.path().join("nope.png");

        let mut ctx = MockContext::new(800, 600);
        let table = resource_table(&mut ctx);
        assert!(Scene::initialize((800, 600), &mut ctx, table, &config).is_err());
        assert_eq!(ctx.live().textures, 0);
    }

    #[test]
    fn test_resource_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let config = fixtures::scene_config(dir.path());

        let mut ctx = MockContext::new(800, 600);
        let table = resource_table(&mut ctx);
        // 两个像素着色器之后的第二个常量缓冲区
        ctx.fail_creation_at = Some(3);
        assert!(Scene::initialize((800, 600), &mut ctx, table, &config).is_err());
        assert_eq!(ctx.live().buffers, 0);
    }

    #[test]
    fn test_release_frees_everything() {
        let mut ctx = MockContext::new(800, 600);
        let (mut scene, table, _dir) = scene(&mut ctx);
        scene.update(&mut ctx, 0.016).unwrap();
        scene.release(&mut ctx);

        ctx.release_pixel_shader(table.textured_ps);
        ctx.release_pixel_shader(table.solid_ps);
        assert!(ctx.live().is_clean());
    }
}
