/// glTF 文件加载器
///
/// 使用 `gltf` crate 解析 glTF 2.0 文件，读取节点层级、三角形图元、
/// 蒙皮和动画。缺失的法线和切线会在加载时重建。
use super::{AssetLoader, SceneAsset};
use crate::component::Transform;
use crate::core::error::{AssetLoadError, Result};
use crate::geometry::animation::{AnimationClip, Channel, Interpolation, Keyframes};
use crate::geometry::hierarchy::{NodeDesc, NodeHierarchy};
use crate::geometry::mesh::MeshData;
use crate::geometry::skin::Skin;
use crate::geometry::vertex::SkinnedVertex;
use crate::math::geometry::{compute_tangent_space, reconstruct_normals};
use crate::math::{Matrix4, Quaternion, Vector3};
use gltf::animation::util::ReadOutputs;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// glTF 格式加载器
pub struct GltfLoader;

impl AssetLoader for GltfLoader {
    fn load_from_file(path: &Path) -> Result<SceneAsset> {
        if !path.exists() {
            return Err(AssetLoadError::FileNotFound(path.to_path_buf()).into());
        }

        let gltf = gltf::Gltf::open(path).map_err(AssetLoadError::from)?;
        let gltf::Gltf { document, blob } = gltf;
        let buffers = gltf::import_buffers(&document, path.parent(), blob)
            .map_err(AssetLoadError::from)?;

        let asset = build_asset(&document, &buffers)?;
        debug!(
            path = %path.display(),
            nodes = asset.hierarchy.len(),
            primitives = asset.primitives.len(),
            triangles = asset.triangle_count(),
            animations = asset.animations.len(),
            "glTF asset loaded"
        );
        Ok(asset)
    }

    fn load_from_memory(data: &[u8]) -> Result<SceneAsset> {
        let gltf = gltf::Gltf::from_slice(data).map_err(AssetLoadError::from)?;
        let gltf::Gltf { document, blob } = gltf;
        let buffers = gltf::import_buffers(&document, None, blob).map_err(AssetLoadError::from)?;
        build_asset(&document, &buffers)
    }

    fn supported_extensions() -> &'static [&'static str] {
        &["gltf", "glb"]
    }
}

fn build_asset(document: &gltf::Document, buffers: &[gltf::buffer::Data]) -> Result<SceneAsset> {
    // 图元：glTF mesh 下标 -> 图元下标列表
    let mut primitives = Vec::new();
    let mut mesh_primitives: HashMap<usize, Vec<usize>> = HashMap::new();
    for mesh in document.meshes() {
        let mesh_name = mesh.name().unwrap_or("mesh");
        for (primitive_index, primitive) in mesh.primitives().enumerate() {
            match read_primitive(&primitive, buffers, mesh_name, primitive_index)? {
                Some(data) => {
                    mesh_primitives.entry(mesh.index()).or_default().push(primitives.len());
                    primitives.push(data);
                }
                None => continue,
            }
        }
    }

    // 节点描述
    let descs: Vec<NodeDesc> = document
        .nodes()
        .map(|node| {
            let (translation, rotation, scale) = node.transform().decomposed();
            NodeDesc {
                name: node
                    .name()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("node_{}", node.index())),
                children: node.children().map(|c| c.index()).collect(),
                transform: Transform::from_trs(
                    Vector3::from(translation),
                    quaternion_from_xyzw(rotation),
                    Vector3::from(scale),
                ),
                primitives: node
                    .mesh()
                    .and_then(|m| mesh_primitives.get(&m.index()).cloned())
                    .unwrap_or_default(),
                skin: node.skin().map(|s| s.index()),
            }
        })
        .collect();

    let roots = scene_roots(document);
    let (hierarchy, remap) = NodeHierarchy::build(descs, &roots)?;

    let skins = document
        .skins()
        .map(|skin| {
            let reader = skin.reader(|buffer| Some(&buffers[buffer.index()]));
            let inverse_bind = reader
                .read_inverse_bind_matrices()
                .map(|matrices| matrices.map(Matrix4::from).collect())
                .unwrap_or_default();
            Skin {
                name: skin.name().unwrap_or("skin").to_string(),
                joints: skin.joints().map(|j| remap[j.index()]).collect(),
                inverse_bind,
            }
        })
        .collect();

    let animations = document
        .animations()
        .map(|animation| read_animation(&animation, buffers, &remap))
        .collect();

    Ok(SceneAsset {
        hierarchy,
        primitives,
        skins,
        animations,
    })
}

/// 默认场景的顶层节点；没有场景时取所有没有父节点的节点
fn scene_roots(document: &gltf::Document) -> Vec<usize> {
    if let Some(scene) = document.default_scene().or_else(|| document.scenes().next()) {
        return scene.nodes().map(|n| n.index()).collect();
    }

    let mut has_parent = vec![false; document.nodes().len()];
    for node in document.nodes() {
        for child in node.children() {
            has_parent[child.index()] = true;
        }
    }
    has_parent
        .iter()
        .enumerate()
        .filter(|(_, p)| !**p)
        .map(|(i, _)| i)
        .collect()
}

fn read_primitive(
    primitive: &gltf::Primitive,
    buffers: &[gltf::buffer::Data],
    mesh_name: &str,
    primitive_index: usize,
) -> Result<Option<MeshData>> {
    if primitive.mode() != gltf::mesh::Mode::Triangles {
        warn!(mesh = mesh_name, mode = ?primitive.mode(), "Skipping non-triangle primitive");
        return Ok(None);
    }

    let empty_accessor = primitive.attributes().any(|(_, accessor)| accessor.count() == 0)
        || primitive.indices().is_some_and(|accessor| accessor.count() == 0);
    if empty_accessor {
        warn!(mesh = mesh_name, primitive = primitive_index, "Skipping primitive with an empty accessor");
        return Ok(None);
    }

    let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

    let Some(positions) = reader.read_positions() else {
        warn!(mesh = mesh_name, "Skipping primitive without positions");
        return Ok(None);
    };

    let mut mesh = MeshData::with_name(format!("{}#{}", mesh_name, primitive_index));
    mesh.vertices = positions
        .map(|p| SkinnedVertex::new(p, [0.0, 0.0, 0.0], [0.0, 0.0]))
        .collect();

    let has_normals = match reader.read_normals() {
        Some(normals) => {
            for (vertex, normal) in mesh.vertices.iter_mut().zip(normals) {
                vertex.normal = normal;
            }
            true
        }
        None => false,
    };

    let has_texcoords = match reader.read_tex_coords(0) {
        Some(texcoords) => {
            for (vertex, uv) in mesh.vertices.iter_mut().zip(texcoords.into_f32()) {
                vertex.texcoord = uv;
            }
            true
        }
        None => false,
    };

    let has_tangents = match reader.read_tangents() {
        Some(tangents) => {
            for (vertex, tangent) in mesh.vertices.iter_mut().zip(tangents) {
                vertex.tangent = tangent;
            }
            true
        }
        None => false,
    };

    if let Some(joints) = reader.read_joints(0) {
        for (vertex, joint) in mesh.vertices.iter_mut().zip(joints.into_u16()) {
            vertex.bone_indices = joint.map(u32::from);
        }
    }

    if let Some(weights) = reader.read_weights(0) {
        for (vertex, weight) in mesh.vertices.iter_mut().zip(weights.into_f32()) {
            vertex.bone_weights = weight;
        }
    }

    mesh.indices = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..mesh.vertices.len() as u32).collect(),
    };

    if mesh.is_empty() {
        warn!(mesh = mesh_name, primitive = primitive_index, "Skipping empty primitive");
        return Ok(None);
    }

    mesh.validate()
        .map_err(|e| AssetLoadError::InvalidGeometry(format!("{}: {}", mesh_name, e)))?;

    if !has_normals {
        reconstruct_normals(&mut mesh.vertices, &mesh.indices);
    }
    if !has_tangents && has_texcoords {
        compute_tangent_space(&mut mesh.vertices, &mesh.indices);
    }

    Ok(Some(mesh))
}

fn read_animation(
    animation: &gltf::Animation,
    buffers: &[gltf::buffer::Data],
    remap: &[Option<usize>],
) -> AnimationClip {
    let name = animation
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("animation_{}", animation.index()));

    let mut channels = Vec::new();
    for channel in animation.channels() {
        let Some(node) = remap.get(channel.target().node().index()).copied().flatten() else {
            continue;
        };

        let reader = channel.reader(|buffer| Some(&buffers[buffer.index()]));
        let timestamps: Vec<f32> = match reader.read_inputs() {
            Some(inputs) => inputs.collect(),
            None => continue,
        };

        let (interpolation, cubic) = match channel.sampler().interpolation() {
            gltf::animation::Interpolation::Step => (Interpolation::Step, false),
            gltf::animation::Interpolation::Linear => (Interpolation::Linear, false),
            gltf::animation::Interpolation::CubicSpline => (Interpolation::Linear, true),
        };

        let keyframes = match reader.read_outputs() {
            Some(ReadOutputs::Translations(values)) => {
                Keyframes::Translation(spline_values(values.map(Vector3::from).collect(), cubic))
            }
            Some(ReadOutputs::Rotations(values)) => Keyframes::Rotation(spline_values(
                values.into_f32().map(quaternion_from_xyzw).collect(),
                cubic,
            )),
            Some(ReadOutputs::Scales(values)) => {
                Keyframes::Scale(spline_values(values.map(Vector3::from).collect(), cubic))
            }
            Some(ReadOutputs::MorphTargetWeights(_)) | None => continue,
        };

        channels.push(Channel {
            node,
            timestamps,
            keyframes,
            interpolation,
        });
    }

    AnimationClip::new(name, channels)
}

/// 三次样条的输出按 (入切线, 数值, 出切线) 排列，只保留数值
fn spline_values<T: Copy>(values: Vec<T>, cubic: bool) -> Vec<T> {
    if cubic {
        values.chunks_exact(3).map(|c| c[1]).collect()
    } else {
        values
    }
}

fn quaternion_from_xyzw(q: [f32; 4]) -> Quaternion {
    Quaternion::new_normalize(nalgebra::Quaternion::new(q[3], q[0], q[1], q[2]))
}
