//! 调试叠加层绘制
//!
//! 把 egui 输出的三角形网格画到当前渲染目标上。使用独立的一套小管线：
//! 预乘 alpha 混合、关闭深度测试、按裁剪矩形开启剪裁。
//! 所有网格拼接进同一对动态顶点 / 索引缓冲区，容量不足时按需增长。

use std::collections::HashMap;
use std::ffi::c_void;

use bytemuck::{Pod, Zeroable};
use tracing::{debug, warn};
use windows::core::s;
use windows::Win32::Foundation::RECT;
use windows::Win32::Graphics::Direct3D::D3D11_PRIMITIVE_TOPOLOGY_TRIANGLELIST;
use windows::Win32::Graphics::Direct3D11::*;
use windows::Win32::Graphics::Dxgi::Common::*;

use crate::core::error::{FrameworkError, GraphicsError, Result};
use crate::gui::OverlayFrame;
use crate::renderer::shaders::{PS_PROFILE, VS_PROFILE};
use crate::renderer::ShaderCompiler;

const OVERLAY_SOURCE: &str = include_str!("shaders/overlay.hlsl");

/// 初始缓冲区容量（顶点 / 索引个数）
const INITIAL_VERTICES: usize = 4096;
const INITIAL_INDICES: usize = 8192;

/// 叠加层顶点（与 overlay.hlsl 的 VS_INPUT 对应）
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
struct OverlayVertex {
    position: [f32; 2],
    uv: [f32; 2],
    color: [u8; 4],
}

impl From<&egui::epaint::Vertex> for OverlayVertex {
    fn from(v: &egui::epaint::Vertex) -> Self {
        Self {
            position: [v.pos.x, v.pos.y],
            uv: [v.uv.x, v.uv.y],
            color: v.color.to_array(),
        }
    }
}

/// `cbuffer OverlayConstants : register(b0)`
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct OverlayConstants {
    /// 屏幕尺寸（逻辑点）
    screen_size: [f32; 2],
    /// 后台缓冲区为线性浮点格式时，在着色器中把 sRGB 颜色转换到线性空间
    linear_output: u32,
    _padding: u32,
}

struct OverlayTexture {
    texture: ID3D11Texture2D,
    view: ID3D11ShaderResourceView,
}

fn overlay_error(what: &str) -> impl FnOnce(windows::core::Error) -> FrameworkError + '_ {
    move |e| GraphicsError::ResourceCreation(format!("overlay {}: {}", what, e)).into()
}

fn missing(what: &str) -> FrameworkError {
    GraphicsError::ResourceCreation(format!("overlay {}: no object returned", what)).into()
}

/// 把 egui 的裁剪矩形（逻辑点）转换为像素剪裁矩形，完全在屏幕外时返回 `None`
fn scissor_rect(clip: egui::Rect, pixels_per_point: f32, target: (u32, u32)) -> Option<RECT> {
    let (width, height) = (target.0 as f32, target.1 as f32);
    let left = (clip.min.x * pixels_per_point).round().clamp(0.0, width);
    let top = (clip.min.y * pixels_per_point).round().clamp(0.0, height);
    let right = (clip.max.x * pixels_per_point).round().clamp(left, width);
    let bottom = (clip.max.y * pixels_per_point).round().clamp(top, height);

    if right <= left || bottom <= top {
        return None;
    }
    Some(RECT {
        left: left as i32,
        top: top as i32,
        right: right as i32,
        bottom: bottom as i32,
    })
}

/// egui 图像数据展开为 RGBA8 字节
fn image_bytes(image: &egui::ImageData) -> (usize, usize, Vec<u8>) {
    match image {
        egui::ImageData::Color(color) => {
            let bytes = color.pixels.iter().flat_map(|c| c.to_array()).collect();
            (color.size[0], color.size[1], bytes)
        }
        egui::ImageData::Font(font) => {
            let bytes = font.srgba_pixels(None).flat_map(|c| c.to_array()).collect();
            (font.size[0], font.size[1], bytes)
        }
    }
}

/// 一帧中要绘制的网格片段
struct DrawBatch {
    clip: egui::Rect,
    texture: egui::TextureId,
    index_start: u32,
    index_count: u32,
    base_vertex: i32,
}

pub struct OverlayPainter {
    vertex_shader: ID3D11VertexShader,
    pixel_shader: ID3D11PixelShader,
    input_layout: ID3D11InputLayout,
    constants: ID3D11Buffer,
    blend_state: ID3D11BlendState,
    rasterizer_state: ID3D11RasterizerState,
    depth_state: ID3D11DepthStencilState,
    sampler: ID3D11SamplerState,
    vertex_buffer: Option<ID3D11Buffer>,
    vertex_capacity: usize,
    index_buffer: Option<ID3D11Buffer>,
    index_capacity: usize,
    textures: HashMap<egui::TextureId, OverlayTexture>,
    linear_output: bool,
}

impl OverlayPainter {
    pub fn new(device: &ID3D11Device, compiler: &dyn ShaderCompiler, linear_output: bool) -> Result<Self> {
        let compile = |entry: &str, profile: &str| {
            compiler
                .compile_source(OVERLAY_SOURCE, "overlay.hlsl", entry, profile)
                .map_err(|diagnostics| -> FrameworkError {
                    GraphicsError::ShaderCompilation {
                        source: "overlay.hlsl".to_string(),
                        entry_point: entry.to_string(),
                        diagnostics,
                    }
                    .into()
                })
        };
        let vs_bytecode = compile("VS", VS_PROFILE)?;
        let ps_bytecode = compile("PS", PS_PROFILE)?;

        unsafe {
            let mut vertex_shader = None;
            device
                .CreateVertexShader(&vs_bytecode, None, Some(&mut vertex_shader))
                .map_err(overlay_error("vertex shader"))?;
            let mut pixel_shader = None;
            device
                .CreatePixelShader(&ps_bytecode, None, Some(&mut pixel_shader))
                .map_err(overlay_error("pixel shader"))?;

            let elements = [
                D3D11_INPUT_ELEMENT_DESC {
                    SemanticName: s!("POSITION"),
                    SemanticIndex: 0,
                    Format: DXGI_FORMAT_R32G32_FLOAT,
                    InputSlot: 0,
                    AlignedByteOffset: D3D11_APPEND_ALIGNED_ELEMENT,
                    InputSlotClass: D3D11_INPUT_PER_VERTEX_DATA,
                    InstanceDataStepRate: 0,
                },
                D3D11_INPUT_ELEMENT_DESC {
                    SemanticName: s!("TEXCOORD"),
                    SemanticIndex: 0,
                    Format: DXGI_FORMAT_R32G32_FLOAT,
                    InputSlot: 0,
                    AlignedByteOffset: D3D11_APPEND_ALIGNED_ELEMENT,
                    InputSlotClass: D3D11_INPUT_PER_VERTEX_DATA,
                    InstanceDataStepRate: 0,
                },
                D3D11_INPUT_ELEMENT_DESC {
                    SemanticName: s!("COLOR"),
                    SemanticIndex: 0,
                    Format: DXGI_FORMAT_R8G8B8A8_UNORM,
                    InputSlot: 0,
                    AlignedByteOffset: D3D11_APPEND_ALIGNED_ELEMENT,
                    InputSlotClass: D3D11_INPUT_PER_VERTEX_DATA,
                    InstanceDataStepRate: 0,
                },
            ];
            let mut input_layout = None;
            device
                .CreateInputLayout(&elements, &vs_bytecode, Some(&mut input_layout))
                .map_err(overlay_error("input layout"))?;

            let constants_desc = D3D11_BUFFER_DESC {
                ByteWidth: std::mem::size_of::<OverlayConstants>() as u32,
                Usage: D3D11_USAGE_DEFAULT,
                BindFlags: D3D11_BIND_CONSTANT_BUFFER.0 as u32,
                ..Default::default()
            };
            let mut constants = None;
            device
                .CreateBuffer(&constants_desc, None, Some(&mut constants))
                .map_err(overlay_error("constant buffer"))?;

            // egui 输出预乘 alpha
            let mut blend_desc = D3D11_BLEND_DESC::default();
            blend_desc.RenderTarget[0] = D3D11_RENDER_TARGET_BLEND_DESC {
                BlendEnable: true.into(),
                SrcBlend: D3D11_BLEND_ONE,
                DestBlend: D3D11_BLEND_INV_SRC_ALPHA,
                BlendOp: D3D11_BLEND_OP_ADD,
                SrcBlendAlpha: D3D11_BLEND_INV_DEST_ALPHA,
                DestBlendAlpha: D3D11_BLEND_ONE,
                BlendOpAlpha: D3D11_BLEND_OP_ADD,
                RenderTargetWriteMask: D3D11_COLOR_WRITE_ENABLE_ALL.0 as u8,
            };
            let mut blend_state = None;
            device
                .CreateBlendState(&blend_desc, Some(&mut blend_state))
                .map_err(overlay_error("blend state"))?;

            let rasterizer_desc = D3D11_RASTERIZER_DESC {
                FillMode: D3D11_FILL_SOLID,
                CullMode: D3D11_CULL_NONE,
                ScissorEnable: true.into(),
                DepthClipEnable: true.into(),
                ..Default::default()
            };
            let mut rasterizer_state = None;
            device
                .CreateRasterizerState(&rasterizer_desc, Some(&mut rasterizer_state))
                .map_err(overlay_error("rasterizer state"))?;

            let depth_desc = D3D11_DEPTH_STENCIL_DESC {
                DepthEnable: false.into(),
                DepthWriteMask: D3D11_DEPTH_WRITE_MASK_ZERO,
                DepthFunc: D3D11_COMPARISON_ALWAYS,
                ..Default::default()
            };
            let mut depth_state = None;
            device
                .CreateDepthStencilState(&depth_desc, Some(&mut depth_state))
                .map_err(overlay_error("depth stencil state"))?;

            let sampler_desc = D3D11_SAMPLER_DESC {
                Filter: D3D11_FILTER_MIN_MAG_MIP_LINEAR,
                AddressU: D3D11_TEXTURE_ADDRESS_CLAMP,
                AddressV: D3D11_TEXTURE_ADDRESS_CLAMP,
                AddressW: D3D11_TEXTURE_ADDRESS_CLAMP,
                ComparisonFunc: D3D11_COMPARISON_NEVER,
                MaxLOD: f32::MAX,
                ..Default::default()
            };
            let mut sampler = None;
            device
                .CreateSamplerState(&sampler_desc, Some(&mut sampler))
                .map_err(overlay_error("sampler"))?;

            debug!(linear_output, "Overlay pipeline created");

            Ok(Self {
                vertex_shader: vertex_shader.ok_or_else(|| missing("vertex shader"))?,
                pixel_shader: pixel_shader.ok_or_else(|| missing("pixel shader"))?,
                input_layout: input_layout.ok_or_else(|| missing("input layout"))?,
                constants: constants.ok_or_else(|| missing("constant buffer"))?,
                blend_state: blend_state.ok_or_else(|| missing("blend state"))?,
                rasterizer_state: rasterizer_state.ok_or_else(|| missing("rasterizer state"))?,
                depth_state: depth_state.ok_or_else(|| missing("depth stencil state"))?,
                sampler: sampler.ok_or_else(|| missing("sampler"))?,
                vertex_buffer: None,
                vertex_capacity: 0,
                index_buffer: None,
                index_capacity: 0,
                textures: HashMap::new(),
                linear_output,
            })
        }
    }

    /// 当前持有的 egui 纹理数量
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn paint(
        &mut self,
        device: &ID3D11Device,
        context: &ID3D11DeviceContext,
        frame: &OverlayFrame,
        target_size: (u32, u32),
    ) -> Result<()> {
        for (id, delta) in &frame.textures_delta.set {
            self.update_texture(device, context, *id, delta)?;
        }

        let mut vertices: Vec<OverlayVertex> = Vec::new();
        let mut indices: Vec<u32> = Vec::new();
        let mut batches = Vec::new();
        for clipped in &frame.primitives {
            let egui::epaint::Primitive::Mesh(mesh) = &clipped.primitive else {
                continue;
            };
            if mesh.indices.is_empty() {
                continue;
            }
            batches.push(DrawBatch {
                clip: clipped.clip_rect,
                texture: mesh.texture_id,
                index_start: indices.len() as u32,
                index_count: mesh.indices.len() as u32,
                base_vertex: vertices.len() as i32,
            });
            vertices.extend(mesh.vertices.iter().map(OverlayVertex::from));
            indices.extend_from_slice(&mesh.indices);
        }

        if !batches.is_empty() {
            self.upload_geometry(device, context, &vertices, &indices)?;
            self.draw_batches(context, &batches, frame.pixels_per_point, target_size);
        }

        for id in &frame.textures_delta.free {
            self.textures.remove(id);
        }
        Ok(())
    }

    fn update_texture(
        &mut self,
        device: &ID3D11Device,
        context: &ID3D11DeviceContext,
        id: egui::TextureId,
        delta: &egui::epaint::ImageDelta,
    ) -> Result<()> {
        let (width, height, bytes) = image_bytes(&delta.image);
        if width == 0 || height == 0 {
            return Ok(());
        }

        if let Some(pos) = delta.pos {
            let Some(existing) = self.textures.get(&id) else {
                warn!(?id, "Partial update for an unknown overlay texture");
                return Ok(());
            };
            let region = D3D11_BOX {
                left: pos[0] as u32,
                top: pos[1] as u32,
                front: 0,
                right: (pos[0] + width) as u32,
                bottom: (pos[1] + height) as u32,
                back: 1,
            };
            unsafe {
                context.UpdateSubresource(
                    &existing.texture,
                    0,
                    Some(&region),
                    bytes.as_ptr() as *const c_void,
                    (width * 4) as u32,
                    0,
                );
            }
            return Ok(());
        }

        let desc = D3D11_TEXTURE2D_DESC {
            Width: width as u32,
            Height: height as u32,
            MipLevels: 1,
            ArraySize: 1,
            Format: DXGI_FORMAT_R8G8B8A8_UNORM,
            SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
            Usage: D3D11_USAGE_DEFAULT,
            BindFlags: D3D11_BIND_SHADER_RESOURCE.0 as u32,
            CPUAccessFlags: 0,
            MiscFlags: 0,
        };
        let initial = D3D11_SUBRESOURCE_DATA {
            pSysMem: bytes.as_ptr() as *const c_void,
            SysMemPitch: (width * 4) as u32,
            SysMemSlicePitch: 0,
        };

        unsafe {
            let mut texture = None;
            device
                .CreateTexture2D(&desc, Some(&initial), Some(&mut texture))
                .map_err(overlay_error("texture"))?;
            let texture = texture.ok_or_else(|| missing("texture"))?;
            let mut view = None;
            device
                .CreateShaderResourceView(&texture, None, Some(&mut view))
                .map_err(overlay_error("texture view"))?;
            let view = view.ok_or_else(|| missing("texture view"))?;
            self.textures.insert(id, OverlayTexture { texture, view });
        }
        debug!(?id, width, height, "Overlay texture uploaded");
        Ok(())
    }

    fn upload_geometry(
        &mut self,
        device: &ID3D11Device,
        context: &ID3D11DeviceContext,
        vertices: &[OverlayVertex],
        indices: &[u32],
    ) -> Result<()> {
        if self.vertex_buffer.is_none() || vertices.len() > self.vertex_capacity {
            let capacity = vertices.len().max(INITIAL_VERTICES).next_power_of_two();
            self.vertex_buffer = Some(create_dynamic_buffer(
                device,
                capacity * std::mem::size_of::<OverlayVertex>(),
                D3D11_BIND_VERTEX_BUFFER,
            )?);
            self.vertex_capacity = capacity;
        }
        if self.index_buffer.is_none() || indices.len() > self.index_capacity {
            let capacity = indices.len().max(INITIAL_INDICES).next_power_of_two();
            self.index_buffer = Some(create_dynamic_buffer(
                device,
                capacity * std::mem::size_of::<u32>(),
                D3D11_BIND_INDEX_BUFFER,
            )?);
            self.index_capacity = capacity;
        }

        if let Some(buffer) = &self.vertex_buffer {
            write_dynamic_buffer(context, buffer, bytemuck::cast_slice(vertices))?;
        }
        if let Some(buffer) = &self.index_buffer {
            write_dynamic_buffer(context, buffer, bytemuck::cast_slice(indices))?;
        }
        Ok(())
    }

    fn draw_batches(
        &self,
        context: &ID3D11DeviceContext,
        batches: &[DrawBatch],
        pixels_per_point: f32,
        target_size: (u32, u32),
    ) {
        let constants = OverlayConstants {
            screen_size: [
                target_size.0 as f32 / pixels_per_point,
                target_size.1 as f32 / pixels_per_point,
            ],
            linear_output: self.linear_output as u32,
            _padding: 0,
        };
        let stride = std::mem::size_of::<OverlayVertex>() as u32;
        let offset = 0u32;

        unsafe {
            context.UpdateSubresource(
                &self.constants,
                0,
                None,
                &constants as *const OverlayConstants as *const c_void,
                0,
                0,
            );

            context.IASetInputLayout(&self.input_layout);
            context.IASetVertexBuffers(0, 1, Some(&self.vertex_buffer), Some(&stride), Some(&offset));
            context.IASetIndexBuffer(self.index_buffer.as_ref(), DXGI_FORMAT_R32_UINT, 0);
            context.IASetPrimitiveTopology(D3D11_PRIMITIVE_TOPOLOGY_TRIANGLELIST);
            context.VSSetShader(&self.vertex_shader, None);
            context.VSSetConstantBuffers(0, Some(&[Some(self.constants.clone())]));
            context.PSSetShader(&self.pixel_shader, None);
            context.PSSetConstantBuffers(0, Some(&[Some(self.constants.clone())]));
            context.PSSetSamplers(0, Some(&[Some(self.sampler.clone())]));
            context.OMSetBlendState(&self.blend_state, Some(&[0.0; 4]), 0xffff_ffff);
            context.OMSetDepthStencilState(&self.depth_state, 0);
            context.RSSetState(&self.rasterizer_state);

            for batch in batches {
                let Some(rect) = scissor_rect(batch.clip, pixels_per_point, target_size) else {
                    continue;
                };
                let Some(texture) = self.textures.get(&batch.texture) else {
                    continue;
                };
                context.RSSetScissorRects(Some(&[rect]));
                context.PSSetShaderResources(0, Some(&[Some(texture.view.clone())]));
                context.DrawIndexed(batch.index_count, batch.index_start, batch.base_vertex);
            }

            context.PSSetShaderResources(0, Some(&[None]));
        }
    }
}

fn create_dynamic_buffer(device: &ID3D11Device, size: usize, bind: D3D11_BIND_FLAG) -> Result<ID3D11Buffer> {
    let desc = D3D11_BUFFER_DESC {
        ByteWidth: size as u32,
        Usage: D3D11_USAGE_DYNAMIC,
        BindFlags: bind.0 as u32,
        CPUAccessFlags: D3D11_CPU_ACCESS_WRITE.0 as u32,
        ..Default::default()
    };
    let mut buffer = None;
    unsafe {
        device
            .CreateBuffer(&desc, None, Some(&mut buffer))
            .map_err(overlay_error("geometry buffer"))?;
    }
    buffer.ok_or_else(|| missing("geometry buffer"))
}

fn write_dynamic_buffer(context: &ID3D11DeviceContext, buffer: &ID3D11Buffer, bytes: &[u8]) -> Result<()> {
    unsafe {
        let mut mapped = D3D11_MAPPED_SUBRESOURCE::default();
        context
            .Map(buffer, 0, D3D11_MAP_WRITE_DISCARD, 0, Some(&mut mapped))
            .map_err(|e| GraphicsError::CommandExecution(format!("overlay map: {}", e)))?;
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), mapped.pData as *mut u8, bytes.len());
        context.Unmap(buffer, 0);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_vertex_is_20_bytes() {
        assert_eq!(std::mem::size_of::<OverlayVertex>(), 20);
        assert_eq!(std::mem::size_of::<OverlayConstants>(), 16);
    }

    #[test]
    fn test_scissor_scales_by_pixels_per_point() {
        let clip = egui::Rect::from_min_max(egui::pos2(10.0, 20.0), egui::pos2(110.0, 70.0));
        let rect = scissor_rect(clip, 2.0, (800, 600)).unwrap();
        assert_eq!((rect.left, rect.top, rect.right, rect.bottom), (20, 40, 220, 140));
    }

    #[test]
    fn test_scissor_clamps_to_target() {
        let clip = egui::Rect::from_min_max(egui::pos2(-50.0, -50.0), egui::pos2(5000.0, 5000.0));
        let rect = scissor_rect(clip, 1.0, (800, 600)).unwrap();
        assert_eq!((rect.left, rect.top, rect.right, rect.bottom), (0, 0, 800, 600));

        let outside = egui::Rect::from_min_max(egui::pos2(900.0, 0.0), egui::pos2(1000.0, 10.0));
        assert!(scissor_rect(outside, 1.0, (800, 600)).is_none());
    }

    #[test]
    fn test_color_image_bytes() {
        let image = egui::ColorImage::new([2, 1], egui::Color32::from_rgb(255, 0, 0));
        let (w, h, bytes) = image_bytes(&egui::ImageData::Color(std::sync::Arc::new(image)));
        assert_eq!((w, h), (2, 1));
        assert_eq!(bytes, vec![255, 0, 0, 255, 255, 0, 0, 255]);
    }
}
