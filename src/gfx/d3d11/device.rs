//! Direct3D 11 设备封装
//!
//! [`D3D11Factory`] 包装 `D3D11CreateDevice`，交给 [`negotiate`](crate::gfx::backend::negotiate)
//! 按驱动类型和特性级别依次尝试。协商成功后由 [`D3D11Device::new`] 完成剩余的初始化：
//!
//! 1. 从设备取得 DXGI 工厂（device → adapter → parent factory）
//! 2. 创建交换链：优先 `IDXGIFactory2::CreateSwapChainForHwnd`（R16G16B16A16_FLOAT），
//!    否则回退到 `IDXGIFactory1::CreateSwapChain`（R8G8B8A8_UNORM，60 Hz）
//! 3. 禁用 Alt+Enter 全屏切换
//! 4. 创建后台缓冲区 RTV、D24S8 深度纹理和 DSV
//! 5. 绑定渲染目标和全窗口视口
//!
//! 上层拿到的只是 [`ResourceSlab`] 中的句柄，COM 对象在释放句柄或关闭设备时析构。

use std::ffi::c_void;

use tracing::{debug, info, warn};
use windows::core::{s, Interface, PCSTR};
use windows::Win32::Foundation::{E_INVALIDARG, HMODULE, HWND};
use windows::Win32::Graphics::Direct3D::*;
use windows::Win32::Graphics::Direct3D11::*;
use windows::Win32::Graphics::Dxgi::Common::*;
use windows::Win32::Graphics::Dxgi::*;

use crate::core::error::{FrameworkError, GraphicsError, Result};
use crate::geometry::vertex::{AttributeFormat, Semantic, VERTEX_ATTRIBUTES};
use crate::gfx::backend::{CreateError, DeviceFactory, DriverType, FeatureLevel, NegotiatedDevice};
use crate::gfx::d3d11::overlay::OverlayPainter;
use crate::gfx::d3d11::shader::D3DCompiler;
use crate::gui::OverlayFrame;
use crate::renderer::resource::{
    invalid_handle, AddressMode, BufferDescriptor, BufferHandle, BufferUsageType, LiveObjectReport,
    PixelShaderHandle, ResourceSlab, SamplerDescriptor, SamplerHandle, ShaderStage, TextureDescriptor,
    TextureHandle, VertexShaderHandle,
};
use crate::renderer::shaders::CompiledStage;
use crate::renderer::{FrameTarget, RenderContext};

fn to_d3d(level: FeatureLevel) -> D3D_FEATURE_LEVEL {
    match level {
        FeatureLevel::Level10_0 => D3D_FEATURE_LEVEL_10_0,
        FeatureLevel::Level10_1 => D3D_FEATURE_LEVEL_10_1,
        FeatureLevel::Level11_0 => D3D_FEATURE_LEVEL_11_0,
        FeatureLevel::Level11_1 => D3D_FEATURE_LEVEL_11_1,
    }
}

fn from_d3d(level: D3D_FEATURE_LEVEL) -> Option<FeatureLevel> {
    match level {
        D3D_FEATURE_LEVEL_10_0 => Some(FeatureLevel::Level10_0),
        D3D_FEATURE_LEVEL_10_1 => Some(FeatureLevel::Level10_1),
        D3D_FEATURE_LEVEL_11_0 => Some(FeatureLevel::Level11_0),
        D3D_FEATURE_LEVEL_11_1 => Some(FeatureLevel::Level11_1),
        _ => None,
    }
}

fn driver_type(driver: DriverType) -> D3D_DRIVER_TYPE {
    match driver {
        DriverType::Hardware => D3D_DRIVER_TYPE_HARDWARE,
        DriverType::Warp => D3D_DRIVER_TYPE_WARP,
        DriverType::Reference => D3D_DRIVER_TYPE_REFERENCE,
    }
}

fn creation_error(what: &str) -> impl FnOnce(windows::core::Error) -> FrameworkError + '_ {
    move |e| GraphicsError::ResourceCreation(format!("{}: {}", what, e)).into()
}

fn swapchain_error(what: &str) -> impl FnOnce(windows::core::Error) -> FrameworkError + '_ {
    move |e| GraphicsError::SwapchainError(format!("{}: {}", what, e)).into()
}

fn missing(what: &str) -> FrameworkError {
    GraphicsError::ResourceCreation(format!("{}: no object returned", what)).into()
}

/// `D3D11CreateDevice` 得到的设备和立即上下文
pub struct RawDevice {
    pub device: ID3D11Device,
    pub context: ID3D11DeviceContext,
}

/// 解绑渲染目标、清空状态并刷新所有立即上下文，返回刷新的上下文数量
fn unbind_and_flush(context: &ID3D11DeviceContext, context1: Option<&ID3D11DeviceContext1>) -> usize {
    unsafe {
        context.OMSetRenderTargets(None, None::<&ID3D11DepthStencilView>);
        context.ClearState();
        if let Some(context1) = context1 {
            context1.Flush();
        }
        context.Flush();
    }
    1 + usize::from(context1.is_some())
}

/// `D3D11CreateDevice` 的包装
#[derive(Debug, Clone, Copy)]
pub struct D3D11Factory {
    debug_layer: bool,
}

impl D3D11Factory {
    pub fn new(debug_layer: bool) -> Self {
        Self { debug_layer }
    }

    /// 调试层是否实际启用（系统未安装调试层时会被关闭）
    pub fn debug_layer(&self) -> bool {
        self.debug_layer
    }

    fn try_create(
        &self,
        driver: DriverType,
        levels: &[D3D_FEATURE_LEVEL],
    ) -> windows::core::Result<(RawDevice, D3D_FEATURE_LEVEL)> {
        let mut flags = D3D11_CREATE_DEVICE_BGRA_SUPPORT;
        if self.debug_layer {
            flags |= D3D11_CREATE_DEVICE_DEBUG;
        }

        let mut device = None;
        let mut context = None;
        let mut feature_level = D3D_FEATURE_LEVEL_10_0;
        unsafe {
            D3D11CreateDevice(
                None,
                driver_type(driver),
                HMODULE::default(),
                flags,
                Some(levels),
                D3D11_SDK_VERSION,
                Some(&mut device),
                Some(&mut feature_level),
                Some(&mut context),
            )?;
        }

        match (device, context) {
            (Some(device), Some(context)) => Ok((RawDevice { device, context }, feature_level)),
            _ => Err(windows::core::Error::from_hresult(windows::Win32::Foundation::E_POINTER)),
        }
    }
}

impl DeviceFactory for D3D11Factory {
    type Device = RawDevice;

    fn create(
        &mut self,
        driver: DriverType,
        levels: &[FeatureLevel],
    ) -> std::result::Result<(RawDevice, FeatureLevel), CreateError> {
        let requested: Vec<D3D_FEATURE_LEVEL> = levels.iter().copied().map(to_d3d).collect();

        let result = match self.try_create(driver, &requested) {
            Err(e) if self.debug_layer && e.code() == DXGI_ERROR_SDK_COMPONENT_MISSING => {
                warn!("D3D11 debug layer is not installed, continuing without it");
                self.debug_layer = false;
                self.try_create(driver, &requested)
            }
            other => other,
        };

        match result {
            Ok((raw, level)) => match from_d3d(level) {
                Some(level) => Ok((raw, level)),
                None => Err(CreateError::Other(format!("unexpected feature level {:#x}", level.0))),
            },
            Err(e) if e.code() == E_INVALIDARG => Err(CreateError::InvalidArg),
            Err(e) => Err(CreateError::Other(e.to_string())),
        }
    }
}

struct GpuBuffer {
    buffer: ID3D11Buffer,
    size: u64,
    usage: BufferUsageType,
}

struct GpuTexture {
    _texture: ID3D11Texture2D,
    view: ID3D11ShaderResourceView,
}

struct GpuVertexShader {
    shader: ID3D11VertexShader,
    layout: ID3D11InputLayout,
}

/// D3D11 设备、交换链和资源表
pub struct D3D11Device {
    device: ID3D11Device,
    context: ID3D11DeviceContext,
    device1: Option<ID3D11Device1>,
    context1: Option<ID3D11DeviceContext1>,
    driver: DriverType,
    feature_level: FeatureLevel,
    debug_layer: bool,

    swap_chain: Option<IDXGISwapChain>,
    render_target: Option<ID3D11RenderTargetView>,
    depth_stencil: Option<ID3D11Texture2D>,
    depth_stencil_view: Option<ID3D11DepthStencilView>,
    viewport: D3D11_VIEWPORT,
    size: (u32, u32),

    buffers: ResourceSlab<GpuBuffer>,
    textures: ResourceSlab<GpuTexture>,
    samplers: ResourceSlab<ID3D11SamplerState>,
    vertex_shaders: ResourceSlab<GpuVertexShader>,
    pixel_shaders: ResourceSlab<ID3D11PixelShader>,

    overlay: Option<OverlayPainter>,
}

impl D3D11Device {
    /// 在协商得到的设备上创建交换链、渲染目标和深度缓冲
    pub fn new(
        negotiated: NegotiatedDevice<RawDevice>,
        hwnd: HWND,
        size: (u32, u32),
        debug_layer: bool,
    ) -> Result<Self> {
        let NegotiatedDevice {
            device: RawDevice { device, context },
            driver,
            feature_level,
            ..
        } = negotiated;
        let (width, height) = (size.0.max(1), size.1.max(1));

        let (swap_chain, format, device1, context1) = create_swap_chain(&device, &context, hwnd, width, height)?;
        info!(
            driver = driver.name(),
            feature_level = %feature_level,
            width,
            height,
            format = format.0,
            "Swap chain created"
        );

        let back_buffer: ID3D11Texture2D =
            unsafe { swap_chain.GetBuffer(0) }.map_err(swapchain_error("back buffer"))?;
        let mut render_target = None;
        unsafe {
            device
                .CreateRenderTargetView(&back_buffer, None, Some(&mut render_target))
                .map_err(creation_error("render target view"))?;
        }
        let render_target = render_target.ok_or_else(|| missing("render target view"))?;

        let (depth_stencil, depth_stencil_view) = create_depth_stencil(&device, width, height)?;

        let viewport = D3D11_VIEWPORT {
            TopLeftX: 0.0,
            TopLeftY: 0.0,
            Width: width as f32,
            Height: height as f32,
            MinDepth: 0.0,
            MaxDepth: 1.0,
        };

        let linear_output = format == DXGI_FORMAT_R16G16B16A16_FLOAT;
        let overlay = OverlayPainter::new(&device, &D3DCompiler::new(), linear_output)?;

        let device = Self {
            device,
            context,
            device1,
            context1,
            driver,
            feature_level,
            debug_layer,
            swap_chain: Some(swap_chain),
            render_target: Some(render_target),
            depth_stencil: Some(depth_stencil),
            depth_stencil_view: Some(depth_stencil_view),
            viewport,
            size: (width, height),
            buffers: ResourceSlab::new(),
            textures: ResourceSlab::new(),
            samplers: ResourceSlab::new(),
            vertex_shaders: ResourceSlab::new(),
            pixel_shaders: ResourceSlab::new(),
            overlay: Some(overlay),
        };
        device.bind_targets();
        Ok(device)
    }

    pub fn driver(&self) -> DriverType {
        self.driver
    }

    pub fn feature_level(&self) -> FeatureLevel {
        self.feature_level
    }

    fn bind_targets(&self) {
        unsafe {
            self.context
                .OMSetRenderTargets(Some(&[self.render_target.clone()]), self.depth_stencil_view.as_ref());
            self.context.RSSetViewports(Some(&[self.viewport]));
        }
    }

    fn buffer(&self, handle: BufferHandle) -> Result<&GpuBuffer> {
        self.buffers
            .get(handle.0)
            .ok_or_else(|| invalid_handle("buffer", handle.0))
    }

    fn device_removed_reason(&self) -> String {
        match unsafe { self.device.GetDeviceRemovedReason() } {
            Ok(()) => "device not removed".to_string(),
            Err(e) => e.to_string(),
        }
    }
}

type SwapChainParts = (
    IDXGISwapChain,
    DXGI_FORMAT,
    Option<ID3D11Device1>,
    Option<ID3D11DeviceContext1>,
);

fn create_swap_chain(
    device: &ID3D11Device,
    context: &ID3D11DeviceContext,
    hwnd: HWND,
    width: u32,
    height: u32,
) -> Result<SwapChainParts> {
    unsafe {
        let dxgi_device: IDXGIDevice = device.cast().map_err(swapchain_error("IDXGIDevice"))?;
        let adapter = dxgi_device.GetAdapter().map_err(swapchain_error("adapter"))?;
        let factory: IDXGIFactory1 = adapter.GetParent().map_err(swapchain_error("DXGI factory"))?;

        let parts = match factory.cast::<IDXGIFactory2>() {
            Ok(factory2) => {
                let device1 = device.cast::<ID3D11Device1>().ok();
                let context1 = context.cast::<ID3D11DeviceContext1>().ok();
                debug!(
                    device1 = device1.is_some(),
                    context1 = context1.is_some(),
                    "DXGI 1.2 factory available"
                );

                let desc = DXGI_SWAP_CHAIN_DESC1 {
                    Width: width,
                    Height: height,
                    Format: DXGI_FORMAT_R16G16B16A16_FLOAT,
                    SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
                    BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
                    BufferCount: 1,
                    ..Default::default()
                };
                let swap_chain1 = factory2
                    .CreateSwapChainForHwnd(device, hwnd, &desc, None, None::<&IDXGIOutput>)
                    .map_err(swapchain_error("CreateSwapChainForHwnd"))?;
                let swap_chain: IDXGISwapChain =
                    swap_chain1.cast().map_err(swapchain_error("IDXGISwapChain"))?;
                (swap_chain, DXGI_FORMAT_R16G16B16A16_FLOAT, device1, context1)
            }
            Err(_) => {
                debug!("DXGI 1.2 unavailable, using the legacy swap chain");
                let desc = DXGI_SWAP_CHAIN_DESC {
                    BufferDesc: DXGI_MODE_DESC {
                        Width: width,
                        Height: height,
                        RefreshRate: DXGI_RATIONAL { Numerator: 60, Denominator: 1 },
                        Format: DXGI_FORMAT_R8G8B8A8_UNORM,
                        ..Default::default()
                    },
                    SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
                    BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
                    BufferCount: 1,
                    OutputWindow: hwnd,
                    Windowed: true.into(),
                    SwapEffect: DXGI_SWAP_EFFECT_DISCARD,
                    Flags: 0,
                };
                let mut swap_chain = None;
                factory
                    .CreateSwapChain(device, &desc, &mut swap_chain)
                    .ok()
                    .map_err(swapchain_error("CreateSwapChain"))?;
                let swap_chain = swap_chain
                    .ok_or_else(|| FrameworkError::from(GraphicsError::SwapchainError("CreateSwapChain returned nothing".into())))?;
                (swap_chain, DXGI_FORMAT_R8G8B8A8_UNORM, None, None)
            }
        };

        factory
            .MakeWindowAssociation(hwnd, DXGI_MWA_NO_ALT_ENTER)
            .map_err(swapchain_error("MakeWindowAssociation"))?;
        Ok(parts)
    }
}

fn create_depth_stencil(
    device: &ID3D11Device,
    width: u32,
    height: u32,
) -> Result<(ID3D11Texture2D, ID3D11DepthStencilView)> {
    let desc = D3D11_TEXTURE2D_DESC {
        Width: width,
        Height: height,
        MipLevels: 1,
        ArraySize: 1,
        Format: DXGI_FORMAT_D24_UNORM_S8_UINT,
        SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
        Usage: D3D11_USAGE_DEFAULT,
        BindFlags: D3D11_BIND_DEPTH_STENCIL.0 as u32,
        CPUAccessFlags: 0,
        MiscFlags: 0,
    };
    let view_desc = D3D11_DEPTH_STENCIL_VIEW_DESC {
        Format: desc.Format,
        ViewDimension: D3D11_DSV_DIMENSION_TEXTURE2D,
        Anonymous: D3D11_DEPTH_STENCIL_VIEW_DESC_0 {
            Texture2D: D3D11_TEX2D_DSV { MipSlice: 0 },
        },
        ..Default::default()
    };

    unsafe {
        let mut texture = None;
        device
            .CreateTexture2D(&desc, None, Some(&mut texture))
            .map_err(creation_error("depth stencil texture"))?;
        let texture = texture.ok_or_else(|| missing("depth stencil texture"))?;

        let mut view = None;
        device
            .CreateDepthStencilView(&texture, Some(&view_desc), Some(&mut view))
            .map_err(creation_error("depth stencil view"))?;
        let view = view.ok_or_else(|| missing("depth stencil view"))?;
        Ok((texture, view))
    }
}

/// 按名字设置调试对象名，图形调试器和存活对象报告中可见
fn set_debug_name<T: Interface>(object: &T, name: Option<&str>) {
    let Some(name) = name else {
        return;
    };
    if let Ok(child) = object.cast::<ID3D11DeviceChild>() {
        unsafe {
            let _ = child.SetPrivateData(
                &WKPDID_D3DDebugObjectName,
                name.len() as u32,
                Some(name.as_ptr() as *const c_void),
            );
        }
    }
}

fn semantic_name(semantic: Semantic) -> PCSTR {
    match semantic {
        Semantic::Position => s!("POSITION"),
        Semantic::Normal => s!("NORMAL"),
        Semantic::Tangent => s!("TANGENT"),
        Semantic::TexCoord => s!("TEXCOORD"),
        Semantic::BlendIndices => s!("BLENDINDICES"),
        Semantic::BlendWeight => s!("BLENDWEIGHT"),
    }
}

fn attribute_format(format: AttributeFormat) -> DXGI_FORMAT {
    match format {
        AttributeFormat::Float2 => DXGI_FORMAT_R32G32_FLOAT,
        AttributeFormat::Float3 => DXGI_FORMAT_R32G32B32_FLOAT,
        AttributeFormat::Float4 => DXGI_FORMAT_R32G32B32A32_FLOAT,
        AttributeFormat::Uint4 => DXGI_FORMAT_R32G32B32A32_UINT,
    }
}

fn address_mode(mode: AddressMode) -> D3D11_TEXTURE_ADDRESS_MODE {
    match mode {
        AddressMode::Wrap => D3D11_TEXTURE_ADDRESS_WRAP,
        AddressMode::Clamp => D3D11_TEXTURE_ADDRESS_CLAMP,
    }
}

impl RenderContext for D3D11Device {
    fn create_buffer(&mut self, desc: &BufferDescriptor, initial_data: Option<&[u8]>) -> Result<BufferHandle> {
        let size = desc.aligned_size();
        let bind = match desc.usage {
            BufferUsageType::Vertex => D3D11_BIND_VERTEX_BUFFER,
            BufferUsageType::Index => D3D11_BIND_INDEX_BUFFER,
            BufferUsageType::Constant => D3D11_BIND_CONSTANT_BUFFER,
        };
        let buffer_desc = D3D11_BUFFER_DESC {
            ByteWidth: size as u32,
            Usage: D3D11_USAGE_DEFAULT,
            BindFlags: bind.0 as u32,
            CPUAccessFlags: 0,
            MiscFlags: 0,
            StructureByteStride: 0,
        };

        // 初始数据必须覆盖整个缓冲区
        let padded;
        let initial = match initial_data {
            Some(data) if (data.len() as u64) < size => {
                let mut copy = data.to_vec();
                copy.resize(size as usize, 0);
                padded = copy;
                Some(padded.as_slice())
            }
            other => other,
        };
        let subresource = initial.map(|data| D3D11_SUBRESOURCE_DATA {
            pSysMem: data.as_ptr() as *const c_void,
            SysMemPitch: 0,
            SysMemSlicePitch: 0,
        });

        let mut buffer = None;
        unsafe {
            self.device
                .CreateBuffer(
                    &buffer_desc,
                    subresource.as_ref().map(|s| s as *const D3D11_SUBRESOURCE_DATA),
                    Some(&mut buffer),
                )
                .map_err(|e| GraphicsError::ResourceCreation(format!("buffer {:?}: {}", desc.name, e)))?;
        }
        let buffer = buffer.ok_or_else(|| missing("buffer"))?;
        set_debug_name(&buffer, desc.name.as_deref());

        let index = self.buffers.insert(GpuBuffer {
            buffer,
            size,
            usage: desc.usage,
        });
        debug!(name = ?desc.name, size, index, "Buffer created");
        Ok(BufferHandle(index))
    }

    fn update_buffer(&mut self, buffer: BufferHandle, data: &[u8]) -> Result<()> {
        let target = self.buffer(buffer)?;
        if data.len() as u64 > target.size {
            return Err(GraphicsError::CommandExecution(format!(
                "update of {} bytes exceeds buffer #{} ({} bytes)",
                data.len(),
                buffer.0,
                target.size
            ))
            .into());
        }

        // 常量缓冲区只能整体更新
        let padded;
        let bytes = if target.usage == BufferUsageType::Constant && (data.len() as u64) < target.size {
            let mut copy = data.to_vec();
            copy.resize(target.size as usize, 0);
            padded = copy;
            padded.as_slice()
        } else {
            data
        };

        unsafe {
            self.context
                .UpdateSubresource(&target.buffer, 0, None, bytes.as_ptr() as *const c_void, 0, 0);
        }
        Ok(())
    }

    fn create_texture(&mut self, desc: &TextureDescriptor, pixels: &[u8]) -> Result<TextureHandle> {
        desc.validate(pixels)?;

        // 完整 mip 链，上传第 0 级后由 GPU 生成其余各级
        let texture_desc = D3D11_TEXTURE2D_DESC {
            Width: desc.width,
            Height: desc.height,
            MipLevels: 0,
            ArraySize: 1,
            Format: DXGI_FORMAT_R8G8B8A8_UNORM,
            SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
            Usage: D3D11_USAGE_DEFAULT,
            BindFlags: (D3D11_BIND_SHADER_RESOURCE.0 | D3D11_BIND_RENDER_TARGET.0) as u32,
            CPUAccessFlags: 0,
            MiscFlags: D3D11_RESOURCE_MISC_GENERATE_MIPS.0 as u32,
        };

        unsafe {
            let mut texture = None;
            self.device
                .CreateTexture2D(&texture_desc, None, Some(&mut texture))
                .map_err(|e| GraphicsError::ResourceCreation(format!("texture {:?}: {}", desc.name, e)))?;
            let texture = texture.ok_or_else(|| missing("texture"))?;

            let mut view = None;
            self.device
                .CreateShaderResourceView(&texture, None, Some(&mut view))
                .map_err(creation_error("shader resource view"))?;
            let view = view.ok_or_else(|| missing("shader resource view"))?;

            self.context.UpdateSubresource(
                &texture,
                0,
                None,
                pixels.as_ptr() as *const c_void,
                desc.row_pitch(),
                0,
            );
            self.context.GenerateMips(&view);

            set_debug_name(&texture, desc.name.as_deref());
            let index = self.textures.insert(GpuTexture { _texture: texture, view });
            debug!(name = ?desc.name, width = desc.width, height = desc.height, index, "Texture created");
            Ok(TextureHandle(index))
        }
    }

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> Result<SamplerHandle> {
        let address = address_mode(desc.address_mode);
        let sampler_desc = D3D11_SAMPLER_DESC {
            Filter: if desc.max_anisotropy > 0 {
                D3D11_FILTER_ANISOTROPIC
            } else {
                D3D11_FILTER_MIN_MAG_MIP_LINEAR
            },
            AddressU: address,
            AddressV: address,
            AddressW: address,
            MipLODBias: 0.0,
            MaxAnisotropy: desc.max_anisotropy.min(D3D11_MAX_MAXANISOTROPY),
            ComparisonFunc: D3D11_COMPARISON_NEVER,
            BorderColor: [0.0; 4],
            MinLOD: desc.min_lod,
            MaxLOD: desc.max_lod,
        };

        let mut sampler = None;
        unsafe {
            self.device
                .CreateSamplerState(&sampler_desc, Some(&mut sampler))
                .map_err(creation_error("sampler"))?;
        }
        let sampler = sampler.ok_or_else(|| missing("sampler"))?;
        Ok(SamplerHandle(self.samplers.insert(sampler)))
    }

    fn bind_constant_buffer(&mut self, stage: ShaderStage, slot: u32, buffer: BufferHandle) -> Result<()> {
        let target = Some(self.buffer(buffer)?.buffer.clone());
        unsafe {
            match stage {
                ShaderStage::Vertex => self.context.VSSetConstantBuffers(slot, Some(&[target])),
                ShaderStage::Pixel => self.context.PSSetConstantBuffers(slot, Some(&[target])),
            }
        }
        Ok(())
    }

    fn bind_texture(&mut self, slot: u32, texture: Option<TextureHandle>) -> Result<()> {
        let view = match texture {
            Some(handle) => Some(
                self.textures
                    .get(handle.0)
                    .ok_or_else(|| invalid_handle("texture", handle.0))?
                    .view
                    .clone(),
            ),
            None => None,
        };
        unsafe { self.context.PSSetShaderResources(slot, Some(&[view])) };
        Ok(())
    }

    fn bind_sampler(&mut self, slot: u32, sampler: SamplerHandle) -> Result<()> {
        let state = self
            .samplers
            .get(sampler.0)
            .ok_or_else(|| invalid_handle("sampler", sampler.0))?
            .clone();
        unsafe { self.context.PSSetSamplers(slot, Some(&[Some(state)])) };
        Ok(())
    }

    fn set_pixel_shader(&mut self, shader: PixelShaderHandle) -> Result<()> {
        let ps = self
            .pixel_shaders
            .get(shader.0)
            .ok_or_else(|| invalid_handle("pixel shader", shader.0))?;
        unsafe { self.context.PSSetShader(ps, None) };
        Ok(())
    }

    fn draw_indexed(
        &mut self,
        vertex_buffer: BufferHandle,
        stride: u32,
        index_buffer: BufferHandle,
        index_count: u32,
    ) -> Result<()> {
        let vertices = Some(self.buffer(vertex_buffer)?.buffer.clone());
        let indices = self.buffer(index_buffer)?.buffer.clone();
        let offset = 0u32;
        unsafe {
            self.context
                .IASetVertexBuffers(0, 1, Some(&vertices), Some(&stride), Some(&offset));
            self.context.IASetIndexBuffer(&indices, DXGI_FORMAT_R32_UINT, 0);
            self.context.IASetPrimitiveTopology(D3D11_PRIMITIVE_TOPOLOGY_TRIANGLELIST);
            self.context.DrawIndexed(index_count, 0, 0);
        }
        Ok(())
    }

    fn release_buffer(&mut self, buffer: BufferHandle) {
        if self.buffers.remove(buffer.0).is_none() {
            warn!(index = buffer.0, "Release of unknown buffer");
        }
    }

    fn release_texture(&mut self, texture: TextureHandle) {
        if self.textures.remove(texture.0).is_none() {
            warn!(index = texture.0, "Release of unknown texture");
        }
    }

    fn release_sampler(&mut self, sampler: SamplerHandle) {
        if self.samplers.remove(sampler.0).is_none() {
            warn!(index = sampler.0, "Release of unknown sampler");
        }
    }
}

impl FrameTarget for D3D11Device {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn feature_level_name(&self) -> String {
        format!("{} ({})", self.feature_level, self.driver.name())
    }

    fn clear(&mut self, color: [f32; 4], depth: f32) {
        // 叠加层会改写混合、深度和光栅化状态，每帧开始时恢复默认
        unsafe {
            self.context.OMSetBlendState(None::<&ID3D11BlendState>, None, 0xffff_ffff);
            self.context.OMSetDepthStencilState(None::<&ID3D11DepthStencilState>, 0);
            self.context.RSSetState(None::<&ID3D11RasterizerState>);
        }
        self.bind_targets();
        unsafe {
            if let Some(rtv) = &self.render_target {
                self.context.ClearRenderTargetView(rtv, &color);
            }
            if let Some(dsv) = &self.depth_stencil_view {
                self.context.ClearDepthStencilView(
                    dsv,
                    (D3D11_CLEAR_DEPTH.0 | D3D11_CLEAR_STENCIL.0) as u32,
                    depth,
                    0,
                );
            }
        }
    }

    fn create_vertex_shader(&mut self, stage: &CompiledStage) -> Result<VertexShaderHandle> {
        let elements: Vec<D3D11_INPUT_ELEMENT_DESC> = VERTEX_ATTRIBUTES
            .iter()
            .map(|attribute| D3D11_INPUT_ELEMENT_DESC {
                SemanticName: semantic_name(attribute.semantic),
                SemanticIndex: 0,
                Format: attribute_format(attribute.format),
                InputSlot: 0,
                AlignedByteOffset: D3D11_APPEND_ALIGNED_ELEMENT,
                InputSlotClass: D3D11_INPUT_PER_VERTEX_DATA,
                InstanceDataStepRate: 0,
            })
            .collect();

        unsafe {
            let mut shader = None;
            self.device
                .CreateVertexShader(&stage.bytecode, None, Some(&mut shader))
                .map_err(creation_error("vertex shader"))?;
            let shader = shader.ok_or_else(|| missing("vertex shader"))?;

            let mut layout = None;
            self.device
                .CreateInputLayout(&elements, &stage.bytecode, Some(&mut layout))
                .map_err(creation_error("input layout"))?;
            let layout = layout.ok_or_else(|| missing("input layout"))?;

            let index = self.vertex_shaders.insert(GpuVertexShader { shader, layout });
            debug!(entry = %stage.entry_point, index, "Vertex shader created");
            Ok(VertexShaderHandle(index))
        }
    }

    fn create_pixel_shader(&mut self, stage: &CompiledStage) -> Result<PixelShaderHandle> {
        let mut shader = None;
        unsafe {
            self.device
                .CreatePixelShader(&stage.bytecode, None, Some(&mut shader))
                .map_err(creation_error("pixel shader"))?;
        }
        let shader = shader.ok_or_else(|| missing("pixel shader"))?;
        let index = self.pixel_shaders.insert(shader);
        debug!(entry = %stage.entry_point, index, "Pixel shader created");
        Ok(PixelShaderHandle(index))
    }

    fn set_vertex_shader(&mut self, shader: VertexShaderHandle) -> Result<()> {
        let vs = self
            .vertex_shaders
            .get(shader.0)
            .ok_or_else(|| invalid_handle("vertex shader", shader.0))?;
        unsafe {
            self.context.IASetInputLayout(&vs.layout);
            self.context.VSSetShader(&vs.shader, None);
        }
        Ok(())
    }

    fn release_vertex_shader(&mut self, shader: VertexShaderHandle) {
        if self.vertex_shaders.remove(shader.0).is_none() {
            warn!(index = shader.0, "Release of unknown vertex shader");
        }
    }

    fn release_pixel_shader(&mut self, shader: PixelShaderHandle) {
        if self.pixel_shaders.remove(shader.0).is_none() {
            warn!(index = shader.0, "Release of unknown pixel shader");
        }
    }

    fn paint_overlay(&mut self, frame: &OverlayFrame) -> Result<()> {
        if frame.is_empty() {
            return Ok(());
        }
        match self.overlay.as_mut() {
            Some(painter) => painter.paint(&self.device, &self.context, frame, self.size),
            None => Ok(()),
        }
    }

    fn present(&mut self) -> Result<()> {
        let Some(swap_chain) = &self.swap_chain else {
            return Err(GraphicsError::SwapchainError("present after shutdown".into()).into());
        };
        let result = unsafe { swap_chain.Present(0, DXGI_PRESENT(0)) };
        if result == DXGI_ERROR_DEVICE_REMOVED || result == DXGI_ERROR_DEVICE_RESET {
            return Err(GraphicsError::SwapchainError(format!(
                "device lost during present: {}",
                self.device_removed_reason()
            ))
            .into());
        }
        result
            .ok()
            .map_err(|e| GraphicsError::SwapchainError(format!("present: {}", e)).into())
    }

    fn shutdown(&mut self) -> LiveObjectReport {
        let report = LiveObjectReport {
            buffers: self.buffers.live_count(),
            textures: self.textures.live_count(),
            samplers: self.samplers.live_count(),
            shaders: self.vertex_shaders.live_count() + self.pixel_shaders.live_count(),
        };

        let flushed = unbind_and_flush(&self.context, self.context1.as_ref());
        debug!(contexts = flushed, "Device contexts flushed");

        self.buffers.drain();
        self.textures.drain();
        self.samplers.drain();
        self.vertex_shaders.drain();
        self.pixel_shaders.drain();
        if let Some(overlay) = self.overlay.take() {
            debug!(textures = overlay.texture_count(), "Overlay painter released");
        }
        self.depth_stencil_view = None;
        self.depth_stencil = None;
        self.render_target = None;
        self.swap_chain = None;
        self.context1 = None;
        self.device1 = None;

        if self.debug_layer {
            match self.device.cast::<ID3D11Debug>() {
                Ok(debug) => unsafe {
                    if let Err(e) = debug.ReportLiveDeviceObjects(D3D11_RLDO_DETAIL) {
                        warn!("ReportLiveDeviceObjects failed: {}", e);
                    }
                },
                Err(e) => warn!("Debug interface unavailable: {}", e),
            }
        }

        info!(live = report.total(), "D3D11 device shut down");
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warp_device() -> RawDevice {
        let mut factory = D3D11Factory::new(false);
        let (raw, _) = factory
            .create(DriverType::Warp, &[FeatureLevel::Level11_0, FeatureLevel::Level10_0])
            .unwrap();
        raw
    }

    #[test]
    fn test_flush_covers_both_contexts() {
        let raw = warp_device();
        let context1 = raw.context.cast::<ID3D11DeviceContext1>().ok();
        let expected = if context1.is_some() { 2 } else { 1 };
        assert_eq!(unbind_and_flush(&raw.context, context1.as_ref()), expected);
    }

    #[test]
    fn test_flush_without_context1() {
        let raw = warp_device();
        assert_eq!(unbind_and_flush(&raw.context, None), 1);
    }
}
