//! Direct3D 11 后端
//!
//! - [`D3D11Factory`] / [`D3D11Device`]：设备创建、交换链、资源表，实现 `FrameTarget`
//! - [`D3DCompiler`]：`D3DCompile` 包装，实现 `ShaderCompiler`
//! - `overlay`：调试叠加层的绘制管线
//! - [`show_error`]：阻塞式错误对话框

mod device;
mod dialog;
mod overlay;
mod shader;

pub use device::{D3D11Device, D3D11Factory, RawDevice};
pub use dialog::show_error;
pub use shader::D3DCompiler;
