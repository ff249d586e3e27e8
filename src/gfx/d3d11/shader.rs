//! 基于 `D3DCompile` 的着色器编译器

use std::ffi::CString;

use tracing::error;
use windows::core::PCSTR;
use windows::Win32::Graphics::Direct3D::Fxc::{
    D3DCompile, D3DCOMPILE_DEBUG, D3DCOMPILE_ENABLE_STRICTNESS, D3DCOMPILE_SKIP_OPTIMIZATION,
};
use windows::Win32::Graphics::Direct3D::ID3DBlob;
use windows::Win32::System::Diagnostics::Debug::OutputDebugStringA;

use crate::renderer::ShaderCompiler;

/// 运行时 HLSL 编译器
///
/// Debug 构建附加 `DEBUG | SKIP_OPTIMIZATION`，便于在图形调试器中单步。
#[derive(Debug, Clone, Copy, Default)]
pub struct D3DCompiler;

impl D3DCompiler {
    pub fn new() -> Self {
        Self
    }

    fn flags() -> u32 {
        let mut flags = D3DCOMPILE_ENABLE_STRICTNESS;
        if cfg!(debug_assertions) {
            flags |= D3DCOMPILE_DEBUG | D3DCOMPILE_SKIP_OPTIMIZATION;
        }
        flags
    }
}

/// 把 blob 内容复制出来
pub(crate) fn blob_bytes(blob: &ID3DBlob) -> Vec<u8> {
    unsafe { std::slice::from_raw_parts(blob.GetBufferPointer() as *const u8, blob.GetBufferSize()).to_vec() }
}

fn c_string(value: &str) -> std::result::Result<CString, String> {
    CString::new(value).map_err(|_| format!("{:?} contains an interior NUL byte", value))
}

impl ShaderCompiler for D3DCompiler {
    fn compile_source(
        &self,
        source: &str,
        source_name: &str,
        entry_point: &str,
        profile: &str,
    ) -> std::result::Result<Vec<u8>, String> {
        let name = c_string(source_name)?;
        let entry = c_string(entry_point)?;
        let target = c_string(profile)?;

        let mut code: Option<ID3DBlob> = None;
        let mut errors: Option<ID3DBlob> = None;

        let result = unsafe {
            D3DCompile(
                source.as_ptr() as _,
                source.len(),
                PCSTR(name.as_ptr() as *const u8),
                None,
                None,
                PCSTR(entry.as_ptr() as *const u8),
                PCSTR(target.as_ptr() as *const u8),
                Self::flags(),
                0,
                &mut code,
                Some(&mut errors),
            )
        };

        let diagnostics = errors
            .as_ref()
            .map(|blob| String::from_utf8_lossy(&blob_bytes(blob)).trim_end_matches('\0').to_string())
            .unwrap_or_default();

        let failure = match (&result, &code) {
            (Err(e), _) if diagnostics.is_empty() => Some(format!("{}: {}", source_name, e)),
            (Err(_), _) => Some(diagnostics),
            (Ok(()), None) => Some(format!("{}: compiler returned no bytecode", source_name)),
            (Ok(()), Some(blob)) if unsafe { blob.GetBufferSize() } == 0 => {
                Some(format!("{}: compiler returned empty bytecode", source_name))
            }
            _ => None,
        };

        if let Some(message) = failure {
            error!(source = source_name, entry_point, profile, "{}", message);
            if let Ok(text) = CString::new(format!("{}\n", message)) {
                unsafe { OutputDebugStringA(PCSTR(text.as_ptr() as *const u8)) };
            }
            return Err(message);
        }

        Ok(code.as_ref().map(blob_bytes).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_source_reports_diagnostics() {
        let compiler = D3DCompiler::new();
        let result = compiler.compile_source("float4 VS( : SV_POSITION {", "broken.hlsl", "VS", "vs_4_0");
        let message = result.unwrap_err();
        assert!(!message.is_empty());
        assert!(message.contains("broken.hlsl"), "{}", message);
    }

    #[test]
    fn test_missing_entry_point_fails() {
        let compiler = D3DCompiler::new();
        let source = "float4 VS(float4 p : POSITION) : SV_POSITION { return p; }";
        assert!(compiler.compile_source(source, "vs.hlsl", "Main", "vs_4_0").is_err());
    }

    #[test]
    fn test_valid_source_produces_bytecode() {
        let compiler = D3DCompiler::new();
        let source = "float4 VS(float4 p : POSITION) : SV_POSITION { return p; }";
        let bytecode = compiler.compile_source(source, "vs.hlsl", "VS", "vs_4_0").unwrap();
        assert!(!bytecode.is_empty());
    }
}
