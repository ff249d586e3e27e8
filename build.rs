/// Build script for FrameworkDX11
///
/// # Shader Compilation Strategy:
/// - D3D11: HLSL shaders are compiled at runtime via D3DCompile, so the build
///   only needs to know when the sources change.
fn main() {
    println!("cargo:rerun-if-changed=src/gfx/d3d11/shaders/pbr.hlsl");
    println!("cargo:rerun-if-changed=src/gfx/d3d11/shaders/skinned.hlsl");
    println!("cargo:rerun-if-changed=src/gfx/d3d11/shaders/common.hlsli");
    println!("cargo:rerun-if-changed=src/gfx/d3d11/shaders/overlay.hlsl");
}
