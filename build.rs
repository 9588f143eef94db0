/// Build script for DXPractice
///
/// # Shader Compilation Strategy:
/// - DX12: HLSL is compiled at runtime via D3DCompile
/// - Software: the reference backend runs a fixed vertex/pixel stage on the CPU
fn main() {
    // Trigger rebuild if shader files change
    println!("cargo:rerun-if-changed=src/gfx/dx12/shaders/default.hlsl");
}
