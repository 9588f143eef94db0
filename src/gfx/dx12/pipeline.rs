//! 根签名与管线状态
//!
//! 根签名只有一个描述符表参数：5 个 CBV（b0-b4）后接 5 个 SRV（t0-t4），
//! 外加一个静态采样器 s0。管线状态使用 `shaders/default.hlsl`，运行时用
//! D3DCompile 编译；深度测试 LESS，不剔除背面。

use std::mem::ManuallyDrop;
use std::path::Path;
use tracing::debug;
use windows::core::{s, PCSTR};
use windows::Win32::Graphics::Direct3D::Fxc::*;
use windows::Win32::Graphics::Direct3D::*;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;

use crate::core::error::{DxPracticeError, GraphicsError, Result};
use crate::geometry::Vertex;
use crate::renderer::descriptor::{CBV_REGISTER_COUNT, SRV_REGISTER, SRV_REGISTER_COUNT};

/// 后台缓冲格式
pub const RENDER_TARGET_FORMAT: DXGI_FORMAT = DXGI_FORMAT_R8G8B8A8_UNORM;

/// 深度缓冲格式
pub const DEPTH_FORMAT: DXGI_FORMAT = DXGI_FORMAT_D32_FLOAT;

fn shader_path() -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("src/gfx/dx12/shaders/default.hlsl")
}

/// 创建根签名
pub fn create_root_signature(device: &ID3D12Device) -> Result<ID3D12RootSignature> {
    let ranges = [
        D3D12_DESCRIPTOR_RANGE {
            RangeType: D3D12_DESCRIPTOR_RANGE_TYPE_CBV,
            NumDescriptors: CBV_REGISTER_COUNT as u32,
            BaseShaderRegister: 0,
            RegisterSpace: 0,
            OffsetInDescriptorsFromTableStart: 0,
        },
        D3D12_DESCRIPTOR_RANGE {
            RangeType: D3D12_DESCRIPTOR_RANGE_TYPE_SRV,
            NumDescriptors: SRV_REGISTER_COUNT as u32,
            BaseShaderRegister: 0,
            RegisterSpace: 0,
            OffsetInDescriptorsFromTableStart: SRV_REGISTER as u32,
        },
    ];

    let root_parameters = [D3D12_ROOT_PARAMETER {
        ParameterType: D3D12_ROOT_PARAMETER_TYPE_DESCRIPTOR_TABLE,
        Anonymous: D3D12_ROOT_PARAMETER_0 {
            DescriptorTable: D3D12_ROOT_DESCRIPTOR_TABLE {
                NumDescriptorRanges: ranges.len() as u32,
                pDescriptorRanges: ranges.as_ptr(),
            },
        },
        ShaderVisibility: D3D12_SHADER_VISIBILITY_ALL,
    }];

    let sampler = D3D12_STATIC_SAMPLER_DESC {
        Filter: D3D12_FILTER_MIN_MAG_MIP_POINT,
        AddressU: D3D12_TEXTURE_ADDRESS_MODE_WRAP,
        AddressV: D3D12_TEXTURE_ADDRESS_MODE_WRAP,
        AddressW: D3D12_TEXTURE_ADDRESS_MODE_WRAP,
        MipLODBias: 0.0,
        MaxAnisotropy: 1,
        ComparisonFunc: D3D12_COMPARISON_FUNC_NEVER,
        BorderColor: D3D12_STATIC_BORDER_COLOR_OPAQUE_BLACK,
        MinLOD: 0.0,
        MaxLOD: f32::MAX,
        ShaderRegister: 0,
        RegisterSpace: 0,
        ShaderVisibility: D3D12_SHADER_VISIBILITY_PIXEL,
    };

    let root_desc = D3D12_ROOT_SIGNATURE_DESC {
        NumParameters: root_parameters.len() as u32,
        pParameters: root_parameters.as_ptr(),
        NumStaticSamplers: 1,
        pStaticSamplers: &sampler,
        Flags: D3D12_ROOT_SIGNATURE_FLAG_ALLOW_INPUT_ASSEMBLER_INPUT_LAYOUT,
    };

    unsafe {
        let mut signature: Option<ID3DBlob> = None;
        let mut error: Option<ID3DBlob> = None;
        D3D12SerializeRootSignature(&root_desc, D3D_ROOT_SIGNATURE_VERSION_1, &mut signature, Some(&mut error))
            .map_err(|e| {
                GraphicsError::ResourceCreation(format!(
                    "Failed to serialize root signature: {}",
                    blob_message(error.as_ref()).unwrap_or_else(|| format!("{:?}", e))
                ))
            })?;
        let signature = signature.ok_or_else(|| {
            GraphicsError::ResourceCreation("Root signature blob is empty".to_string())
        })?;

        let root_signature: ID3D12RootSignature = device
            .CreateRootSignature(
                0,
                std::slice::from_raw_parts(
                    signature.GetBufferPointer() as *const u8,
                    signature.GetBufferSize(),
                ),
            )
            .map_err(|e| {
                GraphicsError::ResourceCreation(format!("Failed to create root signature: {:?}", e))
            })?;

        #[cfg(debug_assertions)]
        debug!("Root signature created: CBV b0-b{}, SRV t0-t{}, sampler s0",
            CBV_REGISTER_COUNT - 1, SRV_REGISTER_COUNT - 1);

        Ok(root_signature)
    }
}

/// 编译一个着色器入口
fn compile_shader(source: &str, entry: PCSTR, target: PCSTR) -> Result<ID3DBlob> {
    let flags = if cfg!(debug_assertions) {
        D3DCOMPILE_DEBUG | D3DCOMPILE_SKIP_OPTIMIZATION
    } else {
        0
    };

    unsafe {
        let mut blob: Option<ID3DBlob> = None;
        let mut error: Option<ID3DBlob> = None;
        let result = D3DCompile(
            source.as_ptr() as _,
            source.len(),
            None,
            None,
            None,
            entry,
            target,
            flags,
            0,
            &mut blob,
            Some(&mut error),
        );

        if let Err(e) = result {
            let message = blob_message(error.as_ref()).unwrap_or_else(|| format!("{:?}", e));
            return Err(GraphicsError::ShaderCompilation(message).into());
        }

        blob.ok_or_else(|| GraphicsError::ShaderCompilation("Empty shader blob".to_string()).into())
    }
}

/// 读取 D3D 错误 blob 中的文本
fn blob_message(blob: Option<&ID3DBlob>) -> Option<String> {
    blob.map(|blob| unsafe {
        let bytes = std::slice::from_raw_parts(blob.GetBufferPointer() as *const u8, blob.GetBufferSize());
        String::from_utf8_lossy(bytes).trim_end_matches('\0').to_string()
    })
}

/// 创建管线状态
pub fn create_pipeline_state(
    device: &ID3D12Device,
    root_signature: &ID3D12RootSignature,
) -> Result<ID3D12PipelineState> {
    let path = shader_path();
    let source = std::fs::read_to_string(&path).map_err(|e| {
        DxPracticeError::Graphics(GraphicsError::ShaderCompilation(format!(
            "Failed to read {}: {}",
            path.display(),
            e
        )))
    })?;

    let vs = compile_shader(&source, s!("VS_Main"), s!("vs_5_0"))?;
    let ps = compile_shader(&source, s!("PS_Main"), s!("ps_5_0"))?;

    let input_element_descs = [
        D3D12_INPUT_ELEMENT_DESC {
            SemanticName: s!("POSITION"),
            SemanticIndex: 0,
            Format: DXGI_FORMAT_R32G32B32_FLOAT,
            InputSlot: 0,
            AlignedByteOffset: Vertex::POSITION_OFFSET,
            InputSlotClass: D3D12_INPUT_CLASSIFICATION_PER_VERTEX_DATA,
            InstanceDataStepRate: 0,
        },
        D3D12_INPUT_ELEMENT_DESC {
            SemanticName: s!("COLOR"),
            SemanticIndex: 0,
            Format: DXGI_FORMAT_R32G32B32A32_FLOAT,
            InputSlot: 0,
            AlignedByteOffset: Vertex::COLOR_OFFSET,
            InputSlotClass: D3D12_INPUT_CLASSIFICATION_PER_VERTEX_DATA,
            InstanceDataStepRate: 0,
        },
        D3D12_INPUT_ELEMENT_DESC {
            SemanticName: s!("TEXCOORD"),
            SemanticIndex: 0,
            Format: DXGI_FORMAT_R32G32_FLOAT,
            InputSlot: 0,
            AlignedByteOffset: Vertex::UV_OFFSET,
            InputSlotClass: D3D12_INPUT_CLASSIFICATION_PER_VERTEX_DATA,
            InstanceDataStepRate: 0,
        },
    ];

    let mut pso_desc = D3D12_GRAPHICS_PIPELINE_STATE_DESC::default();
    pso_desc.pRootSignature = ManuallyDrop::new(Some(root_signature.clone()));
    unsafe {
        pso_desc.VS = D3D12_SHADER_BYTECODE {
            pShaderBytecode: vs.GetBufferPointer(),
            BytecodeLength: vs.GetBufferSize(),
        };
        pso_desc.PS = D3D12_SHADER_BYTECODE {
            pShaderBytecode: ps.GetBufferPointer(),
            BytecodeLength: ps.GetBufferSize(),
        };
    }
    pso_desc.InputLayout = D3D12_INPUT_LAYOUT_DESC {
        pInputElementDescs: input_element_descs.as_ptr(),
        NumElements: input_element_descs.len() as u32,
    };
    pso_desc.RasterizerState = D3D12_RASTERIZER_DESC {
        FillMode: D3D12_FILL_MODE_SOLID,
        CullMode: D3D12_CULL_MODE_NONE,
        DepthClipEnable: true.into(),
        ..Default::default()
    };
    pso_desc.BlendState.RenderTarget[0] = D3D12_RENDER_TARGET_BLEND_DESC {
        BlendEnable: false.into(),
        LogicOpEnable: false.into(),
        RenderTargetWriteMask: D3D12_COLOR_WRITE_ENABLE_ALL.0 as u8,
        ..Default::default()
    };
    pso_desc.DepthStencilState = D3D12_DEPTH_STENCIL_DESC {
        DepthEnable: true.into(),
        DepthWriteMask: D3D12_DEPTH_WRITE_MASK_ALL,
        DepthFunc: D3D12_COMPARISON_FUNC_LESS,
        StencilEnable: false.into(),
        ..Default::default()
    };
    pso_desc.SampleMask = u32::MAX;
    pso_desc.PrimitiveTopologyType = D3D12_PRIMITIVE_TOPOLOGY_TYPE_TRIANGLE;
    pso_desc.NumRenderTargets = 1;
    pso_desc.RTVFormats[0] = RENDER_TARGET_FORMAT;
    pso_desc.DSVFormat = DEPTH_FORMAT;
    pso_desc.SampleDesc.Count = 1;

    let pso: Result<ID3D12PipelineState> = unsafe {
        device.CreateGraphicsPipelineState(&pso_desc).map_err(|e| {
            GraphicsError::ResourceCreation(format!("Failed to create pipeline state: {:?}", e)).into()
        })
    };

    // 释放描述结构中持有的根签名引用
    unsafe { ManuallyDrop::drop(&mut pso_desc.pRootSignature) };

    #[cfg(debug_assertions)]
    if pso.is_ok() {
        debug!("Pipeline state created (depth LESS, cull none)");
    }

    pso
}
