//! DirectX 12 资源创建辅助函数

use std::mem::ManuallyDrop;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;

use crate::core::error::{GraphicsError, Result};
use crate::renderer::command::ResourceState;

/// 引擎资源状态到 D3D12 状态
pub fn d3d12_state(state: ResourceState) -> D3D12_RESOURCE_STATES {
    match state {
        ResourceState::Present => D3D12_RESOURCE_STATE_PRESENT,
        ResourceState::RenderTarget => D3D12_RESOURCE_STATE_RENDER_TARGET,
        ResourceState::DepthWrite => D3D12_RESOURCE_STATE_DEPTH_WRITE,
        ResourceState::CopyDest => D3D12_RESOURCE_STATE_COPY_DEST,
        ResourceState::PixelShaderResource => D3D12_RESOURCE_STATE_PIXEL_SHADER_RESOURCE,
    }
}

/// 资源状态转换屏障
///
/// 屏障借用 `resource` 而不增加引用计数，提交前 `resource` 必须保持存活。
pub fn transition_barrier(
    resource: &ID3D12Resource,
    before: D3D12_RESOURCE_STATES,
    after: D3D12_RESOURCE_STATES,
) -> D3D12_RESOURCE_BARRIER {
    D3D12_RESOURCE_BARRIER {
        Type: D3D12_RESOURCE_BARRIER_TYPE_TRANSITION,
        Flags: D3D12_RESOURCE_BARRIER_FLAG_NONE,
        Anonymous: D3D12_RESOURCE_BARRIER_0 {
            Transition: ManuallyDrop::new(D3D12_RESOURCE_TRANSITION_BARRIER {
                pResource: unsafe { std::mem::transmute_copy(resource) },
                Subresource: D3D12_RESOURCE_BARRIER_ALL_SUBRESOURCES,
                StateBefore: before,
                StateAfter: after,
            }),
        },
    }
}

fn buffer_desc(size: u64) -> D3D12_RESOURCE_DESC {
    D3D12_RESOURCE_DESC {
        Dimension: D3D12_RESOURCE_DIMENSION_BUFFER,
        Width: size,
        Height: 1,
        DepthOrArraySize: 1,
        MipLevels: 1,
        SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
        Layout: D3D12_TEXTURE_LAYOUT_ROW_MAJOR,
        ..Default::default()
    }
}

/// 在上传堆上创建缓冲区
pub fn create_upload_buffer(device: &ID3D12Device, size: u64, what: &str) -> Result<ID3D12Resource> {
    let heap_props = D3D12_HEAP_PROPERTIES {
        Type: D3D12_HEAP_TYPE_UPLOAD,
        ..Default::default()
    };

    let mut buffer: Option<ID3D12Resource> = None;
    unsafe {
        device
            .CreateCommittedResource(
                &heap_props,
                D3D12_HEAP_FLAG_NONE,
                &buffer_desc(size),
                D3D12_RESOURCE_STATE_GENERIC_READ,
                None,
                &mut buffer,
            )
            .map_err(|e| GraphicsError::ResourceCreation(format!("Failed to create {}: {:?}", what, e)))?;
    }

    buffer.ok_or_else(|| GraphicsError::ResourceCreation(format!("{} is null", what)).into())
}

/// 创建上传堆缓冲区并写入数据
pub fn create_buffer_with_data(device: &ID3D12Device, bytes: &[u8], what: &str) -> Result<ID3D12Resource> {
    let buffer = create_upload_buffer(device, bytes.len() as u64, what)?;
    unsafe {
        let mut data = std::ptr::null_mut();
        buffer.Map(0, None, Some(&mut data))?;
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), data as *mut u8, bytes.len());
        buffer.Unmap(0, None);
    }
    Ok(buffer)
}

/// 在默认堆上创建 2D 纹理
pub fn create_texture_2d(
    device: &ID3D12Device,
    width: u32,
    height: u32,
    format: DXGI_FORMAT,
    flags: D3D12_RESOURCE_FLAGS,
    initial_state: D3D12_RESOURCE_STATES,
    clear_value: Option<&D3D12_CLEAR_VALUE>,
) -> Result<ID3D12Resource> {
    let heap_props = D3D12_HEAP_PROPERTIES {
        Type: D3D12_HEAP_TYPE_DEFAULT,
        ..Default::default()
    };
    let desc = D3D12_RESOURCE_DESC {
        Dimension: D3D12_RESOURCE_DIMENSION_TEXTURE2D,
        Width: width as u64,
        Height: height,
        DepthOrArraySize: 1,
        MipLevels: 1,
        Format: format,
        SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
        Layout: D3D12_TEXTURE_LAYOUT_UNKNOWN,
        Flags: flags,
        ..Default::default()
    };

    let mut texture: Option<ID3D12Resource> = None;
    unsafe {
        device
            .CreateCommittedResource(
                &heap_props,
                D3D12_HEAP_FLAG_NONE,
                &desc,
                initial_state,
                clear_value.map(|v| v as *const _),
                &mut texture,
            )
            .map_err(|e| {
                GraphicsError::ResourceCreation(format!(
                    "Failed to create {}x{} texture: {:?}",
                    width, height, e
                ))
            })?;
    }

    texture.ok_or_else(|| GraphicsError::ResourceCreation("Texture is null".to_string()).into())
}

/// 纹理行跨度按 256 字节对齐
#[inline]
pub fn aligned_row_pitch(width: u32) -> u32 {
    let pitch = width * 4;
    let align = D3D12_TEXTURE_DATA_PITCH_ALIGNMENT;
    (pitch + align - 1) & !(align - 1)
}
