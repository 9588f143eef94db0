//! DirectX 12 描述符堆封装
//!
//! 程序中用到的堆：
//!
//! - RTV 堆：交换链的两个后台缓冲
//! - DSV 堆：唯一的深度缓冲
//! - CBV 堆（CPU）：常量缓冲区每个槽位一个 CBV
//! - SRV 堆（CPU）：每个已上传纹理一个 SRV
//! - 着色器可见堆：`GROUP_COUNT * REGISTER_COUNT` 个描述符，每帧从 CPU 堆复制进来

use windows::Win32::Graphics::Direct3D12::*;

use crate::core::error::{DxPracticeError, GraphicsError, Result};

/// 描述符堆
pub struct Dx12DescriptorHeap {
    heap: ID3D12DescriptorHeap,
    heap_type: D3D12_DESCRIPTOR_HEAP_TYPE,
    increment_size: usize,
    cpu_start: usize,
    gpu_start: Option<u64>,
    capacity: usize,
}

impl Dx12DescriptorHeap {
    pub fn new(
        device: &ID3D12Device,
        heap_type: D3D12_DESCRIPTOR_HEAP_TYPE,
        capacity: usize,
        shader_visible: bool,
    ) -> Result<Self> {
        let flags = if shader_visible {
            D3D12_DESCRIPTOR_HEAP_FLAG_SHADER_VISIBLE
        } else {
            D3D12_DESCRIPTOR_HEAP_FLAG_NONE
        };

        let desc = D3D12_DESCRIPTOR_HEAP_DESC {
            Type: heap_type,
            NumDescriptors: capacity as u32,
            Flags: flags,
            NodeMask: 0,
        };

        unsafe {
            let heap: ID3D12DescriptorHeap = device.CreateDescriptorHeap(&desc).map_err(|e| {
                DxPracticeError::Graphics(GraphicsError::ResourceCreation(format!(
                    "Failed to create descriptor heap ({} descriptors): {:?}",
                    capacity, e
                )))
            })?;

            let increment_size = device.GetDescriptorHandleIncrementSize(heap_type) as usize;
            let cpu_start = heap.GetCPUDescriptorHandleForHeapStart().ptr;
            let gpu_start = if shader_visible {
                Some(heap.GetGPUDescriptorHandleForHeapStart().ptr)
            } else {
                None
            };

            Ok(Self {
                heap,
                heap_type,
                increment_size,
                cpu_start,
                gpu_start,
                capacity,
            })
        }
    }

    pub fn heap(&self) -> &ID3D12DescriptorHeap {
        &self.heap
    }

    pub fn heap_type(&self) -> D3D12_DESCRIPTOR_HEAP_TYPE {
        self.heap_type
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 第 `index` 个描述符的 CPU 句柄
    pub fn cpu_handle(&self, index: usize) -> Result<D3D12_CPU_DESCRIPTOR_HANDLE> {
        self.check_index(index)?;
        Ok(D3D12_CPU_DESCRIPTOR_HANDLE {
            ptr: self.cpu_start + index * self.increment_size,
        })
    }

    /// 第 `index` 个描述符的 GPU 句柄，只有着色器可见堆才有
    pub fn gpu_handle(&self, index: usize) -> Result<D3D12_GPU_DESCRIPTOR_HANDLE> {
        self.check_index(index)?;
        let start = self.gpu_start.ok_or_else(|| {
            DxPracticeError::Graphics(GraphicsError::CommandExecution(
                "GPU handle requested from a CPU-only descriptor heap".to_string(),
            ))
        })?;
        Ok(D3D12_GPU_DESCRIPTOR_HANDLE {
            ptr: start + (index * self.increment_size) as u64,
        })
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.capacity {
            return Err(GraphicsError::RingBufferOverrun {
                requested: index + 1,
                capacity: self.capacity,
            }
            .into());
        }
        Ok(())
    }
}
