/// 顶点与常量缓冲区数据定义
///
/// 顶点布局与 HLSL 输入布局（POSITION / COLOR / TEXCOORD）一一对应，
/// `Transform` 是每次绘制写入常量缓冲区的数据。

use bytemuck::{Pod, Zeroable};

use crate::core::math::Vector4;

/// 顶点结构
///
/// # 内存布局
///
/// - position: 12 bytes (3 * f32)
/// - color: 16 bytes (4 * f32)
/// - uv: 8 bytes (2 * f32)
/// - **总计**: 36 bytes
///
/// # 示例
///
/// ```rust
/// use dx_practice::geometry::Vertex;
///
/// let vertex = Vertex::new([0.0, 0.5, 0.5], [1.0, 0.0, 0.0, 1.0], [0.5, 0.0]);
/// assert_eq!(vertex.color[0], 1.0);
/// ```
#[repr(C)]
#[derive(Default, Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// 顶点位置 (x, y, z)
    pub position: [f32; 3],

    /// 顶点颜色 (r, g, b, a)
    pub color: [f32; 4],

    /// 纹理坐标 (u, v)
    pub uv: [f32; 2],
}

impl Vertex {
    /// 创建一个新的顶点
    #[inline]
    pub fn new(position: [f32; 3], color: [f32; 4], uv: [f32; 2]) -> Self {
        Self { position, color, uv }
    }

    /// 位置字段在顶点中的字节偏移
    pub const POSITION_OFFSET: u32 = 0;
    /// 颜色字段在顶点中的字节偏移
    pub const COLOR_OFFSET: u32 = 12;
    /// 纹理坐标字段在顶点中的字节偏移
    pub const UV_OFFSET: u32 = 28;
}

/// 每次绘制的变换数据
///
/// 目前只有一个偏移向量，由顶点着色器直接加到顶点位置上。
#[repr(C)]
#[derive(Default, Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Transform {
    pub offset: [f32; 4],
}

impl Transform {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { offset: [x, y, z, 0.0] }
    }

    pub fn from_vector(offset: Vector4) -> Self {
        Self { offset: [offset.x, offset.y, offset.z, offset.w] }
    }

    pub fn to_vector(&self) -> Vector4 {
        Vector4::new(self.offset[0], self.offset[1], self.offset[2], self.offset[3])
    }

    /// 叠加另一个偏移
    pub fn translated(&self, delta: Vector4) -> Self {
        Self::from_vector(self.to_vector() + delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem;

    #[test]
    fn test_vertex_layout() {
        assert_eq!(mem::size_of::<Vertex>(), 36);
        assert_eq!(mem::align_of::<Vertex>(), 4);

        let vertex = Vertex::default();
        let base = &vertex as *const Vertex as usize;
        assert_eq!(&vertex.color as *const _ as usize - base, Vertex::COLOR_OFFSET as usize);
        assert_eq!(&vertex.uv as *const _ as usize - base, Vertex::UV_OFFSET as usize);
    }

    #[test]
    fn test_transform_bytes() {
        let t = Transform::new(0.25, 0.0, 0.0);
        let bytes: &[u8] = bytemuck::bytes_of(&t);
        assert_eq!(bytes.len(), 16);
        assert_eq!(*bytemuck::from_bytes::<Transform>(bytes), t);
    }

    #[test]
    fn test_transform_translated() {
        let t = Transform::new(0.25, 0.0, 0.2).translated(Vector4::new(0.0, 0.5, 0.0, 0.0));
        assert_eq!(t.offset, [0.25, 0.5, 0.2, 0.0]);
    }
}
