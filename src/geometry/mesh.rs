/// 网格数据结构模块
///
/// CPU 侧的网格数据容器，存放加载器输出的顶点与索引，上传到 GPU 后不再修改。

use super::vertex::Vertex;
use crate::core::error::{MeshLoadError, Result};

/// CPU 侧网格数据
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    /// 网格名称
    pub name: Option<String>,

    /// 顶点数组
    pub vertices: Vec<Vertex>,

    /// 三角形列表索引
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self {
            name: None,
            vertices,
            indices,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// 检查索引是否构成完整三角形且不越界
    pub fn validate(&self) -> Result<()> {
        if self.vertices.is_empty() || self.indices.is_empty() {
            return Err(MeshLoadError::InvalidGeometry("网格不包含任何三角形".to_string()).into());
        }

        if self.indices.len() % 3 != 0 {
            return Err(MeshLoadError::InvalidGeometry(format!(
                "索引数量 {} 不是 3 的倍数",
                self.indices.len()
            ))
            .into());
        }

        let vertex_count = self.vertices.len() as u32;
        if let Some(bad) = self.indices.iter().find(|&&i| i >= vertex_count) {
            return Err(MeshLoadError::InvalidGeometry(format!(
                "索引 {} 超出顶点数量 {}",
                bad, vertex_count
            ))
            .into());
        }

        Ok(())
    }

    /// 以原点为中心、边长为 `2 * half_extent` 的纹理四边形，位于深度 `z`
    ///
    /// 顶点顺序为顺时针（D3D 默认正面）。
    pub fn quad(half_extent: f32, z: f32, color: [f32; 4]) -> Self {
        let h = half_extent;
        let vertices = vec![
            Vertex::new([-h, h, z], color, [0.0, 0.0]),
            Vertex::new([h, h, z], color, [1.0, 0.0]),
            Vertex::new([h, -h, z], color, [1.0, 1.0]),
            Vertex::new([-h, -h, z], color, [0.0, 1.0]),
        ];
        let indices = vec![0, 1, 2, 0, 2, 3];

        Self::new(vertices, indices).with_name("Quad")
    }

    /// 加载失败时使用的默认网格
    pub fn default_quad() -> Self {
        Self::quad(0.5, 0.5, [1.0, 1.0, 1.0, 1.0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_quad() {
        let mesh = MeshData::default_quad();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.index_count(), 6);
        assert_eq!(mesh.triangle_count(), 2);
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_indices() {
        let mut mesh = MeshData::default_quad();
        mesh.indices.push(0);
        assert!(mesh.validate().is_err());

        let mut mesh = MeshData::default_quad();
        mesh.indices[5] = 42;
        assert!(mesh.validate().is_err());

        assert!(MeshData::default().validate().is_err());
    }
}
