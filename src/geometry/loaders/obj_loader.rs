/// OBJ 文件加载器
///
/// 使用 tobj crate 加载 Wavefront OBJ 格式的模型，输出位置、顶点颜色与纹理坐标。
use super::MeshLoader;
use crate::core::error::{MeshLoadError, Result};
use crate::geometry::mesh::MeshData;
use crate::geometry::vertex::Vertex;
use std::io::{BufReader, Cursor};
use std::path::Path;

/// 没有顶点颜色时使用的默认颜色
const DEFAULT_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

/// OBJ 格式加载器
///
/// # 特性
///
/// - 自动三角化
/// - 单一索引（位置、UV 共用一套索引）
/// - UV 坐标翻转（V 轴：1.0 - v）
/// - 多个对象合并为一个网格
pub struct ObjLoader;

impl ObjLoader {
    fn load_options() -> tobj::LoadOptions {
        tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        }
    }

    /// 把 tobj 的模型列表合并成一个 `MeshData`
    fn build_mesh(models: &[tobj::Model], name: &str) -> Result<MeshData> {
        if models.is_empty() {
            return Err(MeshLoadError::InvalidGeometry("OBJ 文件不包含任何模型".to_string()).into());
        }

        let mut mesh_data = MeshData::default().with_name(name);

        for model in models {
            let mesh = &model.mesh;
            let positions = &mesh.positions;
            let texcoords = &mesh.texcoords;
            let colors = &mesh.vertex_color;

            if positions.len() % 3 != 0 {
                return Err(MeshLoadError::InvalidGeometry(format!(
                    "顶点位置数据不完整: {} 个浮点数",
                    positions.len()
                ))
                .into());
            }

            let vertex_start = mesh_data.vertices.len() as u32;
            let vertex_count = positions.len() / 3;

            for i in 0..vertex_count {
                let position = [positions[i * 3], positions[i * 3 + 1], positions[i * 3 + 2]];

                let color = if colors.len() >= (i + 1) * 3 {
                    [colors[i * 3], colors[i * 3 + 1], colors[i * 3 + 2], 1.0]
                } else {
                    DEFAULT_COLOR
                };

                let uv = if texcoords.len() >= (i + 1) * 2 {
                    [texcoords[i * 2], 1.0 - texcoords[i * 2 + 1]]
                } else {
                    [0.0, 0.0]
                };

                mesh_data.vertices.push(Vertex::new(position, color, uv));
            }

            mesh_data
                .indices
                .extend(mesh.indices.iter().map(|&index| vertex_start + index));
        }

        mesh_data.validate()?;

        tracing::info!(
            "成功加载 OBJ: {} 个顶点, {} 个三角形",
            mesh_data.vertex_count(),
            mesh_data.triangle_count()
        );

        Ok(mesh_data)
    }
}

impl MeshLoader for ObjLoader {
    fn load_from_file(path: &Path) -> Result<MeshData> {
        if !path.exists() {
            return Err(MeshLoadError::FileNotFound(path.to_path_buf()).into());
        }

        let (models, _materials) = tobj::load_obj(path, &Self::load_options())
            .map_err(|e| MeshLoadError::ParseError(format!("tobj 解析失败: {}", e)))?;

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Unnamed");

        Self::build_mesh(&models, name)
    }

    fn load_from_memory(data: &[u8]) -> Result<MeshData> {
        let mut reader = BufReader::new(Cursor::new(data));

        // 材质库不参与渲染，直接忽略
        let (models, _materials) = tobj::load_obj_buf(&mut reader, &Self::load_options(), |_| {
            Err(tobj::LoadError::OpenFileFailed)
        })
        .map_err(|e| MeshLoadError::ParseError(format!("tobj 解析失败: {}", e)))?;

        Self::build_mesh(&models, "Memory")
    }

    fn supported_extensions() -> &'static [&'static str] {
        &["obj"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIANGLE_OBJ: &str = "\
v 0.0 0.5 0.5
v 0.5 -0.5 0.5
v -0.5 -0.5 0.5
vt 0.5 1.0
vt 1.0 0.0
vt 0.0 0.0
f 1/1 2/2 3/3
";

    #[test]
    fn test_supported_extensions() {
        assert_eq!(ObjLoader::supported_extensions(), &["obj"]);
    }

    #[test]
    fn test_load_nonexistent_file() {
        assert!(ObjLoader::load_from_file(Path::new("nonexistent.obj")).is_err());
    }

    #[test]
    fn test_load_from_memory() {
        let mesh = ObjLoader::load_from_memory(TRIANGLE_OBJ.as_bytes()).unwrap();
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert_eq!(mesh.vertices[0].color, DEFAULT_COLOR);
        // V 轴翻转
        assert_eq!(mesh.vertices[0].uv, [0.5, 0.0]);
        assert_eq!(mesh.vertices[1].uv, [1.0, 1.0]);
    }

    #[test]
    fn test_empty_obj_rejected() {
        assert!(ObjLoader::load_from_memory(b"# nothing here\n").is_err());
    }
}
