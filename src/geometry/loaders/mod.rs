/// 模型加载器模块
///
/// 提供统一的模型加载接口。目前只支持 Wavefront OBJ（使用 tobj crate）。
///
/// # 使用示例
///
/// ```rust,no_run
/// use dx_practice::geometry::loaders::{MeshLoader, ObjLoader};
/// use std::path::Path;
///
/// let mesh = ObjLoader::load_from_file(Path::new("cube.obj"))?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
use crate::core::error::{MeshLoadError, Result};
use crate::geometry::mesh::MeshData;
use std::path::Path;

pub mod obj_loader;

pub use obj_loader::ObjLoader;

/// 网格加载器 trait
///
/// 加载器无状态，只产出 CPU 侧的 `MeshData`，不涉及 GPU 资源。
pub trait MeshLoader {
    /// 从文件路径加载网格
    ///
    /// # 错误
    ///
    /// - 文件不存在或无法读取
    /// - 文件格式错误或损坏
    /// - 数据验证失败
    fn load_from_file(path: &Path) -> Result<MeshData>;

    /// 从内存中的文件内容加载网格
    fn load_from_memory(data: &[u8]) -> Result<MeshData>;

    /// 支持的文件扩展名（小写，不含点号）
    fn supported_extensions() -> &'static [&'static str];
}

/// 根据文件扩展名选择合适的加载器
pub fn load_mesh(path: &Path) -> Result<MeshData> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .ok_or_else(|| MeshLoadError::UnsupportedFormat("无法确定文件扩展名".to_string()))?;

    if ObjLoader::supported_extensions().contains(&extension.as_str()) {
        ObjLoader::load_from_file(path)
    } else {
        Err(MeshLoadError::UnsupportedFormat(format!("不支持的文件格式: .{}", extension)).into())
    }
}

/// 加载网格，失败时记录警告并退回默认四边形
pub fn load_mesh_or_default(path: &Path) -> MeshData {
    match load_mesh(path) {
        Ok(mesh) => mesh,
        Err(e) => {
            crate::engine_warn!(
                "Failed to load mesh {}: {}, using default quad",
                path.display(),
                e
            );
            MeshData::default_quad()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_extension() {
        assert!(load_mesh(Path::new("model.fbx")).is_err());
        assert!(load_mesh(Path::new("model")).is_err());
    }

    #[test]
    fn test_fallback_to_quad() {
        let mesh = load_mesh_or_default(Path::new("missing/cube.obj"));
        assert_eq!(mesh, MeshData::default_quad());
    }
}
