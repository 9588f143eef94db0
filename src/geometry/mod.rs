/// 几何体与纹理数据模块
///
/// 负责 CPU 侧的顶点、网格与纹理数据，以及从磁盘加载它们。
///
/// # 模块结构
///
/// - `vertex`: 顶点与变换常量定义
/// - `mesh`: 网格数据
/// - `texture`: RGBA8 纹理数据
/// - `loaders`: 模型加载器
///
/// # 数据流
///
/// ```text
/// 文件 (OBJ / DDS / PNG)
///     ↓
/// ObjLoader / TextureData::load_from_file
///     ↓
/// MeshData / TextureData (CPU侧数据)
///     ↓
/// Engine::upload_mesh / upload_texture
/// ```

pub mod vertex;
pub mod mesh;
pub mod texture;
pub mod loaders;

// 重新导出常用类型
pub use vertex::{Transform, Vertex};
pub use mesh::MeshData;
pub use texture::TextureData;
