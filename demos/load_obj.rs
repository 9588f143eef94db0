/// OBJ 模型加载示例
///
/// 演示如何使用 geometry 模块加载 OBJ 文件，文件缺失时退回内置四边形。
///
/// 运行方式：
/// ```text
/// cargo run --example load_obj -- resources/mesh/cube.obj
/// ```

use dx_practice::geometry::loaders::{load_mesh_or_default, MeshLoader, ObjLoader};
use std::path::PathBuf;

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let obj_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("resources/mesh/cube.obj"));

    println!("=== DXPractice OBJ 加载器示例 ===\n");
    println!("支持的扩展名: {:?}", ObjLoader::supported_extensions());
    println!("正在加载: {}", obj_path.display());

    let mesh = load_mesh_or_default(&obj_path);

    println!("\n网格信息:");
    println!("  名称: {}", mesh.name.as_deref().unwrap_or("未命名"));
    println!("  顶点数: {}", mesh.vertex_count());
    println!("  索引数: {}", mesh.index_count());
    println!("  三角形数: {}", mesh.triangle_count());

    println!("\n顶点数据（前 {} 个）:", mesh.vertex_count().min(3));
    for (i, vertex) in mesh.vertices.iter().take(3).enumerate() {
        println!("  顶点 {}:", i);
        println!(
            "    位置: [{:.3}, {:.3}, {:.3}]",
            vertex.position[0], vertex.position[1], vertex.position[2]
        );
        println!(
            "    颜色: [{:.3}, {:.3}, {:.3}, {:.3}]",
            vertex.color[0], vertex.color[1], vertex.color[2], vertex.color[3]
        );
        println!("    UV: [{:.3}, {:.3}]", vertex.uv[0], vertex.uv[1]);
    }

    match mesh.validate() {
        Ok(()) => println!("\n✓ 几何数据有效"),
        Err(e) => println!("\n✗ 几何数据无效: {}", e),
    }
}
