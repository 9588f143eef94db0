//! 三角形光栅化
//!
//! 顶点着色阶段只做一件事：位置加上常量缓冲区中的偏移，结果直接视为 NDC。
//! 不做背面剔除；深度测试为 LESS 并写入深度；NDC z 不在 [0, 1] 内的像素被裁掉。

use image::{Rgba, RgbaImage};

use crate::core::error::{GraphicsError, Result};
use crate::core::math::Color;
use crate::geometry::{MeshData, TextureData, Transform};
use crate::renderer::{ScissorRect, Viewport};

/// 深度缓冲区（D32_FLOAT）
#[derive(Debug, Clone)]
pub struct DepthBuffer {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl DepthBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![1.0; width as usize * height as usize],
        }
    }

    pub fn clear(&mut self, value: f32) {
        self.data.fill(value);
    }

    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.data[(y * self.width + x) as usize]
    }

    fn set(&mut self, x: u32, y: u32, value: f32) {
        self.data[(y * self.width + x) as usize] = value;
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

/// 一次 DrawIndexed 的输入
pub struct DrawCall<'a> {
    pub mesh: &'a MeshData,
    pub transform: Transform,
    pub texture: Option<&'a TextureData>,
    pub viewport: Viewport,
    pub scissor: ScissorRect,
    pub index_count: u32,
    pub start_index: u32,
    pub base_vertex: i32,
}

/// 屏幕空间顶点
#[derive(Debug, Clone, Copy)]
struct ScreenVertex {
    x: f32,
    y: f32,
    z: f32,
    color: [f32; 4],
    uv: [f32; 2],
}

pub fn clear(target: &mut RgbaImage, color: [f32; 4]) {
    let rgba = Rgba(Color::from(color).to_rgba8());
    for pixel in target.pixels_mut() {
        *pixel = rgba;
    }
}

/// 光栅化一次索引绘制，返回写入的像素数
pub fn draw_indexed(
    target: &mut RgbaImage,
    mut depth: Option<&mut DepthBuffer>,
    call: &DrawCall<'_>,
) -> Result<usize> {
    let start = call.start_index as usize;
    let end = start + call.index_count as usize;
    if end > call.mesh.indices.len() {
        return Err(GraphicsError::CommandExecution(format!(
            "DrawIndexed reads indices {}..{} of {}",
            start,
            end,
            call.mesh.indices.len()
        ))
        .into());
    }

    let mut written = 0;
    for triangle in call.mesh.indices[start..end].chunks_exact(3) {
        let a = shade_vertex(call, triangle[0])?;
        let b = shade_vertex(call, triangle[1])?;
        let c = shade_vertex(call, triangle[2])?;
        written += rasterize_triangle(target, depth.as_deref_mut(), call, [a, b, c]);
    }

    Ok(written)
}

fn shade_vertex(call: &DrawCall<'_>, index: u32) -> Result<ScreenVertex> {
    let vertex_index = index as i64 + call.base_vertex as i64;
    let vertex = usize::try_from(vertex_index)
        .ok()
        .and_then(|i| call.mesh.vertices.get(i))
        .ok_or_else(|| {
            GraphicsError::CommandExecution(format!(
                "Vertex index {} out of range ({} vertices)",
                vertex_index,
                call.mesh.vertices.len()
            ))
        })?;

    let offset = call.transform.offset;
    let ndc = [
        vertex.position[0] + offset[0],
        vertex.position[1] + offset[1],
        vertex.position[2] + offset[2],
    ];

    let vp = &call.viewport;
    Ok(ScreenVertex {
        x: vp.x + (ndc[0] + 1.0) * 0.5 * vp.width,
        y: vp.y + (1.0 - ndc[1]) * 0.5 * vp.height,
        z: ndc[2],
        color: vertex.color,
        uv: vertex.uv,
    })
}

#[inline]
fn edge(a: (f32, f32), b: (f32, f32), p: (f32, f32)) -> f32 {
    (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0)
}

fn rasterize_triangle(
    target: &mut RgbaImage,
    mut depth: Option<&mut DepthBuffer>,
    call: &DrawCall<'_>,
    [v0, v1, v2]: [ScreenVertex; 3],
) -> usize {
    let p0 = (v0.x, v0.y);
    let p1 = (v1.x, v1.y);
    let p2 = (v2.x, v2.y);

    let area = edge(p0, p1, p2);
    if area.abs() < f32::EPSILON {
        return 0;
    }

    let (width, height) = target.dimensions();
    let left = call.scissor.left.max(0) as f32;
    let top = call.scissor.top.max(0) as f32;
    let right = (call.scissor.right as f32).min(width as f32);
    let bottom = (call.scissor.bottom as f32).min(height as f32);

    let min_x = v0.x.min(v1.x).min(v2.x).floor().max(left);
    let max_x = v0.x.max(v1.x).max(v2.x).ceil().min(right);
    let min_y = v0.y.min(v1.y).min(v2.y).floor().max(top);
    let max_y = v0.y.max(v1.y).max(v2.y).ceil().min(bottom);
    if min_x >= max_x || min_y >= max_y {
        return 0;
    }

    let vp = &call.viewport;
    let mut written = 0;

    for y in min_y as u32..max_y as u32 {
        for x in min_x as u32..max_x as u32 {
            let p = (x as f32 + 0.5, y as f32 + 0.5);

            // 除以有符号面积后两种环绕方向都得到非负权重
            let w0 = edge(p1, p2, p) / area;
            let w1 = edge(p2, p0, p) / area;
            let w2 = edge(p0, p1, p) / area;
            if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                continue;
            }

            let z = w0 * v0.z + w1 * v1.z + w2 * v2.z;
            if !(0.0..=1.0).contains(&z) {
                continue;
            }
            let z = vp.min_depth + z * (vp.max_depth - vp.min_depth);

            if let Some(depth) = depth.as_deref_mut() {
                if z >= depth.get(x, y) {
                    continue;
                }
                depth.set(x, y, z);
            }

            let rgba = match call.texture {
                Some(texture) => {
                    let u = w0 * v0.uv[0] + w1 * v1.uv[0] + w2 * v2.uv[0];
                    let v = w0 * v0.uv[1] + w1 * v1.uv[1] + w2 * v2.uv[1];
                    texture.sample_nearest(u, v)
                }
                None => {
                    let mut color = [0.0; 4];
                    for (i, c) in color.iter_mut().enumerate() {
                        *c = w0 * v0.color[i] + w1 * v1.color[i] + w2 * v2.color[i];
                    }
                    Color::from(color).to_rgba8()
                }
            };

            target.put_pixel(x, y, Rgba(rgba));
            written += 1;
        }
    }

    written
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call<'a>(mesh: &'a MeshData, transform: Transform, texture: Option<&'a TextureData>) -> DrawCall<'a> {
        DrawCall {
            mesh,
            transform,
            texture,
            viewport: Viewport::full(8, 8),
            scissor: ScissorRect::full(8, 8),
            index_count: mesh.index_count() as u32,
            start_index: 0,
            base_vertex: 0,
        }
    }

    #[test]
    fn test_fullscreen_quad_covers_target() {
        let mesh = MeshData::quad(1.0, 0.5, [1.0, 0.0, 0.0, 1.0]);
        let mut target = RgbaImage::new(8, 8);
        let written = draw_indexed(&mut target, None, &call(&mesh, Transform::default(), None)).unwrap();

        assert!(written >= 64);
        assert!(target.pixels().all(|p| p.0 == [255, 0, 0, 255]));
    }

    #[test]
    fn test_offset_moves_geometry() {
        let mesh = MeshData::quad(0.25, 0.5, [0.0, 1.0, 0.0, 1.0]);
        let mut target = RgbaImage::new(8, 8);
        clear(&mut target, [0.0, 0.0, 0.0, 1.0]);

        draw_indexed(&mut target, None, &call(&mesh, Transform::new(0.5, 0.0, 0.0), None)).unwrap();

        // 右半部分被覆盖，左半部分保持清除色
        assert_eq!(target.get_pixel(6, 4).0, [0, 255, 0, 255]);
        assert_eq!(target.get_pixel(1, 4).0, [0, 0, 0, 255]);
    }

    #[test]
    fn test_depth_less() {
        let near = MeshData::quad(1.0, 0.2, [1.0, 0.0, 0.0, 1.0]);
        let far = MeshData::quad(1.0, 0.3, [0.0, 0.0, 1.0, 1.0]);
        let mut target = RgbaImage::new(8, 8);
        let mut depth = DepthBuffer::new(8, 8);

        draw_indexed(&mut target, Some(&mut depth), &call(&near, Transform::default(), None)).unwrap();
        draw_indexed(&mut target, Some(&mut depth), &call(&far, Transform::default(), None)).unwrap();

        assert_eq!(target.get_pixel(4, 4).0, [255, 0, 0, 255]);
        assert!((depth.get(4, 4) - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_texture_sampled() {
        let mesh = MeshData::quad(1.0, 0.5, [1.0, 1.0, 1.0, 1.0]);
        let texture = TextureData::solid(2, 2, [10, 20, 30, 255]);
        let mut target = RgbaImage::new(8, 8);

        draw_indexed(&mut target, None, &call(&mesh, Transform::default(), Some(&texture))).unwrap();
        assert_eq!(target.get_pixel(3, 3).0, [10, 20, 30, 255]);
    }

    #[test]
    fn test_out_of_range_indices() {
        let mesh = MeshData::default_quad();
        let mut target = RgbaImage::new(8, 8);
        let mut bad = call(&mesh, Transform::default(), None);
        bad.index_count = 9;
        assert!(draw_indexed(&mut target, None, &bad).is_err());
    }

    #[test]
    fn test_clipped_depth() {
        let mesh = MeshData::quad(1.0, 1.5, [1.0, 1.0, 1.0, 1.0]);
        let mut target = RgbaImage::new(8, 8);
        let written = draw_indexed(&mut target, None, &call(&mesh, Transform::default(), None)).unwrap();
        assert_eq!(written, 0);
    }
}
