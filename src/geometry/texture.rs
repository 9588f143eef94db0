/// 纹理数据模块
///
/// 使用 `image` crate 解码磁盘上的纹理（DDS、PNG 等），统一转换为 RGBA8。

use std::path::Path;
use tracing::info;

use crate::core::error::{DxPracticeError, Result};

/// CPU 侧 RGBA8 纹理
#[derive(Debug, Clone, PartialEq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    /// 行优先，每像素 4 字节
    pub pixels: Vec<u8>,
}

impl TextureData {
    pub fn from_rgba8(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let texture = Self { width, height, pixels };
        texture.validate()?;
        Ok(texture)
    }

    /// 检查尺寸非零且像素缓冲长度与尺寸一致
    pub fn validate(&self) -> Result<()> {
        let expected = self.width as usize * self.height as usize * 4;
        if self.width == 0 || self.height == 0 || self.pixels.len() != expected {
            return Err(DxPracticeError::TextureLoading(format!(
                "{}x{} 纹理需要 {} 字节，实际 {} 字节",
                self.width,
                self.height,
                expected,
                self.pixels.len()
            )));
        }
        Ok(())
    }

    /// 从文件解码
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(DxPracticeError::TextureLoading(format!(
                "纹理文件不存在: {}",
                path.display()
            )));
        }

        let image = image::open(path)?.to_rgba8();
        let (width, height) = image.dimensions();
        Self::from_rgba8(width, height, image.into_raw())
    }

    /// 从文件解码，失败时退回棋盘格纹理
    pub fn load_or_checkerboard(path: &Path) -> Self {
        match Self::load_from_file(path) {
            Ok(texture) => {
                info!(
                    path = %path.display(),
                    width = texture.width,
                    height = texture.height,
                    "Texture loaded"
                );
                texture
            }
            Err(e) => {
                crate::engine_warn!("Failed to load texture: {}, using checkerboard", e);
                Self::checkerboard(64, 8)
            }
        }
    }

    /// 单色纹理
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();

        Self { width, height, pixels }
    }

    /// 黑白棋盘格，`cells` 为每行格子数
    pub fn checkerboard(size: u32, cells: u32) -> Self {
        let cell = (size / cells.max(1)).max(1);
        let mut pixels = Vec::with_capacity(size as usize * size as usize * 4);

        for y in 0..size {
            for x in 0..size {
                let on = ((x / cell) + (y / cell)) % 2 == 0;
                let v = if on { 230 } else { 40 };
                pixels.extend_from_slice(&[v, v, v, 255]);
            }
        }

        Self { width: size, height: size, pixels }
    }

    /// 行跨度（字节）
    #[inline]
    pub fn row_pitch(&self) -> usize {
        self.width as usize * 4
    }

    /// 读取一个像素
    pub fn texel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [self.pixels[i], self.pixels[i + 1], self.pixels[i + 2], self.pixels[i + 3]]
    }

    /// 最近点采样，寻址模式为 Wrap
    pub fn sample_nearest(&self, u: f32, v: f32) -> [u8; 4] {
        let wrap = |t: f32, n: u32| {
            let f = t - t.floor();
            ((f * n as f32) as u32).min(n - 1)
        };
        self.texel(wrap(u, self.width), wrap(v, self.height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solid_texture() {
        let tex = TextureData::solid(2, 3, [255, 0, 0, 255]);
        assert_eq!(tex.pixels.len(), 24);
        assert_eq!(tex.texel(1, 2), [255, 0, 0, 255]);
        assert_eq!(tex.row_pitch(), 8);
    }

    #[test]
    fn test_size_mismatch_rejected() {
        assert!(TextureData::from_rgba8(2, 2, vec![0; 15]).is_err());
        assert!(TextureData::from_rgba8(0, 2, vec![]).is_err());
        assert!(TextureData::from_rgba8(1, 1, vec![1, 2, 3, 4]).is_ok());
    }

    #[test]
    fn test_validate_hand_built_texture() {
        assert!(TextureData::checkerboard(0, 8).validate().is_err());

        let mut tex = TextureData::solid(2, 2, [0, 0, 0, 255]);
        assert!(tex.validate().is_ok());
        tex.pixels.pop();
        assert!(matches!(
            tex.validate(),
            Err(DxPracticeError::TextureLoading(_))
        ));
    }

    #[test]
    fn test_sample_wraps() {
        let tex = TextureData::checkerboard(4, 2);
        assert_eq!(tex.sample_nearest(0.1, 0.1), tex.texel(0, 0));
        assert_eq!(tex.sample_nearest(1.1, 0.1), tex.texel(0, 0));
        assert_eq!(tex.sample_nearest(-0.1, 0.1), tex.texel(3, 0));
        assert_ne!(tex.texel(0, 0), tex.texel(2, 0));
    }

    #[test]
    fn test_missing_file_falls_back() {
        let tex = TextureData::load_or_checkerboard(Path::new("does/not/exist.dds"));
        assert_eq!(tex.width, 64);
    }
}
