// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use image::{Rgb, RgbImage};

/// 单帧图像 (RGB8)
///
/// 由采集源产生, 仅在当前循环迭代内持有, 标注时原地修改.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    /// 纯色帧
    pub fn filled(width: u32, height: u32, color: [u8; 3]) -> Self {
        Self::new(RgbImage::from_pixel(width, height, Rgb(color)))
    }

    /// 从 RGB 字节构建, 长度不符时返回 None
    pub fn from_rgb(width: u32, height: u32, rgb: Vec<u8>) -> Option<Self> {
        RgbImage::from_raw(width, height, rgb).map(Self::new)
    }

    /// 从 BGR 字节构建 (OpenCV 默认通道顺序)
    pub fn from_bgr(width: u32, height: u32, bgr: &[u8]) -> Option<Self> {
        if bgr.len() != (width as usize) * (height as usize) * 3 {
            return None;
        }
        let mut rgb = Vec::with_capacity(bgr.len());
        for chunk in bgr.chunks_exact(3) {
            rgb.push(chunk[2]);
            rgb.push(chunk[1]);
            rgb.push(chunk[0]);
        }
        Self::from_rgb(width, height, rgb)
    }

    /// 导出 BGR 字节, 供编码器和显示窗口使用
    pub fn to_bgr(&self) -> Vec<u8> {
        let mut bgr = Vec::with_capacity(self.image.as_raw().len());
        for chunk in self.image.as_raw().chunks_exact(3) {
            bgr.push(chunk[2]);
            bgr.push(chunk[1]);
            bgr.push(chunk[0]);
        }
        bgr
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut RgbImage {
        &mut self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bgr_swaps_channels() {
        let frame = Frame::from_bgr(1, 1, &[1, 2, 3]).unwrap();
        assert_eq!(frame.image().get_pixel(0, 0).0, [3, 2, 1]);
        assert_eq!(frame.to_bgr(), vec![1, 2, 3]);
    }

    #[test]
    fn test_rejects_short_buffer() {
        assert!(Frame::from_bgr(2, 2, &[0; 11]).is_none());
        assert!(Frame::from_rgb(2, 2, vec![0; 11]).is_none());
    }
}
