// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 标注器: 在帧上绘制检测框和标签

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use anyhow::{Context, Result};
use image::Rgb;
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::detection::{ClassNames, Detection, CONFIDENCE_THRESHOLD};
use crate::frame::Frame;

/// 检测框与标签背景颜色 (品红)
pub const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 255]);
/// 标签文字颜色
pub const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

const BOX_THICKNESS: i32 = 2;
const LABEL_SCALE: f32 = 20.0;
const LABEL_PADDING: i32 = 10;
const TEXT_OFFSET: i32 = 5;

/// 常见系统字体位置, 按顺序尝试
const FONT_SEARCH_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// 加载标签字体
///
/// 显式指定的字体读取失败时报错; 未指定时依次查找系统字体, 都没有则返回 None.
pub fn load_font(path: Option<&Path>) -> Result<Option<FontVec>> {
    if let Some(path) = path {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read font {}", path.display()))?;
        let font = FontVec::try_from_vec(bytes)
            .with_context(|| format!("invalid font file {}", path.display()))?;
        return Ok(Some(font));
    }

    for candidate in FONT_SEARCH_PATHS {
        if let Ok(bytes) = std::fs::read(candidate) {
            if let Ok(font) = FontVec::try_from_vec(bytes) {
                log::debug!("label font: {}", candidate);
                return Ok(Some(font));
            }
        }
    }
    Ok(None)
}

/// 标签文本: "{类别}: {置信度, 两位小数}"
pub fn label(name: &str, confidence: f32) -> String {
    format!("{}: {:.2}", name, confidence)
}

pub struct Annotator {
    font: Option<FontVec>,
    scale: PxScale,
    threshold: f32,
}

impl Annotator {
    pub fn new(font: Option<FontVec>) -> Self {
        Self {
            font,
            scale: PxScale::from(LABEL_SCALE),
            threshold: CONFIDENCE_THRESHOLD,
        }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// 需要绘制的检测 (置信度严格大于阈值), 保持检测器原始顺序
    pub fn visible<'a>(&self, detections: &'a [Detection]) -> impl Iterator<Item = &'a Detection> {
        let threshold = self.threshold;
        detections
            .iter()
            .filter(move |det| det.confidence > threshold)
    }

    /// 原地绘制检测框和标签, 返回绘制的检测数量
    pub fn annotate(&self, frame: &mut Frame, detections: &[Detection], names: &ClassNames) -> usize {
        let mut drawn = 0;
        for det in self.visible(detections) {
            let text = label(&names.name(det.class_id), det.confidence);
            self.draw_detection(frame, det, &text);
            drawn += 1;
        }
        drawn
    }

    fn draw_detection(&self, frame: &mut Frame, det: &Detection, text: &str) {
        let image = frame.image_mut();
        let x1 = det.bbox.x1 as i32;
        let y1 = det.bbox.y1 as i32;
        let x2 = det.bbox.x2 as i32;
        let y2 = det.bbox.y2 as i32;

        // 检测框 (向内加粗)
        for t in 0..BOX_THICKNESS {
            let w = x2 - x1 - 2 * t;
            let h = y2 - y1 - 2 * t;
            if w <= 0 || h <= 0 {
                break;
            }
            draw_hollow_rect_mut(
                image,
                Rect::at(x1 + t, y1 + t).of_size(w as u32, h as u32),
                BOX_COLOR,
            );
        }

        // 标签背景
        let (tw, th) = self.text_size(text);
        let bg_top = y1 - th as i32 - LABEL_PADDING;
        draw_filled_rect_mut(
            image,
            Rect::at(x1, bg_top).of_size(tw.max(1), th + LABEL_PADDING as u32),
            BOX_COLOR,
        );

        // 标签文字
        if let Some(font) = &self.font {
            draw_text_mut(
                image,
                TEXT_COLOR,
                x1,
                y1 - th as i32 - TEXT_OFFSET,
                self.scale,
                font,
                text,
            );
        }
    }

    fn text_size(&self, text: &str) -> (u32, u32) {
        match &self.font {
            Some(font) => text_size(self.scale, font, text),
            // 无字体时按平均字宽估算
            None => {
                let chars = text.chars().count() as f32;
                (
                    (chars * LABEL_SCALE * 0.5).ceil() as u32,
                    (LABEL_SCALE * 0.7).ceil() as u32,
                )
            }
        }
    }
}
