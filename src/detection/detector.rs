// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 检测器 (Detector)
//! 职责: Frame → 模型推理 → Vec<Detection>

use anyhow::Result;

use super::types::{ClassNames, Detection};
use crate::frame::Frame;

/// 目标检测器统一接口
///
/// 推理是同步阻塞调用, 不做内部重试; 失败直接返回给主循环.
pub trait Detector {
    /// 对单帧执行检测, 不得修改输入帧
    ///
    /// 返回顺序没有语义, 由调用方按置信度过滤.
    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>>;

    /// 类别名称表, 用于生成标签
    fn names(&self) -> &ClassNames;
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        (**self).infer(frame)
    }

    fn names(&self) -> &ClassNames {
        (**self).names()
    }
}
