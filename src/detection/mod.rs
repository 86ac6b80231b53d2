/// 检测系统 (Detection System)
///
/// - Detector: 目标检测接口
/// - types:    检测框 / 类别名称
pub mod detector;
pub mod types;

pub use detector::Detector;
pub use types::{BBox, ClassNames, Detection, CONFIDENCE_THRESHOLD};
