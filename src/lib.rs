// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod annotate; // 检测框与标签绘制
pub mod backend; // 资源工厂
pub mod config; // 命令行参数
pub mod detection; // 检测结果与检测器接口
pub mod display; // 预览窗口
pub mod frame; // 帧数据
pub mod input; // 视频输入系统
pub mod models; // 模型接口与具体实现
pub mod output; // 视频录制
pub mod session; // 主循环
pub mod signal; // Ctrl+C

pub use crate::annotate::{load_font, Annotator};
pub use crate::backend::{Backend, NativeBackend};
pub use crate::config::{Args, Config, ConfigError};
pub use crate::detection::{BBox, ClassNames, Detection, Detector, CONFIDENCE_THRESHOLD};
pub use crate::frame::Frame;
pub use crate::session::{Session, SessionError, SessionReport, Shutdown};
pub use crate::signal::StopSignal;

/// 贪心 NMS: 按置信度降序, 丢弃与已保留框 IoU 超过阈值的框
pub fn non_max_suppression(xs: &mut Vec<Detection>, iou_threshold: f32) {
    xs.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut current_index = 0;
    for index in 0..xs.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            if xs[prev_index].bbox.iou(&xs[index].bbox) > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            xs.swap(current_index, index);
            current_index += 1;
        }
    }
    xs.truncate(current_index);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nms_keeps_best_of_overlapping() {
        let mut xs = vec![
            Detection::new(BBox::new(0.0, 0.0, 10.0, 10.0), 0, 0.6),
            Detection::new(BBox::new(1.0, 1.0, 11.0, 11.0), 0, 0.9),
            Detection::new(BBox::new(50.0, 50.0, 60.0, 60.0), 2, 0.3),
        ];
        non_max_suppression(&mut xs, 0.45);

        assert_eq!(xs.len(), 2);
        assert_eq!(xs[0].confidence, 0.9);
        assert_eq!(xs[1].class_id, 2);
    }

    #[test]
    fn test_nms_empty() {
        let mut xs: Vec<Detection> = Vec::new();
        non_max_suppression(&mut xs, 0.45);
        assert!(xs.is_empty());
    }
}
