/// 模型实现
///
/// ## YOLOv8
/// - 预处理 (letterbox): 与推理后端无关, ndarray 张量
/// - 推理: TorchScript (`tch` feature)
/// - 后处理 (YOLOv8Postprocessor): 解码 `[1, 4 + nc, N]` 输出 + NMS
///
/// ## 使用示例
/// ```ignore
/// use yolo_recorder::models::YOLOv8;
/// use yolo_recorder::{ClassNames, Detector};
///
/// let mut model = YOLOv8::load(Path::new("yolov8n.pt"), ClassNames::coco())?;
/// let detections = model.infer(&frame)?;
/// ```
pub mod yolov8;

#[cfg(feature = "tch")]
pub use yolov8::YOLOv8;
pub use yolov8::{letterbox, YOLOv8Postprocessor, INPUT_SIZE, MODEL_CONF, MODEL_IOU};
