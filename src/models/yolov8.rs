// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// YOLOv8 检测模型
// 包含: 预处理 (letterbox)、推理 (TorchScript)、后处理 (解码 + NMS)

use anyhow::{bail, Result};
use fast_image_resize as fr;
use image::RgbImage;
use ndarray::{s, Array, Axis, IxDyn};

use crate::detection::{BBox, Detection};
use crate::non_max_suppression;

/// 模型输入尺寸 (正方形)
pub const INPUT_SIZE: u32 = 640;
/// 模型内部置信度下限 (低于此值的候选框直接丢弃)
pub const MODEL_CONF: f32 = 0.25;
/// NMS IoU 阈值
pub const MODEL_IOU: f32 = 0.45;

const CXYWH_OFFSET: usize = 4;
// letterbox 填充值
const PAD_VALUE: f32 = 144.0 / 255.0;

fn scale_wh(w0: f32, h0: f32, w1: f32, h1: f32) -> (f32, f32, f32) {
    let r = (w1 / w0).min(h1 / h0);
    (r, (w0 * r).round(), (h0 * r).round())
}

/// 预处理: RGB 图片 → NCHW 张量 (1, 3, size, size)
///
/// 保持宽高比缩放后贴在左上角, 其余区域用灰色填充.
/// 返回张量以及缩放比例 (后处理用来还原坐标).
pub fn letterbox(image: &RgbImage, size: u32) -> Result<(Array<f32, IxDyn>, f32)> {
    let (w0, h0) = image.dimensions();
    if w0 == 0 || h0 == 0 {
        bail!("cannot preprocess an empty frame");
    }
    let (ratio, w_new, h_new) = scale_wh(w0 as f32, h0 as f32, size as f32, size as f32);
    let w_new = (w_new as u32).clamp(1, size);
    let h_new = (h_new as u32).clamp(1, size);

    let src_image =
        fr::images::Image::from_vec_u8(w0, h0, image.as_raw().clone(), fr::PixelType::U8x3)?;
    let mut dst_image = fr::images::Image::new(w_new, h_new, fr::PixelType::U8x3);
    let mut resizer = fr::Resizer::new();
    resizer.resize(
        &src_image,
        &mut dst_image,
        &fr::ResizeOptions::new()
            .resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear)),
    )?;

    let mut ys = Array::from_elem((1, 3, size as usize, size as usize), PAD_VALUE).into_dyn();
    let row = w_new as usize;
    for (i, rgb) in dst_image.buffer().chunks_exact(3).enumerate() {
        let x = i % row;
        let y = i / row;
        ys[[0, 0, y, x]] = (rgb[0] as f32) / 255.0;
        ys[[0, 1, y, x]] = (rgb[1] as f32) / 255.0;
        ys[[0, 2, y, x]] = (rgb[2] as f32) / 255.0;
    }

    Ok((ys, ratio))
}

/// YOLOv8 后处理器
///
/// 输入为模型原始输出 `[1, 4 + nc, N]`, 每列是 (cx, cy, w, h, 各类别得分).
#[derive(Debug, Clone)]
pub struct YOLOv8Postprocessor {
    pub input_size: u32,
    pub conf: f32,
    pub iou: f32,
}

impl Default for YOLOv8Postprocessor {
    fn default() -> Self {
        Self {
            input_size: INPUT_SIZE,
            conf: MODEL_CONF,
            iou: MODEL_IOU,
        }
    }
}

impl YOLOv8Postprocessor {
    pub fn postprocess(
        &self,
        preds: &Array<f32, IxDyn>,
        width_original: u32,
        height_original: u32,
    ) -> Result<Vec<Detection>> {
        let shape = preds.shape();
        if shape.len() != 3 || shape[0] != 1 || shape[1] <= CXYWH_OFFSET {
            bail!("unexpected detector output shape: {:?}", shape);
        }
        let nc = shape[1] - CXYWH_OFFSET;

        let width_original = width_original as f32;
        let height_original = height_original as f32;
        let ratio = (self.input_size as f32 / width_original)
            .min(self.input_size as f32 / height_original);

        let anchor = preds.index_axis(Axis(0), 0);
        let mut data: Vec<Detection> = Vec::new();
        for pred in anchor.axis_iter(Axis(1)) {
            let bbox = pred.slice(s![0..CXYWH_OFFSET]);
            let clss = pred.slice(s![CXYWH_OFFSET..CXYWH_OFFSET + nc]);

            let Some((id, &confidence)) = clss
                .iter()
                .enumerate()
                .reduce(|max, x| if x.1 > max.1 { x } else { max })
            else {
                continue;
            };

            if confidence < self.conf {
                continue;
            }

            let cx = bbox[0] / ratio;
            let cy = bbox[1] / ratio;
            let w = bbox[2] / ratio;
            let h = bbox[3] / ratio;
            let y_bbox = BBox::new(cx - w / 2., cy - h / 2., cx + w / 2., cy + h / 2.)
                .clamp(width_original, height_original);
            if !y_bbox.is_valid() {
                continue;
            }

            data.push(Detection::new(y_bbox, id, confidence.min(1.0)));
        }

        non_max_suppression(&mut data, self.iou);
        Ok(data)
    }
}

#[cfg(feature = "tch")]
pub use self::torch::YOLOv8;

#[cfg(feature = "tch")]
mod torch {
    use std::path::Path;

    use anyhow::{Context, Result};
    use ndarray::{Array, IxDyn};
    use tch::{CModule, Device, Kind, Tensor};

    use super::{letterbox, YOLOv8Postprocessor};
    use crate::detection::{ClassNames, Detection, Detector};
    use crate::frame::Frame;

    /// TorchScript 版 YOLOv8 (Ultralytics `export format=torchscript`)
    pub struct YOLOv8 {
        module: CModule,
        device: Device,
        postprocessor: YOLOv8Postprocessor,
        names: ClassNames,
    }

    impl YOLOv8 {
        /// 加载模型, 有 CUDA 时优先使用 GPU
        pub fn load(path: &Path, names: ClassNames) -> Result<Self> {
            let device = Device::cuda_if_available();
            let mut module = CModule::load_on_device(path, device)
                .with_context(|| format!("failed to load TorchScript model {}", path.display()))?;
            module.set_eval();
            log::debug!("TorchScript model on {:?}, {} classes", device, names.len());

            Ok(Self {
                module,
                device,
                postprocessor: YOLOv8Postprocessor::default(),
                names,
            })
        }
    }

    impl Detector for YOLOv8 {
        fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
            let size = self.postprocessor.input_size as i64;
            let (xs, _) = letterbox(frame.image(), self.postprocessor.input_size)?;
            let data = xs.as_slice().context("input tensor is not contiguous")?;
            let input = Tensor::from_slice(data)
                .view([1, 3, size, size])
                .to_device(self.device);

            let output = tch::no_grad(|| self.module.forward_ts(&[input]))?;
            let shape: Vec<usize> = output.size().iter().map(|&d| d as usize).collect();
            let flat = output
                .to_device(Device::Cpu)
                .to_kind(Kind::Float)
                .contiguous()
                .view([-1]);
            let values = Vec::<f32>::try_from(&flat)?;
            let ys = Array::from_shape_vec(IxDyn(&shape), values)?;

            self.postprocessor
                .postprocess(&ys, frame.width(), frame.height())
        }

        fn names(&self) -> &ClassNames {
            &self.names
        }
    }
}
