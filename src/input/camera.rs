// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 摄像头输入模块 - OpenCV VideoCapture
//!
//! 同步拉帧: 每次 read() 阻塞直到拿到一帧或设备出错

use anyhow::anyhow;
use opencv::{
    core::Mat,
    prelude::*,
    videoio::{self, VideoCapture},
};

use super::{CaptureError, FrameSource};
use crate::frame::Frame;

fn other(err: opencv::Error) -> CaptureError {
    CaptureError::Other(err.into())
}

/// 摄像头采集源
pub struct CameraSource {
    index: u32,
    capture: Option<VideoCapture>,
    width: u32,
    height: u32,
    mat: Mat,
}

impl CameraSource {
    /// 打开摄像头并读取原始分辨率
    pub fn open(index: u32) -> Result<Self, CaptureError> {
        let capture = VideoCapture::new(index as i32, videoio::CAP_ANY).map_err(|err| {
            log::debug!("VideoCapture({}) failed: {}", index, err);
            CaptureError::Open { index }
        })?;
        if !capture.is_opened().map_err(other)? {
            return Err(CaptureError::Open { index });
        }

        let width = capture.get(videoio::CAP_PROP_FRAME_WIDTH).map_err(other)? as u32;
        let height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT).map_err(other)? as u32;
        if width == 0 || height == 0 {
            return Err(CaptureError::Geometry {
                index,
                width,
                height,
            });
        }
        log::info!("📷 Camera {} opened at {}x{}", index, width, height);

        Ok(Self {
            index,
            capture: Some(capture),
            width,
            height,
            mat: Mat::default(),
        })
    }
}

impl FrameSource for CameraSource {
    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn read(&mut self) -> Result<Option<Frame>, CaptureError> {
        let Some(capture) = self.capture.as_mut() else {
            return Err(CaptureError::Other(anyhow!(
                "camera {} already released",
                self.index
            )));
        };

        if !capture.read(&mut self.mat).map_err(other)? || self.mat.empty() {
            return Ok(None);
        }
        if self.mat.channels() != 3 {
            return Err(CaptureError::Other(anyhow!(
                "expected a 3-channel BGR frame, got {} channels",
                self.mat.channels()
            )));
        }

        let width = self.mat.cols() as u32;
        let height = self.mat.rows() as u32;
        let bytes = self.mat.data_bytes().map_err(other)?;
        let frame = Frame::from_bgr(width, height, bytes)
            .ok_or_else(|| CaptureError::Other(anyhow!("BGR buffer size mismatch")))?;
        Ok(Some(frame))
    }

    fn release(&mut self) -> Result<(), CaptureError> {
        if let Some(mut capture) = self.capture.take() {
            capture.release().map_err(other)?;
        }
        Ok(())
    }
}
