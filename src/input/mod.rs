/// 视频输入系统 (Video Input System)
///
/// - FrameSource: 按需拉取单帧的采集源接口
/// - CameraSource: 本地摄像头 (OpenCV VideoCapture, `opencv` feature)
#[cfg(feature = "opencv")]
pub mod camera;

#[cfg(feature = "opencv")]
pub use camera::CameraSource;

use thiserror::Error;

use crate::frame::Frame;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("could not open camera {index}")]
    Open { index: u32 },
    #[error("camera {index} reported an invalid resolution {width}x{height}")]
    Geometry { index: u32, width: u32, height: u32 },
    #[error("capture backend unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// 采集源
pub trait FrameSource {
    /// 打开后得到的原始分辨率 (width, height)
    fn resolution(&self) -> (u32, u32);

    /// 读取下一帧
    ///
    /// `Ok(None)` 表示流结束; 两种失败都会结束录制, 不做重试.
    fn read(&mut self) -> Result<Option<Frame>, CaptureError>;

    /// 释放设备, 可重复调用
    fn release(&mut self) -> Result<(), CaptureError>;
}
