/// 视频输出 (Video Output)
///
/// - FrameSink: 录制接口
/// - VideoRecorder: OpenCV VideoWriter 实现 (`opencv` feature)
#[cfg(feature = "opencv")]
pub mod recorder;

#[cfg(feature = "opencv")]
pub use recorder::VideoRecorder;

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::frame::Frame;

/// FourCC 编码标识
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Fourcc(pub [u8; 4]);

impl Fourcc {
    pub fn chars(&self) -> [char; 4] {
        self.0.map(char::from)
    }
}

impl fmt::Debug for Fourcc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.chars();
        write!(f, "{}{}{}{}", a, b, c, d)
    }
}

/// 固定使用 XVID
pub const CODEC: Fourcc = Fourcc(*b"XVID");

/// 录制参数
#[derive(Debug, Clone, PartialEq)]
pub struct RecorderSpec {
    pub path: PathBuf,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    pub codec: Fourcc,
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("could not open video writer for {}", .0.display())]
    Open(PathBuf),
    #[error("recorder backend unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// 录制器
///
/// 只接受与打开时尺寸一致的帧, 尺寸检查由调用方负责.
pub trait FrameSink {
    fn write(&mut self, frame: &Frame) -> Result<(), RecordError>;

    /// 刷新并释放, 可重复调用
    fn close(&mut self) -> Result<(), RecordError>;
}
