// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 资源工厂: 打开摄像头 / 加载模型 / 创建录制器 / 打开窗口
//!
//! 具体实现由 feature 决定:
//! - `opencv`: CameraSource, VideoRecorder, HighGuiPreview
//! - `tch`:    YOLOv8 (TorchScript)
//!
//! 未编译进来的后端在打开时返回错误, 进程以退出码 1 结束.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::config::Config;
use crate::detection::{ClassNames, Detector};
use crate::display::Preview;
use crate::input::{CaptureError, FrameSource};
use crate::output::{FrameSink, RecordError, RecorderSpec};

#[cfg(not(feature = "opencv"))]
const NO_OPENCV: &str = "built without the `opencv` feature";

/// 会话所需的全部外部资源
pub trait Backend {
    fn open_camera(&mut self, index: u32) -> Result<Box<dyn FrameSource>, CaptureError>;

    fn load_detector(&mut self, model: &Path) -> Result<Box<dyn Detector>>;

    fn open_recorder(&mut self, spec: &RecorderSpec) -> Result<Box<dyn FrameSink>, RecordError>;

    fn open_preview(&mut self, title: &str) -> Result<Box<dyn Preview>>;
}

/// 本机后端 (OpenCV + libtorch)
pub struct NativeBackend {
    names: Option<PathBuf>,
}

impl NativeBackend {
    pub fn new(config: &Config) -> Self {
        Self {
            names: config.names().map(Path::to_path_buf),
        }
    }

    fn class_names(&self) -> Result<ClassNames> {
        match &self.names {
            Some(path) => ClassNames::from_file(path),
            None => Ok(ClassNames::coco()),
        }
    }
}

impl Backend for NativeBackend {
    fn open_camera(&mut self, index: u32) -> Result<Box<dyn FrameSource>, CaptureError> {
        #[cfg(feature = "opencv")]
        {
            Ok(Box::new(crate::input::CameraSource::open(index)?))
        }
        #[cfg(not(feature = "opencv"))]
        {
            log::debug!("camera {} requested without a capture backend", index);
            Err(CaptureError::Unavailable(NO_OPENCV.to_string()))
        }
    }

    fn load_detector(&mut self, model: &Path) -> Result<Box<dyn Detector>> {
        let names = self.class_names()?;
        #[cfg(feature = "tch")]
        {
            Ok(Box::new(crate::models::YOLOv8::load(model, names)?))
        }
        #[cfg(not(feature = "tch"))]
        {
            anyhow::bail!(
                "cannot load {} ({} classes): built without the `tch` feature",
                model.display(),
                names.len()
            )
        }
    }

    fn open_recorder(&mut self, spec: &RecorderSpec) -> Result<Box<dyn FrameSink>, RecordError> {
        #[cfg(feature = "opencv")]
        {
            Ok(Box::new(crate::output::VideoRecorder::open(spec)?))
        }
        #[cfg(not(feature = "opencv"))]
        {
            log::debug!("recorder {:?} requested without an encoder backend", spec);
            Err(RecordError::Unavailable(NO_OPENCV.to_string()))
        }
    }

    fn open_preview(&mut self, title: &str) -> Result<Box<dyn Preview>> {
        #[cfg(feature = "opencv")]
        {
            Ok(Box::new(crate::display::HighGuiPreview::open(title)?))
        }
        #[cfg(not(feature = "opencv"))]
        {
            anyhow::bail!("cannot open window '{}': {}", title, NO_OPENCV)
        }
    }
}
