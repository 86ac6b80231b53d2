// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 视频录制 - OpenCV VideoWriter

use anyhow::anyhow;
use opencv::{
    core::{self, Mat, Scalar, Size},
    prelude::*,
    videoio::VideoWriter,
};

use super::{FrameSink, RecordError, RecorderSpec};
use crate::frame::Frame;

/// Frame (RGB) → OpenCV Mat (BGR)
pub(crate) fn to_mat(frame: &Frame) -> opencv::Result<Mat> {
    let mut mat = Mat::new_rows_cols_with_default(
        frame.height() as i32,
        frame.width() as i32,
        core::CV_8UC3,
        Scalar::all(0.),
    )?;
    mat.data_bytes_mut()?.copy_from_slice(&frame.to_bgr());
    Ok(mat)
}

pub struct VideoRecorder {
    writer: Option<VideoWriter>,
}

impl VideoRecorder {
    pub fn open(spec: &RecorderSpec) -> Result<Self, RecordError> {
        let [a, b, c, d] = spec.codec.chars();
        let fourcc =
            VideoWriter::fourcc(a, b, c, d).map_err(|e| RecordError::Other(e.into()))?;
        let path = spec
            .path
            .to_str()
            .ok_or_else(|| RecordError::Other(anyhow!("output path is not valid UTF-8")))?;

        let writer = VideoWriter::new(
            path,
            fourcc,
            spec.fps,
            Size::new(spec.width as i32, spec.height as i32),
            true,
        )
        .map_err(|err| {
            log::debug!("VideoWriter::new failed: {}", err);
            RecordError::Open(spec.path.clone())
        })?;
        if !writer.is_opened().map_err(|e| RecordError::Other(e.into()))? {
            return Err(RecordError::Open(spec.path.clone()));
        }

        Ok(Self {
            writer: Some(writer),
        })
    }
}

impl FrameSink for VideoRecorder {
    fn write(&mut self, frame: &Frame) -> Result<(), RecordError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| RecordError::Other(anyhow!("video writer already closed")))?;
        let mat = to_mat(frame).map_err(|e| RecordError::Other(e.into()))?;
        writer.write(&mat).map_err(|e| RecordError::Other(e.into()))
    }

    fn close(&mut self) -> Result<(), RecordError> {
        if let Some(mut writer) = self.writer.take() {
            writer.release().map_err(|e| RecordError::Other(e.into()))?;
        }
        Ok(())
    }
}
