// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 命令行参数与配置校验

use std::path::{Path, PathBuf};

use clap::Parser;
use thiserror::Error;

/// 模型文件扩展名 (TorchScript)
pub const MODEL_EXTENSION: &str = ".pt";
/// 输出视频扩展名
pub const VIDEO_EXTENSION: &str = ".avi";

/// YOLO 实时检测录制参数
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "YOLO Object Detection", long_about = None)]
pub struct Args {
    /// Path to the YOLO model file (should end with .pt)
    pub model_path: PathBuf,

    /// Path to save the output video (should end with .avi)
    #[arg(long, default_value = "output.avi")]
    pub output: PathBuf,

    /// Camera index
    #[arg(long, default_value_t = 0)]
    pub camera: u32,

    /// Output video FPS
    #[arg(long, default_value_t = 20.0)]
    pub fps: f64,

    /// Run without a preview window (stop with Ctrl+C)
    #[arg(long)]
    pub headless: bool,

    /// TrueType font used for labels
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// Class names file, one name per line (defaults to COCO)
    #[arg(long)]
    pub names: Option<PathBuf>,
}

/// 配置错误 (在打开任何资源之前报告)
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Model file '{}' not found.", .0.display())]
    ModelNotFound(PathBuf),
    #[error("Model path must end with .pt")]
    ModelExtension,
    #[error("Output path must end with .avi")]
    OutputExtension,
    #[error("FPS must be a positive number, got {0}")]
    Fps(f64),
}

/// 校验后的配置, 进程生命周期内不可变
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    model_path: PathBuf,
    output: PathBuf,
    camera: u32,
    fps: f64,
    headless: bool,
    font: Option<PathBuf>,
    names: Option<PathBuf>,
}

impl Args {
    /// 按顺序校验: 模型存在 → 模型扩展名 → 输出扩展名 → 帧率
    pub fn validate(self) -> Result<Config, ConfigError> {
        if !self.model_path.exists() {
            return Err(ConfigError::ModelNotFound(self.model_path));
        }
        if !has_suffix(&self.model_path, MODEL_EXTENSION) {
            return Err(ConfigError::ModelExtension);
        }
        if !has_suffix(&self.output, VIDEO_EXTENSION) {
            return Err(ConfigError::OutputExtension);
        }
        if !self.fps.is_finite() || self.fps <= 0.0 {
            return Err(ConfigError::Fps(self.fps));
        }

        Ok(Config {
            model_path: self.model_path,
            output: self.output,
            camera: self.camera,
            fps: self.fps,
            headless: self.headless,
            font: self.font,
            names: self.names,
        })
    }
}

// 与字符串后缀比较, 不使用 Path::extension (".pt" 本身不算扩展名)
fn has_suffix(path: &Path, suffix: &str) -> bool {
    path.to_string_lossy().ends_with(suffix)
}

impl Config {
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn camera(&self) -> u32 {
        self.camera
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn headless(&self) -> bool {
        self.headless
    }

    pub fn font(&self) -> Option<&Path> {
        self.font.as_deref()
    }

    pub fn names(&self) -> Option<&Path> {
        self.names.as_deref()
    }
}
