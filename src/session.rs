// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 主循环 (Main Loop)
//!
//! 状态机: INIT → RUNNING → SHUTTING_DOWN → TERMINATED
//!
//! ```text
//! 采集 → 检测 → 标注 → 录制 → 显示 → 按键/中断检查
//! ```
//!
//! 每种结束原因都是一个 `Shutdown` 值; 资源统一放在 `Resources` 里,
//! 无论从哪条路径离开都会被释放 (包括 panic 展开).

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use thiserror::Error;

use crate::annotate::Annotator;
use crate::backend::Backend;
use crate::config::Config;
use crate::detection::Detector;
use crate::display::{Preview, QUIT_KEY, WINDOW_TITLE};
use crate::input::{CaptureError, FrameSource};
use crate::output::{FrameSink, RecordError, RecorderSpec, CODEC};
use crate::signal::StopSignal;

/// 初始化阶段的致命错误 (退出码 1)
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Could not open camera {index}")]
    CameraOpen {
        index: u32,
        #[source]
        source: CaptureError,
    },
    #[error("Failed to load model {}: {reason}", .path.display())]
    ModelLoad { path: PathBuf, reason: String },
    #[error("Could not open video writer for {}", .path.display())]
    RecorderOpen {
        path: PathBuf,
        #[source]
        source: RecordError,
    },
    #[error("Could not open display window: {reason}")]
    PreviewOpen { reason: String },
}

/// 会话结束原因
#[derive(Debug)]
pub enum Shutdown {
    /// 按下退出键
    Quit,
    /// Ctrl+C
    Interrupted,
    /// 读帧失败 / 流结束
    CaptureFailed,
    /// 循环内的其他错误 (推理失败、写入失败等)
    Error(String),
    /// 初始化失败
    Fatal(SessionError),
}

impl Shutdown {
    pub fn exit_code(&self) -> i32 {
        match self {
            Shutdown::Fatal(_) => 1,
            _ => 0,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Shutdown::Fatal(_))
    }
}

#[derive(Debug)]
enum State {
    Init,
    Running,
    ShuttingDown(Shutdown),
    Terminated(Shutdown),
}

/// 会话结果
#[derive(Debug)]
pub struct SessionReport {
    pub frames_written: u64,
    pub output: PathBuf,
    pub shutdown: Shutdown,
}

impl SessionReport {
    pub fn exit_code(&self) -> i32 {
        self.shutdown.exit_code()
    }
}

impl fmt::Display for SessionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Recorded {} frames to {}",
            self.frames_written,
            self.output.display()
        )
    }
}

/// 会话期间持有的外部资源
#[derive(Default)]
struct Resources {
    camera: Option<Box<dyn FrameSource>>,
    detector: Option<Box<dyn Detector>>,
    recorder: Option<Box<dyn FrameSink>>,
    preview: Option<Box<dyn Preview>>,
}

impl Resources {
    /// 依次释放摄像头、录制器、窗口; 某一项失败不影响其余各项.
    /// 返回失败数量.
    fn release(&mut self) -> usize {
        let mut failures = 0;
        if let Some(mut camera) = self.camera.take() {
            if let Err(err) = camera.release() {
                log::warn!("failed to release camera: {}", err);
                failures += 1;
            }
        }
        if let Some(mut recorder) = self.recorder.take() {
            if let Err(err) = recorder.close() {
                log::warn!("failed to close video writer: {}", err);
                failures += 1;
            }
        }
        if let Some(mut preview) = self.preview.take() {
            if let Err(err) = preview.close() {
                log::warn!("failed to close display window: {:#}", err);
                failures += 1;
            }
        }
        self.detector = None;
        failures
    }
}

impl Drop for Resources {
    fn drop(&mut self) {
        self.release();
    }
}

pub struct Session<B: Backend> {
    config: Config,
    backend: B,
    annotator: Annotator,
    stop: StopSignal,
    resources: Resources,
    geometry: (u32, u32),
    frames_written: u64,
}

impl<B: Backend> Session<B> {
    pub fn new(config: Config, backend: B, annotator: Annotator, stop: StopSignal) -> Self {
        Self {
            config,
            backend,
            annotator,
            stop,
            resources: Resources::default(),
            geometry: (0, 0),
            frames_written: 0,
        }
    }

    /// 运行到结束, 返回报告
    pub fn run(mut self) -> SessionReport {
        let mut state = State::Init;
        loop {
            state = match state {
                State::Init => match self.init() {
                    Ok(()) if self.stop.is_triggered() => {
                        log::info!("Keyboard interrupt received, exiting...");
                        State::ShuttingDown(Shutdown::Interrupted)
                    }
                    Ok(()) => State::Running,
                    Err(err) => State::ShuttingDown(Shutdown::Fatal(err)),
                },
                State::Running => State::ShuttingDown(self.record()),
                State::ShuttingDown(reason) => {
                    self.shutdown(&reason);
                    State::Terminated(reason)
                }
                State::Terminated(reason) => {
                    return SessionReport {
                        frames_written: self.frames_written,
                        output: self.config.output().to_path_buf(),
                        shutdown: reason,
                    };
                }
            };
        }
    }

    fn init(&mut self) -> Result<(), SessionError> {
        let index = self.config.camera();
        let camera = self
            .backend
            .open_camera(index)
            .map_err(|source| {
                log::debug!("camera {}: {}", index, source);
                SessionError::CameraOpen { index, source }
            })?;
        self.geometry = camera.resolution();
        self.resources.camera = Some(camera);

        let model = self.config.model_path();
        log::info!("Loading YOLO model from {}...", model.display());
        let detector = self
            .backend
            .load_detector(model)
            .map_err(|err| SessionError::ModelLoad {
                path: model.to_path_buf(),
                reason: format!("{:#}", err),
            })?;
        log::info!("✅ Model loaded successfully!");
        self.resources.detector = Some(detector);

        let (width, height) = self.geometry;
        let spec = RecorderSpec {
            path: self.config.output().to_path_buf(),
            fps: self.config.fps(),
            width,
            height,
            codec: CODEC,
        };
        let recorder = self
            .backend
            .open_recorder(&spec)
            .map_err(|source| SessionError::RecorderOpen {
                path: spec.path.clone(),
                source,
            })?;
        self.resources.recorder = Some(recorder);

        if !self.config.headless() {
            let preview = self
                .backend
                .open_preview(WINDOW_TITLE)
                .map_err(|err| SessionError::PreviewOpen {
                    reason: format!("{:#}", err),
                })?;
            self.resources.preview = Some(preview);
        }

        log::info!(
            "🎬 Recording to {} ({}x{} @ {} fps, {:?})",
            self.config.output().display(),
            width,
            height,
            self.config.fps(),
            CODEC
        );
        if self.config.headless() {
            log::info!("Press Ctrl+C to stop...");
        } else {
            log::info!("Press '{}' to quit or Ctrl+C to stop...", QUIT_KEY);
        }
        Ok(())
    }

    fn record(&mut self) -> Shutdown {
        loop {
            match self.step() {
                Ok(None) => {}
                Ok(Some(reason)) => return reason,
                Err(err) => {
                    log::error!("An error occurred: {:#}", err);
                    return Shutdown::Error(format!("{:#}", err));
                }
            }
        }
    }

    /// 单次迭代: 返回 Some 表示结束循环
    fn step(&mut self) -> anyhow::Result<Option<Shutdown>> {
        let resources = &mut self.resources;

        let camera = resources.camera.as_mut().context("camera is not open")?;
        let mut frame = match camera.read() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                log::error!("Error: Failed to capture image");
                return Ok(Some(Shutdown::CaptureFailed));
            }
            Err(err) => {
                log::error!("Error: Failed to capture image ({})", err);
                return Ok(Some(Shutdown::CaptureFailed));
            }
        };

        let detector = resources.detector.as_mut().context("model is not loaded")?;
        let detections = detector.infer(&frame).context("inference failed")?;
        let drawn = self
            .annotator
            .annotate(&mut frame, &detections, detector.names());
        log::debug!(
            "frame {}: {} detections, {} drawn",
            self.frames_written + 1,
            detections.len(),
            drawn
        );

        if frame.dimensions() != self.geometry {
            let (width, height) = frame.dimensions();
            bail!(
                "frame size {}x{} does not match recorder size {}x{}",
                width,
                height,
                self.geometry.0,
                self.geometry.1
            );
        }
        let recorder = resources.recorder.as_mut().context("recorder is not open")?;
        recorder.write(&frame).context("failed to write frame")?;
        self.frames_written += 1;

        if let Some(preview) = resources.preview.as_mut() {
            preview.show(&frame)?;
            if preview.poll_key()? == Some(QUIT_KEY) {
                log::info!("Quit key pressed, exiting...");
                return Ok(Some(Shutdown::Quit));
            }
        }

        if self.stop.is_triggered() {
            log::info!("Keyboard interrupt received, exiting...");
            return Ok(Some(Shutdown::Interrupted));
        }

        Ok(None)
    }

    fn shutdown(&mut self, reason: &Shutdown) {
        let failures = self.resources.release();
        if failures > 0 {
            log::warn!("{} resource(s) failed to release cleanly", failures);
        }
        log::debug!("session ended: {:?}", reason);
    }

    pub fn output(&self) -> &Path {
        self.config.output()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use anyhow::{anyhow, Result};
    use clap::Parser;
    use tempfile::NamedTempFile;

    use super::*;
    use crate::annotate::BOX_COLOR;
    use crate::config::Args;
    use crate::detection::{BBox, ClassNames, Detection};
    use crate::frame::Frame;

    const W: u32 = 64;
    const H: u32 = 48;

    /// 记录各个假资源上发生的事件
    #[derive(Default)]
    struct Log {
        events: Vec<String>,
        written: Vec<Frame>,
    }

    type Shared = Rc<RefCell<Log>>;

    fn has(log: &Shared, event: &str) -> bool {
        log.borrow().events.iter().any(|e| e == event)
    }

    struct FakeCamera {
        log: Shared,
        frames: usize,
        size: (u32, u32),
        fail_release: bool,
    }

    impl FrameSource for FakeCamera {
        fn resolution(&self) -> (u32, u32) {
            (W, H)
        }

        fn read(&mut self) -> Result<Option<Frame>, CaptureError> {
            if self.frames == 0 {
                return Ok(None);
            }
            self.frames -= 1;
            Ok(Some(Frame::filled(self.size.0, self.size.1, [10, 20, 30])))
        }

        fn release(&mut self) -> Result<(), CaptureError> {
            self.log.borrow_mut().events.push("camera.release".into());
            if self.fail_release {
                return Err(CaptureError::Other(anyhow!("device busy")));
            }
            Ok(())
        }
    }

    type Script = Box<dyn FnMut(usize) -> Result<Vec<Detection>>>;

    struct FakeDetector {
        calls: usize,
        script: Script,
        names: ClassNames,
    }

    impl Detector for FakeDetector {
        fn infer(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
            self.calls += 1;
            (self.script)(self.calls)
        }

        fn names(&self) -> &ClassNames {
            &self.names
        }
    }

    struct FakeRecorder {
        log: Shared,
    }

    impl FrameSink for FakeRecorder {
        fn write(&mut self, frame: &Frame) -> Result<(), RecordError> {
            self.log.borrow_mut().written.push(frame.clone());
            Ok(())
        }

        fn close(&mut self) -> Result<(), RecordError> {
            self.log.borrow_mut().events.push("recorder.close".into());
            Ok(())
        }
    }

    struct FakePreview {
        log: Shared,
        polls: usize,
        quit_after: Option<usize>,
    }

    impl Preview for FakePreview {
        fn show(&mut self, _frame: &Frame) -> Result<()> {
            Ok(())
        }

        fn poll_key(&mut self) -> Result<Option<char>> {
            self.polls += 1;
            match self.quit_after {
                Some(n) if self.polls >= n => Ok(Some('q')),
                _ => Ok(Some('x')),
            }
        }

        fn close(&mut self) -> Result<()> {
            self.log.borrow_mut().events.push("preview.close".into());
            Ok(())
        }
    }

    struct FakeBackend {
        log: Shared,
        camera_ok: bool,
        model_ok: bool,
        frames: usize,
        frame_size: (u32, u32),
        fail_camera_release: bool,
        quit_after: Option<usize>,
        script: Option<Script>,
    }

    impl FakeBackend {
        fn new(frames: usize) -> Self {
            Self {
                log: Shared::default(),
                camera_ok: true,
                model_ok: true,
                frames,
                frame_size: (W, H),
                fail_camera_release: false,
                quit_after: None,
                script: None,
            }
        }

        fn with_script(mut self, script: impl FnMut(usize) -> Result<Vec<Detection>> + 'static) -> Self {
            self.script = Some(Box::new(script));
            self
        }
    }

    impl Backend for FakeBackend {
        fn open_camera(&mut self, index: u32) -> Result<Box<dyn FrameSource>, CaptureError> {
            self.log.borrow_mut().events.push("camera.open".into());
            if !self.camera_ok {
                return Err(CaptureError::Open { index });
            }
            Ok(Box::new(FakeCamera {
                log: self.log.clone(),
                frames: self.frames,
                size: self.frame_size,
                fail_release: self.fail_camera_release,
            }))
        }

        fn load_detector(&mut self, _model: &Path) -> Result<Box<dyn Detector>> {
            self.log.borrow_mut().events.push("detector.load".into());
            if !self.model_ok {
                return Err(anyhow!("corrupt model"));
            }
            let script = self
                .script
                .take()
                .unwrap_or_else(|| Box::new(|_| Ok(Vec::new())));
            Ok(Box::new(FakeDetector {
                calls: 0,
                script,
                names: ClassNames::coco(),
            }))
        }

        fn open_recorder(&mut self, spec: &RecorderSpec) -> Result<Box<dyn FrameSink>, RecordError> {
            assert_eq!((spec.width, spec.height), (W, H));
            assert_eq!(spec.codec, CODEC);
            self.log.borrow_mut().events.push("recorder.open".into());
            Ok(Box::new(FakeRecorder {
                log: self.log.clone(),
            }))
        }

        fn open_preview(&mut self, _title: &str) -> Result<Box<dyn Preview>> {
            self.log.borrow_mut().events.push("preview.open".into());
            Ok(Box::new(FakePreview {
                log: self.log.clone(),
                polls: 0,
                quit_after: self.quit_after,
            }))
        }
    }

    fn config(headless: bool) -> (NamedTempFile, Config) {
        let model = tempfile::Builder::new().suffix(".pt").tempfile().unwrap();
        let mut args = Args::parse_from(["yolo-record", model.path().to_str().unwrap()]);
        args.headless = headless;
        (model, args.validate().unwrap())
    }

    fn run(backend: FakeBackend, headless: bool, stop: StopSignal) -> (SessionReport, Shared) {
        let log = backend.log.clone();
        let (_model, config) = config(headless);
        let report = Session::new(config, backend, Annotator::new(None), stop).run();
        (report, log)
    }

    fn assert_all_released(log: &Shared) {
        assert!(has(log, "camera.release"));
        assert!(has(log, "recorder.close"));
    }

    #[test]
    fn test_camera_unavailable_is_fatal() {
        let mut backend = FakeBackend::new(10);
        backend.camera_ok = false;
        let (_model, mut config) = config(true);
        let mut args = Args::parse_from(["yolo-record", config.model_path().to_str().unwrap()]);
        args.camera = 3;
        args.headless = true;
        config = args.validate().unwrap();
        let log = backend.log.clone();

        let report = Session::new(config, backend, Annotator::new(None), StopSignal::new()).run();

        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.frames_written, 0);
        match &report.shutdown {
            Shutdown::Fatal(err) => assert_eq!(err.to_string(), "Could not open camera 3"),
            other => panic!("unexpected shutdown {:?}", other),
        }
        assert!(!has(&log, "detector.load"));
        assert!(!has(&log, "recorder.open"));
    }

    #[test]
    fn test_model_load_failure_releases_camera() {
        let mut backend = FakeBackend::new(10);
        backend.model_ok = false;
        let (report, log) = run(backend, true, StopSignal::new());

        assert_eq!(report.exit_code(), 1);
        assert!(matches!(
            report.shutdown,
            Shutdown::Fatal(SessionError::ModelLoad { .. })
        ));
        assert!(has(&log, "camera.release"));
        assert!(!has(&log, "recorder.open"));
    }

    #[test]
    fn test_ten_frames_without_detections() {
        let (report, log) = run(FakeBackend::new(10), true, StopSignal::new());

        assert!(matches!(report.shutdown, Shutdown::CaptureFailed));
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.frames_written, 10);
        assert_eq!(report.to_string(), "Recorded 10 frames to output.avi");

        let log_ref = log.borrow();
        assert_eq!(log_ref.written.len(), 10);
        let blank = Frame::filled(W, H, [10, 20, 30]);
        assert!(log_ref.written.iter().all(|f| *f == blank));
        drop(log_ref);
        assert_all_released(&log);
    }

    #[test]
    fn test_quit_key_after_five_frames() {
        let mut backend = FakeBackend::new(100);
        backend.quit_after = Some(5);
        let (report, log) = run(backend, false, StopSignal::new());

        assert!(matches!(report.shutdown, Shutdown::Quit));
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.frames_written, 5);
        assert!(report.to_string().starts_with("Recorded 5 frames"));
        assert_all_released(&log);
        assert!(has(&log, "preview.close"));
    }

    #[test]
    fn test_headless_never_opens_preview() {
        let (_, log) = run(FakeBackend::new(2), true, StopSignal::new());
        assert!(!has(&log, "preview.open"));
    }

    #[test]
    fn test_only_confident_detection_is_recorded() {
        let backend = FakeBackend::new(1).with_script(|_| {
            Ok(vec![
                Detection::new(BBox::new(4.0, 30.0, 20.0, 46.0), 0, 0.49),
                Detection::new(BBox::new(40.0, 30.0, 60.0, 46.0), 0, 0.51),
            ])
        });
        let (report, log) = run(backend, true, StopSignal::new());

        assert_eq!(report.frames_written, 1);
        let log_ref = log.borrow();
        let image = log_ref.written[0].image();
        assert_eq!(*image.get_pixel(40, 40), BOX_COLOR);
        assert_eq!(image.get_pixel(4, 40).0, [10, 20, 30]);
    }

    #[test]
    fn test_interrupt_ends_session() {
        let stop = StopSignal::new();
        let remote = stop.clone();
        let backend = FakeBackend::new(100).with_script(move |call| {
            if call == 3 {
                remote.trigger();
            }
            Ok(Vec::new())
        });
        let (report, log) = run(backend, true, stop);

        assert!(matches!(report.shutdown, Shutdown::Interrupted));
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.frames_written, 3);
        assert_all_released(&log);
    }

    #[test]
    fn test_interrupt_during_init_records_nothing() {
        let stop = StopSignal::new();
        stop.trigger();
        let (report, log) = run(FakeBackend::new(100), true, stop);

        assert!(matches!(report.shutdown, Shutdown::Interrupted));
        assert_eq!(report.frames_written, 0);
        assert_all_released(&log);
    }

    #[test]
    fn test_inference_failure_skips_frame_and_stops() {
        let backend = FakeBackend::new(100).with_script(|call| {
            if call == 4 {
                Err(anyhow!("cuda error"))
            } else {
                Ok(Vec::new())
            }
        });
        let (report, log) = run(backend, true, StopSignal::new());

        match &report.shutdown {
            Shutdown::Error(msg) => assert!(msg.contains("cuda error")),
            other => panic!("unexpected shutdown {:?}", other),
        }
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.frames_written, 3);
        assert_eq!(log.borrow().written.len(), 3);
        assert_all_released(&log);
    }

    #[test]
    fn test_geometry_mismatch_is_not_written() {
        let mut backend = FakeBackend::new(5);
        backend.frame_size = (32, 32);
        let (report, log) = run(backend, true, StopSignal::new());

        assert!(matches!(report.shutdown, Shutdown::Error(_)));
        assert_eq!(report.frames_written, 0);
        assert!(log.borrow().written.is_empty());
    }

    #[test]
    fn test_release_failure_does_not_block_others() {
        let mut backend = FakeBackend::new(100);
        backend.fail_camera_release = true;
        backend.quit_after = Some(2);
        let (report, log) = run(backend, false, StopSignal::new());

        assert!(matches!(report.shutdown, Shutdown::Quit));
        assert_all_released(&log);
        assert!(has(&log, "preview.close"));
    }

    #[test]
    fn test_resources_released_on_drop() {
        let log = Shared::default();
        {
            let mut resources = Resources::default();
            resources.camera = Some(Box::new(FakeCamera {
                log: log.clone(),
                frames: 0,
                size: (W, H),
                fail_release: false,
            }));
            resources.recorder = Some(Box::new(FakeRecorder { log: log.clone() }));
        }
        assert_all_released(&log);
        assert_eq!(log.borrow().events.len(), 2);
    }

    #[test]
    fn test_frame_count_is_monotonic() {
        let counts = Rc::new(RefCell::new(Vec::new()));
        let seen = counts.clone();
        let backend = FakeBackend::new(6).with_script(move |call| {
            seen.borrow_mut().push(call);
            Ok(Vec::new())
        });
        let (report, _) = run(backend, true, StopSignal::new());

        let counts = counts.borrow();
        assert!(counts.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(report.frames_written as usize, counts.len());
    }
}
