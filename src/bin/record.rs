// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 摄像头实时检测 + 录制
///
/// 主程序入口 - 直接运行: cargo run --bin yolo-record --features native --release -- yolov8n.pt
use clap::Parser;
use yolo_recorder::{load_font, Annotator, Args, NativeBackend, Session, Shutdown, StopSignal};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            // --help / --version 走 stdout, 退出码 0
            let code = if err.use_stderr() { 1 } else { 0 };
            let _ = err.print();
            std::process::exit(code);
        }
    };

    let config = match args.validate() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {}", err);
            std::process::exit(1);
        }
    };

    let font = match load_font(config.font()) {
        Ok(Some(font)) => Some(font),
        Ok(None) => {
            log::warn!("⚠️ No label font found, labels will be drawn without text (use --font)");
            None
        }
        Err(err) => {
            eprintln!("Error: {:#}", err);
            std::process::exit(1);
        }
    };

    let stop = StopSignal::new();
    if let Err(err) = stop.install_ctrlc() {
        log::warn!("failed to install Ctrl+C handler: {}", err);
    }

    let backend = NativeBackend::new(&config);
    let report = Session::new(config, backend, Annotator::new(font), stop).run();

    if let Shutdown::Fatal(err) = &report.shutdown {
        eprintln!("Error: {}", err);
    }
    println!("{}", report);
    std::process::exit(report.exit_code());
}
