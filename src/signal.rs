// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 外部中断信号 (Ctrl+C)
//!
//! 信号处理线程只往 bounded(1) 通道里投递, 主循环每次迭代检查一次.

use crossbeam_channel::{bounded, Receiver, Sender};

#[derive(Clone)]
pub struct StopSignal {
    tx: Sender<()>,
    rx: Receiver<()>,
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, rx) = bounded(1);
        Self { tx, rx }
    }

    /// 注册 Ctrl+C 处理函数
    pub fn install_ctrlc(&self) -> Result<(), ctrlc::Error> {
        let signal = self.clone();
        ctrlc::set_handler(move || signal.trigger())
    }

    pub fn trigger(&self) {
        // 已触发时通道已满, 忽略
        let _ = self.tx.try_send(());
    }

    /// 触发后保持置位, 不会被读取清除
    pub fn is_triggered(&self) -> bool {
        !self.rx.is_empty()
    }
}
