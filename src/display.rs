// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 预览窗口

use anyhow::Result;

use crate::frame::Frame;

/// 窗口标题
pub const WINDOW_TITLE: &str = "YOLO Object Detection";
/// 退出按键
pub const QUIT_KEY: char = 'q';

/// 预览窗口接口
pub trait Preview {
    fn show(&mut self, frame: &Frame) -> Result<()>;

    /// 短暂等待 UI 事件, 返回按下的键
    fn poll_key(&mut self) -> Result<Option<char>>;

    /// 关闭窗口, 可重复调用
    fn close(&mut self) -> Result<()>;
}

#[cfg(feature = "opencv")]
pub use self::highgui::HighGuiPreview;

#[cfg(feature = "opencv")]
mod highgui {
    use anyhow::Result;
    use opencv::highgui;

    use super::Preview;
    use crate::frame::Frame;
    use crate::output::recorder::to_mat;

    /// OpenCV highgui 窗口
    pub struct HighGuiPreview {
        title: String,
        open: bool,
    }

    impl HighGuiPreview {
        pub fn open(title: &str) -> Result<Self> {
            highgui::named_window(title, highgui::WINDOW_AUTOSIZE)?;
            Ok(Self {
                title: title.to_string(),
                open: true,
            })
        }
    }

    impl Preview for HighGuiPreview {
        fn show(&mut self, frame: &Frame) -> Result<()> {
            let mat = to_mat(frame)?;
            highgui::imshow(&self.title, &mat)?;
            Ok(())
        }

        fn poll_key(&mut self) -> Result<Option<char>> {
            let key = highgui::wait_key(1)?;
            if key < 0 {
                return Ok(None);
            }
            Ok(Some(char::from((key & 0xFF) as u8)))
        }

        fn close(&mut self) -> Result<()> {
            if self.open {
                self.open = false;
                highgui::destroy_all_windows()?;
            }
            Ok(())
        }
    }
}
