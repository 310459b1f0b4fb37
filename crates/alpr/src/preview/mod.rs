mod server;
mod window;

pub use window::PreviewWindow;

use crate::{error::DisplayError, frame::AnnotatedFrame};

/// A surface that shows annotated frames to a human.
pub trait Previewer {
    fn show(&mut self, frame: &AnnotatedFrame) -> Result<(), DisplayError>;
}

/// `None` means preview is disabled; showing always succeeds.
impl<V: Previewer> Previewer for Option<V> {
    fn show(&mut self, frame: &AnnotatedFrame) -> Result<(), DisplayError> {
        match self {
            Some(previewer) => previewer.show(frame),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PreviewConfig {
    pub enabled: bool,
    pub addr: String,
    pub title: String,
    /// 1..=100
    pub jpeg_quality: u8,
}
