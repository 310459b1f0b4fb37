pub mod post;
pub mod pre;

pub use post::{OcrDecoder, PlateBox, expand_alphabet, parse_plate_detections};
pub use pre::{DetectorPreProcessor, Letterbox, OcrPreProcessor};
