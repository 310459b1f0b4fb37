use bus::Stamp;
use image::RgbImage;

/// Decoded frame in packed 8-bit RGB, owned by one pipeline pass.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Arrival order assigned by the bus.
    pub sequence: u64,
    pub stamp: Stamp,
    pub frame_id: String,
    pub image: RgbImage,
}

impl Frame {
    pub fn new(sequence: u64, image: RgbImage) -> Self {
        Self {
            sequence,
            stamp: Stamp::default(),
            frame_id: String::new(),
            image,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Copy of a [`Frame`] with detection overlays, shown once then discarded.
#[derive(Debug, Clone)]
pub struct AnnotatedFrame {
    pub sequence: u64,
    pub stamp: Stamp,
    pub image: RgbImage,
    /// Plate texts drawn on the image, best candidate first.
    pub labels: Vec<String>,
}

impl AnnotatedFrame {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}
