use crate::detection::BoundingBox;
use common::span_debug;
use fast_image_resize::{
    FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer,
    images::{Image, ImageRef},
};
use image::RgbImage;
use ndarray::{Array, IxDyn};

const LETTERBOX_COLOR: u8 = 114;

/// Mapping from detector input space back to frame pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl Letterbox {
    /// Map a point in the letterboxed canvas to frame coordinates.
    pub fn to_frame(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (x - self.offset_x) / self.scale,
            (y - self.offset_y) / self.scale,
        )
    }
}

/// Resizes frames into the detector's square input, keeping aspect ratio.
pub struct DetectorPreProcessor {
    pub input_size: u32,
    resizer: Resizer,
    canvas: Vec<u8>,
}

impl DetectorPreProcessor {
    pub fn new(input_size: u32) -> Self {
        Self {
            input_size,
            resizer: Resizer::new(),
            canvas: vec![LETTERBOX_COLOR; (input_size * input_size * 3) as usize],
        }
    }

    /// Returns an NCHW `[1, 3, S, S]` tensor scaled to `[0, 1]`.
    pub fn preprocess(
        &mut self,
        image: &RgbImage,
    ) -> anyhow::Result<(Array<f32, IxDyn>, Letterbox)> {
        let _s = span_debug!("detector_preprocess");

        let (width, height) = image.dimensions();
        let size = self.input_size;
        if width == 0 || height == 0 {
            anyhow::bail!("Cannot letterbox an empty {}x{} image", width, height);
        }

        let scale = (size as f32 / width as f32).min(size as f32 / height as f32);
        let new_width = ((width as f32 * scale) as u32).clamp(1, size);
        let new_height = ((height as f32 * scale) as u32).clamp(1, size);
        let offset_x = (size - new_width) / 2;
        let offset_y = (size - new_height) / 2;

        let src = ImageRef::new(width, height, image.as_raw(), PixelType::U8x3)?;
        let mut resized = Image::new(new_width, new_height, PixelType::U8x3);
        self.resizer.resize(
            &src,
            &mut resized,
            &ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear)),
        )?;

        self.canvas.fill(LETTERBOX_COLOR);

        let resized_data = resized.buffer();
        let row_len = (new_width * 3) as usize;
        let stride = (size * 3) as usize;
        for y in 0..new_height as usize {
            let src_row = y * row_len;
            let dst_row = (y + offset_y as usize) * stride + offset_x as usize * 3;
            self.canvas[dst_row..dst_row + row_len]
                .copy_from_slice(&resized_data[src_row..src_row + row_len]);
        }

        let input = normalize(&self.canvas, size as usize)?;
        let letterbox = Letterbox {
            scale,
            offset_x: offset_x as f32,
            offset_y: offset_y as f32,
        };

        Ok((input, letterbox))
    }
}

fn normalize(canvas: &[u8], size: usize) -> anyhow::Result<Array<f32, IxDyn>> {
    let spatial = size * size;
    let mut output = vec![0.0f32; 3 * spatial];

    for (i, px) in canvas.chunks_exact(3).enumerate() {
        output[i] = px[0] as f32 / 255.0;
        output[i + spatial] = px[1] as f32 / 255.0;
        output[i + 2 * spatial] = px[2] as f32 / 255.0;
    }

    Ok(Array::from_shape_vec(IxDyn(&[1, 3, size, size]), output)?)
}

/// Crops a plate region and resizes it to the OCR model's fixed input.
#[derive(Debug, Clone, Copy)]
pub struct OcrPreProcessor {
    pub height: u32,
    pub width: u32,
    /// 1 (grayscale) or 3 (RGB).
    pub channels: u32,
}

impl OcrPreProcessor {
    pub fn new(height: u32, width: u32, channels: u32) -> Self {
        Self {
            height,
            width,
            channels,
        }
    }

    /// Returns an NHWC `[1, H, W, C]` u8 tensor.
    pub fn preprocess(
        &self,
        image: &RgbImage,
        region: &BoundingBox,
    ) -> anyhow::Result<Array<u8, IxDyn>> {
        let _s = span_debug!("ocr_preprocess");

        let (img_w, img_h) = image.dimensions();
        let x = (region.x1.max(0.0).floor() as u32).min(img_w);
        let y = (region.y1.max(0.0).floor() as u32).min(img_h);
        let w = (region.x2.ceil().max(0.0) as u32).min(img_w).saturating_sub(x);
        let h = (region.y2.ceil().max(0.0) as u32).min(img_h).saturating_sub(y);
        if w == 0 || h == 0 {
            anyhow::bail!(
                "Plate region {:?} is empty inside a {}x{} frame",
                region,
                img_w,
                img_h
            );
        }

        let crop = image::imageops::crop_imm(image, x, y, w, h).to_image();
        let src = ImageRef::new(w, h, crop.as_raw(), PixelType::U8x3)?;
        let mut resized = Image::new(self.width, self.height, PixelType::U8x3);
        Resizer::new().resize(
            &src,
            &mut resized,
            &ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear)),
        )?;

        let pixels: Vec<u8> = match self.channels {
            1 => resized
                .buffer()
                .chunks_exact(3)
                .map(|px| luma(px[0], px[1], px[2]))
                .collect(),
            3 => resized.buffer().to_vec(),
            other => anyhow::bail!("OCR input must have 1 or 3 channels, got {}", other),
        };

        Ok(Array::from_shape_vec(
            IxDyn(&[
                1,
                self.height as usize,
                self.width as usize,
                self.channels as usize,
            ]),
            pixels,
        )?)
    }
}

/// ITU-R BT.601 luma.
#[inline]
fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((299 * r as u32 + 587 * g as u32 + 114 * b as u32 + 500) / 1000) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_letterbox_preserves_aspect_ratio() {
        let image = RgbImage::from_pixel(800, 600, Rgb([128, 128, 128]));
        let mut pre = DetectorPreProcessor::new(384);

        let (input, letterbox) = pre.preprocess(&image).unwrap();

        assert_eq!(input.shape(), &[1, 3, 384, 384]);
        assert_eq!(letterbox.scale, 0.48);
        assert_eq!(letterbox.offset_x, 0.0);
        assert_eq!(letterbox.offset_y, 48.0);
    }

    #[test]
    fn test_padding_is_letterbox_gray() {
        let image = RgbImage::from_pixel(800, 600, Rgb([255, 255, 255]));
        let mut pre = DetectorPreProcessor::new(384);

        let (input, _) = pre.preprocess(&image).unwrap();

        let pad = LETTERBOX_COLOR as f32 / 255.0;
        assert!((input[[0, 0, 0, 0]] - pad).abs() < 1e-6);
        assert!((input[[0, 2, 383, 383]] - pad).abs() < 1e-6);
        assert!((input[[0, 1, 192, 192]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_channels_are_planar_rgb() {
        let image = RgbImage::from_pixel(4, 4, Rgb([255, 0, 51]));
        let mut pre = DetectorPreProcessor::new(4);

        let (input, _) = pre.preprocess(&image).unwrap();

        assert!((input[[0, 0, 1, 1]] - 1.0).abs() < 1e-6);
        assert!(input[[0, 1, 1, 1]].abs() < 1e-6);
        assert!((input[[0, 2, 1, 1]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_letterbox_maps_back_to_frame() {
        let letterbox = Letterbox {
            scale: 0.48,
            offset_x: 0.0,
            offset_y: 48.0,
        };
        let (x, y) = letterbox.to_frame(192.0, 192.0);
        assert!((x - 400.0).abs() < 1e-3);
        assert!((y - 300.0).abs() < 1e-3);
    }

    #[test]
    fn test_ocr_crop_shape_rgb_and_gray() {
        let image = RgbImage::from_pixel(200, 100, Rgb([10, 20, 30]));
        let region = BoundingBox::new(20.0, 30.0, 120.0, 60.0);

        let rgb = OcrPreProcessor::new(64, 128, 3).preprocess(&image, &region).unwrap();
        assert_eq!(rgb.shape(), &[1, 64, 128, 3]);
        assert_eq!(rgb[[0, 10, 10, 2]], 30);

        let gray = OcrPreProcessor::new(64, 128, 1).preprocess(&image, &region).unwrap();
        assert_eq!(gray.shape(), &[1, 64, 128, 1]);
        assert_eq!(gray[[0, 10, 10, 0]], luma(10, 20, 30));
    }

    #[test]
    fn test_ocr_rejects_empty_region() {
        let image = RgbImage::new(50, 50);
        let region = BoundingBox::new(60.0, 10.0, 80.0, 20.0);

        assert!(OcrPreProcessor::new(64, 128, 3).preprocess(&image, &region).is_err());
    }
}
