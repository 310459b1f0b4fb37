use crate::{error::DecodeError, frame::Frame};
use bus::ImageMessage;
use common::span_debug;
use image::RgbImage;
use std::str::FromStr;

/// Pixel layouts accepted on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Rgb8,
    Bgr8,
    Rgba8,
    Bgra8,
    Mono8,
    /// YUV 4:2:2 packed as `[Y0, U, Y1, V]`.
    Yuyv,
    /// YUV 4:2:2 packed as `[U, Y0, V, Y1]`.
    Uyvy,
}

impl Encoding {
    /// Bytes per pixel on the wire (4:2:2 formats average two).
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Encoding::Mono8 => 1,
            Encoding::Yuyv | Encoding::Uyvy => 2,
            Encoding::Rgb8 | Encoding::Bgr8 => 3,
            Encoding::Rgba8 | Encoding::Bgra8 => 4,
        }
    }

    fn write_rgb(self, row: &[u8], out: &mut Vec<u8>) {
        match self {
            Encoding::Rgb8 => out.extend_from_slice(row),
            Encoding::Bgr8 => {
                for px in row.chunks_exact(3) {
                    out.extend_from_slice(&[px[2], px[1], px[0]]);
                }
            }
            Encoding::Rgba8 => {
                for px in row.chunks_exact(4) {
                    out.extend_from_slice(&px[..3]);
                }
            }
            Encoding::Bgra8 => {
                for px in row.chunks_exact(4) {
                    out.extend_from_slice(&[px[2], px[1], px[0]]);
                }
            }
            Encoding::Mono8 => {
                for &y in row {
                    out.extend_from_slice(&[y, y, y]);
                }
            }
            Encoding::Yuyv => {
                for chunk in row.chunks_exact(4) {
                    yuv422_pair_to_rgb(chunk[0], chunk[2], chunk[1], chunk[3], out);
                }
            }
            Encoding::Uyvy => {
                for chunk in row.chunks_exact(4) {
                    yuv422_pair_to_rgb(chunk[1], chunk[3], chunk[0], chunk[2], out);
                }
            }
        }
    }
}

impl FromStr for Encoding {
    type Err = DecodeError;

    /// Names follow the ROS image encoding constants; `8UC1`/`8UC3` are read
    /// as mono and BGR like cv_bridge does.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rgb8" => Ok(Encoding::Rgb8),
            "bgr8" | "8uc3" => Ok(Encoding::Bgr8),
            "rgba8" => Ok(Encoding::Rgba8),
            "bgra8" | "8uc4" => Ok(Encoding::Bgra8),
            "mono8" | "8uc1" => Ok(Encoding::Mono8),
            "yuv422_yuy2" | "yuyv" => Ok(Encoding::Yuyv),
            "yuv422" | "uyvy" => Ok(Encoding::Uyvy),
            _ => Err(DecodeError::UnsupportedEncoding(s.to_string())),
        }
    }
}

/// Two pixels sharing one chroma sample, BT.601 fixed-point (8-bit fraction).
#[inline]
fn yuv422_pair_to_rgb(y0: u8, y1: u8, u: u8, v: u8, out: &mut Vec<u8>) {
    let u = u as i32 - 128;
    let v = v as i32 - 128;

    // R = Y + 1.402*V, G = Y - 0.344*U - 0.714*V, B = Y + 1.772*U
    let rv = (359 * v) >> 8;
    let gu = (88 * u + 183 * v) >> 8;
    let bu = (454 * u) >> 8;

    for y in [y0 as i32, y1 as i32] {
        out.push((y + rv).clamp(0, 255) as u8);
        out.push((y - gu).clamp(0, 255) as u8);
        out.push((y + bu).clamp(0, 255) as u8);
    }
}

/// Parse a raw bus payload and decode it.
pub fn decode_payload(sequence: u64, payload: &[u8]) -> Result<Frame, DecodeError> {
    let message = ImageMessage::from_slice(payload)?;
    decode(sequence, &message)
}

/// Convert a transport image message into an RGB [`Frame`].
///
/// Rows may be padded (`step` larger than the packed row); the final row only
/// needs its packed length.
pub fn decode(sequence: u64, message: &ImageMessage) -> Result<Frame, DecodeError> {
    let _s = span_debug!("decode");

    let encoding: Encoding = message.encoding.parse()?;
    let (width, height) = (message.width, message.height);

    if width == 0 || height == 0 {
        return Err(DecodeError::EmptyImage { width, height });
    }
    if matches!(encoding, Encoding::Yuyv | Encoding::Uyvy) && width % 2 != 0 {
        return Err(DecodeError::OddWidth(width));
    }

    let row_bytes = width as usize * encoding.bytes_per_pixel();
    let step = message.step as usize;
    if step < row_bytes {
        return Err(DecodeError::InvalidStep {
            step: message.step,
            min: row_bytes,
        });
    }

    let expected = step * (height as usize - 1) + row_bytes;
    if message.data.len() < expected {
        return Err(DecodeError::Truncated {
            expected,
            actual: message.data.len(),
        });
    }

    let rgb_size = width as usize * height as usize * 3;
    let mut rgb = Vec::with_capacity(rgb_size);
    for row in message.data.chunks(step).take(height as usize) {
        encoding.write_rgb(&row[..row_bytes], &mut rgb);
    }

    let actual = rgb.len();
    let image = RgbImage::from_raw(width, height, rgb).ok_or(DecodeError::Truncated {
        expected: rgb_size,
        actual,
    })?;

    tracing::trace!(
        sequence,
        width,
        height,
        encoding = ?encoding,
        "Decoded frame"
    );

    Ok(Frame {
        sequence,
        stamp: message.header.stamp,
        frame_id: message.header.frame_id.clone(),
        image,
    })
}
