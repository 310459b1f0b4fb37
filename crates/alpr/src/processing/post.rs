use super::pre::Letterbox;
use crate::detection::BoundingBox;

/// Detector output row: `[batch, x1, y1, x2, y2, class, score]`.
const DETECTION_ROW: usize = 7;

/// A plate region proposed by the detector, in frame pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlateBox {
    pub region: BoundingBox,
    pub score: f32,
}

/// Parse end-to-end detector output (NMS already applied by the model).
///
/// Rows below `threshold` are dropped, boxes are mapped out of the letterbox
/// and clamped to the frame, and the result is ranked by score, best first.
pub fn parse_plate_detections(
    output: &ndarray::ArrayViewD<f32>,
    letterbox: &Letterbox,
    threshold: f32,
    frame_width: u32,
    frame_height: u32,
) -> anyhow::Result<Vec<PlateBox>> {
    if output.shape().last() != Some(&DETECTION_ROW) {
        anyhow::bail!(
            "Unexpected detector output shape {:?}, expected [N, {}]",
            output.shape(),
            DETECTION_ROW
        );
    }

    let values: Vec<f32> = output.iter().copied().collect();
    let mut plates = Vec::new();

    for row in values.chunks_exact(DETECTION_ROW) {
        let score = row[6];
        if !(score >= threshold) {
            continue;
        }

        let (x1, y1) = letterbox.to_frame(row[1], row[2]);
        let (x2, y2) = letterbox.to_frame(row[3], row[4]);
        let region = BoundingBox::new(x1, y1, x2, y2).clamp_to(frame_width, frame_height);
        if region.is_empty() {
            continue;
        }

        plates.push(PlateBox { region, score });
    }

    plates.sort_by(|a, b| b.score.total_cmp(&a.score));

    Ok(plates)
}

/// Expand an alphabet pattern such as `0-9A-Z_` into its characters.
///
/// `a-b` denotes an inclusive range; a `-` at either end is literal.
pub fn expand_alphabet(pattern: &str) -> Vec<char> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = Vec::with_capacity(chars.len());
    let mut i = 0;

    while i < chars.len() {
        if i + 2 < chars.len() && chars[i + 1] == '-' && chars[i] <= chars[i + 2] {
            out.extend(chars[i]..=chars[i + 2]);
            i += 3;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }

    out
}

/// Decodes fixed-slot OCR output into plate text.
#[derive(Debug, Clone)]
pub struct OcrDecoder {
    pub alphabet: Vec<char>,
    pub pad_char: char,
    pub max_slots: usize,
}

impl OcrDecoder {
    pub fn new(alphabet: Vec<char>, pad_char: char, max_slots: usize) -> Self {
        Self {
            alphabet,
            pad_char,
            max_slots,
        }
    }

    /// Argmax per slot; returns the text without padding and the mean of the
    /// winning slot probabilities.
    pub fn decode(&self, probs: &[f32]) -> anyhow::Result<(String, f32)> {
        let vocab = self.alphabet.len();
        let expected = self.max_slots * vocab;
        if vocab == 0 || probs.len() != expected {
            anyhow::bail!(
                "OCR output has {} values, expected {} slots x {} characters",
                probs.len(),
                self.max_slots,
                vocab
            );
        }

        let mut text = String::with_capacity(self.max_slots);
        let mut total = 0.0f32;

        for slot in probs.chunks_exact(vocab) {
            let (idx, prob) = slot
                .iter()
                .copied()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |best, (i, p)| {
                    if p > best.1 { (i, p) } else { best }
                });
            total += prob;
            text.push(self.alphabet[idx]);
        }

        let text = text.trim_end_matches(self.pad_char).to_string();
        let confidence = total / self.max_slots as f32;

        Ok((text, confidence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, IxDyn};

    fn identity() -> Letterbox {
        Letterbox {
            scale: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }

    fn rows(data: Vec<[f32; 7]>) -> Array<f32, IxDyn> {
        let n = data.len();
        Array::from_shape_vec(IxDyn(&[n, 7]), data.into_iter().flatten().collect()).unwrap()
    }

    #[test]
    fn test_threshold_filters_rows() {
        let output = rows(vec![
            [0.0, 10.0, 10.0, 50.0, 30.0, 0.0, 0.39],
            [0.0, 60.0, 10.0, 90.0, 30.0, 0.0, 0.40],
            [0.0, 10.0, 40.0, 50.0, 60.0, 0.0, 0.85],
        ]);

        let plates = parse_plate_detections(&output.view(), &identity(), 0.4, 100, 100).unwrap();

        assert_eq!(plates.len(), 2, "Scores below threshold are dropped");
        assert_eq!(plates[0].score, 0.85);
        assert_eq!(plates[1].score, 0.40);
    }

    #[test]
    fn test_unletterbox_and_clamp() {
        // 800x600 frame letterboxed into 384: scale 0.48, offset_y 48.
        let letterbox = Letterbox {
            scale: 0.48,
            offset_x: 0.0,
            offset_y: 48.0,
        };
        let output = rows(vec![
            [0.0, 96.0, 96.0, 192.0, 144.0, 0.0, 0.9],
            [0.0, 350.0, 300.0, 400.0, 340.0, 0.0, 0.8],
        ]);

        let plates = parse_plate_detections(&output.view(), &letterbox, 0.4, 800, 600).unwrap();

        let r = plates[0].region;
        assert!((r.x1 - 200.0).abs() < 1e-3);
        assert!((r.y1 - 100.0).abs() < 1e-3);
        assert!((r.x2 - 400.0).abs() < 1e-3);
        assert!((r.y2 - 200.0).abs() < 1e-3);
        assert_eq!(plates[1].region.x2, 800.0, "Box past the edge is clamped");
    }

    #[test]
    fn test_boxes_in_padding_are_skipped() {
        let letterbox = Letterbox {
            scale: 0.48,
            offset_x: 0.0,
            offset_y: 48.0,
        };
        let output = rows(vec![[0.0, 10.0, 0.0, 50.0, 40.0, 0.0, 0.9]]);

        let plates = parse_plate_detections(&output.view(), &letterbox, 0.4, 800, 600).unwrap();

        assert!(plates.is_empty());
    }

    #[test]
    fn test_batched_shape_accepted_and_bad_shape_rejected() {
        let batched =
            Array::from_shape_vec(IxDyn(&[1, 1, 7]), vec![0.0, 1.0, 1.0, 5.0, 5.0, 0.0, 0.9])
                .unwrap();
        assert_eq!(
            parse_plate_detections(&batched.view(), &identity(), 0.4, 10, 10)
                .unwrap()
                .len(),
            1
        );

        let wrong = Array::from_shape_vec(IxDyn(&[1, 6]), vec![0.0; 6]).unwrap();
        assert!(parse_plate_detections(&wrong.view(), &identity(), 0.4, 10, 10).is_err());
    }

    #[test]
    fn test_expand_alphabet() {
        let alphabet = expand_alphabet("0-9A-Z_");
        assert_eq!(alphabet.len(), 37);
        assert_eq!(alphabet[0], '0');
        assert_eq!(alphabet[10], 'A');
        assert_eq!(alphabet[36], '_');

        assert_eq!(expand_alphabet("-AB-"), vec!['-', 'A', 'B', '-']);
    }

    #[test]
    fn test_ocr_decode_strips_padding() {
        let decoder = OcrDecoder::new(vec!['A', 'B', '1', '_'], '_', 4);
        #[rustfmt::skip]
        let probs = [
            0.9, 0.05, 0.05, 0.0, // A
            0.1, 0.7, 0.1, 0.1,   // B
            0.0, 0.0, 0.8, 0.2,   // 1
            0.0, 0.0, 0.0, 1.0,   // _
        ];

        let (text, confidence) = decoder.decode(&probs).unwrap();

        assert_eq!(text, "AB1");
        assert!((confidence - 0.85).abs() < 1e-6);
    }

    #[test]
    fn test_ocr_decode_rejects_wrong_length() {
        let decoder = OcrDecoder::new(vec!['A', '_'], '_', 3);
        assert!(decoder.decode(&[0.5; 5]).is_err());
    }
}
