use super::{ExecutionProvider, model_path};
use crate::{
    adapter::Predictor,
    config::ModelConfig,
    detection::Detection,
    frame::Frame,
    processing::{
        DetectorPreProcessor, OcrDecoder, OcrPreProcessor, expand_alphabet, parse_plate_detections,
    },
};
use anyhow::Context;
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::TensorRef,
};
use std::path::Path;

/// Plate detector followed by per-plate OCR, both run through ONNX Runtime.
pub struct OrtAlprBackend {
    detector: Session,
    ocr: Session,
    detector_pre: DetectorPreProcessor,
    ocr_pre: OcrPreProcessor,
    ocr_decoder: OcrDecoder,
    confidence_threshold: f32,
}

impl OrtAlprBackend {
    pub fn load(config: &ModelConfig) -> anyhow::Result<Self> {
        // Initialize ORT environment (idempotent)
        let _ = ort::init().commit();

        let detector_path = model_path(&config.model_dir, &config.detector_model);
        let ocr_path = model_path(&config.model_dir, &config.ocr_model);

        let detector = load_session(&detector_path, config.provider)
            .with_context(|| format!("loading plate detector {}", detector_path.display()))?;
        let ocr = load_session(&ocr_path, config.provider)
            .with_context(|| format!("loading plate OCR {}", ocr_path.display()))?;

        Ok(Self {
            detector,
            ocr,
            detector_pre: DetectorPreProcessor::new(config.detector_input_size),
            ocr_pre: OcrPreProcessor::new(
                config.ocr_img_height,
                config.ocr_img_width,
                config.ocr_channels,
            ),
            ocr_decoder: OcrDecoder::new(
                expand_alphabet(&config.ocr_alphabet),
                config.ocr_pad_char,
                config.ocr_max_slots,
            ),
            confidence_threshold: config.detector_confidence,
        })
    }
}

fn load_session(path: &Path, provider: ExecutionProvider) -> anyhow::Result<Session> {
    let mut builder = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(4)?;

    match provider {
        ExecutionProvider::Cuda => {
            tracing::info!("Initializing ONNX Runtime with CUDA execution provider");
            builder = builder.with_execution_providers([
                ort::execution_providers::CUDAExecutionProvider::default()
                    .with_device_id(0)
                    .build()
                    .error_on_failure(),
            ])?;
        }
        ExecutionProvider::Cpu => {
            tracing::info!("Initializing ONNX Runtime with CPU execution provider");
        }
    }

    let session = builder.commit_from_file(path)?;

    tracing::info!("Model loaded from {}", path.display());
    Ok(session)
}

impl Predictor for OrtAlprBackend {
    fn predict(&mut self, frame: &Frame) -> anyhow::Result<Vec<Detection>> {
        let (input, letterbox) = self.detector_pre.preprocess(&frame.image)?;

        let plates = {
            let outputs = self
                .detector
                .run(ort::inputs![TensorRef::from_array_view(input.view())?])
                .context("plate detector")?;
            let raw = outputs[0].try_extract_array::<f32>()?;
            parse_plate_detections(
                &raw,
                &letterbox,
                self.confidence_threshold,
                frame.width(),
                frame.height(),
            )?
        };

        let mut detections = Vec::with_capacity(plates.len());
        for plate in plates {
            let crop = self.ocr_pre.preprocess(&frame.image, &plate.region)?;
            let outputs = self
                .ocr
                .run(ort::inputs![TensorRef::from_array_view(crop.view())?])
                .context("plate OCR")?;
            let probs = outputs[0].try_extract_array::<f32>()?;
            let probs: Vec<f32> = probs.iter().copied().collect();

            let (text, ocr_confidence) = self.ocr_decoder.decode(&probs)?;
            tracing::trace!(
                text = %text,
                detector_score = plate.score,
                ocr_confidence,
                "Plate read"
            );
            if text.is_empty() {
                continue;
            }
            detections.push(Detection::new(text, Some(ocr_confidence), plate.region));
        }

        Ok(detections)
    }
}
