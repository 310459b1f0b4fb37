use thiserror::Error;

/// Inbound message could not be turned into a frame. The frame is dropped.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Malformed image message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Unsupported encoding: {0:?}")]
    UnsupportedEncoding(String),

    #[error("Image has no pixels ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    #[error("Row step {step} is shorter than the {min} bytes a row needs")]
    InvalidStep { step: u32, min: usize },

    #[error("Pixel data truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("Packed YUV 4:2:2 needs an even width, got {0}")]
    OddWidth(u32),
}

/// The model call failed. The pass continues with no detections.
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Model inference failed: {0:#}")]
    Model(anyhow::Error),

    #[error("Model panicked: {0}")]
    Panicked(String),
}

/// The preview surface could not show a frame. Ignored by the pass.
#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("Failed to encode preview frame: {0}")]
    Encode(#[from] image::ImageError),

    #[error("Preview surface is closed")]
    SurfaceClosed,

    #[error("Failed to open preview surface on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to start preview runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_formatting() {
        assert_eq!(
            DecodeError::UnsupportedEncoding("bayer_rggb8".to_string()).to_string(),
            "Unsupported encoding: \"bayer_rggb8\""
        );
        assert_eq!(
            DecodeError::Truncated {
                expected: 12,
                actual: 6
            }
            .to_string(),
            "Pixel data truncated: expected 12 bytes, got 6"
        );
        assert_eq!(
            InferenceError::Panicked("index out of bounds".to_string()).to_string(),
            "Model panicked: index out of bounds"
        );
        assert_eq!(
            DisplayError::SurfaceClosed.to_string(),
            "Preview surface is closed"
        );
    }

    #[test]
    fn test_model_error_keeps_context_chain() {
        let err = anyhow::anyhow!("session run failed").context("plate detector");
        let inference = InferenceError::Model(err);
        assert_eq!(
            inference.to_string(),
            "Model inference failed: plate detector: session run failed"
        );
    }

    #[test]
    fn test_malformed_converts_from_json_error() {
        let json_err = serde_json::from_slice::<serde_json::Value>(b"{").unwrap_err();
        let err: DecodeError = json_err.into();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }
}
