pub mod adapter;
pub mod annotator;
pub mod backend;
pub mod config;
pub mod decoder;
pub mod detection;
pub mod error;
pub mod frame;
pub mod logging;
pub mod pipeline;
pub mod preview;
pub mod processing;
pub mod publisher;
pub mod service;

pub use adapter::{InferenceAdapter, Predictor};
pub use annotator::annotate;
pub use config::{AlprConfig, ModelConfig};
pub use decoder::{decode, decode_payload};
pub use detection::{BoundingBox, Detection};
pub use error::{DecodeError, DisplayError, InferenceError};
pub use frame::{AnnotatedFrame, Frame};
pub use pipeline::{PassOutcome, PassReport, PassState, Pipeline};
pub use preview::{PreviewConfig, PreviewWindow, Previewer};
pub use publisher::ResultPublisher;
pub use service::{AlprService, ServiceStats};
