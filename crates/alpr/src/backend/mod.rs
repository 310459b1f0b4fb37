use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

#[cfg(feature = "ort-backend")]
pub mod ort;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionProvider {
    Cpu,
    Cuda,
}

impl FromStr for ExecutionProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cpu" => Ok(ExecutionProvider::Cpu),
            "cuda" | "gpu" => Ok(ExecutionProvider::Cuda),
            other => anyhow::bail!("Unknown execution provider: {}", other),
        }
    }
}

/// `<dir>/<name>.onnx`; a name that already carries the extension is kept.
pub fn model_path(dir: &Path, name: &str) -> PathBuf {
    if name.ends_with(".onnx") {
        dir.join(name)
    } else {
        dir.join(format!("{name}.onnx"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parsing() {
        assert_eq!("cpu".parse::<ExecutionProvider>().unwrap(), ExecutionProvider::Cpu);
        assert_eq!(" CUDA ".parse::<ExecutionProvider>().unwrap(), ExecutionProvider::Cuda);
        assert!("tpu".parse::<ExecutionProvider>().is_err());
    }

    #[test]
    fn test_model_path_appends_extension() {
        let dir = Path::new("models");
        assert_eq!(
            model_path(dir, "yolo-v9-t-384-license-plate-end2end"),
            PathBuf::from("models/yolo-v9-t-384-license-plate-end2end.onnx")
        );
        assert_eq!(
            model_path(dir, "custom.onnx"),
            PathBuf::from("models/custom.onnx")
        );
    }
}
