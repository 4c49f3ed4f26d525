use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("Error decoding image: invalid base64 payload ({0})")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("Error decoding image: {0}")]
    InvalidImage(image::ImageError),

    #[error("Error decoding image: image has no pixels")]
    EmptyImage,

    #[error("No output found")]
    NotFound,

    #[error("Inference failed: {0}")]
    Inference(anyhow::Error),

    #[error("Failed to write output image: {0}")]
    Output(#[source] anyhow::Error),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

impl DetectionError {
    /// True when the caller sent bytes that are not a decodable image.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            DetectionError::InvalidBase64(_)
                | DetectionError::InvalidImage(_)
                | DetectionError::EmptyImage
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;

    #[test]
    fn test_error_display_formatting() {
        let err = DetectionError::NotFound;
        assert_eq!(err.to_string(), "No output found");

        let err = DetectionError::EmptyImage;
        assert_eq!(
            err.to_string(),
            "Error decoding image: image has no pixels",
            "EmptyImage should display with decode prefix"
        );

        let err = DetectionError::Inference(anyhow::anyhow!("session crashed"));
        assert_eq!(err.to_string(), "Inference failed: session crashed");
    }

    #[test]
    fn test_decode_error_classification() {
        let b64_err = base64::engine::general_purpose::STANDARD
            .decode("not base64!!")
            .unwrap_err();
        let err: DetectionError = b64_err.into();
        assert!(err.is_decode_error(), "Malformed base64 is a decode error");
        assert!(err.to_string().starts_with("Error decoding image"));

        let image_err = image::load_from_memory(b"definitely not an image").unwrap_err();
        assert!(DetectionError::InvalidImage(image_err).is_decode_error());

        assert!(!DetectionError::NotFound.is_decode_error());
        assert!(!DetectionError::Inference(anyhow::anyhow!("boom")).is_decode_error());
    }

    #[test]
    fn test_error_conversion_from_io_error() {
        fn read_missing() -> Result<Vec<u8>, DetectionError> {
            Ok(std::fs::read("/nonexistent/definitely/missing.png")?)
        }

        match read_missing().unwrap_err() {
            DetectionError::IoError(e) => assert_eq!(e.kind(), io::ErrorKind::NotFound),
            other => panic!("Expected IoError variant, got {other:?}"),
        }
    }
}
