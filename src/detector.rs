use crate::annotate::annotate_frame;
use crate::bounding_box::BoundingBox;
use crate::labels::ClassLabel;
use image::DynamicImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("failed to initialize model: {0}")]
    Init(#[from] ort::Error),
    #[error("failed to load class labels: {0}")]
    Labels(#[from] std::io::Error),
    #[error("model session unavailable: {0}")]
    Session(String),
    #[error("inference failed: {0}")]
    Inference(ort::Error),
    #[error("malformed model output: {0}")]
    Output(String),
}

/// Anything that can find objects in a frame. Handlers only depend on this
/// seam, so tests substitute fakes and the underlying model can be swapped
/// without touching them.
pub trait Detector: Send + Sync + 'static {
    fn detect(&self, frame: &DynamicImage) -> Result<Vec<BoundingBox>, DetectorError>;

    fn class_labels(&self) -> &[ClassLabel];

    /// Runs detection and returns a copy of the frame with the detections
    /// rendered onto it. The returned frame has the same dimensions as the
    /// input.
    fn detect_and_annotate(&self, frame: &DynamicImage) -> Result<DynamicImage, DetectorError> {
        let detections = self.detect(frame)?;
        Ok(annotate_frame(frame, &detections, self.class_labels()))
    }
}
