use crate::bounding_box::BoundingBox;
use crate::config::ModelConfig;
use crate::detector::{Detector, DetectorError};
use crate::labels::{load_class_labels, ClassLabel};
use image::{imageops::FilterType, DynamicImage, GenericImageView};
use ndarray::{s, Array, Axis, Ix4};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

const INPUT_SIZE: u32 = 640;
const NMS_IOU_THRESHOLD: f32 = 0.7;

/// YOLO-family detector backed by ONNX Runtime. Sessions are created once
/// at startup from the configured weights file; each session sits behind a
/// mutex and requests pick one round-robin, so independent connections can
/// run inference concurrently.
pub struct OrtDetector {
    sessions: Vec<Arc<Mutex<Session>>>,
    counter: AtomicUsize,
    min_probability: f32,
    class_labels: Vec<ClassLabel>,
}

impl OrtDetector {
    pub fn new(model_config: &ModelConfig) -> Result<Self, DetectorError> {
        let _ = ort::init().commit();

        let sessions = (0..model_config.num_instances)
            .map(|_| {
                let session = Session::builder()?
                    .with_optimization_level(GraphOptimizationLevel::Level3)?
                    .commit_from_file(model_config.get_model_path())?;
                Ok(Arc::new(Mutex::new(session)))
            })
            .collect::<Result<Vec<_>, ort::Error>>()?;

        let class_labels = load_class_labels(&model_config.get_labels_path())?;

        tracing::info!(
            "Created {} ONNX sessions, {} class labels",
            model_config.num_instances,
            class_labels.len()
        );

        Ok(Self {
            sessions,
            counter: AtomicUsize::new(0),
            min_probability: model_config.min_probability,
            class_labels,
        })
    }

    fn run_inference(&self, input: &Array<f32, Ix4>) -> Result<ndarray::ArrayD<f32>, DetectorError> {
        let index = self.counter.fetch_add(1, Ordering::SeqCst) % self.sessions.len();
        let session_arc = &self.sessions[index];
        let mut session = session_arc
            .lock()
            .map_err(|e| DetectorError::Session(format!("session mutex poisoned: {}", e)))?;

        tracing::debug!("Handling request with session {}", index);
        let owned_buffer;
        let input_view = if input.view().is_standard_layout() {
            input.view()
        } else {
            owned_buffer = input.to_owned();
            owned_buffer.view()
        };

        let tensor_ref =
            TensorRef::from_array_view(input_view).map_err(DetectorError::Inference)?;

        let outputs = session
            .run(ort::inputs![tensor_ref])
            .map_err(DetectorError::Inference)?;

        let (shape, data) = outputs["output0"]
            .try_extract_tensor::<f32>()
            .map_err(DetectorError::Inference)?;

        let array = ndarray::ArrayD::from_shape_vec(shape.to_ixdyn(), data.to_vec())
            .map_err(|e| DetectorError::Output(format!("invalid tensor shape: {}", e)))?;

        Ok(array)
    }
}

impl Detector for OrtDetector {
    fn detect(&self, frame: &DynamicImage) -> Result<Vec<BoundingBox>, DetectorError> {
        let (input, img_height, img_width) = preprocess(frame);
        let outputs = self.run_inference(&input)?;

        // Model output is [1, 4 + classes, anchors]; transpose to iterate
        // one candidate box per row.
        let transposed = outputs.t();
        let output = transposed.slice(s![.., .., 0]);

        let mut boxes = Vec::new();
        for row in output.axis_iter(Axis(0)) {
            let row: Vec<f32> = row.iter().copied().collect();
            let Some((class_id, prob)) = row
                .iter()
                .skip(4)
                .enumerate()
                .map(|(index, value)| (index, *value))
                .reduce(|accum, candidate| {
                    if candidate.1 > accum.1 {
                        candidate
                    } else {
                        accum
                    }
                })
            else {
                continue;
            };

            if prob < self.min_probability {
                continue;
            }

            let xc = row[0] / INPUT_SIZE as f32 * (img_width as f32);
            let yc = row[1] / INPUT_SIZE as f32 * (img_height as f32);
            let w = row[2] / INPUT_SIZE as f32 * (img_width as f32);
            let h = row[3] / INPUT_SIZE as f32 * (img_height as f32);

            boxes.push(BoundingBox {
                x1: xc - w / 2.,
                y1: yc - h / 2.,
                x2: xc + w / 2.,
                y2: yc + h / 2.,
                class_id,
                confidence: prob,
            });
        }

        boxes.sort_by(|box1, box2| box2.confidence.total_cmp(&box1.confidence));

        let mut result = Vec::new();
        while !boxes.is_empty() {
            let best = boxes[0];
            result.push(best);
            boxes.retain(|candidate| best.iou(candidate) < NMS_IOU_THRESHOLD);
        }

        Ok(result)
    }

    fn class_labels(&self) -> &[ClassLabel] {
        &self.class_labels
    }
}

fn preprocess(frame: &DynamicImage) -> (Array<f32, Ix4>, u32, u32) {
    let (img_width, img_height) = frame.dimensions();
    let resized = frame.resize_exact(INPUT_SIZE, INPUT_SIZE, FilterType::CatmullRom);

    let mut input = Array::zeros((1, 3, INPUT_SIZE as usize, INPUT_SIZE as usize));
    for pixel in resized.pixels() {
        let x = pixel.0 as usize;
        let y = pixel.1 as usize;
        let [r, g, b, _] = pixel.2 .0;
        input[[0, 0, y, x]] = (r as f32) / 255.;
        input[[0, 1, y, x]] = (g as f32) / 255.;
        input[[0, 2, y, x]] = (b as f32) / 255.;
    }

    (input, img_height, img_width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    #[test]
    fn preprocess_produces_chw_tensor_and_original_dimensions() {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(100, 80, Rgb([255, 0, 0]));
        let frame = DynamicImage::ImageRgb8(img);

        let (input, img_height, img_width) = preprocess(&frame);

        assert_eq!(input.shape(), &[1, 3, 640, 640]);
        assert_eq!(img_width, 100);
        assert_eq!(img_height, 80);
        // red channel normalized to 1.0, others to 0.0
        assert!((input[[0, 0, 320, 320]] - 1.0).abs() < f32::EPSILON);
        assert!(input[[0, 1, 320, 320]].abs() < f32::EPSILON);
    }

    #[test]
    fn nms_drops_heavily_overlapping_boxes() {
        let mut boxes = vec![
            BoundingBox {
                x1: 0.0,
                y1: 0.0,
                x2: 10.0,
                y2: 10.0,
                class_id: 0,
                confidence: 0.9,
            },
            BoundingBox {
                x1: 0.5,
                y1: 0.5,
                x2: 10.5,
                y2: 10.5,
                class_id: 0,
                confidence: 0.8,
            },
            BoundingBox {
                x1: 50.0,
                y1: 50.0,
                x2: 60.0,
                y2: 60.0,
                class_id: 1,
                confidence: 0.7,
            },
        ];

        boxes.sort_by(|box1, box2| box2.confidence.total_cmp(&box1.confidence));
        let mut result = Vec::new();
        while !boxes.is_empty() {
            let best = boxes[0];
            result.push(best);
            boxes.retain(|candidate| best.iou(candidate) < NMS_IOU_THRESHOLD);
        }

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].class_id, 0);
        assert_eq!(result[1].class_id, 1);
    }
}
