use crate::{config::ModelSettings, error::InferenceError, model_service::ModelService};
use image::{imageops::FilterType, GenericImageView};
use ndarray::{Array, Axis, Ix4};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use sign_proto::Classification;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

/// Decode raw image bytes into the tensor the classifier expects: RGB,
/// resized to `input_size` square with bilinear filtering, intensities
/// scaled to [0,1], channel-first, with a leading batch dimension.
fn preprocess_image(image_data: &[u8], input_size: u32) -> Result<Array<f32, Ix4>, InferenceError> {
    let image_reader =
        image::ImageReader::new(std::io::Cursor::new(image_data)).with_guessed_format()?;
    let img = image_reader.decode()?;

    let img = img.resize_exact(input_size, input_size, FilterType::Triangle);

    let size = input_size as usize;
    let mut input = Array::zeros((1, 3, size, size));
    for pixel in img.pixels() {
        let x = pixel.0 as usize;
        let y = pixel.1 as usize;
        let [r, g, b, _] = pixel.2 .0;
        input[[0, 0, y, x]] = (r as f32) / 255.;
        input[[0, 1, y, x]] = (g as f32) / 255.;
        input[[0, 2, y, x]] = (b as f32) / 255.;
    }

    Ok(input)
}

/// Softmax over a logit vector. The largest logit is subtracted before
/// exponentiating so extreme magnitudes cannot overflow.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Pick the winning class from a logit vector. The argmax of the logits and
/// of the softmax probabilities coincide; the score is the winning
/// probability scaled to 0-100.
pub fn classify_logits(logits: &[f32]) -> Result<Classification, InferenceError> {
    let (class, _) = logits
        .iter()
        .enumerate()
        .map(|(index, value)| (index, *value))
        .reduce(|accum, row| if row.1 > accum.1 { row } else { accum })
        .ok_or(InferenceError::UnexpectedOutput {
            expected: 1,
            got: 0,
        })?;

    let probabilities = softmax(logits);

    Ok(Classification {
        class: class as u32,
        score: probabilities[class] * 100.,
    })
}

#[derive(Clone)]
pub struct OrtModelService {
    sessions: Arc<Vec<Arc<Mutex<Session>>>>,
    counter: Arc<AtomicUsize>,
    num_classes: usize,
    input_size: u32,
}

impl OrtModelService {
    pub fn new(model_settings: &ModelSettings) -> Result<Self, Box<dyn std::error::Error>> {
        ort::init().commit()?;
        let num_instances = model_settings.num_instances;
        let sessions = (0..num_instances)
            .map(|_| {
                let session = Session::builder()?
                    .with_optimization_level(GraphOptimizationLevel::Level3)?
                    .commit_from_file(model_settings.get_checkpoint_path())?;
                Ok(Arc::new(Mutex::new(session)))
            })
            .collect::<Result<Vec<_>, ort::Error>>()?;

        tracing::info!("Created {} ONNX sessions", num_instances);

        Ok(Self {
            sessions: Arc::new(sessions),
            counter: Arc::new(AtomicUsize::new(0)),
            num_classes: model_settings.num_classes,
            input_size: model_settings.input_size,
        })
    }

    fn run_inference(&self, input: &Array<f32, Ix4>) -> Result<Vec<f32>, InferenceError> {
        let index = self.counter.fetch_add(1, Ordering::SeqCst) % self.sessions.len();
        let session_arc = &self.sessions[index];
        let mut session = session_arc
            .lock()
            .map_err(|_| InferenceError::SessionPoisoned)?;

        tracing::debug!("Handling request with session {}", index);
        let tensor_ref = TensorRef::from_array_view(input.view())?;
        let input_tensor = ort::inputs![tensor_ref];

        let outputs = session.run(input_tensor)?;

        let (shape, data) = outputs[0].try_extract_tensor::<f32>()?;
        let ix = shape.to_ixdyn();
        let array = ndarray::ArrayD::from_shape_vec(ix, data.to_vec())?;

        let logits: Vec<f32> = array.index_axis(Axis(0), 0).iter().copied().collect();
        if logits.len() != self.num_classes {
            return Err(InferenceError::UnexpectedOutput {
                expected: self.num_classes,
                got: logits.len(),
            });
        }

        Ok(logits)
    }
}

impl ModelService for OrtModelService {
    fn classify(&self, image_data: &[u8]) -> Result<Classification, InferenceError> {
        let input = preprocess_image(image_data, self.input_size)?;
        let logits = self.run_inference(&input)?;
        classify_logits(&logits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(width, height, Rgb([255, 0, 0]));
        let mut image_data: Vec<u8> = Vec::new();
        let mut cursor = Cursor::new(&mut image_data);
        img.write_to(&mut cursor, image::ImageFormat::Png).unwrap();
        image_data
    }

    #[test]
    fn test_preprocess_image_shape_and_range() {
        let input = preprocess_image(&png_bytes(100, 80), 224).unwrap();

        assert_eq!(input.shape(), &[1, 3, 224, 224]);
        assert!(input.iter().all(|&v| (0. ..=1.).contains(&v)));
        // solid red stays red after resizing
        assert_eq!(input[[0, 0, 112, 112]], 1.0);
        assert_eq!(input[[0, 1, 112, 112]], 0.0);
    }

    #[test]
    fn test_preprocess_image_is_deterministic() {
        let bytes = png_bytes(64, 48);

        let first = preprocess_image(&bytes, 224).unwrap();
        let second = preprocess_image(&bytes, 224).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_preprocess_image_rejects_garbage() {
        let result = preprocess_image(b"definitely not an image", 224);

        assert!(result.is_err());
    }

    #[test]
    fn test_softmax_is_a_probability_distribution() {
        let probabilities = softmax(&[0.1, 5.0, -3.0]);

        assert!(probabilities.iter().all(|&p| (0. ..=1.).contains(&p)));
        let sum: f32 = probabilities.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_softmax_survives_extreme_logits() {
        let probabilities = softmax(&[1000.0, 999.0, -1000.0]);

        assert!(probabilities.iter().all(|p| p.is_finite()));
        let sum: f32 = probabilities.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(probabilities[0] > probabilities[1]);
    }

    #[test]
    fn test_classify_logits_matches_argmax() {
        let logits = [0.1, 5.0, -3.0];

        let classification = classify_logits(&logits).unwrap();
        let probabilities = softmax(&logits);
        let softmax_argmax = probabilities
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap()
            .0;

        assert_eq!(classification.class, 1);
        assert_eq!(softmax_argmax, 1);
        assert!((classification.score - probabilities[1] * 100.).abs() < 1e-4);
    }

    #[test]
    fn test_classify_logits_rejects_empty_output() {
        assert!(classify_logits(&[]).is_err());
    }
}
