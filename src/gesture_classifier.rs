use std::fs;
use std::path::Path;

use log::info;
use ort::session::Session;
use ort::tensor::TensorElementType;
use ort::value::ValueType;
use thiserror::Error;

use crate::types::{flatten_window, FrameFeature, Prediction, FRAME_FEATURES, SEQ_LEN};

/// Errores de carga del modelo o de inferencia. Todos son fatales para la sesión.
#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("ONNX Runtime error: {0}")]
    OnnxError(#[from] ort::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid window shape: expected {expected}, got {actual}")]
    InvalidWindowShape { expected: usize, actual: usize },

    #[error("Label set has {labels} classes but the model returned {outputs}")]
    LabelCountMismatch { labels: usize, outputs: usize },

    #[error("Label set is empty")]
    EmptyLabelSet,

    #[error("Blank label at line {line}")]
    BlankLabel { line: usize },

    #[error("Model returned a non-finite probability")]
    NonFiniteOutput,

    #[error("No output tensor found")]
    NoOutputTensor,

    #[error("Missing ONNX {kind}")]
    MissingIo { kind: &'static str },
}

/// Clasificador de secuencias tratado como caja negra:
/// ventana [30 x 126] -> distribución de probabilidad sobre las clases.
pub trait SequenceModel {
    fn predict(&mut self, window: &[FrameFeature]) -> Result<Vec<f32>, ClassifierError>;
}

/// Lista ordenada de clases; la posición coincide con la salida del modelo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    labels: Vec<String>,
}

impl LabelSet {
    /// Una clase por línea; la línea N es la salida N-1 del modelo.
    /// Solo se toleran líneas vacías al final del archivo.
    pub fn parse(content: &str) -> Result<Self, ClassifierError> {
        let lines: Vec<&str> = content.lines().map(str::trim).collect();
        let end = lines
            .iter()
            .rposition(|line| !line.is_empty())
            .map_or(0, |last| last + 1);

        if end == 0 {
            return Err(ClassifierError::EmptyLabelSet);
        }

        let mut labels = Vec::with_capacity(end);
        for (idx, line) in lines[..end].iter().enumerate() {
            if line.is_empty() {
                return Err(ClassifierError::BlankLabel { line: idx + 1 });
            }
            labels.push(line.to_string());
        }

        Ok(Self { labels })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn get(&self, idx: usize) -> Option<&str> {
        self.labels.get(idx).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.labels
    }
}

/// Modelo secuencial exportado a ONNX (entrada [1, 30, 126])
pub struct OnnxSequenceModel {
    session: Session,
    input_name: String,
    prob_output_name: String,
}

impl OnnxSequenceModel {
    pub fn load(model_path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let model_path = model_path.as_ref();
        let session = Session::builder()?.commit_from_file(model_path)?;

        let input_name = match session.inputs.first() {
            Some(input) => input.name.clone(),
            None => return Err(ClassifierError::MissingIo { kind: "input" }),
        };
        let prob_output_name = probability_output(&session)?;

        info!(
            "🧠 Modelo {} listo ({} -> {})",
            model_path.display(),
            input_name,
            prob_output_name
        );

        Ok(Self {
            session,
            input_name,
            prob_output_name,
        })
    }
}

/// Nombre de la primera salida f32, o de la primera salida si no hay ninguna
fn probability_output(session: &Session) -> Result<String, ClassifierError> {
    let is_f32 = |ty: &ValueType| {
        matches!(
            ty,
            ValueType::Tensor {
                ty: TensorElementType::Float32,
                ..
            }
        )
    };

    session
        .outputs
        .iter()
        .find(|output| is_f32(&output.output_type))
        .or_else(|| session.outputs.first())
        .map(|output| output.name.clone())
        .ok_or(ClassifierError::MissingIo { kind: "output" })
}

impl SequenceModel for OnnxSequenceModel {
    fn predict(&mut self, window: &[FrameFeature]) -> Result<Vec<f32>, ClassifierError> {
        if window.len() != SEQ_LEN {
            return Err(ClassifierError::InvalidWindowShape {
                expected: SEQ_LEN,
                actual: window.len(),
            });
        }

        // Tensor de entrada [1, 30, 126]
        let shape_vec = vec![1_usize, SEQ_LEN, FRAME_FEATURES];
        let input_value = ort::value::Value::from_array((shape_vec, flatten_window(window)))?;

        let outputs = self.session.run(ort::inputs![
            self.input_name.as_str() => &input_value,
        ])?;

        let (prob_shape, prob_data) =
            outputs[self.prob_output_name.as_str()].try_extract_tensor::<f32>()?;

        // Salida [1, N] o [N]
        let num_classes = match prob_shape.len() {
            0 => return Err(ClassifierError::NoOutputTensor),
            1 => prob_shape[0] as usize,
            _ => prob_shape[1] as usize,
        };

        Ok(prob_data.iter().take(num_classes).copied().collect())
    }
}

/// Adaptador: ventana completa -> (etiqueta, confianza)
pub struct GestureClassifier<M: SequenceModel = OnnxSequenceModel> {
    model: M,
    labels: LabelSet,
}

impl GestureClassifier<OnnxSequenceModel> {
    /// Carga modelo ONNX y lista de clases una sola vez al arrancar
    pub fn load(
        model_path: impl AsRef<Path>,
        labels_path: impl AsRef<Path>,
    ) -> Result<Self, ClassifierError> {
        let labels = LabelSet::load(labels_path)?;
        let model = OnnxSequenceModel::load(model_path)?;
        info!("[ONNX] Clases: {:?}", labels.as_slice());
        Ok(Self::new(model, labels))
    }
}

impl<M: SequenceModel> GestureClassifier<M> {
    pub fn new(model: M, labels: LabelSet) -> Self {
        Self { model, labels }
    }

    /// Probabilidad por clase, en el orden de la lista de clases
    pub fn predict_scores(
        &mut self,
        window: &[FrameFeature],
    ) -> Result<Vec<(String, f32)>, ClassifierError> {
        if window.len() != SEQ_LEN {
            return Err(ClassifierError::InvalidWindowShape {
                expected: SEQ_LEN,
                actual: window.len(),
            });
        }

        let probs = self.model.predict(window)?;

        if probs.len() != self.labels.len() {
            return Err(ClassifierError::LabelCountMismatch {
                labels: self.labels.len(),
                outputs: probs.len(),
            });
        }

        if probs.iter().any(|p| !p.is_finite()) {
            return Err(ClassifierError::NonFiniteOutput);
        }

        Ok(self
            .labels
            .as_slice()
            .iter()
            .cloned()
            .zip(probs)
            .collect())
    }

    /// Clase del arg-max y su probabilidad, sin renormalizar
    pub fn classify(&mut self, window: &[FrameFeature]) -> Result<Prediction, ClassifierError> {
        let scores = self.predict_scores(window)?;

        // En empate gana el primer índice
        let mut best: Option<(String, f32)> = None;
        for (label, score) in scores {
            if best.as_ref().map_or(true, |(_, b)| score > *b) {
                best = Some((label, score));
            }
        }

        let (label, confidence) = best.ok_or(ClassifierError::NoOutputTensor)?;
        Ok(Prediction::new(label, confidence))
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }
}
