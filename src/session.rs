//! Un frame del pipeline: normalizar -> bufferizar -> clasificar -> estabilizar.
//!
//! `Session` es dueña de todo el estado mutable del loop (ventana y última
//! etiqueta anunciada). Solo vive en el hilo principal.

use log::debug;

use crate::gesture_classifier::{ClassifierError, GestureClassifier, OnnxSequenceModel, SequenceModel};
use crate::landmark_normalizer::LandmarkNormalizer;
use crate::sequence_buffer::SequenceBuffer;
use crate::stabilizer::{Action, Observation, PredictionStabilizer};
use crate::types::HandDetection;

pub struct Session<M: SequenceModel = OnnxSequenceModel> {
    normalizer: LandmarkNormalizer,
    buffer: SequenceBuffer,
    classifier: GestureClassifier<M>,
    stabilizer: PredictionStabilizer,
}

impl<M: SequenceModel> Session<M> {
    pub fn new(
        normalizer: LandmarkNormalizer,
        classifier: GestureClassifier<M>,
        stabilizer: PredictionStabilizer,
    ) -> Self {
        Self {
            normalizer,
            buffer: SequenceBuffer::new(),
            classifier,
            stabilizer,
        }
    }

    /// Procesa las manos de un frame. Solo falla si falla la inferencia.
    ///
    /// El frame se añade a la ventana aunque no haya manos (ceros); sin
    /// manos en el frame actual no se clasifica.
    pub fn process(&mut self, hands: &[HandDetection]) -> Result<Action, ClassifierError> {
        let feature = self.normalizer.normalize(hands);
        self.buffer.push(feature);

        let observation = if hands.is_empty() {
            Observation::NoHands
        } else if !self.buffer.is_ready() {
            Observation::WindowFilling {
                frames: self.buffer.len(),
            }
        } else {
            match self.buffer.snapshot() {
                Ok(window) => Observation::Classified(self.classifier.classify(&window)?),
                Err(e) => {
                    debug!("Ventana no disponible: {}", e);
                    Observation::WindowFilling {
                        frames: self.buffer.len(),
                    }
                }
            }
        };

        Ok(self.stabilizer.evaluate(observation))
    }

    pub fn buffered_frames(&self) -> usize {
        self.buffer.len()
    }

    pub fn buffer(&self) -> &SequenceBuffer {
        &self.buffer
    }

    pub fn stabilizer(&self) -> &PredictionStabilizer {
        &self.stabilizer
    }

    pub fn classifier(&self) -> &GestureClassifier<M> {
        &self.classifier
    }

    /// Reinicio del stream: ventana vacía y sin etiqueta previa
    pub fn reset(&mut self) {
        self.buffer.reset();
        self.stabilizer.reset();
    }
}
