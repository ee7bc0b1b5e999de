//! Filtro de confianza + anti-repetición sobre la salida del clasificador.
//!
//! A ~30 fps el mismo gesto sostenido produce la misma etiqueta en cada
//! frame; solo la primera aceptación (o un cambio de etiqueta) debe
//! generar voz.

use log::debug;

use crate::types::{Prediction, CONF_THRESHOLD};

/// Lo que el pipeline sabe del frame actual
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// El detector no encontró manos en este frame
    NoHands,
    /// La ventana todavía no tiene 30 frames
    WindowFilling { frames: usize },
    /// Ventana completa clasificada
    Classified(Prediction),
}

/// Decisión para el frame actual
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Predicción confiable y nueva: anunciarla
    Speak { label: String, confidence: f32 },
    /// Predicción confiable ya anunciada: solo refrescar el subtítulo
    Hold { label: String, confidence: f32 },
    ShowUncertain { confidence: f32 },
    ShowUnrecognizedHands,
}

impl Action {
    pub fn is_speak(&self) -> bool {
        matches!(self, Action::Speak { .. })
    }
}

pub struct PredictionStabilizer {
    threshold: f32,
    previous_accepted_label: Option<String>,
}

impl PredictionStabilizer {
    pub fn new() -> Self {
        Self::with_threshold(CONF_THRESHOLD)
    }

    pub fn with_threshold(threshold: f32) -> Self {
        Self {
            threshold,
            previous_accepted_label: None,
        }
    }

    /// Umbral estricto: `confidence > threshold`. Exactamente 0.8 no es confiable.
    pub fn evaluate(&mut self, observation: Observation) -> Action {
        let prediction = match observation {
            Observation::NoHands | Observation::WindowFilling { .. } => {
                return Action::ShowUnrecognizedHands;
            }
            Observation::Classified(prediction) => prediction,
        };

        if prediction.confidence <= self.threshold {
            return Action::ShowUncertain {
                confidence: prediction.confidence,
            };
        }

        let Prediction { label, confidence } = prediction;

        if self.previous_accepted_label.as_deref() == Some(label.as_str()) {
            return Action::Hold { label, confidence };
        }

        debug!(
            "Etiqueta aceptada: {:?} -> {} ({:.2})",
            self.previous_accepted_label, label, confidence
        );
        self.previous_accepted_label = Some(label.clone());
        Action::Speak { label, confidence }
    }

    pub fn previous_accepted_label(&self) -> Option<&str> {
        self.previous_accepted_label.as_deref()
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Olvida la última etiqueta anunciada (reinicio de sesión)
    pub fn reset(&mut self) {
        self.previous_accepted_label = None;
    }
}

impl Default for PredictionStabilizer {
    fn default() -> Self {
        Self::new()
    }
}
