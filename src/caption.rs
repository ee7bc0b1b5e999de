use std::collections::HashMap;

use crate::rephrase::fallback_sentence;
use crate::stabilizer::Action;

pub const UNCERTAIN_TEXT: &str = "Uncertain gesture";
pub const NO_HANDS_TEXT: &str = "No hands detected";

/// Texto que mostraría el overlay para el frame actual
#[derive(Debug, Clone, PartialEq)]
pub enum Caption {
    Sentence { text: String, confidence: f32 },
    Uncertain,
    NoHands,
}

impl Caption {
    pub fn text(&self) -> String {
        match self {
            Caption::Sentence { text, confidence } => {
                format!("{} ({:.1}%)", text, confidence * 100.0)
            }
            Caption::Uncertain => UNCERTAIN_TEXT.to_string(),
            Caption::NoHands => NO_HANDS_TEXT.to_string(),
        }
    }
}

/// Frases ya reformuladas por etiqueta. Mientras el worker no responde se
/// muestra la transformación local.
#[derive(Debug, Default)]
pub struct CaptionBook {
    sentences: HashMap<String, String>,
}

impl CaptionBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remember(&mut self, label: &str, sentence: &str) {
        self.sentences.insert(label.to_string(), sentence.to_string());
    }

    pub fn sentence_for(&self, label: &str) -> String {
        self.sentences
            .get(label)
            .cloned()
            .unwrap_or_else(|| fallback_sentence(label))
    }

    pub fn caption_for(&self, action: &Action) -> Caption {
        match action {
            Action::Speak { label, confidence } | Action::Hold { label, confidence } => {
                Caption::Sentence {
                    text: self.sentence_for(label),
                    confidence: *confidence,
                }
            }
            Action::ShowUncertain { .. } => Caption::Uncertain,
            Action::ShowUnrecognizedHands => Caption::NoHands,
        }
    }
}
