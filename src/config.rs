use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::landmark_normalizer::SlotPolicy;
use crate::types::{CONF_THRESHOLD, MIN_DETECTION_CONFIDENCE, MIN_TRACKING_CONFIDENCE};

/// Configuración de la aplicación (`handsup.toml`). Todos los campos tienen valor por defecto.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,
    #[serde(default = "default_labels_path")]
    pub labels_path: PathBuf,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    #[serde(default)]
    pub slot_policy: SlotPolicy,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub rephrase: RephraseConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

fn default_model_path() -> PathBuf { PathBuf::from("models/asl_model.onnx") }
fn default_labels_path() -> PathBuf { PathBuf::from("models/labels.txt") }
fn default_confidence_threshold() -> f32 { CONF_THRESHOLD }

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            labels_path: default_labels_path(),
            confidence_threshold: default_confidence_threshold(),
            slot_policy: SlotPolicy::default(),
            detector: DetectorConfig::default(),
            rephrase: RephraseConfig::default(),
            speech: SpeechConfig::default(),
            dispatch: DispatchConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("configuración TOML inválida")
    }

    /// Lee el archivo si existe; si no, usa los valores por defecto
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("No se pudo leer {:?}", path))?;
        Self::from_toml(&content)
    }
}

/// Proceso externo de detección de manos
#[derive(Debug, Clone, Deserialize)]
pub struct DetectorConfig {
    /// Programa + argumentos; vacío = leer landmarks de stdin
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default = "default_detection_confidence")]
    pub min_detection_confidence: f32,
    #[serde(default = "default_tracking_confidence")]
    pub min_tracking_confidence: f32,
}

fn default_detection_confidence() -> f32 { MIN_DETECTION_CONFIDENCE }
fn default_tracking_confidence() -> f32 { MIN_TRACKING_CONFIDENCE }

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            min_detection_confidence: default_detection_confidence(),
            min_tracking_confidence: default_tracking_confidence(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RephraseConfig {
    #[serde(default = "default_rephrase_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_rephrase_goal")]
    pub goal: String,
    #[serde(default = "default_rephrase_timeout")]
    pub timeout_secs: u64,
}

fn default_rephrase_endpoint() -> String { "https://api.neuralseek.com/v1/rephrase".to_string() }
fn default_rephrase_goal() -> String {
    "Convert ASL phrase into a natural English sentence suitable for subtitles.".to_string()
}
fn default_rephrase_timeout() -> u64 { 10 }

impl Default for RephraseConfig {
    fn default() -> Self {
        Self {
            endpoint: default_rephrase_endpoint(),
            goal: default_rephrase_goal(),
            timeout_secs: default_rephrase_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpeechConfig {
    #[serde(default = "default_speech_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_voice_id")]
    pub voice_id: String,
    #[serde(default = "default_speech_model")]
    pub model_id: String,
    #[serde(default = "default_stability")]
    pub stability: f32,
    #[serde(default = "default_similarity_boost")]
    pub similarity_boost: f32,
    #[serde(default = "default_speech_timeout")]
    pub timeout_secs: u64,
}

fn default_speech_endpoint() -> String { "https://api.elevenlabs.io/v1/text-to-speech".to_string() }
fn default_voice_id() -> String { "21m00Tcm4TlvDq8ikWAM".to_string() }
fn default_speech_model() -> String { "eleven_multilingual_v2".to_string() }
fn default_stability() -> f32 { 0.5 }
fn default_similarity_boost() -> f32 { 0.75 }
fn default_speech_timeout() -> u64 { 30 }

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            endpoint: default_speech_endpoint(),
            voice_id: default_voice_id(),
            model_id: default_speech_model(),
            stability: default_stability(),
            similarity_boost: default_similarity_boost(),
            timeout_secs: default_speech_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Peticiones pendientes antes de empezar a descartar
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_queue_capacity() -> usize { 4 }

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Las credenciales vacías cuentan como ausentes
pub fn non_empty_credential(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.confidence_threshold, 0.8);
        assert_eq!(config.slot_policy, SlotPolicy::DetectionOrder);
        assert_eq!(config.model_path, PathBuf::from("models/asl_model.onnx"));
        assert_eq!(config.detector.min_detection_confidence, 0.6);
        assert!(config.detector.command.is_empty());
        assert_eq!(config.speech.voice_id, "21m00Tcm4TlvDq8ikWAM");
        assert_eq!(config.dispatch.queue_capacity, 4);
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config = AppConfig::from_toml(
            r#"
            confidence_threshold = 0.9
            slot_policy = "side_keyed"

            [detector]
            command = ["python3", "hand_detect.py"]

            [rephrase]
            timeout_secs = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.confidence_threshold, 0.9);
        assert_eq!(config.slot_policy, SlotPolicy::SideKeyed);
        assert_eq!(config.detector.command, vec!["python3", "hand_detect.py"]);
        assert_eq!(config.detector.min_tracking_confidence, 0.6);
        assert_eq!(config.rephrase.timeout_secs, 3);
        assert_eq!(config.rephrase.endpoint, "https://api.neuralseek.com/v1/rephrase");
    }

    #[test]
    fn test_missing_file_is_default() {
        let path = std::env::temp_dir().join("handsup_no_such_config.toml");
        let config = AppConfig::load_or_default(&path).unwrap();
        assert_eq!(config.labels_path, PathBuf::from("models/labels.txt"));
    }

    #[test]
    fn test_blank_credential_is_absent() {
        assert_eq!(non_empty_credential(Some("  ".to_string())), None);
        assert_eq!(non_empty_credential(None), None);
        assert_eq!(
            non_empty_credential(Some("key".to_string())),
            Some("key".to_string())
        );
    }
}
