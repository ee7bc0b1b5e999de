//! Etiqueta ASL -> frase en inglés para subtítulos.
//!
//! Sin credencial no se hace ninguna llamada de red: se aplica la
//! transformación local (separadores -> espacios, mayúscula inicial).
//! Cualquier fallo de red, HTTP no-200 o respuesta vacía usa la misma
//! transformación.

use log::warn;
use serde::Deserialize;

use crate::config::RephraseConfig;
use crate::service::{build_agent, ServiceError};

pub trait Rephrase: Send {
    /// Best-effort: siempre devuelve una frase
    fn rephrase(&self, label: &str) -> String;
}

#[derive(Debug, Deserialize)]
struct RephraseResponse {
    #[serde(default)]
    output: Option<String>,
}

pub struct SentenceRephraser {
    credential: Option<String>,
    endpoint: String,
    goal: String,
    agent: ureq::Agent,
}

impl SentenceRephraser {
    pub fn new(config: &RephraseConfig, credential: Option<String>) -> Self {
        Self {
            credential,
            endpoint: config.endpoint.clone(),
            goal: config.goal.clone(),
            agent: build_agent(config.timeout_secs),
        }
    }

    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    fn try_rephrase(&self, label: &str) -> Result<String, ServiceError> {
        let api_key = self
            .credential
            .as_deref()
            .ok_or(ServiceError::MissingCredential)?;

        let payload = serde_json::json!({
            "input": label.replace('_', " "),
            "goal": self.goal,
        });

        let resp = self
            .agent
            .post(self.endpoint.as_str())
            .header("Authorization", format!("Bearer {}", api_key))
            .send_json(&payload)
            .map_err(ServiceError::from_ureq)?;

        let status = resp.status().as_u16();
        if status != 200 {
            return Err(ServiceError::Status(status));
        }

        let body: RephraseResponse = resp
            .into_body()
            .read_json()
            .map_err(ServiceError::from_ureq)?;

        body.output
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(ServiceError::EmptyResponse)
    }
}

impl Rephrase for SentenceRephraser {
    fn rephrase(&self, label: &str) -> String {
        match self.try_rephrase(label) {
            Ok(sentence) => sentence,
            Err(ServiceError::MissingCredential) => fallback_sentence(label),
            Err(e) => {
                warn!("⚠️  Reformulación falló para {:?}: {}", label, e);
                fallback_sentence(label)
            }
        }
    }
}

/// Transformación local determinista: `thank_you` -> `Thank you`
pub fn fallback_sentence(label: &str) -> String {
    let spaced: String = label
        .chars()
        .map(|c| if c == '_' || c == '-' { ' ' } else { c })
        .collect();

    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
