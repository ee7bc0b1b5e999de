//! Fuente de landmarks: un detector externo (MediaPipe hands) que escribe
//! un objeto JSON por frame.
//!
//! ```text
//! READY
//! {"hands":[{"handedness":"Left","score":0.93,"landmarks":[{"x":..,"y":..,"z":..}, ...]}],"error":null}
//! ```

use std::io::{self, BufRead, BufReader};
use std::process::{Child, ChildStdout, Command, Stdio};

use log::{debug, info, warn};
use serde::Deserialize;
use thiserror::Error;

use crate::config::DetectorConfig;
use crate::types::{HandDetection, HandSide, Landmark, HAND_SLOTS, NUM_LANDMARKS};

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON inválido en línea {line}: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("no se pudo lanzar el detector {command:?}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("el detector no envió READY, recibido: {0:?}")]
    Handshake(String),
}

/// Lo que produce el detector en cada lectura
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    /// Manos detectadas en un frame (puede estar vacío)
    Frame(Vec<HandDetection>),
    /// El usuario pidió salir
    Quit,
    /// Fin del stream de video
    EndOfStream,
}

pub trait HandDetector {
    fn next_event(&mut self) -> Result<SourceEvent, SourceError>;
}

#[derive(Debug, Deserialize)]
struct HandJson {
    #[serde(default)]
    handedness: String,
    /// Opcional: sin score la mano ya viene filtrada por el detector
    #[serde(default)]
    score: Option<f32>,
    landmarks: Vec<Landmark>,
}

#[derive(Debug, Deserialize)]
struct DetectionJson {
    #[serde(default)]
    hands: Vec<HandJson>,
    #[serde(default)]
    error: Option<String>,
}

/// Stream JSON-lines sobre cualquier `BufRead` (stdin, pipe, archivo)
pub struct JsonLinesSource<R: BufRead> {
    reader: R,
    min_detection_confidence: f32,
    line_no: usize,
}

impl<R: BufRead> JsonLinesSource<R> {
    pub fn new(reader: R, min_detection_confidence: f32) -> Self {
        Self {
            reader,
            min_detection_confidence,
            line_no: 0,
        }
    }

    fn parse_line(&self, line: &str) -> Result<Vec<HandDetection>, SourceError> {
        let result: DetectionJson =
            serde_json::from_str(line).map_err(|source| SourceError::Json {
                line: self.line_no,
                source,
            })?;

        if let Some(error) = result.error {
            warn!("⚠️  Error del detector: {}", error);
            return Ok(Vec::new());
        }

        let mut hands = Vec::with_capacity(HAND_SLOTS);
        for hand in result.hands {
            if let Some(score) = hand.score {
                if score < self.min_detection_confidence {
                    debug!(
                        "Mano descartada por confianza {:.2} < {:.2}",
                        score, self.min_detection_confidence
                    );
                    continue;
                }
            }

            if hand.landmarks.len() != NUM_LANDMARKS {
                warn!(
                    "⚠️  Se esperaban {} landmarks, llegaron {}",
                    NUM_LANDMARKS,
                    hand.landmarks.len()
                );
                continue;
            }

            if hands.len() == HAND_SLOTS {
                debug!("Más de {} manos, se ignora el resto", HAND_SLOTS);
                break;
            }

            let mut landmarks = [Landmark::default(); NUM_LANDMARKS];
            landmarks.copy_from_slice(&hand.landmarks);
            hands.push(HandDetection::new(
                HandSide::from_label(&hand.handedness),
                landmarks,
            ));
        }

        Ok(hands)
    }
}

impl<R: BufRead> HandDetector for JsonLinesSource<R> {
    fn next_event(&mut self) -> Result<SourceEvent, SourceError> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                return Ok(SourceEvent::EndOfStream);
            }
            self.line_no += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.eq_ignore_ascii_case("q") || trimmed.eq_ignore_ascii_case("quit") {
                return Ok(SourceEvent::Quit);
            }

            match self.parse_line(trimmed) {
                Ok(hands) => return Ok(SourceEvent::Frame(hands)),
                Err(SourceError::Json { line, source }) => {
                    // Frame perdido, no es fatal
                    warn!("⚠️  Línea {} ignorada: {}", line, source);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Detector lanzado como subproceso; lee su stdout
pub struct SubprocessSource {
    process: Child,
    inner: JsonLinesSource<BufReader<ChildStdout>>,
}

impl SubprocessSource {
    pub fn spawn(config: &DetectorConfig) -> Result<Self, SourceError> {
        let Some((program, args)) = config.command.split_first() else {
            return Err(SourceError::Spawn {
                command: String::new(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "comando vacío"),
            });
        };

        info!("🖐️  Lanzando detector: {}", config.command.join(" "));

        let mut process = Command::new(program)
            .args(args)
            .env(
                "MIN_DETECTION_CONFIDENCE",
                config.min_detection_confidence.to_string(),
            )
            .env(
                "MIN_TRACKING_CONFIDENCE",
                config.min_tracking_confidence.to_string(),
            )
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| SourceError::Spawn {
                command: program.clone(),
                source,
            })?;

        let Some(stdout) = process.stdout.take() else {
            let _ = process.kill();
            return Err(SourceError::Handshake("sin stdout".to_string()));
        };
        let mut reader = BufReader::new(stdout);

        let mut ready_line = String::new();
        if let Err(e) = reader.read_line(&mut ready_line) {
            let _ = process.kill();
            return Err(SourceError::Io(e));
        }
        if ready_line.trim() != "READY" {
            let _ = process.kill();
            return Err(SourceError::Handshake(ready_line.trim().to_string()));
        }

        info!("✅ Detector listo");

        Ok(Self {
            process,
            inner: JsonLinesSource::new(reader, config.min_detection_confidence),
        })
    }
}

impl HandDetector for SubprocessSource {
    fn next_event(&mut self) -> Result<SourceEvent, SourceError> {
        self.inner.next_event()
    }
}

impl Drop for SubprocessSource {
    fn drop(&mut self) {
        let _ = self.process.kill();
        let _ = self.process.wait();
    }
}
