//! Síntesis de voz por HTTP (MP3) + reproducción local con cpal.
//!
//! `speak` nunca propaga errores: sin credencial es un no-op con warning,
//! y los fallos de red o de audio se registran y se ignoran.

use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, warn};

use crate::cancel::CancellationToken;
use crate::config::SpeechConfig;
use crate::service::{build_agent, ServiceError};

/// Frecuencia de salida; el MP3 decodificado se re-muestrea a esta tasa
const OUTPUT_SAMPLE_RATE: u32 = 48_000;

pub trait Speak: Send {
    /// Best-effort. Bloquea al hilo que llama hasta terminar la reproducción.
    fn speak(&self, sentence: &str, cancel: &CancellationToken);
}

/// Destino del audio sintetizado
pub trait AudioOutput: Send {
    fn play_mp3(&self, mp3: &[u8], cancel: &CancellationToken) -> Result<(), ServiceError>;
}

pub struct SpeechSynthesizer {
    credential: Option<String>,
    endpoint: String,
    voice_id: String,
    model_id: String,
    stability: f32,
    similarity_boost: f32,
    agent: ureq::Agent,
    output: Box<dyn AudioOutput>,
}

impl SpeechSynthesizer {
    pub fn new(config: &SpeechConfig, credential: Option<String>) -> Self {
        Self::with_output(config, credential, Box::new(CpalOutput))
    }

    pub fn with_output(
        config: &SpeechConfig,
        credential: Option<String>,
        output: Box<dyn AudioOutput>,
    ) -> Self {
        Self {
            credential,
            endpoint: config.endpoint.clone(),
            voice_id: config.voice_id.clone(),
            model_id: config.model_id.clone(),
            stability: config.stability,
            similarity_boost: config.similarity_boost,
            agent: build_agent(config.timeout_secs),
            output,
        }
    }

    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    fn synthesize(&self, text: &str) -> Result<Vec<u8>, ServiceError> {
        let api_key = self
            .credential
            .as_deref()
            .ok_or(ServiceError::MissingCredential)?;

        let payload = serde_json::json!({
            "text": text,
            "model_id": self.model_id,
            "voice_settings": {
                "stability": self.stability,
                "similarity_boost": self.similarity_boost,
            },
        });

        let url = format!("{}/{}", self.endpoint.trim_end_matches('/'), self.voice_id);
        let resp = self
            .agent
            .post(url.as_str())
            .header("xi-api-key", api_key)
            .header("accept", "audio/mpeg")
            .send_json(&payload)
            .map_err(ServiceError::from_ureq)?;

        let status = resp.status().as_u16();
        if status != 200 {
            return Err(ServiceError::Status(status));
        }

        let audio = resp
            .into_body()
            .read_to_vec()
            .map_err(ServiceError::from_ureq)?;

        if audio.is_empty() {
            return Err(ServiceError::EmptyResponse);
        }

        Ok(audio)
    }

    fn try_speak(&self, sentence: &str, cancel: &CancellationToken) -> Result<(), ServiceError> {
        let audio = self.synthesize(sentence)?;
        if cancel.is_cancelled() {
            return Err(ServiceError::Cancelled);
        }
        self.output.play_mp3(&audio, cancel)
    }
}

impl Speak for SpeechSynthesizer {
    fn speak(&self, sentence: &str, cancel: &CancellationToken) {
        if cancel.is_cancelled() {
            return;
        }

        match self.try_speak(sentence, cancel) {
            Ok(()) => debug!("🔊 Reproducido: {}", sentence),
            Err(ServiceError::MissingCredential) => {
                warn!("⚠️  Sin credencial de voz, se omite: {}", sentence);
            }
            Err(ServiceError::Cancelled) => debug!("Voz cancelada: {}", sentence),
            Err(e) => warn!("❌ Error de voz para {:?}: {}", sentence, e),
        }
    }
}

/// Salida por el dispositivo de audio por defecto
pub struct CpalOutput;

impl AudioOutput for CpalOutput {
    fn play_mp3(&self, mp3: &[u8], cancel: &CancellationToken) -> Result<(), ServiceError> {
        let (samples, source_rate) = decode_mp3(mp3)?;
        let samples = resample_linear(&samples, source_rate, OUTPUT_SAMPLE_RATE);
        play_samples(samples, OUTPUT_SAMPLE_RATE, cancel)
    }
}

/// Decodifica MP3 a PCM mono i16. Devuelve (muestras, frecuencia)
pub fn decode_mp3(mp3: &[u8]) -> Result<(Vec<i16>, u32), ServiceError> {
    use minimp3::{Decoder, Frame};

    let mut decoder = Decoder::new(Cursor::new(mp3));
    let mut all_samples: Vec<i16> = Vec::new();
    let mut source_sample_rate = 0u32;

    loop {
        match decoder.next_frame() {
            Ok(Frame {
                data,
                sample_rate,
                channels,
                ..
            }) => {
                source_sample_rate = sample_rate as u32;

                // Estéreo -> mono
                if channels == 2 {
                    all_samples.extend(
                        data.chunks(2)
                            .map(|chunk| ((chunk[0] as i32 + chunk[1] as i32) / 2) as i16),
                    );
                } else {
                    all_samples.extend(data);
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => {
                debug!("Decodificación MP3 interrumpida: {:?}", e);
                break;
            }
        }
    }

    if all_samples.is_empty() || source_sample_rate == 0 {
        return Err(ServiceError::Audio("MP3 sin muestras".to_string()));
    }

    Ok((all_samples, source_sample_rate))
}

/// Re-muestreo lineal simple
pub fn resample_linear(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((samples.len() as f64) / ratio).round() as usize;
    let last = samples.len() - 1;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = (pos.floor() as usize).min(last);
            let next = (idx + 1).min(last);
            let frac = pos - idx as f64;
            let a = samples[idx] as f64;
            let b = samples[next] as f64;
            (a + (b - a) * frac).round() as i16
        })
        .collect()
}

/// Reproduce PCM mono por el dispositivo por defecto (estéreo duplicado).
/// Bloquea hasta vaciar el buffer o hasta que se cancele.
fn play_samples(
    samples: Vec<i16>,
    sample_rate: u32,
    cancel: &CancellationToken,
) -> Result<(), ServiceError> {
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| ServiceError::Audio("no hay dispositivo de salida".to_string()))?;

    let config = cpal::StreamConfig {
        channels: 2,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let shared_buffer: Arc<Mutex<VecDeque<i16>>> = Arc::new(Mutex::new(samples.into()));
    let buffer_f32 = Arc::clone(&shared_buffer);
    let buffer_i16 = Arc::clone(&shared_buffer);

    let stream = match device.build_output_stream(
        &config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            if let Ok(mut buf) = buffer_f32.lock() {
                for frame in data.chunks_mut(2) {
                    let sample = buf.pop_front().unwrap_or(0) as f32 / 32768.0;
                    for out in frame.iter_mut() {
                        *out = sample;
                    }
                }
            }
        },
        |err| warn!("❌ Error en stream de audio: {}", err),
        None,
    ) {
        Ok(stream) => stream,
        Err(e) => {
            debug!("Stream f32 no soportado ({}), probando i16", e);
            device
                .build_output_stream(
                    &config,
                    move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                        if let Ok(mut buf) = buffer_i16.lock() {
                            for frame in data.chunks_mut(2) {
                                let sample = buf.pop_front().unwrap_or(0);
                                for out in frame.iter_mut() {
                                    *out = sample;
                                }
                            }
                        }
                    },
                    |err| warn!("❌ Error en stream de audio: {}", err),
                    None,
                )
                .map_err(|e| ServiceError::Audio(e.to_string()))?
        }
    };

    stream
        .play()
        .map_err(|e| ServiceError::Audio(e.to_string()))?;

    loop {
        if cancel.is_cancelled() {
            return Err(ServiceError::Cancelled);
        }
        let remaining = shared_buffer.lock().map(|buf| buf.len()).unwrap_or(0);
        if remaining == 0 {
            break;
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    // Dejar que el último bloque del dispositivo termine de sonar
    std::thread::sleep(Duration::from_millis(100));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_server::respond_once;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingOutput {
        plays: Arc<AtomicUsize>,
    }

    impl AudioOutput for CountingOutput {
        fn play_mp3(&self, _mp3: &[u8], _cancel: &CancellationToken) -> Result<(), ServiceError> {
            self.plays.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_missing_credential_is_noop() {
        let plays = Arc::new(AtomicUsize::new(0));
        let synth = SpeechSynthesizer::with_output(
            &SpeechConfig::default(),
            None,
            Box::new(CountingOutput {
                plays: Arc::clone(&plays),
            }),
        );
        assert!(!synth.has_credential());
        synth.speak("Hello", &CancellationToken::new());
        assert_eq!(plays.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_network_failure_is_swallowed() {
        let plays = Arc::new(AtomicUsize::new(0));
        let config = SpeechConfig {
            endpoint: "http://127.0.0.1:9/v1/text-to-speech".to_string(),
            timeout_secs: 2,
            ..SpeechConfig::default()
        };
        let synth = SpeechSynthesizer::with_output(
            &config,
            Some("test-key".to_string()),
            Box::new(CountingOutput {
                plays: Arc::clone(&plays),
            }),
        );
        synth.speak("Hello", &CancellationToken::new());
        assert_eq!(plays.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cancelled_before_start_does_nothing() {
        let plays = Arc::new(AtomicUsize::new(0));
        let synth = SpeechSynthesizer::with_output(
            &SpeechConfig::default(),
            Some("test-key".to_string()),
            Box::new(CountingOutput {
                plays: Arc::clone(&plays),
            }),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();
        synth.speak("Hello", &cancel);
        assert_eq!(plays.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_resample_doubles_length() {
        let samples = vec![0i16, 100, 200, 300];
        let out = resample_linear(&samples, 24_000, 48_000);
        assert_eq!(out.len(), 8);
        assert_eq!(out[0], 0);
        assert_eq!(out[1], 50);
        assert_eq!(out[2], 100);
        assert_eq!(*out.last().unwrap(), 300);
    }

    #[test]
    fn test_resample_same_rate_is_identity() {
        let samples = vec![1i16, -2, 3];
        assert_eq!(resample_linear(&samples, 48_000, 48_000), samples);
    }

    #[test]
    fn test_decode_garbage_is_error() {
        assert!(decode_mp3(&[0u8; 64]).is_err());
    }

    fn synth_for(url: &str, plays: &Arc<AtomicUsize>) -> SpeechSynthesizer {
        let config = SpeechConfig {
            endpoint: format!("{}/v1/text-to-speech", url),
            timeout_secs: 5,
            ..SpeechConfig::default()
        };
        SpeechSynthesizer::with_output(
            &config,
            Some("test-key".to_string()),
            Box::new(CountingOutput {
                plays: Arc::clone(plays),
            }),
        )
    }

    #[test]
    fn test_server_error_skips_playback() {
        let (url, server) = respond_once(
            "500 Internal Server Error",
            "application/json",
            br#"{"detail":"quota"}"#.to_vec(),
        );
        let plays = Arc::new(AtomicUsize::new(0));
        synth_for(&url, &plays).speak("Hello", &CancellationToken::new());
        server.join().unwrap();
        assert_eq!(plays.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_audio_response_is_played() {
        let (url, server) = respond_once("200 OK", "audio/mpeg", b"ID3fake-mp3".to_vec());
        let plays = Arc::new(AtomicUsize::new(0));
        synth_for(&url, &plays).speak("Hello", &CancellationToken::new());
        assert_eq!(plays.load(Ordering::SeqCst), 1);

        let head = server.join().unwrap();
        assert!(head.starts_with("post /v1/text-to-speech/21m00tcm4tlvdq8ikwam"));
        assert!(head.contains("xi-api-key: test-key"));
    }
}
