//! Despacho de acciones fuera del loop de video.
//!
//! El loop principal envía copias de la etiqueta por un canal acotado; un
//! hilo worker reformula la etiqueta, devuelve la frase para el subtítulo
//! y la reproduce. El estado del estabilizador nunca sale del hilo principal.

use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender, TrySendError};
use log::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::rephrase::Rephrase;
use crate::speech::Speak;

/// Frase producida por el worker para una etiqueta anunciada
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchedSentence {
    pub label: String,
    pub sentence: String,
}

pub struct ActionDispatcher {
    tx_labels: Option<Sender<String>>,
    rx_sentences: Receiver<DispatchedSentence>,
    cancel: CancellationToken,
    worker: Option<JoinHandle<()>>,
}

impl ActionDispatcher {
    pub fn spawn<R, S>(
        rephraser: R,
        speaker: S,
        queue_capacity: usize,
        cancel: CancellationToken,
    ) -> Self
    where
        R: Rephrase + 'static,
        S: Speak + 'static,
    {
        let (tx_labels, rx_labels) = bounded::<String>(queue_capacity.max(1));
        let (tx_sentences, rx_sentences) = unbounded::<DispatchedSentence>();

        let worker_cancel = cancel.clone();
        let worker = std::thread::spawn(move || {
            run_worker(rephraser, speaker, rx_labels, tx_sentences, worker_cancel);
        });

        Self {
            tx_labels: Some(tx_labels),
            rx_sentences,
            cancel,
            worker: Some(worker),
        }
    }

    /// Fire-and-forget. Devuelve false si la petición se descartó
    /// (cola llena, worker caído o dispatcher cerrado). Sin reintentos.
    pub fn submit(&self, label: &str) -> bool {
        let Some(tx) = self.tx_labels.as_ref() else {
            return false;
        };
        if self.cancel.is_cancelled() {
            return false;
        }

        match tx.try_send(label.to_string()) {
            Ok(()) => {
                debug!("📤 Despachado: {}", label);
                true
            }
            Err(TrySendError::Full(label)) => {
                warn!("⚠️  Cola de voz llena, se descarta: {}", label);
                false
            }
            Err(TrySendError::Disconnected(label)) => {
                warn!("❌ Worker de voz no disponible, se descarta: {}", label);
                false
            }
        }
    }

    /// Frases listas desde la última llamada (no bloquea)
    pub fn poll_sentences(&self) -> Vec<DispatchedSentence> {
        self.rx_sentences.try_iter().collect()
    }

    /// Cancela el trabajo pendiente, cierra la cola y espera al worker
    pub fn shutdown(&mut self) {
        self.cancel.cancel();
        self.tx_labels.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("❌ El worker de voz terminó con pánico");
            }
        }
    }

    /// Cierra la cola pero deja terminar lo ya encolado
    pub fn finish(&mut self) {
        self.tx_labels.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("❌ El worker de voz terminó con pánico");
            }
        }
    }
}

impl Drop for ActionDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker<R: Rephrase, S: Speak>(
    rephraser: R,
    speaker: S,
    rx_labels: Receiver<String>,
    tx_sentences: Sender<DispatchedSentence>,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            break;
        }

        select! {
            recv(rx_labels) -> msg => {
                let Ok(label) = msg else {
                    // Cola cerrada
                    break;
                };

                if cancel.is_cancelled() {
                    break;
                }
                let sentence = rephraser.rephrase(&label);

                let _ = tx_sentences.send(DispatchedSentence {
                    label: label.clone(),
                    sentence: sentence.clone(),
                });

                if cancel.is_cancelled() {
                    break;
                }
                speaker.speak(&sentence, &cancel);
            }
            default(Duration::from_millis(100)) => {}
        }
    }

    info!("🛑 Worker de voz detenido");
}
