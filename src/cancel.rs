use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Señal de cancelación compartida entre el loop principal y los workers.
/// Se consulta entre frames y antes/después de cada llamada bloqueante.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
