use std::collections::VecDeque;
use std::io::Write;

use anyhow::Result;
use csv::WriterBuilder;
use thiserror::Error;

use crate::types::{FrameFeature, SequenceWindow, FRAME_FEATURES, SEQ_LEN};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BufferError {
    #[error("Ventana incompleta: {len} de {required} frames")]
    NotReady { len: usize, required: usize },
}

/// Buffer FIFO de capacidad fija (30) sobre features por frame
pub struct SequenceBuffer {
    buffer: VecDeque<FrameFeature>,
    capacity: usize,
}

impl SequenceBuffer {
    pub fn new() -> Self {
        Self::with_capacity(SEQ_LEN)
    }

    /// Capacidad mínima 1
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Añade un frame, descartando el más antiguo si está lleno
    pub fn push(&mut self, feature: FrameFeature) {
        if self.buffer.len() == self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(feature);
    }

    /// True solo con exactamente `capacity` frames
    pub fn is_ready(&self) -> bool {
        self.buffer.len() == self.capacity
    }

    /// Copia la ventana en orden de llegada: [30 x 126]
    pub fn snapshot(&self) -> Result<SequenceWindow, BufferError> {
        if !self.is_ready() {
            return Err(BufferError::NotReady {
                len: self.buffer.len(),
                required: self.capacity,
            });
        }

        Ok(self.buffer.iter().copied().collect())
    }

    /// Vacía el buffer (reinicio de sesión)
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Escribe el buffer en el formato de muestras de entrenamiento:
    /// `frame,f0,...,f125`
    pub fn write_csv<W: Write>(&self, writer: W) -> csv::Result<()> {
        let mut wtr = WriterBuilder::new().from_writer(writer);

        let header: Vec<String> = std::iter::once("frame".to_string())
            .chain((0..FRAME_FEATURES).map(|i| format!("f{}", i)))
            .collect();
        wtr.write_record(&header)?;

        for (frame_idx, feature) in self.buffer.iter().enumerate() {
            let record: Vec<String> = std::iter::once(frame_idx.to_string())
                .chain(feature.iter().map(f32::to_string))
                .collect();
            wtr.write_record(&record)?;
        }

        wtr.flush()?;
        Ok(())
    }

    pub fn to_csv(&self) -> Result<String> {
        let mut out = Vec::new();
        self.write_csv(&mut out)?;
        Ok(String::from_utf8(out)?)
    }
}

impl Default for SequenceBuffer {
    fn default() -> Self {
        Self::new()
    }
}
