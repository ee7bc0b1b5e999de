use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{anyhow, bail, ensure, Context, Result};
use csv::ReaderBuilder;

use crate::types::{SequenceWindow, FRAME_FEATURES, SEQ_LEN};

/// Carga una secuencia T x F desde un CSV `frame,f0,...,f{F-1}`.
/// T y F son libres; las filas se ordenan por `frame` y los huecos se rellenan con ceros.
pub fn load_sequence(path: impl AsRef<Path>) -> Result<Vec<Vec<f32>>> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("No se pudo abrir el CSV {:?}", path))?;

    let mut frames: BTreeMap<usize, Vec<f32>> = BTreeMap::new();

    for (row_idx, result) in reader.records().enumerate() {
        let record =
            result.with_context(|| format!("Fila {} inválida en {:?}", row_idx + 1, path))?;
        if record.len() < 2 {
            bail!("La fila {} no tiene features", row_idx + 1);
        }

        let frame: usize = record[0]
            .trim()
            .parse()
            .with_context(|| format!("frame inválido en fila {}", row_idx + 1))?;

        let values = record
            .iter()
            .skip(1)
            .map(|field| field.trim().parse::<f32>())
            .collect::<Result<Vec<f32>, _>>()
            .with_context(|| format!("valor no numérico en fila {}", row_idx + 1))?;

        if frames.insert(frame, values).is_some() {
            bail!("frame {} repetido en {:?}", frame, path);
        }
    }

    if frames.is_empty() {
        return Err(anyhow!("El CSV {:?} no contiene datos", path));
    }

    let min_frame = frames.keys().next().copied().unwrap_or_default();
    ensure!(
        min_frame == 0,
        "El CSV debe iniciar en frame=0 (encontrado frame={})",
        min_frame
    );
    let max_frame = frames.keys().next_back().copied().unwrap_or_default();
    let width = frames.values().map(Vec::len).max().unwrap_or(0);

    let mut sequence = Vec::with_capacity(max_frame + 1);
    for frame_idx in 0..=max_frame {
        match frames.remove(&frame_idx) {
            Some(values) => sequence.push(values),
            None => sequence.push(vec![0.0; width]),
        }
    }

    Ok(sequence)
}

/// Ajusta una secuencia arbitraria a la forma fija 30 x 126:
/// ceros al final (frames y features) o recorte de lo que sobra.
pub fn fit_window(sequence: &[Vec<f32>]) -> SequenceWindow {
    let mut window = vec![[0.0f32; FRAME_FEATURES]; SEQ_LEN];

    for (dst, src) in window.iter_mut().zip(sequence.iter()) {
        let n = src.len().min(FRAME_FEATURES);
        dst[..n].copy_from_slice(&src[..n]);
    }

    window
}

/// Carga un CSV de muestra y lo deja listo para el clasificador
pub fn load_window(path: impl AsRef<Path>) -> Result<SequenceWindow> {
    let sequence = load_sequence(path)?;
    Ok(fit_window(&sequence))
}

/// Etiqueta de una muestra: nombre del directorio que la contiene
pub fn sample_label(path: impl AsRef<Path>) -> Option<String> {
    path.as_ref()
        .parent()
        .and_then(|dir| dir.file_name())
        .map(|name| name.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence_buffer::SequenceBuffer;
    use std::fs;
    use std::path::PathBuf;

    fn temp_sample(dir_name: &str, file_name: &str, content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("handsup_samples_test").join(dir_name);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(file_name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_fit_window_pads_short_sequence() {
        let sequence = vec![vec![1.0; 63]; 10];
        let window = fit_window(&sequence);
        assert_eq!(window.len(), 30);
        assert_eq!(window[0][62], 1.0);
        assert_eq!(window[0][63], 0.0);
        assert!(window[10].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_fit_window_truncates_long_sequence() {
        let sequence: Vec<Vec<f32>> = (0..40).map(|t| vec![t as f32; 200]).collect();
        let window = fit_window(&sequence);
        assert_eq!(window.len(), 30);
        assert_eq!(window[29][0], 29.0);
        assert_eq!(window[29][125], 29.0);
    }

    #[test]
    fn test_load_sequence_fills_gaps_with_zeros() {
        let path = temp_sample(
            "hello",
            "gaps.csv",
            "frame,f0,f1\n0,1.0,2.0\n2,3.0,4.0\n",
        );
        let sequence = load_sequence(&path).unwrap();
        assert_eq!(sequence, vec![vec![1.0, 2.0], vec![0.0, 0.0], vec![3.0, 4.0]]);
        assert_eq!(sample_label(&path).as_deref(), Some("hello"));
    }

    #[test]
    fn test_load_sequence_rejects_bad_values() {
        let path = temp_sample("bad", "bad.csv", "frame,f0\n0,abc\n");
        assert!(load_sequence(&path).is_err());

        let path = temp_sample("bad", "offset.csv", "frame,f0\n3,1.0\n");
        assert!(load_sequence(&path).is_err());
    }

    #[test]
    fn test_buffer_export_loads_back_as_window() {
        let mut buffer = SequenceBuffer::new();
        for t in 0..30 {
            let mut feature = [0.0f32; FRAME_FEATURES];
            feature[5] = t as f32;
            buffer.push(feature);
        }
        let path = temp_sample("thank_you", "export.csv", &buffer.to_csv().unwrap());

        let window = load_window(&path).unwrap();
        assert_eq!(window, buffer.snapshot().unwrap());
    }
}
