use std::cmp::Ordering;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use rand::Rng;

use handsup::config::AppConfig;
use handsup::gesture_classifier::GestureClassifier;
use handsup::sample_loader::{fit_window, load_sequence, sample_label};
use handsup::types::{flatten_window, FRAME_FEATURES, SEQ_LEN};

const USAGE: &str =
    "Uso: replay_samples [--config <archivo>] [--dump-flat] [--top <n>] <muestra.csv | carpeta-gesto>";

struct ReplayOptions {
    config_path: PathBuf,
    dump_flat: bool,
    top: usize,
}

fn parse_args() -> Result<(PathBuf, ReplayOptions)> {
    let mut opts = ReplayOptions {
        config_path: PathBuf::from("handsup.toml"),
        dump_flat: false,
        top: 5,
    };
    let mut sample_path: Option<PathBuf> = None;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--dump-flat" => opts.dump_flat = true,
            "--config" => {
                opts.config_path = PathBuf::from(args.next().context(USAGE)?);
            }
            "--top" => {
                let value = args.next().context(USAGE)?;
                opts.top = value
                    .parse()
                    .with_context(|| format!("--top inválido: {}", value))?;
            }
            _ => {
                if sample_path.is_some() {
                    bail!(USAGE);
                }
                sample_path = Some(PathBuf::from(arg));
            }
        }
    }

    let sample_path =
        sample_path.ok_or_else(|| anyhow!("Debes especificar una muestra o carpeta\n{}", USAGE))?;
    Ok((sample_path, opts))
}

/// Si es una carpeta, elige al azar uno de sus CSV
fn pick_sample(path: &Path) -> Result<PathBuf> {
    if !path.is_dir() {
        return Ok(path.to_path_buf());
    }

    let csv_files: Vec<PathBuf> = fs::read_dir(path)
        .with_context(|| format!("No se pudo leer la carpeta {:?}", path))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| {
            p.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("csv"))
                .unwrap_or(false)
        })
        .collect();

    if csv_files.is_empty() {
        bail!("No hay archivos CSV en {:?}", path);
    }

    let random_idx = rand::thread_rng().gen_range(0..csv_files.len());
    Ok(csv_files[random_idx].clone())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let (path, opts) = parse_args()?;
    let sample = pick_sample(&path)?;
    println!("🎞️  Reproduciendo muestra {:?}", sample);

    let sequence = load_sequence(&sample)?;
    let width = sequence.iter().map(Vec::len).max().unwrap_or(0);
    if sequence.len() != SEQ_LEN || width != FRAME_FEATURES {
        println!(
            "ℹ️  Muestra {}x{} ajustada a {}x{}",
            sequence.len(),
            width,
            SEQ_LEN,
            FRAME_FEATURES
        );
    }
    let window = fit_window(&sequence);

    let config = AppConfig::load_or_default(&opts.config_path)?;
    let mut classifier = GestureClassifier::load(&config.model_path, &config.labels_path)?;

    let mut scores = classifier.predict_scores(&window)?;
    let prediction = classifier.classify(&window)?;
    scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    println!(
        "\n🥇 Predicción: {} ({:.1}%)",
        prediction.label,
        prediction.confidence * 100.0
    );

    if let Some(expected) = sample_label(&sample) {
        let mark = if expected == prediction.label { "✅" } else { "❌" };
        println!("{} Etiqueta de la carpeta: {}", mark, expected);
    }

    println!("\nTop-{} probabilidades:", opts.top);
    for (idx, (label, score)) in scores.iter().take(opts.top).enumerate() {
        println!("  {:>2}. {:<25} {:>6.2}%", idx + 1, label, score * 100.0);
    }

    if opts.dump_flat {
        let flat = flatten_window(&window);
        println!("\n🧱 Tensor plano ({} valores):", flat.len());
        for (idx, value) in flat.iter().enumerate() {
            println!("  {:04}: {:>12.6}", idx, value);
        }
    }

    Ok(())
}
