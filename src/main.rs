/*
HandsUp - Reconocimiento de ASL en tiempo real - Rust + ONNX

Pipeline por frame:
1. Un detector externo (MediaPipe hands) entrega hasta 2 manos con 21 landmarks
2. Se normalizan a 126 floats y se acumulan en una ventana de 30 frames
3. El modelo ONNX clasifica la ventana
4. Una etiqueta nueva y confiable se reformula y se lee en voz alta (en otro hilo)

Uso:
    handsup [--config handsup.toml] [--record ventana.csv] [--detector python3 hand_detect.py]

Sin --detector (ni `detector.command` en la config) lee JSON-lines de stdin:
    python3 hand_detect.py | RUST_LOG=debug ./target/release/handsup

Credenciales (opcionales): NEURALSEEK_API_KEY, ELEVENLABS_API_KEY
*/

use anyhow::{bail, Context, Result};
use crossbeam_channel::{unbounded, Receiver};
use log::{error, info, warn};
use std::env;
use std::fs::File;
use std::io::{self, BufRead};
use std::path::PathBuf;

use handsup::cancel::CancellationToken;
use handsup::caption::CaptionBook;
use handsup::config::{non_empty_credential, AppConfig};
use handsup::dispatcher::ActionDispatcher;
use handsup::gesture_classifier::GestureClassifier;
use handsup::landmark_normalizer::LandmarkNormalizer;
use handsup::landmark_source::{HandDetector, JsonLinesSource, SourceEvent, SubprocessSource};
use handsup::rephrase::SentenceRephraser;
use handsup::session::Session;
use handsup::speech::SpeechSynthesizer;
use handsup::stabilizer::{Action, PredictionStabilizer};

const DEFAULT_CONFIG_PATH: &str = "handsup.toml";

struct CliOptions {
    config_path: PathBuf,
    record_path: Option<PathBuf>,
    detector_command: Vec<String>,
}

fn parse_args() -> Result<CliOptions> {
    let usage = "Uso: handsup [--config <archivo>] [--record <archivo.csv>] [--detector <cmd> [args...]]";
    let mut config_path = PathBuf::from(DEFAULT_CONFIG_PATH);
    let mut record_path = None;
    let mut detector_command = Vec::new();

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                config_path = PathBuf::from(args.next().context(usage)?);
            }
            "--record" => {
                record_path = Some(PathBuf::from(args.next().context(usage)?));
            }
            "--detector" => {
                // El resto de argumentos pertenece al comando del detector
                detector_command = args.by_ref().collect();
                if detector_command.is_empty() {
                    bail!(usage);
                }
            }
            "-h" | "--help" => {
                println!("{}", usage);
                std::process::exit(0);
            }
            other => bail!("Argumento desconocido: {}\n{}", other, usage),
        }
    }

    Ok(CliOptions {
        config_path,
        record_path,
        detector_command,
    })
}

/// En modo subproceso stdin queda libre para el teclado: `q` + Enter sale
fn spawn_quit_watcher() -> Receiver<()> {
    let (tx, rx) = unbounded();
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let cmd = line.trim();
            if cmd.eq_ignore_ascii_case("q") || cmd.eq_ignore_ascii_case("quit") {
                let _ = tx.send(());
                break;
            }
        }
    });
    rx
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("🎯 HandsUp - ASL en tiempo real - Rust + ONNX");

    let opts = parse_args()?;
    let mut config = AppConfig::load_or_default(&opts.config_path)?;
    if !opts.detector_command.is_empty() {
        config.detector.command = opts.detector_command.clone();
    }

    // Credenciales: se leen una sola vez y se inyectan
    let rephrase_key = non_empty_credential(env::var("NEURALSEEK_API_KEY").ok());
    let speech_key = non_empty_credential(env::var("ELEVENLABS_API_KEY").ok());

    info!("🔧 Inicializando clasificador ONNX...");
    let classifier = GestureClassifier::load(&config.model_path, &config.labels_path)
        .with_context(|| {
            format!(
                "No se pudo cargar el modelo {:?} / clases {:?}",
                config.model_path, config.labels_path
            )
        })?;
    info!("✅ Clasificador cargado");

    let mut session = Session::new(
        LandmarkNormalizer::new(config.slot_policy),
        classifier,
        PredictionStabilizer::with_threshold(config.confidence_threshold),
    );

    let rephraser = SentenceRephraser::new(&config.rephrase, rephrase_key);
    if !rephraser.has_credential() {
        warn!("⚠️  NEURALSEEK_API_KEY ausente: subtítulos con transformación local");
    }
    let speaker = SpeechSynthesizer::new(&config.speech, speech_key);
    if !speaker.has_credential() {
        warn!("⚠️  ELEVENLABS_API_KEY ausente: sin voz");
    }

    let cancel = CancellationToken::new();
    let mut dispatcher = ActionDispatcher::spawn(
        rephraser,
        speaker,
        config.dispatch.queue_capacity,
        cancel.clone(),
    );

    let (mut detector, quit_rx): (Box<dyn HandDetector>, Option<Receiver<()>>) =
        if config.detector.command.is_empty() {
            info!("📥 Leyendo landmarks de stdin (q para salir)");
            let source = JsonLinesSource::new(
                io::stdin().lock(),
                config.detector.min_detection_confidence,
            );
            (Box::new(source), None)
        } else {
            let source = SubprocessSource::spawn(&config.detector)
                .context("No se pudo iniciar el detector de manos")?;
            info!("⌨️  Escribe q + Enter para salir");
            (Box::new(source), Some(spawn_quit_watcher()))
        };

    info!("🎬 Iniciando reconocimiento en tiempo real...");

    let mut captions = CaptionBook::new();
    let mut last_caption = String::new();
    let mut frames = 0usize;
    let mut user_quit = false;

    loop {
        if quit_rx.as_ref().is_some_and(|rx| rx.try_recv().is_ok()) {
            user_quit = true;
            break;
        }

        let hands = match detector.next_event() {
            Ok(SourceEvent::Frame(hands)) => hands,
            Ok(SourceEvent::Quit) => {
                user_quit = true;
                break;
            }
            Ok(SourceEvent::EndOfStream) => {
                info!("📭 Fin del stream de video");
                break;
            }
            Err(e) => {
                // Fallo de captura: se termina sin error
                warn!("❌ Error leyendo el detector: {}", e);
                break;
            }
        };
        frames += 1;

        let action = match session.process(&hands) {
            Ok(action) => action,
            Err(e) => {
                error!("❌ Error de inferencia: {}", e);
                dispatcher.shutdown();
                return Err(e).context("La inferencia falló; no se puede continuar");
            }
        };

        if let Action::Speak { label, confidence } = &action {
            info!("🗣️  Gesto: {} ({:.1}%)", label, confidence * 100.0);
            dispatcher.submit(label);
        }

        for dispatched in dispatcher.poll_sentences() {
            captions.remember(&dispatched.label, &dispatched.sentence);
        }

        let caption = captions.caption_for(&action).text();
        if caption != last_caption {
            info!("💬 {}", caption);
            last_caption = caption;
        }
    }

    if let Some(path) = &opts.record_path {
        if session.buffer().is_ready() {
            let file = File::create(path)
                .with_context(|| format!("No se pudo crear {:?}", path))?;
            session
                .buffer()
                .write_csv(file)
                .with_context(|| format!("No se pudo escribir {:?}", path))?;
            info!("💾 Ventana guardada en {:?}", path);
        } else {
            warn!(
                "⚠️  Ventana incompleta ({} frames), no se guarda {:?}",
                session.buffered_frames(),
                path
            );
        }
    }

    if user_quit {
        info!("👋 Saliendo...");
        dispatcher.shutdown();
    } else {
        // Fin del stream: dejar terminar lo que ya estaba en cola
        dispatcher.finish();
    }

    info!("✅ {} frames procesados", frames);
    Ok(())
}
