use std::io::Cursor;
use std::sync::{Arc, Mutex};

use handsup::cancel::CancellationToken;
use handsup::caption::{Caption, CaptionBook};
use handsup::dispatcher::ActionDispatcher;
use handsup::gesture_classifier::{ClassifierError, GestureClassifier, LabelSet, SequenceModel};
use handsup::landmark_normalizer::LandmarkNormalizer;
use handsup::landmark_source::{HandDetector, JsonLinesSource, SourceEvent};
use handsup::rephrase::{fallback_sentence, Rephrase, SentenceRephraser};
use handsup::config::RephraseConfig;
use handsup::session::Session;
use handsup::speech::Speak;
use handsup::stabilizer::{Action, PredictionStabilizer};
use handsup::types::{FrameFeature, FRAME_FEATURES, SEQ_LEN};

/// "hello" si la mano está a la izquierda de la imagen, "thank_you" si no
struct PositionModel;

impl SequenceModel for PositionModel {
    fn predict(&mut self, window: &[FrameFeature]) -> Result<Vec<f32>, ClassifierError> {
        assert_eq!(window.len(), SEQ_LEN);
        assert!(window.iter().all(|f| f.len() == FRAME_FEATURES));
        let last_x = window[SEQ_LEN - 1][0];
        if last_x < 0.5 {
            Ok(vec![0.93, 0.07])
        } else {
            Ok(vec![0.1, 0.9])
        }
    }
}

struct UppercaseRephraser;

impl Rephrase for UppercaseRephraser {
    fn rephrase(&self, label: &str) -> String {
        fallback_sentence(label).to_uppercase()
    }
}

#[derive(Clone, Default)]
struct RecordingSpeaker {
    spoken: Arc<Mutex<Vec<String>>>,
}

impl Speak for RecordingSpeaker {
    fn speak(&self, sentence: &str, cancel: &CancellationToken) {
        if !cancel.is_cancelled() {
            self.spoken.lock().unwrap().push(sentence.to_string());
        }
    }
}

fn frame_line(x: f32) -> String {
    let landmarks: Vec<String> = (0..21)
        .map(|_| format!(r#"{{"x":{},"y":0.4,"z":-0.01}}"#, x))
        .collect();
    format!(
        r#"{{"hands":[{{"handedness":"Right","score":0.95,"landmarks":[{}]}}],"error":null}}"#,
        landmarks.join(",")
    )
}

fn session() -> Session<PositionModel> {
    let labels = LabelSet::parse("hello\nthank_you\n").unwrap();
    Session::new(
        LandmarkNormalizer::default(),
        GestureClassifier::new(PositionModel, labels),
        PredictionStabilizer::new(),
    )
}

#[test]
fn test_stream_to_speech() {
    let mut lines = Vec::new();
    lines.extend((0..35).map(|_| frame_line(0.2)));
    lines.push(r#"{"hands":[]}"#.to_string());
    lines.extend((0..5).map(|_| frame_line(0.8)));
    let mut source = JsonLinesSource::new(Cursor::new(lines.join("\n")), 0.6);

    let speaker = RecordingSpeaker::default();
    let spoken = Arc::clone(&speaker.spoken);
    let mut dispatcher =
        ActionDispatcher::spawn(UppercaseRephraser, speaker, 4, CancellationToken::new());

    let mut session = session();
    let mut actions = Vec::new();
    loop {
        match source.next_event().unwrap() {
            SourceEvent::Frame(hands) => {
                let action = session.process(&hands).unwrap();
                if let Action::Speak { label, .. } = &action {
                    assert!(dispatcher.submit(label));
                }
                actions.push(action);
            }
            SourceEvent::Quit => panic!("no se esperaba quit"),
            SourceEvent::EndOfStream => break,
        }
    }
    dispatcher.finish();

    assert_eq!(actions.len(), 41);
    assert!(actions[..SEQ_LEN - 1]
        .iter()
        .all(|a| *a == Action::ShowUnrecognizedHands));
    assert_eq!(actions.iter().filter(|a| a.is_speak()).count(), 2);
    assert_eq!(actions[35], Action::ShowUnrecognizedHands);

    assert_eq!(
        *spoken.lock().unwrap(),
        vec!["HELLO".to_string(), "THANK YOU".to_string()]
    );

    let mut book = CaptionBook::new();
    for dispatched in dispatcher.poll_sentences() {
        book.remember(&dispatched.label, &dispatched.sentence);
    }
    assert_eq!(
        book.caption_for(actions.last().unwrap()).text(),
        "THANK YOU (90.0%)"
    );
}

#[test]
fn test_rephrase_failure_falls_back_to_local_sentence() {
    let config = RephraseConfig {
        endpoint: "http://127.0.0.1:9/rephrase".to_string(),
        timeout_secs: 2,
        ..RephraseConfig::default()
    };
    let rephraser = SentenceRephraser::new(&config, Some("key".to_string()));

    let speaker = RecordingSpeaker::default();
    let spoken = Arc::clone(&speaker.spoken);
    let mut dispatcher = ActionDispatcher::spawn(rephraser, speaker, 4, CancellationToken::new());

    assert!(dispatcher.submit("thank_you"));
    dispatcher.finish();

    assert_eq!(*spoken.lock().unwrap(), vec!["Thank you".to_string()]);
}

#[test]
fn test_quit_line_stops_stream() {
    let lines = [frame_line(0.2), "q".to_string(), frame_line(0.2)];
    let mut source = JsonLinesSource::new(Cursor::new(lines.join("\n")), 0.6);
    let mut session = session();

    let SourceEvent::Frame(hands) = source.next_event().unwrap() else {
        panic!("se esperaba un frame");
    };
    assert_eq!(
        session.process(&hands).unwrap(),
        Action::ShowUnrecognizedHands
    );
    assert_eq!(source.next_event().unwrap(), SourceEvent::Quit);
}

#[test]
fn test_uncertain_caption() {
    let book = CaptionBook::new();
    assert_eq!(
        book.caption_for(&Action::ShowUncertain { confidence: 0.8 }),
        Caption::Uncertain
    );
}
