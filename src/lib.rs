pub mod cancel;
pub mod caption;
pub mod config;
pub mod dispatcher;
pub mod gesture_classifier;
pub mod landmark_normalizer;
pub mod landmark_source;
pub mod rephrase;
pub mod sample_loader;
pub mod sequence_buffer;
pub mod service;
pub mod session;
pub mod speech;
pub mod stabilizer;
pub mod types;
