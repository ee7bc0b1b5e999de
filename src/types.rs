use serde::Deserialize;

/// Landmarks por mano (modelo de manos de MediaPipe)
pub const NUM_LANDMARKS: usize = 21;
/// Coordenadas por landmark: x, y, z
pub const NUM_COORDS: usize = 3;
/// Slots fijos de mano en el vector de features
pub const HAND_SLOTS: usize = 2;
/// Floats por mano: 21 * 3 = 63
pub const HAND_FEATURES: usize = NUM_LANDMARKS * NUM_COORDS;
/// Floats por frame: 2 * 63 = 126
pub const FRAME_FEATURES: usize = HAND_SLOTS * HAND_FEATURES;
/// Frames por ventana (debe coincidir con el entrenamiento)
pub const SEQ_LEN: usize = 30;
/// Total de valores de una ventana completa: 30 * 126 = 3780
pub const TOTAL_WINDOW_FEATURES: usize = SEQ_LEN * FRAME_FEATURES;

/// Umbral de confianza para aceptar una predicción (estricto: `>`)
pub const CONF_THRESHOLD: f32 = 0.8;
/// Umbrales configurados en el detector de manos
pub const MIN_DETECTION_CONFIDENCE: f32 = 0.6;
pub const MIN_TRACKING_CONFIDENCE: f32 = 0.6;

/// Un punto 3D en coordenadas normalizadas de imagen
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    /// Profundidad relativa a la muñeca
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Lado reportado por el detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandSide {
    Left,
    Right,
    Unknown,
}

impl HandSide {
    /// Convierte la etiqueta de handedness del detector ("Left" / "Right")
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            l if l.eq_ignore_ascii_case("left") => HandSide::Left,
            l if l.eq_ignore_ascii_case("right") => HandSide::Right,
            _ => HandSide::Unknown,
        }
    }

    /// Color BGR con el que el overlay pinta la mano. No afecta a las features.
    pub fn display_color(&self) -> (u8, u8, u8) {
        match self {
            HandSide::Left => (255, 0, 0),
            HandSide::Right => (0, 255, 0),
            HandSide::Unknown => (0, 255, 255),
        }
    }
}

/// Una mano detectada en un frame
#[derive(Debug, Clone, PartialEq)]
pub struct HandDetection {
    pub side: HandSide,
    /// Orden canónico de MediaPipe (WRIST = 0 ... PINKY_TIP = 20)
    pub landmarks: [Landmark; NUM_LANDMARKS],
}

impl HandDetection {
    pub fn new(side: HandSide, landmarks: [Landmark; NUM_LANDMARKS]) -> Self {
        Self { side, landmarks }
    }

    /// Escribe los 63 floats de la mano en `output` (x, y, z por landmark)
    pub fn write_features(&self, output: &mut [f32]) {
        for (i, lm) in self.landmarks.iter().enumerate() {
            let base_idx = i * NUM_COORDS;
            output[base_idx] = lm.x;
            output[base_idx + 1] = lm.y;
            output[base_idx + 2] = lm.z;
        }
    }
}

/// Vector de features de un frame: [slot0 (63) | slot1 (63)]
pub type FrameFeature = [f32; FRAME_FEATURES];

/// Ventana lista para clasificar: [30 frames x 126]
pub type SequenceWindow = Vec<FrameFeature>;

/// Salida del clasificador para una ventana
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub confidence: f32,
}

impl Prediction {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// Aplana una ventana en formato [t * 126 + feature]
pub fn flatten_window(window: &[FrameFeature]) -> Vec<f32> {
    let mut flat = Vec::with_capacity(window.len() * FRAME_FEATURES);
    for frame in window {
        flat.extend_from_slice(frame);
    }
    flat
}
