//! Convierte 0, 1 o 2 manos detectadas en un `FrameFeature` de 126 floats.
//!
//! El layout tiene que coincidir con el usado al entrenar el modelo:
//! dos slots de 63 floats, rellenos en el orden en que el detector
//! reporta las manos, con ceros para los slots vacíos.

use log::debug;
use serde::Deserialize;

use crate::types::{FrameFeature, HandDetection, HandSide, FRAME_FEATURES, HAND_FEATURES, HAND_SLOTS};

/// Política de asignación de manos a slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotPolicy {
    /// Orden de reporte del detector, sin mirar el lado (layout del modelo entrenado)
    #[default]
    DetectionOrder,
    /// Left -> slot 0, Right -> slot 1; Unknown ocupa el primer slot libre
    SideKeyed,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LandmarkNormalizer {
    policy: SlotPolicy,
}

impl LandmarkNormalizer {
    pub fn new(policy: SlotPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> SlotPolicy {
        self.policy
    }

    /// Función total: nunca falla por manos ausentes.
    /// Manos extra (más de 2) se ignoran.
    pub fn normalize(&self, hands: &[HandDetection]) -> FrameFeature {
        let mut feature = [0.0f32; FRAME_FEATURES];

        if hands.len() > HAND_SLOTS {
            debug!("Se reportaron {} manos, se usan las {} primeras", hands.len(), HAND_SLOTS);
        }

        match self.policy {
            SlotPolicy::DetectionOrder => {
                for (slot, hand) in hands.iter().take(HAND_SLOTS).enumerate() {
                    hand.write_features(slot_mut(&mut feature, slot));
                }
            }
            SlotPolicy::SideKeyed => {
                let mut taken = [false; HAND_SLOTS];
                let mut pending = Vec::new();

                for hand in hands.iter().take(HAND_SLOTS) {
                    let preferred = match hand.side {
                        HandSide::Left => Some(0),
                        HandSide::Right => Some(1),
                        HandSide::Unknown => None,
                    };
                    match preferred {
                        Some(slot) if !taken[slot] => {
                            hand.write_features(slot_mut(&mut feature, slot));
                            taken[slot] = true;
                        }
                        // Lado repetido o desconocido: se resuelve al final
                        _ => pending.push(hand),
                    }
                }

                for hand in pending {
                    if let Some(slot) = taken.iter().position(|t| !t) {
                        hand.write_features(slot_mut(&mut feature, slot));
                        taken[slot] = true;
                    }
                }
            }
        }

        feature
    }
}

fn slot_mut(feature: &mut FrameFeature, slot: usize) -> &mut [f32] {
    let start = slot * HAND_FEATURES;
    &mut feature[start..start + HAND_FEATURES]
}
