//! Novelty scoring over bounded per-sensor-type history.
//!
//! Mirrors the predictive-coding idea of [`SurpriseDetector`]: an incoming
//! sample is scored against recent history *before* it joins that history.

use rex_core::{SensorType, SensorValue, VisionEvent};
use std::collections::{HashMap, VecDeque};

const DEFAULT_CAPACITY: usize = 100;
const VISION_WINDOW: usize = 10;
const STDDEV_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone)]
enum Sample {
    Numeric(f32),
    Categorical(String),
    Vision(String),
    Generic(String),
}

struct SensorHistory {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl SensorHistory {
    fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, sample: Sample) {
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }
}

/// Stateful, per-sensor-type bounded history novelty estimator.
pub struct NoveltyDetector {
    histories: HashMap<SensorType, SensorHistory>,
    capacity: usize,
}

impl Default for NoveltyDetector {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl NoveltyDetector {
    pub fn new(capacity: usize) -> Self {
        Self {
            histories: HashMap::new(),
            capacity,
        }
    }

    /// Score `value` against the sensor type's history, then append it.
    pub fn score(&mut self, sensor_type: SensorType, value: &SensorValue) -> f32 {
        let history = self
            .histories
            .entry(sensor_type)
            .or_insert_with(|| SensorHistory::new(self.capacity));

        if history.samples.is_empty() {
            let sample = Self::to_sample(value);
            history.push(sample);
            return 1.0;
        }

        let (novelty, sample) = match value {
            SensorValue::Distance(x) => {
                let (novelty, _) = Self::numeric_novelty(history, *x);
                (novelty, Sample::Numeric(*x))
            }
            SensorValue::Touch(style) => {
                let label = style
                    .map(|s| format!("{s:?}"))
                    .unwrap_or_else(|| "none".to_string());
                let novelty = Self::categorical_novelty(history, &label);
                (novelty, Sample::Categorical(label))
            }
            SensorValue::Vision(event) => {
                let label = Self::vision_label(event);
                let novelty = Self::vision_novelty(history, &label);
                (novelty, Sample::Vision(label))
            }
            SensorValue::Generic(v) => {
                let label = v.to_string();
                let novelty = Self::generic_novelty(history, &label);
                (novelty, Sample::Generic(label))
            }
        };

        history.push(sample);
        novelty
    }

    fn to_sample(value: &SensorValue) -> Sample {
        match value {
            SensorValue::Distance(x) => Sample::Numeric(*x),
            SensorValue::Touch(style) => Sample::Categorical(
                style
                    .map(|s| format!("{s:?}"))
                    .unwrap_or_else(|| "none".to_string()),
            ),
            SensorValue::Vision(event) => Sample::Vision(Self::vision_label(event)),
            SensorValue::Generic(v) => Sample::Generic(v.to_string()),
        }
    }

    fn vision_label(event: &VisionEvent) -> String {
        match event {
            VisionEvent::PersonEnteredView => "person_entered_view".to_string(),
            VisionEvent::PersonLeftView => "person_left_view".to_string(),
            VisionEvent::FaceRecognized { .. } => "face_recognized".to_string(),
            VisionEvent::UnknownFaceDetected => "unknown_face_detected".to_string(),
        }
    }

    fn numeric_novelty(history: &SensorHistory, x: f32) -> (f32, ()) {
        let values: Vec<f32> = history
            .samples
            .iter()
            .filter_map(|s| match s {
                Sample::Numeric(v) => Some(*v),
                _ => None,
            })
            .collect();
        if values.is_empty() {
            return (1.0, ());
        }
        let mean = values.iter().sum::<f32>() / values.len() as f32;
        let variance =
            values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / values.len() as f32;
        let stddev = variance.sqrt();
        let novelty = if stddev < STDDEV_EPSILON {
            ((x - mean).abs() / 3.0).min(1.0)
        } else {
            ((x - mean).abs() / (3.0 * stddev)).min(1.0)
        };
        (novelty, ())
    }

    fn categorical_novelty(history: &SensorHistory, label: &str) -> f32 {
        let total = history.samples.len();
        let matches = history
            .samples
            .iter()
            .filter(|s| matches!(s, Sample::Categorical(l) if l == label))
            .count();
        1.0 - (matches as f32 / total as f32)
    }

    fn vision_novelty(history: &SensorHistory, label: &str) -> f32 {
        let recent: Vec<&Sample> = history
            .samples
            .iter()
            .rev()
            .filter(|s| matches!(s, Sample::Vision(_)))
            .take(VISION_WINDOW)
            .collect();
        if recent.is_empty() {
            return 1.0;
        }
        let matches = recent
            .iter()
            .filter(|s| matches!(s, Sample::Vision(l) if l == label))
            .count();
        let denom = VISION_WINDOW.min(recent.len()) as f32;
        (1.0 - (matches as f32 / denom)).max(0.2)
    }

    fn generic_novelty(history: &SensorHistory, label: &str) -> f32 {
        let exact_match = history
            .samples
            .iter()
            .any(|s| matches!(s, Sample::Generic(l) if l == label));
        if exact_match {
            0.2
        } else {
            0.6
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_observation_of_any_sensor_is_maximally_novel() {
        let mut det = NoveltyDetector::default();
        let score = det.score(SensorType::Ultrasonic, &SensorValue::Distance(42.0));
        assert_eq!(score, 1.0);
    }

    #[test]
    fn repeated_identical_numeric_samples_settle_to_zero_novelty() {
        let mut det = NoveltyDetector::default();
        for _ in 0..10 {
            det.score(SensorType::Ultrasonic, &SensorValue::Distance(50.0));
        }
        let score = det.score(SensorType::Ultrasonic, &SensorValue::Distance(50.0));
        assert_eq!(score, 0.0);
    }

    #[test]
    fn categorical_novelty_decreases_with_repetition() {
        let mut det = NoveltyDetector::default();
        det.score(
            SensorType::Touch,
            &SensorValue::Touch(Some(rex_core::TouchStyle::Press)),
        );
        let second = det.score(
            SensorType::Touch,
            &SensorValue::Touch(Some(rex_core::TouchStyle::Press)),
        );
        assert!(second < 1.0);
    }

    #[test]
    fn vision_novelty_has_a_floor_of_point_two() {
        let mut det = NoveltyDetector::default();
        for _ in 0..12 {
            det.score(
                SensorType::Vision,
                &SensorValue::Vision(VisionEvent::PersonEnteredView),
            );
        }
        let score = det.score(
            SensorType::Vision,
            &SensorValue::Vision(VisionEvent::PersonEnteredView),
        );
        assert!(score >= 0.2);
    }

    #[test]
    fn histories_are_independent_per_sensor_type() {
        let mut det = NoveltyDetector::default();
        det.score(SensorType::Ultrasonic, &SensorValue::Distance(10.0));
        let score = det.score(
            SensorType::Touch,
            &SensorValue::Touch(Some(rex_core::TouchStyle::FrontToRear)),
        );
        assert_eq!(score, 1.0);
    }
}
