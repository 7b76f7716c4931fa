//! Persisted personality traits, loaded from and synchronously written back
//! to a TOML side-file.

use rex_core::{Personality, ValidationError};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Snapshot of a [`Personality`] as the derived modifiers a UI might surface.
/// A pure function of the snapshot — never mutates state.
#[derive(Debug, Clone, Serialize)]
pub struct BehaviorModifiers {
    pub is_playful: bool,
    pub is_curious: bool,
    pub is_affectionate: bool,
    pub is_energetic: bool,
    pub is_talkative: bool,
}

pub fn behavior_modifiers(personality: &Personality) -> BehaviorModifiers {
    BehaviorModifiers {
        is_playful: personality.playfulness > 0.6,
        is_curious: personality.curiosity > 0.6,
        is_affectionate: personality.affection > 0.6,
        is_energetic: personality.energy > 0.6,
        is_talkative: personality.talkativeness > 0.6,
    }
}

/// Owns the single persisted [`Personality`] record for the process
/// lifetime; reads are snapshots, writes persist synchronously to disk.
pub struct PersonalityModel {
    path: PathBuf,
    state: Arc<RwLock<Personality>>,
}

impl PersonalityModel {
    /// Load from `path`, falling back to the default personality if the
    /// file is missing or unreadable.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let personality = std::fs::read_to_string(&path)
            .ok()
            .and_then(|content| toml::from_str(&content).ok())
            .unwrap_or_default();
        Self {
            path,
            state: Arc::new(RwLock::new(personality)),
        }
    }

    pub fn get(&self) -> Personality {
        self.state.read().expect("personality lock poisoned").clone()
    }

    /// Absolute update of a named trait; clamps and persists synchronously.
    pub fn update(&self, trait_name: &str, value: f32) -> Result<(), ValidationError> {
        let mut guard = self.state.write().expect("personality lock poisoned");
        if !guard.set_trait(trait_name, value) {
            return Err(ValidationError::UnknownCategory(trait_name.to_string()));
        }
        drop(guard);
        self.persist()
    }

    /// Relative update of a named trait; clamps and persists synchronously.
    pub fn adjust(&self, trait_name: &str, delta: f32) -> Result<(), ValidationError> {
        let mut guard = self.state.write().expect("personality lock poisoned");
        let current = guard
            .get_trait(trait_name)
            .ok_or_else(|| ValidationError::UnknownCategory(trait_name.to_string()))?;
        guard.set_trait(trait_name, current + delta);
        drop(guard);
        self.persist()
    }

    pub fn behavior_modifiers(&self) -> BehaviorModifiers {
        behavior_modifiers(&self.get())
    }

    fn persist(&self) -> Result<(), ValidationError> {
        let snapshot = self.get();
        let serialized = toml::to_string_pretty(&snapshot).unwrap_or_default();
        if let Err(e) = std::fs::write(&self.path, serialized) {
            tracing::warn!("failed to persist personality to {:?}: {e}", self.path);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_spec_default() {
        let dir = tempdir().unwrap();
        let model = PersonalityModel::load(dir.path().join("personality.toml"));
        let p = model.get();
        assert_eq!(p.playfulness, 0.7);
        assert_eq!(p.curiosity, 0.8);
        assert_eq!(p.affection, 0.6);
        assert_eq!(p.energy, 0.5);
        assert_eq!(p.talkativeness, 0.6);
    }

    #[test]
    fn update_clamps_and_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("personality.toml");
        let model = PersonalityModel::load(&path);
        model.update("playfulness", 1.5).unwrap();
        assert_eq!(model.get().playfulness, 1.0);

        let reloaded = PersonalityModel::load(&path);
        assert_eq!(reloaded.get().playfulness, 1.0);
    }

    #[test]
    fn update_unknown_trait_is_rejected() {
        let dir = tempdir().unwrap();
        let model = PersonalityModel::load(dir.path().join("personality.toml"));
        assert!(model.update("nonexistent", 0.5).is_err());
    }

    #[test]
    fn adjust_is_relative() {
        let dir = tempdir().unwrap();
        let model = PersonalityModel::load(dir.path().join("personality.toml"));
        let before = model.get().energy;
        model.adjust("energy", 0.1).unwrap();
        assert!((model.get().energy - (before + 0.1)).abs() < 1e-6);
    }
}
