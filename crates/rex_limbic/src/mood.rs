//! Mood dynamics and the shared, lock-guarded handle the Brain drives its
//! think-eligibility check through.
//!
//! Mood is a value type; the lock's critical section is kept as small as
//! possible and is never held across an effector or reasoner call —
//! snapshot, release, then act on the snapshot.

use rex_core::{Mood, Personality};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Per-tick and per-interaction transitions on [`Mood`].
pub trait MoodDynamics {
    fn on_interaction(&mut self);
    fn on_novel_stimulus(&mut self, novelty: f32);
    fn decay(&mut self, dt: f32);
    fn should_think(&self, personality: &Personality) -> bool;
}

impl MoodDynamics for Mood {
    fn on_interaction(&mut self) {
        self.boredom = (self.boredom - 0.3).max(0.0);
        self.happiness = (self.happiness + 0.1).min(1.0);
        self.excitement = (self.excitement + 0.2).min(1.0);
        self.normalize();
    }

    fn on_novel_stimulus(&mut self, novelty: f32) {
        self.curiosity_level = (self.curiosity_level + 0.3 * novelty).min(1.0);
        self.boredom = (self.boredom - 0.2 * novelty).max(0.0);
        self.excitement = (self.excitement + 0.1 * novelty).min(1.0);
        self.normalize();
    }

    fn decay(&mut self, dt: f32) {
        let ticks = dt * 10.0;
        let excitement_floor = 0.3;
        if self.excitement > excitement_floor {
            self.excitement = (self.excitement - 0.001 * ticks).max(excitement_floor);
        }
        if self.curiosity_level > excitement_floor {
            self.curiosity_level = (self.curiosity_level - 0.001 * ticks).max(excitement_floor);
        }
        self.boredom = (self.boredom + 0.0005 * ticks).min(1.0);
        self.tiredness = (self.tiredness + 0.0001 * ticks).min(1.0);
        self.normalize();
    }

    fn should_think(&self, personality: &Personality) -> bool {
        self.curiosity_level > (0.6 - 0.2 * personality.curiosity)
            || self.boredom > (0.8 - 0.2 * personality.curiosity)
    }
}

/// A dedicated-lock handle around [`Mood`]. Per the lock-ordering
/// discipline, whenever both mood and brain-state locks are needed, this
/// one is acquired first.
#[derive(Clone)]
pub struct SharedMood {
    inner: Arc<RwLock<Mood>>,
}

impl SharedMood {
    pub fn new(mood: Mood) -> Self {
        Self {
            inner: Arc::new(RwLock::new(mood)),
        }
    }

    /// Copy out the current mood, releasing the lock immediately.
    pub async fn snapshot(&self) -> Mood {
        self.inner.read().await.clone()
    }

    pub async fn on_interaction(&self) {
        let mut guard = self.inner.write().await;
        guard.on_interaction();
    }

    pub async fn on_novel_stimulus(&self, novelty: f32) {
        let mut guard = self.inner.write().await;
        guard.on_novel_stimulus(novelty);
    }

    pub async fn decay(&self, dt: f32) {
        let mut guard = self.inner.write().await;
        guard.decay(dt);
    }

    pub async fn should_think(&self, personality: &Personality) -> bool {
        let guard = self.inner.read().await;
        guard.should_think(personality)
    }

    /// Applied after a remote think cycle completes.
    pub async fn clamp_post_remote_think(&self) {
        let mut guard = self.inner.write().await;
        guard.curiosity_level = guard.curiosity_level.min(0.3);
        guard.boredom = 0.0;
        guard.normalize();
    }

    /// Applied after a local think cycle completes.
    pub async fn clamp_post_local_think(&self) {
        let mut guard = self.inner.write().await;
        guard.curiosity_level = (guard.curiosity_level - 0.2).max(0.3);
        guard.boredom = (guard.boredom - 0.3).max(0.0);
        guard.normalize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_interaction_reduces_boredom_and_raises_happiness() {
        let mut mood = Mood {
            happiness: 0.5,
            excitement: 0.3,
            tiredness: 0.0,
            boredom: 0.5,
            curiosity_level: 0.5,
        };
        mood.on_interaction();
        assert!((mood.boredom - 0.2).abs() < 1e-6);
        assert!((mood.happiness - 0.6).abs() < 1e-6);
        assert!((mood.excitement - 0.5).abs() < 1e-6);
    }

    #[test]
    fn decay_never_produces_out_of_range_values() {
        let mut mood = Mood {
            happiness: 1.0,
            excitement: 1.0,
            tiredness: 1.0,
            boredom: 1.0,
            curiosity_level: 1.0,
        };
        for _ in 0..1000 {
            mood.decay(0.1);
        }
        assert!(mood.tiredness <= 1.0);
        assert!(mood.boredom <= 1.0);
        assert!(mood.excitement >= 0.0 && mood.excitement <= 1.0);
    }

    #[test]
    fn should_think_reacts_to_curiosity_and_boredom_thresholds() {
        let personality = Personality::default();
        let bored = Mood {
            boredom: 0.9,
            ..Mood::default()
        };
        assert!(bored.should_think(&personality));

        let content = Mood {
            boredom: 0.1,
            curiosity_level: 0.1,
            ..Mood::default()
        };
        assert!(!content.should_think(&personality));
    }

    #[tokio::test]
    async fn shared_mood_snapshot_then_release_does_not_deadlock() {
        let shared = SharedMood::new(Mood::default());
        let snap = shared.snapshot().await;
        shared.on_interaction().await;
        assert_eq!(snap.happiness, 0.5);
        let after = shared.snapshot().await;
        assert!(after.happiness > snap.happiness);
    }
}
