pub mod mood;
pub mod novelty;
pub mod personality;

pub use mood::{MoodDynamics, SharedMood};
pub use novelty::NoveltyDetector;
pub use personality::{behavior_modifiers, BehaviorModifiers, PersonalityModel};
