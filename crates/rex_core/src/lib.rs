pub mod capability;
pub mod config;
pub mod error;
pub mod types;

pub use capability::{ActionEffector, DistanceSensor, FrameSource, SpeechEffector, VisionCapabilities};
pub use config::{
    BrainConfig, CoreConfig, MaintenanceConfig, MemoryConfig, RateLimitConfig, ReasonerConfig,
};
pub use error::{ReasonerError, StorageError, ValidationError};
pub use types::{
    clamp_priority, clamp01, sanitize_f32, Action, Conversation, Decision, Face, Goal, GoalStatus,
    Memory, MemoryCategory, Mood, Observation, Personality, Room, SensorType, SensorValue,
    ToolCall, TouchStyle, Trick, VisionEvent, MAX_TRICK_ACTIONS,
};
