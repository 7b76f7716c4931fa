use crate::types::Action;
use async_trait::async_trait;

/// Drives the physical body. Out of scope: the kinematics behind each
/// action token, only this seam is owned here.
#[async_trait]
pub trait ActionEffector: Send + Sync {
    async fn perform(&self, actions: &[Action]) -> anyhow::Result<()>;
}

/// Text-to-speech output.
#[async_trait]
pub trait SpeechEffector: Send + Sync {
    async fn speak(&self, text: &str) -> anyhow::Result<()>;
}

/// Reads the ultrasonic distance sensor.
#[async_trait]
pub trait DistanceSensor: Send + Sync {
    /// Distance in centimeters. Implementations that cannot sample should
    /// return the sentinel value of 100.0 rather than erroring.
    async fn read_distance_cm(&self) -> f32 {
        100.0
    }
}

/// Captures a single camera frame. Out of scope: the image type and the
/// model that interprets it; this seam only hands raw bytes upward.
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn capture(&self) -> Option<Vec<u8>> {
        None
    }
}

/// The optional vision/navigation capability set, invoked by name from
/// ToolDispatcher. Each method's absence of an override means "not wired
/// up" — callers must treat `None` as `CapabilityUnavailable`, never as a
/// bug to propagate.
#[async_trait]
pub trait VisionCapabilities: Send + Sync {
    async fn learn_face(&self, _name: &str) -> Option<anyhow::Result<String>> {
        None
    }
    async fn learn_room(&self, _name: &str) -> Option<anyhow::Result<String>> {
        None
    }
    async fn follow_person(&self) -> Option<anyhow::Result<String>> {
        None
    }
    async fn find_person(&self, _name: &str) -> Option<anyhow::Result<String>> {
        None
    }
    async fn go_to_room(&self, _name: &str) -> Option<anyhow::Result<String>> {
        None
    }
    async fn explore(&self) -> Option<anyhow::Result<String>> {
        None
    }
}
