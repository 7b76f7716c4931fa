use serde::{Deserialize, Deserializer, Serialize};

/// Guards a persisted or deserialized float against NaN/Infinity, clamping
/// to `fallback` when the value cannot be trusted.
pub fn sanitize_f32(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

pub(crate) fn deserialize_safe_f32<'de, D>(deserializer: D) -> Result<f32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f32::deserialize(deserializer)?;
    Ok(sanitize_f32(raw, 0.0))
}

/// `clamp(x) = max(0, min(1, x))`. Idempotent by construction.
pub fn clamp01(value: f32) -> f32 {
    sanitize_f32(value, 0.0).clamp(0.0, 1.0)
}

// ============================================================================
// Memory
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryCategory {
    Person,
    Fact,
    Preference,
    Experience,
    Location,
    Interaction,
}

impl MemoryCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::Fact => "fact",
            Self::Preference => "preference",
            Self::Experience => "experience",
            Self::Location => "location",
            Self::Interaction => "interaction",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "person" => Some(Self::Person),
            "fact" => Some(Self::Fact),
            "preference" => Some(Self::Preference),
            "experience" => Some(Self::Experience),
            "location" => Some(Self::Location),
            "interaction" => Some(Self::Interaction),
            _ => None,
        }
    }
}

/// A single remembered episode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: i64,
    pub category: MemoryCategory,
    pub subject: String,
    pub content: String,
    pub importance: f32,
    pub created_at: i64,
    pub last_accessed: i64,
    pub access_count: i64,
}

// ============================================================================
// Action vocabulary
// ============================================================================

/// The closed action vocabulary understood by the effector. `learn_trick`
/// rejects any token outside this set; the dispatcher filters/logs the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "forward")]
    Forward,
    #[serde(rename = "backward")]
    Backward,
    #[serde(rename = "turn left")]
    TurnLeft,
    #[serde(rename = "turn right")]
    TurnRight,
    #[serde(rename = "stop")]
    Stop,
    #[serde(rename = "lie")]
    Lie,
    #[serde(rename = "stand")]
    Stand,
    #[serde(rename = "sit")]
    Sit,
    #[serde(rename = "bark")]
    Bark,
    #[serde(rename = "bark harder")]
    BarkHarder,
    #[serde(rename = "pant")]
    Pant,
    #[serde(rename = "wag tail")]
    WagTail,
    #[serde(rename = "shake head")]
    ShakeHead,
    #[serde(rename = "stretch")]
    Stretch,
    #[serde(rename = "doze off")]
    DozeOff,
    #[serde(rename = "push up")]
    PushUp,
    #[serde(rename = "howling")]
    Howling,
    #[serde(rename = "twist body")]
    TwistBody,
    #[serde(rename = "scratch")]
    Scratch,
    #[serde(rename = "handshake")]
    Handshake,
    #[serde(rename = "high five")]
    HighFive,
    #[serde(rename = "lick hand")]
    LickHand,
    #[serde(rename = "waiting")]
    Waiting,
    #[serde(rename = "feet shake")]
    FeetShake,
    #[serde(rename = "relax neck")]
    RelaxNeck,
    #[serde(rename = "nod")]
    Nod,
    #[serde(rename = "think")]
    Think,
    #[serde(rename = "recall")]
    Recall,
    #[serde(rename = "fluster")]
    Fluster,
    #[serde(rename = "surprise")]
    Surprise,
}

impl Action {
    pub const ALL: &'static [Action] = &[
        Action::Forward,
        Action::Backward,
        Action::TurnLeft,
        Action::TurnRight,
        Action::Stop,
        Action::Lie,
        Action::Stand,
        Action::Sit,
        Action::Bark,
        Action::BarkHarder,
        Action::Pant,
        Action::WagTail,
        Action::ShakeHead,
        Action::Stretch,
        Action::DozeOff,
        Action::PushUp,
        Action::Howling,
        Action::TwistBody,
        Action::Scratch,
        Action::Handshake,
        Action::HighFive,
        Action::LickHand,
        Action::Waiting,
        Action::FeetShake,
        Action::RelaxNeck,
        Action::Nod,
        Action::Think,
        Action::Recall,
        Action::Fluster,
        Action::Surprise,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Backward => "backward",
            Self::TurnLeft => "turn left",
            Self::TurnRight => "turn right",
            Self::Stop => "stop",
            Self::Lie => "lie",
            Self::Stand => "stand",
            Self::Sit => "sit",
            Self::Bark => "bark",
            Self::BarkHarder => "bark harder",
            Self::Pant => "pant",
            Self::WagTail => "wag tail",
            Self::ShakeHead => "shake head",
            Self::Stretch => "stretch",
            Self::DozeOff => "doze off",
            Self::PushUp => "push up",
            Self::Howling => "howling",
            Self::TwistBody => "twist body",
            Self::Scratch => "scratch",
            Self::Handshake => "handshake",
            Self::HighFive => "high five",
            Self::LickHand => "lick hand",
            Self::Waiting => "waiting",
            Self::FeetShake => "feet shake",
            Self::RelaxNeck => "relax neck",
            Self::Nod => "nod",
            Self::Think => "think",
            Self::Recall => "recall",
            Self::Fluster => "fluster",
            Self::Surprise => "surprise",
        }
    }

    /// Parse a (case-folded) free-form token against the closed vocabulary.
    pub fn parse_str(s: &str) -> Option<Self> {
        let needle = s.trim().to_lowercase();
        Self::ALL.iter().copied().find(|a| a.as_str() == needle)
    }
}

// ============================================================================
// Trick
// ============================================================================

/// A learned trick: a named, bounded sequence of vocabulary actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trick {
    pub name: String,
    pub trigger_phrase: String,
    pub actions: Vec<Action>,
    pub times_performed: i64,
    pub created_at: i64,
}

pub const MAX_TRICK_ACTIONS: usize = 10;

// ============================================================================
// Goal
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Active,
    Completed,
    Abandoned,
}

impl GoalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            "abandoned" => Some(Self::Abandoned),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: i64,
    pub description: String,
    pub priority: u8,
    pub status: GoalStatus,
    /// Opaque structured progress payload, shape owned by the caller.
    pub progress: serde_json::Value,
    pub created_at: i64,
    pub completed_at: Option<i64>,
}

pub fn clamp_priority(priority: u8) -> u8 {
    priority.clamp(1, 5)
}

// ============================================================================
// Face / Room / Conversation
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Face {
    pub id: i64,
    pub name: String,
    pub encoding: Vec<f32>,
    pub image_hash: String,
    pub times_seen: i64,
    pub created_at: i64,
    pub last_seen: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub name: String,
    pub description: String,
    pub landmarks: Vec<String>,
    pub image_hash: String,
    pub times_visited: i64,
    pub created_at: i64,
    pub last_visited: i64,
}

/// Opaque summary record, retained by recency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub summary: String,
    pub created_at: i64,
}

// ============================================================================
// Personality / Mood
// ============================================================================

/// Process-lifetime, persisted trait vector, each in `[0,1]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Personality {
    #[serde(deserialize_with = "deserialize_safe_f32", default = "default_playfulness")]
    pub playfulness: f32,
    #[serde(deserialize_with = "deserialize_safe_f32", default = "default_curiosity")]
    pub curiosity: f32,
    #[serde(deserialize_with = "deserialize_safe_f32", default = "default_affection")]
    pub affection: f32,
    #[serde(deserialize_with = "deserialize_safe_f32", default = "default_energy")]
    pub energy: f32,
    #[serde(deserialize_with = "deserialize_safe_f32", default = "default_talkativeness")]
    pub talkativeness: f32,
}

fn default_playfulness() -> f32 {
    0.7
}
fn default_curiosity() -> f32 {
    0.8
}
fn default_affection() -> f32 {
    0.6
}
fn default_energy() -> f32 {
    0.5
}
fn default_talkativeness() -> f32 {
    0.6
}

impl Default for Personality {
    fn default() -> Self {
        Self {
            playfulness: default_playfulness(),
            curiosity: default_curiosity(),
            affection: default_affection(),
            energy: default_energy(),
            talkativeness: default_talkativeness(),
        }
    }
}

impl Personality {
    /// Clamp every trait into `[0.0, 1.0]`, replacing non-finite values with
    /// their default.
    pub fn normalize(&mut self) {
        self.playfulness = clamp01(self.playfulness);
        self.curiosity = clamp01(self.curiosity);
        self.affection = clamp01(self.affection);
        self.energy = clamp01(self.energy);
        self.talkativeness = clamp01(self.talkativeness);
    }

    pub fn get_trait(&self, name: &str) -> Option<f32> {
        match name {
            "playfulness" => Some(self.playfulness),
            "curiosity" => Some(self.curiosity),
            "affection" => Some(self.affection),
            "energy" => Some(self.energy),
            "talkativeness" => Some(self.talkativeness),
            _ => None,
        }
    }

    pub fn set_trait(&mut self, name: &str, value: f32) -> bool {
        match name {
            "playfulness" => self.playfulness = clamp01(value),
            "curiosity" => self.curiosity = clamp01(value),
            "affection" => self.affection = clamp01(value),
            "energy" => self.energy = clamp01(value),
            "talkativeness" => self.talkativeness = clamp01(value),
            _ => return false,
        }
        true
    }
}

/// Transient, in-memory five-field emotional state. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mood {
    #[serde(deserialize_with = "deserialize_safe_f32", default = "half")]
    pub happiness: f32,
    #[serde(deserialize_with = "deserialize_safe_f32", default)]
    pub excitement: f32,
    #[serde(deserialize_with = "deserialize_safe_f32", default)]
    pub tiredness: f32,
    #[serde(deserialize_with = "deserialize_safe_f32", default)]
    pub boredom: f32,
    #[serde(deserialize_with = "deserialize_safe_f32", default = "half")]
    pub curiosity_level: f32,
}

fn half() -> f32 {
    0.5
}

impl Default for Mood {
    fn default() -> Self {
        Self {
            happiness: 0.5,
            excitement: 0.0,
            tiredness: 0.0,
            boredom: 0.0,
            curiosity_level: 0.5,
        }
    }
}

impl Mood {
    pub fn normalize(&mut self) {
        self.happiness = clamp01(self.happiness);
        self.excitement = clamp01(self.excitement);
        self.tiredness = clamp01(self.tiredness);
        self.boredom = clamp01(self.boredom);
        self.curiosity_level = clamp01(self.curiosity_level);
    }
}

// ============================================================================
// Observations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorType {
    Ultrasonic,
    Touch,
    Imu,
    Vision,
    Audio,
}

/// Touch style enum; anything else is treated as neutral (`None`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TouchStyle {
    FrontToRear,
    RearToFront,
    Press,
}

/// Vision event, discriminated by `event`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum VisionEvent {
    PersonEnteredView,
    PersonLeftView,
    FaceRecognized { name: String },
    UnknownFaceDetected,
}

/// The typed payload of a single observation, per sensor type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SensorValue {
    Distance(f32),
    Touch(Option<TouchStyle>),
    Vision(VisionEvent),
    Generic(serde_json::Value),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub sensor_type: SensorType,
    pub value: SensorValue,
    pub timestamp: i64,
    pub novelty: f32,
}

// ============================================================================
// Decision
// ============================================================================

/// A single parsed tool invocation, in either JSON or legacy line format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// The single output type of both reasoning backends.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Decision {
    #[serde(default)]
    pub speech: String,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub tools: Vec<ToolCall>,
}
