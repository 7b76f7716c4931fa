//! The central scheduler and state machine: ticks the observation queue,
//! decides when a think cycle is warranted, and drives one of the two
//! reasoning backends behind a single `think()` entry point.
//!
//! Lock ordering discipline: whenever both the mood lock and the brain
//! state lock are needed in the same operation, mood is snapshotted and
//! released *before* the brain lock is taken.

use rex_core::{Decision, Observation, SensorType, SensorValue, TouchStyle, VisionEvent};
use rex_core::{ActionEffector, SpeechEffector};
use rex_expression::{BehaviorTree, ObservationContext};
use rex_limbic::{MoodDynamics, NoveltyDetector, PersonalityModel, SharedMood};
use rex_core::RateLimitConfig;
use rex_memory::MemoryStore;
use rex_reasoning::{ExternalReasoner, RateLimiter, ToolDispatcher};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Notify, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrainStateKind {
    Idle,
    Curious,
    Thinking,
    Acting,
    Interacting,
}

struct BrainState {
    kind: BrainStateKind,
    person_detected: bool,
    person_name: Option<String>,
    person_is_new: bool,
    person_left_time: Option<Instant>,
    obstacle_distance: Option<f32>,
    touch_detected: bool,
    touch_style: Option<TouchStyle>,
    idle_since: Instant,
}

impl Default for BrainState {
    fn default() -> Self {
        Self {
            kind: BrainStateKind::Idle,
            person_detected: false,
            person_name: None,
            person_is_new: false,
            person_left_time: None,
            obstacle_distance: None,
            touch_detected: false,
            touch_style: None,
            idle_since: Instant::now(),
        }
    }
}

/// Fixed-capacity, drop-oldest observation queue. `push` never blocks.
struct ObservationQueue {
    items: Mutex<VecDeque<Observation>>,
    capacity: usize,
}

impl ObservationQueue {
    fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    async fn push(&self, obs: Observation) {
        let mut items = self.items.lock().await;
        if items.len() >= self.capacity {
            items.pop_front();
        }
        items.push_back(obs);
    }

    async fn drain(&self) -> Vec<Observation> {
        let mut items = self.items.lock().await;
        items.drain(..).collect()
    }
}

const PERSON_RETURN_WINDOW: Duration = Duration::from_secs(300);

/// The two think-cycle backends, selected once at construction by
/// `local_only`. The scheduler is otherwise identical across both.
enum Backend {
    Remote(Arc<dyn ExternalReasoner>),
    Local,
}

pub struct AutonomousBrain {
    mood: SharedMood,
    personality: Arc<PersonalityModel>,
    memory: Arc<MemoryStore>,
    dispatcher: Arc<ToolDispatcher>,
    behavior_tree: Mutex<BehaviorTree>,
    novelty: Mutex<NoveltyDetector>,
    state: RwLock<BrainState>,
    queue: ObservationQueue,
    rate_limiter: Mutex<RateLimiter>,
    backend: Backend,
    actions: Option<Arc<dyn ActionEffector>>,
    speech: Option<Arc<dyn SpeechEffector>>,
    running: AtomicBool,
    /// Mirrors `state.kind == Interacting`, readable synchronously so
    /// `MemoryMaintainer`'s busy check doesn't need to await the state lock.
    interacting: AtomicBool,
    stop_signal: Notify,
    tick_interval: Duration,
}

impl AutonomousBrain {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mood: SharedMood,
        personality: Arc<PersonalityModel>,
        memory: Arc<MemoryStore>,
        dispatcher: Arc<ToolDispatcher>,
        reasoner: Option<Arc<dyn ExternalReasoner>>,
        local_only: bool,
        rate_limit: &RateLimitConfig,
        observation_queue_capacity: usize,
        tick_interval: Duration,
    ) -> Self {
        let (backend, rate_limiter) = match (local_only, reasoner) {
            (false, Some(reasoner)) => (
                Backend::Remote(reasoner),
                RateLimiter::new(rate_limit.max_calls_per_minute as usize, 60, rate_limit.min_interval_secs),
            ),
            _ => (Backend::Local, RateLimiter::for_local()),
        };
        Self {
            mood,
            personality,
            memory,
            dispatcher,
            behavior_tree: Mutex::new(BehaviorTree::new()),
            novelty: Mutex::new(NoveltyDetector::default()),
            state: RwLock::new(BrainState::default()),
            queue: ObservationQueue::new(observation_queue_capacity),
            rate_limiter: Mutex::new(rate_limiter),
            backend,
            actions: None,
            speech: None,
            running: AtomicBool::new(true),
            interacting: AtomicBool::new(false),
            stop_signal: Notify::new(),
            tick_interval,
        }
    }

    /// Synchronous busy check for callers (e.g. `MemoryMaintainer`) that
    /// must not await a lock to decide whether to skip a cycle.
    pub fn is_interacting(&self) -> bool {
        self.interacting.load(Ordering::SeqCst)
    }

    pub fn with_action_effector(mut self, effector: Arc<dyn ActionEffector>) -> Self {
        self.actions = Some(effector);
        self
    }

    pub fn with_speech_effector(mut self, effector: Arc<dyn SpeechEffector>) -> Self {
        self.speech = Some(effector);
        self
    }

    /// Enqueue a sensor reading, scoring its novelty before it joins the
    /// per-sensor-type history. Never blocks.
    pub async fn observe(&self, sensor_type: SensorType, value: SensorValue) {
        let novelty = self.novelty.lock().await.score(sensor_type, &value);
        let obs = Observation {
            sensor_type,
            value,
            timestamp: chrono::Utc::now().timestamp(),
            novelty,
        };
        self.queue.push(obs).await;
    }

    pub async fn on_interaction_start(&self) {
        self.mood.on_interaction().await;
        self.interacting.store(true, Ordering::SeqCst);
        let mut state = self.state.write().await;
        state.kind = BrainStateKind::Interacting;
    }

    pub async fn on_interaction_end(&self) {
        self.interacting.store(false, Ordering::SeqCst);
        let mut state = self.state.write().await;
        state.kind = BrainStateKind::Idle;
        state.idle_since = Instant::now();
    }

    /// Runs the 10 Hz tick loop until `stop()` is called. Every tick is
    /// wrapped so a single bad observation or reasoner failure can never
    /// take the loop down.
    pub async fn run(self: Arc<Self>) {
        while self.running.load(Ordering::SeqCst) {
            tokio::select! {
                _ = tokio::time::sleep(self.tick_interval) => {}
                _ = self.stop_signal.notified() => break,
            }
            if let Err(e) = self.tick().await {
                tracing::warn!("brain tick failed: {e}");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
        tracing::info!("brain loop exited");
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.stop_signal.notify_waiters();
    }

    async fn tick(&self) -> anyhow::Result<()> {
        let observations = self.queue.drain().await;
        for obs in &observations {
            if obs.novelty > 0.5 {
                self.mood.on_novel_stimulus(obs.novelty).await;
            }
            self.apply_observation(obs).await;
        }
        self.mood.decay(0.1).await;

        let interacting = self.state.read().await.kind == BrainStateKind::Interacting;
        if interacting {
            return Ok(());
        }

        let personality = self.personality.get();
        let should_think = self.mood.should_think(&personality).await;
        let may_call = self.rate_limiter.lock().await.may_call();

        if should_think && may_call {
            self.run_think_cycle(&personality).await?;
        }
        Ok(())
    }

    async fn apply_observation(&self, obs: &Observation) {
        let mut state = self.state.write().await;
        match &obs.value {
            SensorValue::Vision(event) => match event {
                VisionEvent::PersonEnteredView => {
                    state.person_detected = true;
                    if state.kind == BrainStateKind::Idle {
                        state.kind = BrainStateKind::Curious;
                    }
                }
                VisionEvent::PersonLeftView => {
                    state.person_detected = false;
                    state.person_left_time = Some(Instant::now());
                }
                VisionEvent::FaceRecognized { name } => {
                    let known = self
                        .memory
                        .get_faces_by_name(name)
                        .await
                        .map(|faces| !faces.is_empty())
                        .unwrap_or(false);
                    state.person_detected = true;
                    state.person_name = Some(name.clone());
                    state.person_is_new = !known;
                    if state.kind == BrainStateKind::Idle {
                        state.kind = BrainStateKind::Curious;
                    }
                }
                VisionEvent::UnknownFaceDetected => {
                    state.person_detected = true;
                    state.person_name = None;
                    state.person_is_new = true;
                    if state.kind == BrainStateKind::Idle {
                        state.kind = BrainStateKind::Curious;
                    }
                }
            },
            SensorValue::Distance(cm) => {
                state.obstacle_distance = Some(*cm);
            }
            SensorValue::Touch(style) => {
                state.touch_detected = true;
                state.touch_style = *style;
            }
            SensorValue::Generic(_) => {}
        }
    }

    async fn run_think_cycle(&self, personality: &rex_core::Personality) -> anyhow::Result<()> {
        self.rate_limiter.lock().await.record();
        {
            let mut state = self.state.write().await;
            state.kind = BrainStateKind::Thinking;
        }

        let mood_snapshot = self.mood.snapshot().await;
        let obs_context = self.build_observation_context().await;
        let memory_context = match &obs_context.person_name {
            Some(name) => {
                let mut memories = self.memory.by_subject(name).await.unwrap_or_default();
                memories.sort_by(|a, b| b.importance.partial_cmp(&a.importance).unwrap());
                memories.truncate(3);
                memories
            }
            None => Vec::new(),
        };

        let decision = match &self.backend {
            Backend::Remote(reasoner) => {
                self.remote_think(reasoner.as_ref(), &mood_snapshot, personality, &obs_context, &memory_context)
                    .await
            }
            Backend::Local => {
                let mut tree = self.behavior_tree.lock().await;
                Some(tree.decide(&mood_snapshot, personality, &obs_context, &memory_context))
            }
        };

        {
            let mut state = self.state.write().await;
            state.kind = BrainStateKind::Acting;
        }

        if let Some(decision) = decision {
            self.execute_decision(decision).await;
        }

        match &self.backend {
            Backend::Remote(_) => self.mood.clamp_post_remote_think().await,
            Backend::Local => self.mood.clamp_post_local_think().await,
        }

        let mut state = self.state.write().await;
        state.kind = BrainStateKind::Idle;
        state.idle_since = Instant::now();
        state.touch_detected = false;
        state.touch_style = None;
        Ok(())
    }

    async fn build_observation_context(&self) -> ObservationContext {
        let state = self.state.read().await;
        let person_is_returning = state.person_name.is_some()
            && !state.person_is_new
            && state
                .person_left_time
                .map(|t| t.elapsed() < PERSON_RETURN_WINDOW)
                .unwrap_or(false);
        let active_goal = self
            .memory
            .get_active_goals()
            .await
            .unwrap_or_default()
            .into_iter()
            .next();
        ObservationContext {
            person_detected: state.person_detected,
            person_name: state.person_name.clone(),
            person_is_new: state.person_is_new,
            person_is_returning,
            obstacle_distance: state.obstacle_distance,
            touch_detected: state.touch_detected,
            touch_style: state.touch_style,
            active_goal,
        }
    }

    /// Compose a context prompt from memory/goals/personality/mood/faces/
    /// rooms and a short observation summary, call the injected reasoner,
    /// then dispatch tools before returning the parsed decision. Returns
    /// `None` on reasoner failure — the cycle ends cleanly in IDLE with no
    /// partial action sequence emitted.
    async fn remote_think(
        &self,
        reasoner: &dyn ExternalReasoner,
        mood: &rex_core::Mood,
        personality: &rex_core::Personality,
        obs: &ObservationContext,
        memory_context: &[rex_core::Memory],
    ) -> Option<Decision> {
        let system = "You are the cognitive core of a social robot dog. Reply with a single JSON \
             object: {\"speech\": string, \"actions\": [string], \"tools\": [{\"name\": string, \
             \"params\": object}]}. Actions must be drawn from the robot's closed vocabulary.";
        let goals_context = self
            .memory
            .get_active_goals()
            .await
            .unwrap_or_default()
            .iter()
            .map(|g| format!("- ({}) {}", g.priority, g.description))
            .collect::<Vec<_>>()
            .join("\n");
        let memory_lines = memory_context
            .iter()
            .map(|m| format!("- {}", m.content))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!(
            "Personality: playfulness={:.2} curiosity={:.2} affection={:.2} energy={:.2} talkativeness={:.2}\n\
             Mood: happiness={:.2} excitement={:.2} tiredness={:.2} boredom={:.2} curiosity_level={:.2}\n\
             Observation: person_detected={} person_name={:?} obstacle_distance={:?} touch_detected={}\n\
             Active goals:\n{goals_context}\n\
             Known about this person:\n{memory_lines}",
            personality.playfulness,
            personality.curiosity,
            personality.affection,
            personality.energy,
            personality.talkativeness,
            mood.happiness,
            mood.excitement,
            mood.tiredness,
            mood.boredom,
            mood.curiosity_level,
            obs.person_detected,
            obs.person_name,
            obs.obstacle_distance,
            obs.touch_detected,
        );

        match reasoner.think(system, &prompt).await {
            Ok(response) => {
                let (speech, actions, _results) = self.dispatcher.parse_and_execute(&response).await;
                Some(Decision {
                    speech,
                    actions,
                    tools: Vec::new(),
                })
            }
            Err(e) => {
                tracing::warn!("reasoner call failed: {e}");
                None
            }
        }
    }

    /// Tools execute before actions execute before speech — a tool may
    /// mutate memory that the immediately following action or speech's
    /// context depends on.
    async fn execute_decision(&self, decision: Decision) {
        for tool in &decision.tools {
            let result = self.dispatcher.execute_tool(&tool.name, &tool.params).await;
            if !result.success {
                tracing::debug!("tool '{}' failed: {}", tool.name, result.message);
            }
        }
        if !decision.actions.is_empty() {
            if let Some(effector) = &self.actions {
                if let Err(e) = effector.perform(&decision.actions).await {
                    tracing::warn!("action effector failed: {e}");
                }
            }
        }
        if !decision.speech.is_empty() {
            if let Some(effector) = &self.speech {
                if let Err(e) = effector.speak(&decision.speech).await {
                    tracing::warn!("speech effector failed: {e}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rex_core::TouchStyle;

    fn observation(novelty: f32) -> Observation {
        Observation {
            sensor_type: SensorType::Touch,
            value: SensorValue::Touch(Some(TouchStyle::Press)),
            timestamp: 0,
            novelty,
        }
    }

    #[tokio::test]
    async fn queue_drops_oldest_once_full() {
        let queue = ObservationQueue::new(2);
        queue.push(observation(0.1)).await;
        queue.push(observation(0.2)).await;
        queue.push(observation(0.3)).await;

        let drained = queue.drain().await;
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].novelty, 0.2);
        assert_eq!(drained[1].novelty, 0.3);
    }

    #[tokio::test]
    async fn queue_drain_empties_it() {
        let queue = ObservationQueue::new(4);
        queue.push(observation(0.5)).await;
        assert_eq!(queue.drain().await.len(), 1);
        assert_eq!(queue.drain().await.len(), 0);
    }

    #[test]
    fn default_brain_state_is_idle_and_unseen() {
        let state = BrainState::default();
        assert_eq!(state.kind, BrainStateKind::Idle);
        assert!(!state.person_detected);
        assert!(state.person_name.is_none());
        assert!(state.person_left_time.is_none());
    }
}
