//! Parses a reasoner's free-form response and dispatches the requested
//! tool calls against memory, personality, and vision/navigation
//! capabilities.
//!
//! Two wire formats are accepted: a single JSON object (`speech`,
//! `actions`, `tools`), or a legacy line-oriented format (`ACTIONS:` /
//! `TOOL:` lines). `params` on a JSON tool entry may itself be a
//! JSON-encoded string, which is decoded transparently.

use regex::Regex;
use rex_core::{Action, ActionEffector, VisionCapabilities};
use rex_limbic::PersonalityModel;
use rex_memory::MemoryStore;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ToolResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }

    fn ok_with(message: impl Into<String>, data: Value) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }

    fn unavailable() -> Self {
        Self::fail("Vision not available")
    }
}

/// One parsed `(name, params)` tool invocation, prior to dispatch.
#[derive(Debug, Clone)]
pub struct ParsedTool {
    pub name: String,
    pub params: Value,
}

/// `(speech, action_tokens, parsed_tools)`.
pub fn parse_response(text: &str) -> (String, Vec<Action>, Vec<ParsedTool>) {
    let trimmed = text.trim();
    let owned;
    let stripped: &str = if trimmed.starts_with("```") {
        let mut lines: Vec<&str> = trimmed.lines().collect();
        if lines.first().map(|l| l.starts_with("```")).unwrap_or(false) {
            lines.remove(0);
        }
        if lines.last().map(|l| l.trim() == "```").unwrap_or(false) {
            lines.pop();
        }
        owned = lines.join("\n");
        owned.trim()
    } else {
        trimmed
    };

    if stripped.starts_with('{') {
        if let Ok(data) = serde_json::from_str::<Value>(stripped) {
            let speech = data
                .get("speech")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            let actions = data
                .get("actions")
                .and_then(Value::as_array)
                .map(|arr| {
                    arr.iter()
                        .filter_map(Value::as_str)
                        .filter_map(Action::parse_str)
                        .collect()
                })
                .unwrap_or_default();
            let tools = data
                .get("tools")
                .and_then(Value::as_array)
                .map(|arr| {
                    arr.iter()
                        .filter_map(|tool| {
                            let name = tool.get("name")?.as_str()?.to_string();
                            let params = match tool.get("params") {
                                Some(Value::String(s)) => {
                                    serde_json::from_str(s).unwrap_or(Value::Object(Default::default()))
                                }
                                Some(v) => v.clone(),
                                None => Value::Object(Default::default()),
                            };
                            Some(ParsedTool { name, params })
                        })
                        .collect()
                })
                .unwrap_or_default();
            return (speech, actions, tools);
        }
    }

    parse_legacy_format(stripped)
}

fn parse_legacy_format(text: &str) -> (String, Vec<Action>, Vec<ParsedTool>) {
    let tool_line_re = Regex::new(r"(?i)^(\w+)\s*(\{.*\})?$").unwrap();
    let mut speech_lines = Vec::new();
    let mut actions = Vec::new();
    let mut tools = Vec::new();

    for line in text.trim().lines() {
        let trimmed = line.trim();
        let upper = trimmed.to_uppercase();
        if upper.starts_with("ACTIONS:") {
            let rest = trimmed[8..].trim();
            if !rest.is_empty() {
                actions = rest
                    .split(',')
                    .filter_map(|a| Action::parse_str(a.trim()))
                    .collect();
            }
        } else if upper.starts_with("TOOL:") {
            let rest = trimmed[5..].trim();
            if let Some(caps) = tool_line_re.captures(rest) {
                let name = caps.get(1).unwrap().as_str().to_lowercase();
                let params = caps
                    .get(2)
                    .and_then(|m| serde_json::from_str(m.as_str()).ok())
                    .unwrap_or(Value::Object(Default::default()));
                tools.push(ParsedTool { name, params });
            }
        } else if !trimmed.is_empty() {
            speech_lines.push(trimmed);
        }
    }

    (speech_lines.join("\n"), actions, tools)
}

/// Registered handler table plus optional effector/capability collaborators.
pub struct ToolDispatcher {
    memory: Arc<MemoryStore>,
    personality: Arc<PersonalityModel>,
    vision: Option<Arc<dyn VisionCapabilities>>,
    actions: Option<Arc<dyn ActionEffector>>,
}

impl ToolDispatcher {
    pub fn new(memory: Arc<MemoryStore>, personality: Arc<PersonalityModel>) -> Self {
        Self {
            memory,
            personality,
            vision: None,
            actions: None,
        }
    }

    pub fn with_vision(mut self, vision: Arc<dyn VisionCapabilities>) -> Self {
        self.vision = Some(vision);
        self
    }

    pub fn with_action_effector(mut self, actions: Arc<dyn ActionEffector>) -> Self {
        self.actions = Some(actions);
        self
    }

    pub async fn execute_tool(&self, name: &str, params: &Value) -> ToolResult {
        let result = match name.to_lowercase().as_str() {
            "remember" => self.tool_remember(params).await,
            "recall" => self.tool_recall(params).await,
            "learn_trick" => self.tool_learn_trick(params).await,
            "do_trick" => self.tool_do_trick(params).await,
            "list_tricks" => self.tool_list_tricks().await,
            "set_goal" => self.tool_set_goal(params).await,
            "complete_goal" => self.tool_complete_goal(params).await,
            "list_goals" => self.tool_list_goals().await,
            "update_personality" => self.tool_update_personality(params).await,
            "learn_face" => self.tool_vision_name(params, "learn_face").await,
            "learn_room" => self.tool_vision_name(params, "learn_room").await,
            "follow_person" => self.tool_vision_noarg("follow_person").await,
            "find_person" => self.tool_vision_name(params, "find_person").await,
            "go_to_room" => self.tool_vision_name(params, "go_to_room").await,
            "explore" => self.tool_vision_noarg("explore").await,
            other => Ok(ToolResult::fail(format!("Unknown tool: {other}"))),
        };
        match result {
            Ok(outcome) => outcome,
            Err(e) => ToolResult::fail(format!("Tool error: {e}")),
        }
    }

    pub async fn parse_and_execute(&self, text: &str) -> (String, Vec<Action>, Vec<ToolResult>) {
        let (speech, actions, tools) = parse_response(text);
        let mut results = Vec::with_capacity(tools.len());
        for tool in &tools {
            results.push(self.execute_tool(&tool.name, &tool.params).await);
        }
        (speech, actions, results)
    }

    async fn tool_remember(&self, params: &Value) -> anyhow::Result<ToolResult> {
        let subject = params.get("subject").and_then(Value::as_str).unwrap_or("");
        let content = params.get("content").and_then(Value::as_str).unwrap_or("");
        if subject.is_empty() || content.is_empty() {
            return Ok(ToolResult::fail("Missing subject or content"));
        }
        let category = params
            .get("category")
            .and_then(Value::as_str)
            .and_then(rex_core::MemoryCategory::parse_str)
            .unwrap_or(rex_core::MemoryCategory::Fact);
        let importance = params
            .get("importance")
            .and_then(Value::as_f64)
            .unwrap_or(0.5) as f32;
        let id = self
            .memory
            .remember(category, subject, content, importance)
            .await?;
        Ok(ToolResult::ok_with(
            format!("Remembered: {subject}"),
            serde_json::json!({ "id": id }),
        ))
    }

    async fn tool_recall(&self, params: &Value) -> anyhow::Result<ToolResult> {
        let query = params.get("query").and_then(Value::as_str).unwrap_or("");
        if query.is_empty() {
            return Ok(ToolResult::fail("Missing query"));
        }
        let limit = params.get("limit").and_then(Value::as_u64).unwrap_or(5) as i64;
        let category = params
            .get("category")
            .and_then(Value::as_str)
            .and_then(rex_core::MemoryCategory::parse_str);
        let memories = self.memory.recall(query, limit, category).await?;
        if memories.is_empty() {
            return Ok(ToolResult::ok_with("No memories found", serde_json::json!([])));
        }
        let results: Vec<Value> = memories
            .iter()
            .map(|m| {
                serde_json::json!({
                    "category": m.category.as_str(),
                    "subject": m.subject,
                    "content": m.content,
                    "importance": m.importance,
                })
            })
            .collect();
        Ok(ToolResult::ok_with(
            format!("Found {} memories", memories.len()),
            Value::Array(results),
        ))
    }

    async fn tool_learn_trick(&self, params: &Value) -> anyhow::Result<ToolResult> {
        let name = params.get("name").and_then(Value::as_str).unwrap_or("");
        let trigger = params
            .get("trigger")
            .or_else(|| params.get("trigger_phrase"))
            .and_then(Value::as_str)
            .unwrap_or("");
        let raw_actions: Vec<&str> = params
            .get("actions")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        if name.is_empty() || trigger.is_empty() || raw_actions.is_empty() {
            return Ok(ToolResult::fail("Missing name, trigger, or actions"));
        }
        let Some(actions): Option<Vec<Action>> =
            raw_actions.iter().map(|a| Action::parse_str(a)).collect()
        else {
            return Ok(ToolResult::fail("Unknown action in trick"));
        };
        match self.memory.learn_trick(name, trigger, &actions).await {
            Ok(()) => Ok(ToolResult::ok(format!("Learned trick: {name}"))),
            Err(e) => Ok(ToolResult::fail(e.to_string())),
        }
    }

    async fn tool_do_trick(&self, params: &Value) -> anyhow::Result<ToolResult> {
        let name = params.get("name").and_then(Value::as_str).unwrap_or("");
        if name.is_empty() {
            return Ok(ToolResult::fail("Missing trick name"));
        }
        let trick = match self.memory.get_trick(name).await? {
            Some(t) => Some(t),
            None => self.memory.find_trick_by_trigger(name).await?,
        };
        let Some(trick) = trick else {
            return Ok(ToolResult::fail(format!("Unknown trick: {name}")));
        };
        if let Some(effector) = &self.actions {
            effector.perform(&trick.actions).await?;
            self.memory.record_trick_performed(&trick.name).await?;
            Ok(ToolResult::ok_with(
                format!("Performing {}!", trick.name),
                serde_json::json!({ "actions": trick.actions }),
            ))
        } else {
            Ok(ToolResult::ok_with(
                format!("Would perform {}: {:?}", trick.name, trick.actions),
                serde_json::json!({ "actions": trick.actions }),
            ))
        }
    }

    async fn tool_list_tricks(&self) -> anyhow::Result<ToolResult> {
        let tricks = self.memory.list_tricks().await?;
        if tricks.is_empty() {
            return Ok(ToolResult::ok_with("No tricks learned yet", serde_json::json!([])));
        }
        let results: Vec<Value> = tricks
            .iter()
            .map(|t| {
                serde_json::json!({
                    "name": t.name,
                    "trigger": t.trigger_phrase,
                    "times_performed": t.times_performed,
                })
            })
            .collect();
        Ok(ToolResult::ok_with(format!("Know {} tricks", tricks.len()), Value::Array(results)))
    }

    async fn tool_set_goal(&self, params: &Value) -> anyhow::Result<ToolResult> {
        let description = params.get("description").and_then(Value::as_str).unwrap_or("");
        if description.is_empty() {
            return Ok(ToolResult::fail("Missing goal description"));
        }
        let priority = params.get("priority").and_then(Value::as_u64).unwrap_or(3) as u8;
        let id = self.memory.create_goal(description, priority).await?;
        Ok(ToolResult::ok_with(
            format!("Goal set: {description}"),
            serde_json::json!({ "id": id }),
        ))
    }

    async fn tool_complete_goal(&self, params: &Value) -> anyhow::Result<ToolResult> {
        let Some(id) = params.get("id").and_then(Value::as_i64) else {
            return Ok(ToolResult::fail("Missing goal ID"));
        };
        self.memory.set_goal_status(id, rex_core::GoalStatus::Completed).await?;
        Ok(ToolResult::ok(format!("Goal {id} completed!")))
    }

    async fn tool_list_goals(&self) -> anyhow::Result<ToolResult> {
        let goals = self.memory.get_active_goals().await?;
        if goals.is_empty() {
            return Ok(ToolResult::ok_with("No active goals", serde_json::json!([])));
        }
        let results: Vec<Value> = goals
            .iter()
            .map(|g| {
                serde_json::json!({
                    "id": g.id,
                    "description": g.description,
                    "priority": g.priority,
                })
            })
            .collect();
        Ok(ToolResult::ok_with(format!("{} active goals", goals.len()), Value::Array(results)))
    }

    async fn tool_update_personality(&self, params: &Value) -> anyhow::Result<ToolResult> {
        let trait_name = params.get("trait").and_then(Value::as_str).unwrap_or("");
        let Some(value) = params.get("value").and_then(Value::as_f64) else {
            return Ok(ToolResult::fail("Missing trait or value"));
        };
        if trait_name.is_empty() {
            return Ok(ToolResult::fail("Missing trait or value"));
        }
        match self.personality.update(trait_name, value as f32) {
            Ok(()) => Ok(ToolResult::ok(format!("Updated {trait_name}"))),
            Err(e) => Ok(ToolResult::fail(e.to_string())),
        }
    }

    async fn tool_vision_name(&self, params: &Value, capability: &str) -> anyhow::Result<ToolResult> {
        let name = params.get("name").and_then(Value::as_str).unwrap_or("");
        if name.is_empty() && capability != "follow_person" {
            return Ok(ToolResult::fail("Missing name"));
        }
        let Some(vision) = &self.vision else {
            return Ok(ToolResult::unavailable());
        };
        let outcome = match capability {
            "learn_face" => vision.learn_face(name).await,
            "learn_room" => vision.learn_room(name).await,
            "find_person" => vision.find_person(name).await,
            "go_to_room" => vision.go_to_room(name).await,
            _ => None,
        };
        match outcome {
            None => Ok(ToolResult::unavailable()),
            Some(Ok(message)) => Ok(ToolResult::ok(message)),
            Some(Err(e)) => Ok(ToolResult::fail(format!("Failed: {e}"))),
        }
    }

    async fn tool_vision_noarg(&self, capability: &str) -> anyhow::Result<ToolResult> {
        let Some(vision) = &self.vision else {
            return Ok(ToolResult::unavailable());
        };
        let outcome = match capability {
            "follow_person" => vision.follow_person().await,
            "explore" => vision.explore().await,
            _ => None,
        };
        match outcome {
            None => Ok(ToolResult::unavailable()),
            Some(Ok(message)) => Ok(ToolResult::ok(message)),
            Some(Err(e)) => Ok(ToolResult::fail(format!("Failed: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_response_with_string_encoded_params() {
        let text = r#"{"speech":"hi","actions":["wag tail"],"tools":[{"name":"remember","params":"{\"subject\":\"Joe\"}"}]}"#;
        let (speech, actions, tools) = parse_response(text);
        assert_eq!(speech, "hi");
        assert_eq!(actions, vec![Action::WagTail]);
        assert_eq!(tools[0].name, "remember");
        assert_eq!(tools[0].params["subject"], "Joe");
    }

    #[test]
    fn strips_fenced_code_block_before_parsing() {
        let text = "```json\n{\"speech\":\"hi\",\"actions\":[],\"tools\":[]}\n```";
        let (speech, _, _) = parse_response(text);
        assert_eq!(speech, "hi");
    }

    #[test]
    fn parses_legacy_line_format() {
        let text = "Hello there\nACTIONS: wag tail, sit\nTOOL: remember {\"subject\":\"Joe\"}";
        let (speech, actions, tools) = parse_response(text);
        assert_eq!(speech, "Hello there");
        assert_eq!(actions, vec![Action::WagTail, Action::Sit]);
        assert_eq!(tools[0].name, "remember");
    }

    #[test]
    fn legacy_format_with_no_tool_params_defaults_to_empty_object() {
        let text = "ACTIONS: sit\nTOOL: list_tricks";
        let (_, _, tools) = parse_response(text);
        assert_eq!(tools[0].name, "list_tricks");
        assert!(tools[0].params.as_object().unwrap().is_empty());
    }
}
