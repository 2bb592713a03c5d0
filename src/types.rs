use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A single step the model asks the agent to perform.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Action {
    pub tool: String,
    pub parameters: Map<String, Value>,
    pub reasoning: String,
}

/// Tool name recorded for an entry that names no tool at all.
pub const MISSING_TOOL: &str = "<missing>";

impl Action {
    /// Read one entry of the model's `actions` list.
    ///
    /// Never fails: a malformed entry still becomes an action, and the batch
    /// reports it on its own line (an unusable tool name is an unknown tool)
    /// instead of the whole plan being thrown away.
    pub fn from_entry(entry: Value) -> Self {
        let Value::Object(mut entry) = entry else {
            return Self {
                tool: entry.to_string(),
                parameters: Map::new(),
                reasoning: default_reasoning(),
            };
        };
        let tool = match entry.remove("tool") {
            Some(Value::String(tool)) => tool,
            None | Some(Value::Null) => MISSING_TOOL.to_string(),
            Some(other) => other.to_string(),
        };
        let parameters = match entry.remove("parameters") {
            Some(Value::Object(parameters)) => parameters,
            _ => Map::new(),
        };
        let reasoning = match entry.remove("reasoning") {
            Some(Value::String(reasoning)) => reasoning,
            _ => default_reasoning(),
        };
        Self {
            tool,
            parameters,
            reasoning,
        }
    }
}

fn default_reasoning() -> String {
    "No reasoning provided".to_string()
}

/// Ordered list of actions derived from one instruction. Order is execution order.
pub type ActionPlan = Vec<Action>;

/// How a single action ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    NotFound,
    ExecutionError,
    UnknownTool,
    /// The browser session died; the rest of the batch is skipped.
    SessionFatal,
    Skipped,
}

impl Outcome {
    pub fn label(self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::NotFound => "not found",
            Outcome::ExecutionError => "error",
            Outcome::UnknownTool => "unknown tool",
            Outcome::SessionFatal => "session lost",
            Outcome::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub tool: String,
    pub outcome: Outcome,
    pub message: String,
}

impl ActionResult {
    pub fn new(tool: &str, outcome: Outcome, message: impl Into<String>) -> Self {
        Self {
            tool: tool.to_string(),
            outcome,
            message: message.into(),
        }
    }

    pub fn success(tool: &str, message: impl Into<String>) -> Self {
        Self::new(tool, Outcome::Success, message)
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }
}

impl fmt::Display for ActionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.outcome {
            Outcome::Success => write!(f, "✓ {}: {}", self.tool, self.message),
            other => write!(f, "✗ {} [{}]: {}", self.tool, other.label(), self.message),
        }
    }
}

/// Per-action outcomes for one executed plan, in plan order.
pub type ActionTrace = Vec<ActionResult>;

/// What the model sees about the current page before planning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub title: String,
    pub url: String,
    pub preview: String,
}

impl fmt::Display for PageSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Title: {}\nURL: {}\nPage preview: {}...",
            self.title, self.url, self.preview
        )
    }
}

pub const PAGE_PREVIEW_MAX_CHARS: usize = 500;
pub const SCROLL_STEP_PX: i64 = 500;
